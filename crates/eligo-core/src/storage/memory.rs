//! In-memory store.

use super::ApplicationStore;
use crate::application::Application;
use crate::eligibility::IncomeLimitTable;
use crate::token::TokenDigest;
use crate::{ApplicationId, EligoError, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    applications: BTreeMap<ApplicationId, Application>,
    tokens: BTreeMap<TokenDigest, ApplicationId>,
    limits: IncomeLimitTable,
}

/// `BTreeMap`-backed store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| EligoError::Storage("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| EligoError::Storage("memory store lock poisoned".to_string()))
    }
}

impl ApplicationStore for MemoryStore {
    fn allocate_id(&self) -> Result<ApplicationId> {
        let mut inner = self.write()?;
        inner.next_id = inner.next_id.max(1);
        let id = ApplicationId(inner.next_id);
        inner.next_id += 1;
        Ok(id)
    }

    fn insert(&self, app: &Application, token: &TokenDigest) -> Result<()> {
        let mut inner = self.write()?;
        if inner.applications.contains_key(&app.id) {
            return Err(EligoError::Duplicate(format!("application {}", app.id)));
        }
        if inner.tokens.contains_key(token) {
            return Err(EligoError::Duplicate("access token".to_string()));
        }
        inner.tokens.insert(token.clone(), app.id);
        inner.applications.insert(app.id, app.clone());
        Ok(())
    }

    fn update(&self, app: &Application) -> Result<()> {
        let mut inner = self.write()?;
        let slot = inner
            .applications
            .get_mut(&app.id)
            .ok_or_else(|| EligoError::NotFound(format!("application {}", app.id)))?;
        *slot = app.clone();
        Ok(())
    }

    fn get(&self, id: ApplicationId) -> Result<Option<Application>> {
        Ok(self.read()?.applications.get(&id).cloned())
    }

    fn find_by_token(&self, token: &TokenDigest) -> Result<Option<Application>> {
        let inner = self.read()?;
        Ok(inner
            .tokens
            .get(token)
            .and_then(|id| inner.applications.get(id))
            .cloned())
    }

    fn list(&self) -> Result<Vec<Application>> {
        Ok(self.read()?.applications.values().cloned().collect())
    }

    fn income_limits(&self) -> Result<IncomeLimitTable> {
        Ok(self.read()?.limits.clone())
    }

    fn replace_income_limits(&self, table: &IncomeLimitTable) -> Result<()> {
        self.write()?.limits = table.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::exercise_store;

    #[test]
    fn memory_store_contract() {
        exercise_store(&MemoryStore::new());
    }
}
