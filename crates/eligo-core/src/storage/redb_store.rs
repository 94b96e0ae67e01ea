//! # Redb Store
//!
//! Disk-backed store using the redb embedded database.
//!
//! Tables:
//! - `applications`: `u64 -> postcard(Application)`
//! - `tokens`: `token digest -> u64`
//! - `settings`: `name -> postcard(value)` (the income limit table)
//! - `counters`: `name -> u64` (next application id)

use super::ApplicationStore;
use crate::application::Application;
use crate::eligibility::IncomeLimitTable;
use crate::token::TokenDigest;
use crate::{ApplicationId, EligoError, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

const APPLICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("applications");
const TOKENS: TableDefinition<&str, u64> = TableDefinition::new("tokens");
const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const INCOME_LIMITS_KEY: &str = "income_limits";
const NEXT_ID_KEY: &str = "next_application_id";

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for EligoError {
                fn from(err: $ty) -> Self {
                    EligoError::Storage(err.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// =============================================================================
// STORE
// =============================================================================

/// redb-backed [`ApplicationStore`].
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create the database at `path` and ensure all tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        let txn = db.begin_write()?;
        {
            txn.open_table(APPLICATIONS)?;
            txn.open_table(TOKENS)?;
            txn.open_table(SETTINGS)?;
            txn.open_table(COUNTERS)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }
}

impl ApplicationStore for RedbStore {
    fn allocate_id(&self) -> Result<ApplicationId> {
        let txn = self.db.begin_write()?;
        let id = {
            let mut counters = txn.open_table(COUNTERS)?;
            let next = counters.get(NEXT_ID_KEY)?.map(|g| g.value()).unwrap_or(1);
            counters.insert(NEXT_ID_KEY, next.saturating_add(1))?;
            next
        };
        txn.commit()?;
        Ok(ApplicationId(id))
    }

    fn insert(&self, app: &Application, token: &TokenDigest) -> Result<()> {
        let bytes = postcard::to_allocvec(app)?;
        let txn = self.db.begin_write()?;
        {
            let mut apps = txn.open_table(APPLICATIONS)?;
            let mut tokens = txn.open_table(TOKENS)?;
            if apps.get(app.id.0)?.is_some() {
                return Err(EligoError::Duplicate(format!("application {}", app.id)));
            }
            if tokens.get(token.as_str())?.is_some() {
                return Err(EligoError::Duplicate("access token".to_string()));
            }
            apps.insert(app.id.0, bytes.as_slice())?;
            tokens.insert(token.as_str(), app.id.0)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn update(&self, app: &Application) -> Result<()> {
        let bytes = postcard::to_allocvec(app)?;
        let txn = self.db.begin_write()?;
        {
            let mut apps = txn.open_table(APPLICATIONS)?;
            if apps.get(app.id.0)?.is_none() {
                return Err(EligoError::NotFound(format!("application {}", app.id)));
            }
            apps.insert(app.id.0, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get(&self, id: ApplicationId) -> Result<Option<Application>> {
        let txn = self.db.begin_read()?;
        let apps = txn.open_table(APPLICATIONS)?;
        match apps.get(id.0)? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    fn find_by_token(&self, token: &TokenDigest) -> Result<Option<Application>> {
        let id = {
            let txn = self.db.begin_read()?;
            let tokens = txn.open_table(TOKENS)?;
            tokens.get(token.as_str())?.map(|g| g.value())
        };
        match id {
            Some(id) => self.get(ApplicationId(id)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<Application>> {
        let txn = self.db.begin_read()?;
        let apps = txn.open_table(APPLICATIONS)?;
        let mut out = Vec::new();
        for entry in apps.iter()? {
            let (_, value) = entry?;
            out.push(postcard::from_bytes(value.value())?);
        }
        Ok(out)
    }

    fn income_limits(&self) -> Result<IncomeLimitTable> {
        let txn = self.db.begin_read()?;
        let settings = txn.open_table(SETTINGS)?;
        match settings.get(INCOME_LIMITS_KEY)? {
            Some(guard) => Ok(postcard::from_bytes(guard.value())?),
            None => Ok(IncomeLimitTable::default()),
        }
    }

    fn replace_income_limits(&self, table: &IncomeLimitTable) -> Result<()> {
        let bytes = postcard::to_allocvec(table)?;
        let txn = self.db.begin_write()?;
        {
            let mut settings = txn.open_table(SETTINGS)?;
            settings.insert(INCOME_LIMITS_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
