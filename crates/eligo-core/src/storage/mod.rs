//! # Storage Module
//!
//! Persistence for applications and the income limit table.
//!
//! - [`RedbStore`]: redb embedded database (ACID, crash safe, concurrent
//!   readers with a single writer). Records are postcard-encoded.
//! - [`MemoryStore`]: `BTreeMap` behind a lock, for tests and tooling.
//!
//! Tokens are indexed by digest only.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::application::Application;
use crate::eligibility::IncomeLimitTable;
use crate::token::TokenDigest;
use crate::{ApplicationId, Result};
use chrono::{DateTime, Utc};

/// Operations every backend provides.
pub trait ApplicationStore: Send + Sync {
    /// Reserve the next application id. Ids are never reused.
    fn allocate_id(&self) -> Result<ApplicationId>;

    /// Insert a new application together with its token index entry.
    /// Fails with `Duplicate` if the id or digest already exists.
    fn insert(&self, app: &Application, token: &TokenDigest) -> Result<()>;

    /// Overwrite an existing application. Fails with `NotFound` if absent.
    fn update(&self, app: &Application) -> Result<()>;

    fn get(&self, id: ApplicationId) -> Result<Option<Application>>;

    fn find_by_token(&self, token: &TokenDigest) -> Result<Option<Application>>;

    /// Every application, ordered by id.
    fn list(&self) -> Result<Vec<Application>>;

    /// The current limit table. Empty if never configured.
    fn income_limits(&self) -> Result<IncomeLimitTable>;

    fn replace_income_limits(&self, table: &IncomeLimitTable) -> Result<()>;

    /// Allocate, build and insert a fresh draft.
    fn create(&self, token: &TokenDigest, now: DateTime<Utc>) -> Result<Application> {
        let id = self.allocate_id()?;
        let app = Application::start(id, now);
        self.insert(&app, token)?;
        Ok(app)
    }
}

// =============================================================================
// TESTS
// =============================================================================
