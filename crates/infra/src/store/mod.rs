//! Persistent-store collaborator contracts and backends.
//!
//! The store offers per-record atomicity only: every method touches a single
//! record (or reads a listing). Nothing here spans records transactionally.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use mixbook_auth::Account;
use mixbook_core::{FormulaId, JobId, TenantId};
use mixbook_jobs::{Formula, Job};

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Distinguished store failures.
///
/// `NotFound` and `AlreadyExists` are recognised by the services and passed
/// through to callers; `Storage` is everything else.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    AlreadyExists,

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(cause: impl core::fmt::Display) -> Self {
        Self::Storage(cause.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account records (tenant-independent).
pub trait AccountStore: Send + Sync {
    fn get_account(&self, id: &TenantId) -> StoreResult<Account>;
    fn get_all_accounts(&self) -> StoreResult<Vec<Account>>;
    /// Fails with `AlreadyExists` if the id is taken.
    fn create_account(&self, account: Account) -> StoreResult<()>;
    /// Replaces an existing record; fails with `NotFound` if absent.
    fn update_account(&self, account: Account) -> StoreResult<()>;
    /// Marks an existing account disabled; fails with `NotFound` if absent.
    fn disable_account(&self, id: &TenantId, now: DateTime<Utc>) -> StoreResult<()>;
}

/// Job records, scoped by tenant and keyed by job id.
pub trait JobStore: Send + Sync {
    fn get_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<Job>;
    fn get_all_jobs(&self, tenant: &TenantId) -> StoreResult<Vec<Job>>;
    /// Every tenant holding at least one job, ordered by id.
    fn tenants(&self) -> StoreResult<Vec<TenantId>>;
    /// Fails with `AlreadyExists` if the id is taken within the tenant.
    fn add_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()>;
    /// Replaces an existing record; fails with `NotFound` if absent.
    fn update_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()>;
    /// Fails with `NotFound` if absent.
    fn delete_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<()>;
}

/// Formula records, scoped by tenant and keyed by formula id.
pub trait FormulaStore: Send + Sync {
    fn get_formula(&self, tenant: &TenantId, id: &FormulaId) -> StoreResult<Formula>;
    /// Replaces an existing record; fails with `NotFound` if absent.
    fn update_formula(&self, tenant: &TenantId, formula: Formula) -> StoreResult<()>;
}

/// Where records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    InMemory,
    Sqlite(std::path::PathBuf),
}

impl StorageLocation {
    /// `:memory:` selects the in-memory backend, anything else is a SQLite path.
    pub fn parse(raw: &str) -> Self {
        if raw == ":memory:" {
            StorageLocation::InMemory
        } else {
            StorageLocation::Sqlite(Path::new(raw).to_path_buf())
        }
    }
}

/// The three store contracts, usually backed by one object.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub jobs: Arc<dyn JobStore>,
    pub formulas: Arc<dyn FormulaStore>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AccountStore + JobStore + FormulaStore + 'static,
    {
        Self {
            accounts: backend.clone(),
            jobs: backend.clone(),
            formulas: backend,
        }
    }

    pub fn open(location: &StorageLocation) -> StoreResult<Self> {
        match location {
            StorageLocation::InMemory => Ok(Self::from_backend(Arc::new(InMemoryStore::new()))),
            StorageLocation::Sqlite(path) => Ok(Self::from_backend(Arc::new(SqliteStore::open(path)?))),
        }
    }
}

impl core::fmt::Debug for Stores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_location_parsing() {
        assert_eq!(StorageLocation::parse(":memory:"), StorageLocation::InMemory);
        assert_eq!(
            StorageLocation::parse("/var/lib/mixbook.db"),
            StorageLocation::Sqlite("/var/lib/mixbook.db".into())
        );
    }
}
