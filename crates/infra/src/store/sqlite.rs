//! SQLite-backed store.
//!
//! Records are kept as JSON documents in one table per entity, keyed the same
//! way as the in-memory backend. A single connection behind a mutex gives
//! per-record atomicity; read-modify-write sequences that span two calls are
//! not atomic.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use mixbook_auth::Account;
use mixbook_core::{FormulaId, JobId, TenantId};
use mixbook_jobs::{Formula, Job};

use super::{AccountStore, FormulaStore, JobStore, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id   TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS jobs (
    tenant_id TEXT NOT NULL,
    id        TEXT NOT NULL,
    data      TEXT NOT NULL,
    PRIMARY KEY (tenant_id, id)
);
CREATE TABLE IF NOT EXISTS formulas (
    tenant_id TEXT NOT NULL,
    id        TEXT NOT NULL,
    data      TEXT NOT NULL,
    PRIMARY KEY (tenant_id, id)
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl core::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::AlreadyExists
        }
        other => StoreError::storage(other),
    }
}

fn encode<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(StoreError::storage)
}

fn decode<T: DeserializeOwned>(raw: &str) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(StoreError::storage)
}

fn expect_one_row(changed: usize) -> StoreResult<()> {
    if changed == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(sql_error)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA).map_err(sql_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Storage("connection lock poisoned".to_string()))
    }

    /// Seed or overwrite a formula record.
    pub fn put_formula(&self, tenant: &TenantId, formula: Formula) -> StoreResult<()> {
        let data = encode(&formula)?;
        self.conn()?
            .execute(
                "INSERT INTO formulas (tenant_id, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT (tenant_id, id) DO UPDATE SET data = excluded.data",
                params![tenant.as_str(), formula.id.as_str(), data],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn get_scoped<T: DeserializeOwned>(&self, table: &str, tenant: &TenantId, id: &str) -> StoreResult<T> {
        let sql = format!("SELECT data FROM {table} WHERE tenant_id = ?1 AND id = ?2");
        let raw: Option<String> = self
            .conn()?
            .query_row(&sql, params![tenant.as_str(), id], |row| row.get(0))
            .optional()
            .map_err(sql_error)?;
        decode(&raw.ok_or(StoreError::NotFound)?)
    }

    fn replace_scoped(&self, table: &str, tenant: &TenantId, id: &str, data: String) -> StoreResult<()> {
        let sql = format!("UPDATE {table} SET data = ?3 WHERE tenant_id = ?1 AND id = ?2");
        let changed = self
            .conn()?
            .execute(&sql, params![tenant.as_str(), id, data])
            .map_err(sql_error)?;
        expect_one_row(changed)
    }
}

impl AccountStore for SqliteStore {
    fn get_account(&self, id: &TenantId) -> StoreResult<Account> {
        let raw: Option<String> = self
            .conn()?
            .query_row("SELECT data FROM accounts WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(sql_error)?;
        decode(&raw.ok_or(StoreError::NotFound)?)
    }

    fn get_all_accounts(&self) -> StoreResult<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT data FROM accounts ORDER BY id")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)?;
        rows.iter().map(|raw| decode(raw)).collect()
    }

    fn create_account(&self, account: Account) -> StoreResult<()> {
        let data = encode(&account)?;
        self.conn()?
            .execute(
                "INSERT INTO accounts (id, data) VALUES (?1, ?2)",
                params![account.id.as_str(), data],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn update_account(&self, account: Account) -> StoreResult<()> {
        let data = encode(&account)?;
        let changed = self
            .conn()?
            .execute(
                "UPDATE accounts SET data = ?2 WHERE id = ?1",
                params![account.id.as_str(), data],
            )
            .map_err(sql_error)?;
        expect_one_row(changed)
    }

    fn disable_account(&self, id: &TenantId, now: DateTime<Utc>) -> StoreResult<()> {
        // Read and write under one guard so the flip is atomic for this record.
        let conn = self.conn()?;
        let raw: String = conn
            .query_row("SELECT data FROM accounts WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(sql_error)?
            .ok_or(StoreError::NotFound)?;

        let mut account: Account = decode(&raw)?;
        account.disable(now);

        conn.execute(
            "UPDATE accounts SET data = ?2 WHERE id = ?1",
            params![id.as_str(), encode(&account)?],
        )
        .map_err(sql_error)?;
        Ok(())
    }
}

impl JobStore for SqliteStore {
    fn get_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<Job> {
        self.get_scoped("jobs", tenant, id.as_str())
    }

    fn get_all_jobs(&self, tenant: &TenantId) -> StoreResult<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT data FROM jobs WHERE tenant_id = ?1 ORDER BY id")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map(params![tenant.as_str()], |row| row.get::<_, String>(0))
            .map_err(sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)?;
        rows.iter().map(|raw| decode(raw)).collect()
    }

    fn tenants(&self) -> StoreResult<Vec<TenantId>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT tenant_id FROM jobs ORDER BY tenant_id")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)?;
        Ok(rows.into_iter().map(TenantId::new).collect())
    }

    fn add_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
        let data = encode(&job)?;
        self.conn()?
            .execute(
                "INSERT INTO jobs (tenant_id, id, data) VALUES (?1, ?2, ?3)",
                params![tenant.as_str(), job.id.as_str(), data],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn update_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
        let data = encode(&job)?;
        self.replace_scoped("jobs", tenant, job.id.as_str(), data)
    }

    fn delete_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<()> {
        let changed = self
            .conn()?
            .execute(
                "DELETE FROM jobs WHERE tenant_id = ?1 AND id = ?2",
                params![tenant.as_str(), id.as_str()],
            )
            .map_err(sql_error)?;
        expect_one_row(changed)
    }
}

impl FormulaStore for SqliteStore {
    fn get_formula(&self, tenant: &TenantId, id: &FormulaId) -> StoreResult<Formula> {
        self.get_scoped("formulas", tenant, id.as_str())
    }

    fn update_formula(&self, tenant: &TenantId, formula: Formula) -> StoreResult<()> {
        let data = encode(&formula)?;
        self.replace_scoped("formulas", tenant, formula.id.as_str(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbook_jobs::JobDetails;

    fn job(id: &str, formulas: &[&str]) -> Job {
        Job::new(
            JobId::new(id),
            JobDetails::named(format!("job {id}")).with_formulas(formulas.iter().copied()),
            Utc::now(),
        )
    }

    #[test]
    fn job_lifecycle_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("mixbook.db")).unwrap();
        let t = TenantId::new("acct1");

        store.add_job(&t, job("j1", &["f1"])).unwrap();
        assert_eq!(store.add_job(&t, job("j1", &[])), Err(StoreError::AlreadyExists));

        let loaded = store.get_job(&t, &JobId::new("j1")).unwrap();
        assert_eq!(loaded.formulas(), &[FormulaId::new("f1")]);

        store.update_job(&t, job("j1", &["f2"])).unwrap();
        assert_eq!(store.get_all_jobs(&t).unwrap()[0].formulas(), &[FormulaId::new("f2")]);

        store.add_job(&TenantId::new("acct0"), job("j9", &[])).unwrap();
        assert_eq!(store.tenants().unwrap(), vec![TenantId::new("acct0"), t.clone()]);

        store.delete_job(&t, &JobId::new("j1")).unwrap();
        assert_eq!(store.get_job(&t, &JobId::new("j1")), Err(StoreError::NotFound));
        assert_eq!(store.tenants().unwrap(), vec![TenantId::new("acct0")]);
        assert_eq!(store.delete_job(&t, &JobId::new("j1")), Err(StoreError::NotFound));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixbook.db");
        let t = TenantId::new("acct1");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .create_account(Account::register(t.clone(), b"h".to_vec(), Utc::now()))
                .unwrap();
            store.put_formula(&t, Formula::new("f1")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_account(&t).unwrap().is_enabled());
        assert!(store.get_formula(&t, &FormulaId::new("f1")).is_ok());
    }

    #[test]
    fn accounts_unique_and_disable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = TenantId::new("acct1");
        let account = Account::register(id.clone(), b"h".to_vec(), Utc::now());

        store.create_account(account.clone()).unwrap();
        assert_eq!(store.create_account(account), Err(StoreError::AlreadyExists));

        store.disable_account(&id, Utc::now()).unwrap();
        assert!(!store.get_account(&id).unwrap().is_enabled());
        assert_eq!(
            store.disable_account(&TenantId::new("ghost"), Utc::now()),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn formula_update_requires_existing_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = TenantId::new("acct1");

        assert_eq!(store.update_formula(&t, Formula::new("f1")), Err(StoreError::NotFound));

        store.put_formula(&t, Formula::new("f1")).unwrap();
        let mut f = store.get_formula(&t, &FormulaId::new("f1")).unwrap();
        f.attach_job(&JobId::new("j1"));
        store.update_formula(&t, f).unwrap();

        assert!(store
            .get_formula(&t, &FormulaId::new("f1"))
            .unwrap()
            .references(&JobId::new("j1")));
    }
}
