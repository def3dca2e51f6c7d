//! Job search on SQLite's FTS5 full-text engine.
//!
//! One FTS5 row per job. `tenant_id` and `job_id` ride along as unindexed
//! columns; `job_search_keys` maps `(tenant, job)` to the FTS rowid so single
//! entries can be replaced or dropped without scanning the index.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use mixbook_core::{JobId, TenantId};
use mixbook_jobs::Job;

use super::{IndexState, IndexStats, JobCorpus, SearchError, SearchIndex, SearchResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_search_keys (
    doc_id    INTEGER PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    job_id    TEXT NOT NULL,
    UNIQUE (tenant_id, job_id)
);
CREATE VIRTUAL TABLE IF NOT EXISTS job_search USING fts5(
    tenant_id UNINDEXED,
    job_id UNINDEXED,
    name,
    body,
    tokenize = 'unicode61'
);
"#;

// Column weights follow the table layout: tenant_id, job_id, name, body.
const SEARCH_SQL: &str = r#"
SELECT job_id, name, bm25(job_search, 0.0, 0.0, 10.0, 1.0) AS rank
FROM job_search
WHERE job_search MATCH ?1 AND tenant_id = ?2
ORDER BY rank, job_id
"#;

fn sql_error(err: rusqlite::Error) -> SearchError {
    SearchError::Unavailable(err.to_string())
}

/// Turn free text into an FTS5 query: every word must match, each as a prefix.
///
/// Words are runs of alphanumerics, so the quoted phrases never need escaping.
fn match_expression(term: &str) -> Option<String> {
    let phrases: Vec<String> = term
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{}\" *", w.to_lowercase()))
        .collect();

    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" "))
    }
}

fn remove_doc(tx: &Transaction<'_>, tenant: &TenantId, job_id: &JobId) -> rusqlite::Result<()> {
    let doc_id: Option<i64> = tx
        .query_row(
            "SELECT doc_id FROM job_search_keys WHERE tenant_id = ?1 AND job_id = ?2",
            params![tenant.as_str(), job_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(doc_id) = doc_id {
        tx.execute("DELETE FROM job_search WHERE rowid = ?1", params![doc_id])?;
        tx.execute("DELETE FROM job_search_keys WHERE doc_id = ?1", params![doc_id])?;
    }
    Ok(())
}

fn insert_doc(tx: &Transaction<'_>, tenant: &TenantId, job: &Job) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO job_search_keys (tenant_id, job_id) VALUES (?1, ?2)",
        params![tenant.as_str(), job.id.as_str()],
    )?;
    let doc_id = tx.last_insert_rowid();

    let body = job.searchable_fields().collect::<Vec<_>>().join(" ");
    tx.execute(
        "INSERT INTO job_search (rowid, tenant_id, job_id, name, body) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![doc_id, tenant.as_str(), job.id.as_str(), job.name(), body],
    )?;
    Ok(())
}

struct Inner {
    conn: Connection,
    /// Completed full builds; 0 until the first one.
    generation: u64,
}

/// FTS5 search index held in a private SQLite database.
///
/// All access goes through one connection lock, so a full build (a single
/// transaction) is seen by searches either entirely or not at all.
pub struct Fts5SearchIndex {
    inner: Mutex<Inner>,
}

impl core::fmt::Debug for Fts5SearchIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fts5SearchIndex").finish_non_exhaustive()
    }
}

impl Fts5SearchIndex {
    /// A fresh, empty index. Its content is derived, so it lives in memory and
    /// is repopulated by the first full build.
    pub fn open_in_memory() -> Result<Self, SearchError> {
        let conn = Connection::open_in_memory().map_err(sql_error)?;
        conn.execute_batch(SCHEMA).map_err(sql_error)?;
        Ok(Self {
            inner: Mutex::new(Inner { conn, generation: 0 }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, SearchError> {
        self.inner
            .lock()
            .map_err(|_| SearchError::Unavailable("index lock poisoned".to_string()))
    }

    fn read_stats(inner: &Inner) -> Result<IndexStats, SearchError> {
        let (indexed_jobs, tenants): (i64, i64) = inner
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT tenant_id) FROM job_search_keys",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(sql_error)?;

        Ok(IndexStats {
            indexed_jobs: indexed_jobs as usize,
            tenants: tenants as usize,
            state: match inner.generation {
                0 => IndexState::Empty,
                generation => IndexState::Ready { generation },
            },
        })
    }
}

impl SearchIndex for Fts5SearchIndex {
    fn build_index(&self, corpus: JobCorpus) -> Result<IndexStats, SearchError> {
        let mut inner = self.lock()?;

        let tx = inner.conn.transaction().map_err(sql_error)?;
        tx.execute("DELETE FROM job_search", []).map_err(sql_error)?;
        tx.execute("DELETE FROM job_search_keys", []).map_err(sql_error)?;
        for (tenant, jobs) in &corpus.tenants {
            for job in jobs {
                insert_doc(&tx, tenant, job).map_err(sql_error)?;
            }
        }
        tx.commit().map_err(sql_error)?;

        inner.generation += 1;
        debug!(generation = inner.generation, jobs = corpus.job_count(), "fts5 job index built");
        Self::read_stats(&inner)
    }

    fn search_jobs(&self, tenant: &TenantId, term: &str) -> Result<Vec<SearchResult>, SearchError> {
        let Some(expression) = match_expression(term) else {
            return Ok(Vec::new());
        };

        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(SEARCH_SQL).map_err(sql_error)?;
        let rows = stmt
            .query_map(params![expression, tenant.as_str()], |row| {
                let id: String = row.get(0)?;
                let name: String = row.get(1)?;
                let rank: f64 = row.get(2)?;
                Ok(SearchResult {
                    id: JobId::new(id),
                    name,
                    // bm25 is negative, more negative is better.
                    score: -rank,
                })
            })
            .map_err(sql_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(sql_error)
    }

    fn update_job_index(&self, tenant: &TenantId, job: &Job) -> Result<(), SearchError> {
        let mut inner = self.lock()?;
        let tx = inner.conn.transaction().map_err(sql_error)?;
        remove_doc(&tx, tenant, &job.id).map_err(sql_error)?;
        insert_doc(&tx, tenant, job).map_err(sql_error)?;
        tx.commit().map_err(sql_error)
    }

    fn delete_job_index(&self, tenant: &TenantId, job_id: &JobId) -> Result<(), SearchError> {
        let mut inner = self.lock()?;
        let tx = inner.conn.transaction().map_err(sql_error)?;
        remove_doc(&tx, tenant, job_id).map_err(sql_error)?;
        tx.commit().map_err(sql_error)
    }

    fn stats(&self) -> IndexStats {
        self.lock()
            .and_then(|inner| Self::read_stats(&inner))
            .unwrap_or_default()
    }
}
