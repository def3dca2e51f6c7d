//! Job search: the index collaborator contract, the FTS5-backed index and the
//! maintainer that keeps it in step with the job records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mixbook_core::{JobId, TenantId};
use mixbook_jobs::Job;

pub mod fts5;
pub mod maintainer;

pub use fts5::Fts5SearchIndex;
pub use maintainer::{RebuildError, SearchIndexMaintainer};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
}

/// One matching job. Higher `score` is a better match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: JobId,
    pub name: String,
    pub score: f64,
}

/// Every tenant's full job set, the input to a wholesale rebuild.
#[derive(Debug, Clone, Default)]
pub struct JobCorpus {
    pub tenants: Vec<(TenantId, Vec<Job>)>,
}

impl JobCorpus {
    pub fn push(&mut self, tenant: TenantId, jobs: Vec<Job>) {
        self.tenants.push((tenant, jobs));
    }

    pub fn job_count(&self) -> usize {
        self.tenants.iter().map(|(_, jobs)| jobs.len()).sum()
    }
}

/// State of the search index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexState {
    /// No full build has completed yet.
    #[default]
    Empty,
    /// Serving the `generation`-th full build (plus incremental changes).
    Ready { generation: u64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub indexed_jobs: usize,
    pub tenants: usize,
    pub state: IndexState,
}

/// Search-engine collaborator.
///
/// Implementations must make `build_index` atomic for readers: a concurrent
/// `search_jobs` sees the previous generation or the new one, never a mix.
pub trait SearchIndex: Send + Sync {
    /// Replace the whole index with one built from `corpus`.
    fn build_index(&self, corpus: JobCorpus) -> Result<IndexStats, SearchError>;

    fn search_jobs(&self, tenant: &TenantId, term: &str) -> Result<Vec<SearchResult>, SearchError>;

    /// Insert or replace the entry for `job`.
    fn update_job_index(&self, tenant: &TenantId, job: &Job) -> Result<(), SearchError>;

    /// Remove the entry for `job_id`; absent entries are not an error.
    fn delete_job_index(&self, tenant: &TenantId, job_id: &JobId) -> Result<(), SearchError>;

    fn stats(&self) -> IndexStats;
}
