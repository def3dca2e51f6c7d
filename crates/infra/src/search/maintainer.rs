use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{error, info, warn};

use mixbook_core::{JobId, TenantId};
use mixbook_jobs::Job;

use super::{IndexStats, JobCorpus, SearchError, SearchIndex, SearchResult};
use crate::registry::{ServiceError, ServiceResult};
use crate::store::{JobStore, StoreError};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("listing tenants failed: {0}")]
    Tenants(#[source] StoreError),

    #[error("listing jobs for tenant {tenant} failed: {source}")]
    Jobs {
        tenant: TenantId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Index(#[from] SearchError),
}

/// An incremental change seen while a rebuild was in flight.
#[derive(Debug, Clone)]
enum PendingChange {
    Upsert(TenantId, Job),
    Delete(TenantId, JobId),
}

/// Keeps the search index current with the authoritative job records.
///
/// Incremental changes are best-effort; drift is corrected by
/// [`SearchIndexMaintainer::rebuild_index`]. Changes made while a rebuild is
/// listing jobs are replayed on top of the new build, so a rebuild never
/// undoes a mutation that finished before it did.
#[derive(Clone)]
pub struct SearchIndexMaintainer {
    index: Arc<dyn SearchIndex>,
    jobs: Arc<dyn JobStore>,
    /// `Some` while a rebuild is running.
    pending: Arc<Mutex<Option<Vec<PendingChange>>>>,
    rebuilding: Arc<Mutex<()>>,
}

impl core::fmt::Debug for SearchIndexMaintainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SearchIndexMaintainer")
            .field("stats", &self.index.stats())
            .finish_non_exhaustive()
    }
}

impl SearchIndexMaintainer {
    pub fn new(index: Arc<dyn SearchIndex>, jobs: Arc<dyn JobStore>) -> Self {
        Self {
            index,
            jobs,
            pending: Arc::new(Mutex::new(None)),
            rebuilding: Arc::new(Mutex::new(())),
        }
    }

    pub fn update_entry(&self, tenant: &TenantId, job: &Job) {
        let mut pending = self.pending();
        if let Some(changes) = pending.as_mut() {
            changes.push(PendingChange::Upsert(tenant.clone(), job.clone()));
        }
        self.apply_update(tenant, job);
    }

    pub fn delete_entry(&self, tenant: &TenantId, job_id: &JobId) {
        let mut pending = self.pending();
        if let Some(changes) = pending.as_mut() {
            changes.push(PendingChange::Delete(tenant.clone(), job_id.clone()));
        }
        self.apply_delete(tenant, job_id);
    }

    pub fn search(&self, tenant: &TenantId, term: &str) -> ServiceResult<Vec<SearchResult>> {
        if term.is_empty() {
            return Err(ServiceError::precondition("search term required"));
        }
        self.index.search_jobs(tenant, term).map_err(|err| {
            error!(tenant = %tenant, error = %err, "search failed");
            ServiceError::Internal
        })
    }

    /// Rebuild the whole index from every tenant's jobs.
    ///
    /// Tenants are taken from the job records themselves. Any listing failure
    /// aborts the rebuild and leaves the previous generation in place.
    pub fn rebuild_index(&self) -> Result<IndexStats, RebuildError> {
        let _rebuilding = self.rebuilding.lock().unwrap_or_else(PoisonError::into_inner);

        *self.pending() = Some(Vec::new());
        let built = self.build_from_store();

        // Replay while still holding the log so no change lands in between.
        let mut pending = self.pending();
        let changes = pending.take().unwrap_or_default();
        let mut stats = built?;
        if !changes.is_empty() {
            for change in &changes {
                match change {
                    PendingChange::Upsert(tenant, job) => self.apply_update(tenant, job),
                    PendingChange::Delete(tenant, job_id) => self.apply_delete(tenant, job_id),
                }
            }
            stats = self.index.stats();
        }
        drop(pending);

        info!(
            indexed_jobs = stats.indexed_jobs,
            tenants = stats.tenants,
            replayed = changes.len(),
            "search index rebuilt"
        );
        Ok(stats)
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    fn build_from_store(&self) -> Result<IndexStats, RebuildError> {
        let tenants = self.jobs.tenants().map_err(RebuildError::Tenants)?;

        let mut corpus = JobCorpus::default();
        for tenant in tenants {
            let jobs = self
                .jobs
                .get_all_jobs(&tenant)
                .map_err(|source| RebuildError::Jobs {
                    tenant: tenant.clone(),
                    source,
                })?;
            corpus.push(tenant, jobs);
        }

        Ok(self.index.build_index(corpus)?)
    }

    fn pending(&self) -> MutexGuard<'_, Option<Vec<PendingChange>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_update(&self, tenant: &TenantId, job: &Job) {
        if let Err(err) = self.index.update_job_index(tenant, job) {
            warn!(tenant = %tenant, job = %job.id, error = %err, "search index update failed");
        }
    }

    fn apply_delete(&self, tenant: &TenantId, job_id: &JobId) {
        if let Err(err) = self.index.delete_job_index(tenant, job_id) {
            warn!(tenant = %tenant, job = %job_id, error = %err, "search index delete failed");
        }
    }
}
