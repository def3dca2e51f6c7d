use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use mixbook_auth::Argon2Hasher;
use mixbook_core::{Clock, IdGenerator, SystemClock};
use mixbook_infra::{
    AccountDirectory, Config, FormulaReferenceSync, Fts5SearchIndex, IndexRebuildWorker,
    JobRegistry, SearchIndexMaintainer, Stores, WorkerHandle,
};

/// Everything the handlers need, plus the background rebuild task whose
/// lifetime is tied to this object.
pub struct AppServices {
    pub accounts: AccountDirectory,
    pub jobs: JobRegistry,
    pub search: SearchIndexMaintainer,
    rebuild_worker: Mutex<Option<WorkerHandle>>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire services over `stores` and start the periodic index rebuild.
    pub fn new(stores: Stores, ids: IdGenerator, rebuild_interval: Duration) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let index = Fts5SearchIndex::open_in_memory().context("opening search index")?;
        let search = SearchIndexMaintainer::new(Arc::new(index), stores.jobs.clone());
        let accounts = AccountDirectory::new(stores.accounts.clone(), Arc::new(Argon2Hasher::new()), clock.clone());
        let jobs = JobRegistry::new(
            stores.jobs.clone(),
            FormulaReferenceSync::new(stores.formulas.clone()),
            search.clone(),
            ids,
            clock,
        );

        let worker = IndexRebuildWorker::spawn(search.clone(), rebuild_interval)
            .context("starting index rebuild worker")?;

        Ok(Self {
            accounts,
            jobs,
            search,
            rebuild_worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the background rebuild and wait for it. Later calls do nothing.
    pub fn shutdown(&self) {
        let handle = self
            .rebuild_worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    let stores = Stores::open(&config.storage)
        .with_context(|| format!("opening storage {:?}", config.storage))?;
    let ids = IdGenerator::new(config.id_length)?;

    tracing::info!(
        storage = ?config.storage,
        id_length = config.id_length,
        rebuild_secs = config.search_rebuild_interval.as_secs(),
        "services configured"
    );

    AppServices::new(stores, ids, config.search_rebuild_interval)
}
