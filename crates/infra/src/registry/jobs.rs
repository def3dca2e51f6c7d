//! Job Registry: tenant-scoped job records plus their derived state.
//!
//! The job write happens first. Formula back-references and the search entry
//! are then brought in line on a best-effort basis, so a failure there never
//! fails the job operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use mixbook_core::{Clock, FormulaId, IdGenerator, JobId, TenantId};
use mixbook_jobs::{FormulaChanges, Job, JobDetails, formula_changes};
use mixbook_observability::audit::{self, AuditAction};

use super::cross_ref::FormulaReferenceSync;
use super::error::{ServiceError, ServiceResult, store_failure};
use crate::search::{SearchIndexMaintainer, SearchResult};
use crate::store::{JobStore, StoreError};

fn require_tenant(tenant: &TenantId) -> ServiceResult<()> {
    if tenant.is_empty() {
        return Err(ServiceError::precondition("account required"));
    }
    Ok(())
}

fn require_job_id(id: &JobId) -> ServiceResult<()> {
    if id.is_empty() {
        return Err(ServiceError::precondition("id required"));
    }
    Ok(())
}

/// What a best-effort read of the current record yields.
struct Base {
    created: DateTime<Utc>,
    formulas: Vec<FormulaId>,
}

impl Base {
    /// Stand-in when the current record could not be read.
    fn zero() -> Self {
        Self {
            created: DateTime::<Utc>::UNIX_EPOCH,
            formulas: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    references: FormulaReferenceSync,
    search: SearchIndexMaintainer,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl JobRegistry {
    pub fn new(
        store: Arc<dyn JobStore>,
        references: FormulaReferenceSync,
        search: SearchIndexMaintainer,
        ids: IdGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            references,
            search,
            ids,
            clock,
        }
    }

    pub fn get(&self, tenant: &TenantId, id: &JobId) -> ServiceResult<Job> {
        require_tenant(tenant)?;
        require_job_id(id)?;
        self.store
            .get_job(tenant, id)
            .map_err(|e| store_failure("get_job", e))
    }

    pub fn search(&self, tenant: &TenantId, term: &str) -> ServiceResult<Vec<SearchResult>> {
        require_tenant(tenant)?;
        self.search.search(tenant, term)
    }

    pub fn list(&self, tenant: &TenantId) -> ServiceResult<Vec<Job>> {
        require_tenant(tenant)?;
        self.store
            .get_all_jobs(tenant)
            .map_err(|e| store_failure("get_all_jobs", e))
    }

    /// Create a job under a freshly generated id.
    pub fn create(&self, tenant: &TenantId, details: JobDetails) -> ServiceResult<Job> {
        require_tenant(tenant)?;
        details.validate()?;

        let job = Job::new(self.ids.job_id(), details, self.clock.now());
        self.store
            .add_job(tenant, job.clone())
            .map_err(|e| store_failure("add_job", e))?;
        audit::record_scoped(AuditAction::JobCreated, tenant.as_str(), job.id.as_str());

        self.sync_references(tenant, &job.id, &formula_changes(&[], job.formulas()));
        self.search.update_entry(tenant, &job);
        Ok(job)
    }

    /// Replace every caller-supplied field of a job, keeping `created`.
    pub fn update(&self, tenant: &TenantId, id: &JobId, details: JobDetails) -> ServiceResult<Job> {
        require_tenant(tenant)?;
        require_job_id(id)?;
        details.validate()?;

        let base = self.current(tenant, id)?;
        let job = Job::revise(id.clone(), details, base.created, self.clock.now());
        self.store
            .update_job(tenant, job.clone())
            .map_err(|e| store_failure("update_job", e))?;
        audit::record_scoped(AuditAction::JobUpdated, tenant.as_str(), id.as_str());

        self.sync_references(tenant, id, &formula_changes(&base.formulas, job.formulas()));
        self.search.update_entry(tenant, &job);
        Ok(job)
    }

    pub fn delete(&self, tenant: &TenantId, id: &JobId) -> ServiceResult<()> {
        require_tenant(tenant)?;
        require_job_id(id)?;

        let base = self.current(tenant, id)?;
        self.store
            .delete_job(tenant, id)
            .map_err(|e| store_failure("delete_job", e))?;
        audit::record_scoped(AuditAction::JobDeleted, tenant.as_str(), id.as_str());

        self.sync_references(tenant, id, &FormulaChanges::removals_only(&base.formulas));
        self.search.delete_entry(tenant, id);
        Ok(())
    }

    fn sync_references(&self, tenant: &TenantId, id: &JobId, changes: &FormulaChanges) {
        let report = self.references.sync(tenant, id, changes);
        if report.is_complete() {
            debug!(
                tenant = %tenant,
                job = %id,
                attached = report.attached,
                detached = report.detached,
                "formula back-references synchronized"
            );
        } else {
            warn!(
                tenant = %tenant,
                job = %id,
                attached = report.attached,
                detached = report.detached,
                failed = report.failed,
                "formula back-references partially synchronized"
            );
        }
    }

    /// Read the record about to be overwritten.
    ///
    /// Not-found ends the operation. Any other read failure falls back to a
    /// zero base and lets the write decide.
    fn current(&self, tenant: &TenantId, id: &JobId) -> ServiceResult<Base> {
        match self.store.get_job(tenant, id) {
            Ok(job) => Ok(Base {
                created: job.created,
                formulas: job.details.formulas,
            }),
            Err(StoreError::NotFound) => Err(ServiceError::NotFound),
            Err(err) => {
                warn!(tenant = %tenant, job = %id, error = %err, "failed to read current job, continuing from empty base");
                Ok(Base::zero())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Fts5SearchIndex, IndexStats, JobCorpus, SearchError, SearchIndex};
    use crate::store::{InMemoryStore, StoreResult};
    use crate::test_support::{EventCapture, audit_events};
    use chrono::Duration;
    use mixbook_core::ManualClock;
    use mixbook_jobs::Formula;
    use tracing::Level;

    fn fts() -> Arc<Fts5SearchIndex> {
        Arc::new(Fts5SearchIndex::open_in_memory().unwrap())
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        registry: JobRegistry,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_index(fts())
        }

        fn with_index(index: Arc<dyn SearchIndex>) -> Self {
            let store = Arc::new(InMemoryStore::new());
            let registry = registry_over(store.clone(), store.clone(), index, IdGenerator::new(8).unwrap());
            Self { store, registry }
        }

        fn seed_formulas(&self, tenant: &TenantId, ids: &[&str]) {
            for id in ids {
                self.store.put_formula(tenant, Formula::new(*id)).unwrap();
            }
        }

        fn formula(&self, tenant: &TenantId, id: &str) -> Formula {
            use crate::store::FormulaStore;
            self.store.get_formula(tenant, &FormulaId::new(id)).unwrap()
        }
    }

    fn registry_over(
        jobs: Arc<dyn JobStore>,
        store: Arc<InMemoryStore>,
        index: Arc<dyn SearchIndex>,
        ids: IdGenerator,
    ) -> JobRegistry {
        let start = DateTime::<Utc>::UNIX_EPOCH + Duration::days(365);
        let clock = Arc::new(ManualClock::new(start, Duration::seconds(1)));
        JobRegistry::new(
            jobs.clone(),
            FormulaReferenceSync::new(store),
            SearchIndexMaintainer::new(index, jobs),
            ids,
            clock,
        )
    }

    fn tenant() -> TenantId {
        TenantId::new("acct1")
    }

    #[test]
    fn create_then_get_round_trips_fields() {
        let h = Harness::new();
        let mut details = JobDetails::named("Smith Repaint").with_formulas(["f1", "f2", "f1"]);
        details.street = "12 Elm St".to_string();
        details.notes = "two coats".to_string();

        let created = h.registry.create(&tenant(), details.clone()).unwrap();
        assert_eq!(created.id.as_str().len(), 8);

        let loaded = h.registry.get(&tenant(), &created.id).unwrap();
        assert_eq!(loaded.details, details);
        assert_eq!(loaded.created, loaded.modified);
    }

    #[test]
    fn create_with_empty_name_writes_nothing() {
        let h = Harness::new();
        let result = h.registry.create(&tenant(), JobDetails::named(""));

        assert!(matches!(result, Err(ServiceError::Precondition(_))));
        assert!(h.registry.list(&tenant()).unwrap().is_empty());
    }

    #[test]
    fn every_operation_requires_a_tenant() {
        let h = Harness::new();
        let none = TenantId::default();
        let id = JobId::new("j1");

        let results = [
            h.registry.get(&none, &id).map(|_| ()),
            h.registry.list(&none).map(|_| ()),
            h.registry.search(&none, "smith").map(|_| ()),
            h.registry.create(&none, JobDetails::named("x")).map(|_| ()),
            h.registry.update(&none, &id, JobDetails::named("x")).map(|_| ()),
            h.registry.delete(&none, &id),
        ];
        for result in results {
            assert_eq!(result, Err(ServiceError::precondition("account required")));
        }
    }

    #[test]
    fn empty_ids_are_preconditions() {
        let h = Harness::new();
        let empty = JobId::default();

        assert!(matches!(h.registry.get(&tenant(), &empty), Err(ServiceError::Precondition(_))));
        assert!(matches!(
            h.registry.update(&tenant(), &empty, JobDetails::named("x")),
            Err(ServiceError::Precondition(_))
        ));
        assert!(matches!(h.registry.delete(&tenant(), &empty), Err(ServiceError::Precondition(_))));
    }

    #[test]
    fn updates_keep_created_and_advance_modified() {
        let h = Harness::new();
        let job = h.registry.create(&tenant(), JobDetails::named("v0")).unwrap();

        let mut last_modified = job.modified;
        for n in 1..4 {
            let updated = h
                .registry
                .update(&tenant(), &job.id, JobDetails::named(format!("v{n}")))
                .unwrap();
            assert_eq!(updated.created, job.created);
            assert!(updated.modified > last_modified);
            last_modified = updated.modified;
        }
        assert_eq!(h.registry.get(&tenant(), &job.id).unwrap().name(), "v3");
    }

    #[test]
    fn update_rejects_empty_name_and_missing_job() {
        let h = Harness::new();
        let job = h.registry.create(&tenant(), JobDetails::named("keep")).unwrap();

        assert!(matches!(
            h.registry.update(&tenant(), &job.id, JobDetails::named("")),
            Err(ServiceError::Precondition(_))
        ));
        assert_eq!(h.registry.get(&tenant(), &job.id).unwrap().name(), "keep");
        assert_eq!(
            h.registry
                .update(&tenant(), &JobId::new("ghost"), JobDetails::named("x"))
                .unwrap_err(),
            ServiceError::NotFound
        );
    }

    #[test]
    fn formula_back_references_follow_the_job() {
        let h = Harness::new();
        let t = tenant();
        h.seed_formulas(&t, &["f1", "f2", "f3"]);

        let job = h
            .registry
            .create(&t, JobDetails::named("Smith").with_formulas(["f1", "f2"]))
            .unwrap();
        assert!(h.formula(&t, "f1").references(&job.id));
        assert!(h.formula(&t, "f2").references(&job.id));

        h.registry
            .update(&t, &job.id, JobDetails::named("Smith").with_formulas(["f2", "f3"]))
            .unwrap();
        assert!(!h.formula(&t, "f1").references(&job.id));
        assert!(h.formula(&t, "f2").references(&job.id));
        assert!(h.formula(&t, "f3").references(&job.id));

        h.registry.delete(&t, &job.id).unwrap();
        assert_eq!(h.registry.get(&t, &job.id), Err(ServiceError::NotFound));
        for f in ["f1", "f2", "f3"] {
            assert!(!h.formula(&t, f).references(&job.id));
        }
    }

    #[test]
    fn repeated_formula_is_referenced_once() {
        let h = Harness::new();
        let t = tenant();
        h.seed_formulas(&t, &["f1"]);

        let job = h
            .registry
            .create(&t, JobDetails::named("Smith").with_formulas(["f1", "f1"]))
            .unwrap();
        assert_eq!(h.formula(&t, "f1").jobs, vec![job.id]);
    }

    #[test]
    fn acct1_walkthrough() {
        let h = Harness::new();
        let t = tenant();
        h.seed_formulas(&t, &["f1"]);

        let job = h
            .registry
            .create(&t, JobDetails::named("Smith Repaint").with_formulas(["f1"]))
            .unwrap();
        assert_eq!(h.registry.get(&t, &job.id).unwrap().formulas(), &[FormulaId::new("f1")]);
        assert!(h.formula(&t, "f1").references(&job.id));

        let hits = h.registry.search(&t, "repaint").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, job.id);

        h.registry.delete(&t, &job.id).unwrap();
        assert_eq!(h.registry.get(&t, &job.id), Err(ServiceError::NotFound));
        assert!(!h.formula(&t, "f1").references(&job.id));
        assert!(h.registry.search(&t, "repaint").unwrap().is_empty());
    }

    #[test]
    fn missing_formula_does_not_fail_the_job() {
        let h = Harness::new();
        let t = tenant();
        h.seed_formulas(&t, &["f2"]);

        let job = h
            .registry
            .create(&t, JobDetails::named("Smith").with_formulas(["nope", "f2"]))
            .unwrap();
        assert!(h.formula(&t, "f2").references(&job.id));
        assert_eq!(h.registry.get(&t, &job.id).unwrap().formulas().len(), 2);
    }

    #[test]
    fn delete_missing_job_is_not_found() {
        let h = Harness::new();
        assert_eq!(
            h.registry.delete(&tenant(), &JobId::new("ghost")),
            Err(ServiceError::NotFound)
        );
    }

    #[test]
    fn jobs_are_isolated_per_tenant() {
        let h = Harness::new();
        let job = h.registry.create(&tenant(), JobDetails::named("Smith")).unwrap();
        let other = TenantId::new("acct2");

        assert_eq!(h.registry.get(&other, &job.id), Err(ServiceError::NotFound));
        assert!(h.registry.list(&other).unwrap().is_empty());
        assert!(h.registry.search(&other, "smith").unwrap().is_empty());
    }

    #[test]
    fn id_collisions_surface_as_already_exists() {
        let store = Arc::new(InMemoryStore::new());
        let registry = registry_over(
            store.clone(),
            store,
            fts(),
            IdGenerator::new(1).unwrap(),
        );

        // 62 possible one-character ids, so 63 creates must collide.
        let collided = (0..63)
            .map(|_| registry.create(&tenant(), JobDetails::named("x")))
            .any(|r| r == Err(ServiceError::AlreadyExists));
        assert!(collided);
    }

    struct DownIndex;

    impl SearchIndex for DownIndex {
        fn build_index(&self, _: JobCorpus) -> Result<IndexStats, SearchError> {
            Err(SearchError::Unavailable("down".to_string()))
        }
        fn search_jobs(&self, _: &TenantId, _: &str) -> Result<Vec<SearchResult>, SearchError> {
            Err(SearchError::Unavailable("down".to_string()))
        }
        fn update_job_index(&self, _: &TenantId, _: &Job) -> Result<(), SearchError> {
            Err(SearchError::Unavailable("down".to_string()))
        }
        fn delete_job_index(&self, _: &TenantId, _: &JobId) -> Result<(), SearchError> {
            Err(SearchError::Unavailable("down".to_string()))
        }
        fn stats(&self) -> IndexStats {
            IndexStats::default()
        }
    }

    #[test]
    fn index_outage_does_not_fail_mutations() {
        let h = Harness::with_index(Arc::new(DownIndex));
        let t = tenant();

        let job = h.registry.create(&t, JobDetails::named("Smith")).unwrap();
        h.registry.update(&t, &job.id, JobDetails::named("Jones")).unwrap();
        h.registry.delete(&t, &job.id).unwrap();

        assert_eq!(h.registry.search(&t, "jones"), Err(ServiceError::Internal));
    }

    /// Reads of single jobs fail; everything else goes to the inner store.
    struct FlakyReads(Arc<InMemoryStore>);

    impl JobStore for FlakyReads {
        fn get_job(&self, _: &TenantId, _: &JobId) -> StoreResult<Job> {
            Err(StoreError::storage("read timeout"))
        }
        fn get_all_jobs(&self, tenant: &TenantId) -> StoreResult<Vec<Job>> {
            self.0.get_all_jobs(tenant)
        }
        fn tenants(&self) -> StoreResult<Vec<TenantId>> {
            self.0.tenants()
        }
        fn add_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
            self.0.add_job(tenant, job)
        }
        fn update_job(&self, tenant: &TenantId, job: Job) -> StoreResult<()> {
            self.0.update_job(tenant, job)
        }
        fn delete_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<()> {
            self.0.delete_job(tenant, id)
        }
    }

    #[test]
    fn failed_read_falls_back_to_zero_base() {
        let store = Arc::new(InMemoryStore::new());
        let registry = registry_over(
            Arc::new(FlakyReads(store.clone())),
            store.clone(),
            fts(),
            IdGenerator::new(8).unwrap(),
        );
        let t = tenant();

        let job = registry.create(&t, JobDetails::named("Smith")).unwrap();
        let updated = registry.update(&t, &job.id, JobDetails::named("Jones")).unwrap();
        assert_eq!(updated.created, DateTime::<Utc>::UNIX_EPOCH);

        assert_eq!(registry.get(&t, &job.id), Err(ServiceError::Internal));
        registry.delete(&t, &job.id).unwrap();
        assert!(registry.list(&t).unwrap().is_empty());
    }

    #[test]
    fn audit_events_follow_successful_mutations_only() {
        let h = Harness::new();
        let t = tenant();

        let (job, events) = EventCapture::run(|| {
            let job = h.registry.create(&t, JobDetails::named("Smith")).unwrap();
            h.registry.update(&t, &job.id, JobDetails::named("Jones")).unwrap();
            h.registry.delete(&t, &job.id).unwrap();

            assert!(h.registry.create(&t, JobDetails::named("")).is_err());
            assert!(h.registry.update(&t, &job.id, JobDetails::named("x")).is_err());
            assert!(h.registry.delete(&t, &job.id).is_err());
            assert!(h.registry.delete(&TenantId::default(), &job.id).is_err());
            job
        });

        let audit = audit_events(&events);
        let actions: Vec<_> = audit.iter().map(|e| e.field("action").unwrap()).collect();
        assert_eq!(actions, vec!["job.created", "job.updated", "job.deleted"]);
        for event in audit {
            assert_eq!(event.field("tenant"), Some("acct1"));
            assert_eq!(event.field("subject"), Some(job.id.as_str()));
        }
    }

    /// Every write fails with a storage error.
    struct FailingWrites(Arc<InMemoryStore>);

    impl JobStore for FailingWrites {
        fn get_job(&self, tenant: &TenantId, id: &JobId) -> StoreResult<Job> {
            self.0.get_job(tenant, id)
        }
        fn get_all_jobs(&self, tenant: &TenantId) -> StoreResult<Vec<Job>> {
            self.0.get_all_jobs(tenant)
        }
        fn tenants(&self) -> StoreResult<Vec<TenantId>> {
            self.0.tenants()
        }
        fn add_job(&self, _: &TenantId, _: Job) -> StoreResult<()> {
            Err(StoreError::storage("disk full"))
        }
        fn update_job(&self, _: &TenantId, _: Job) -> StoreResult<()> {
            Err(StoreError::storage("disk full"))
        }
        fn delete_job(&self, _: &TenantId, _: &JobId) -> StoreResult<()> {
            Err(StoreError::storage("disk full"))
        }
    }

    #[test]
    fn storage_failures_are_not_audited() {
        let store = Arc::new(InMemoryStore::new());
        let t = tenant();
        store
            .add_job(&t, Job::new(JobId::new("j1"), JobDetails::named("Smith"), Utc::now()))
            .unwrap();
        let registry = registry_over(
            Arc::new(FailingWrites(store.clone())),
            store,
            fts(),
            IdGenerator::new(8).unwrap(),
        );

        let ((), events) = EventCapture::run(|| {
            let id = JobId::new("j1");
            assert_eq!(registry.create(&t, JobDetails::named("x")).unwrap_err(), ServiceError::Internal);
            assert_eq!(
                registry.update(&t, &id, JobDetails::named("x")).unwrap_err(),
                ServiceError::Internal
            );
            assert_eq!(registry.delete(&t, &id).unwrap_err(), ServiceError::Internal);
        });

        assert!(audit_events(&events).is_empty());
    }

    #[test]
    fn partial_reference_sync_is_logged() {
        let h = Harness::new();
        let t = tenant();
        h.seed_formulas(&t, &["f2"]);

        let (_, events) = EventCapture::run(|| {
            h.registry
                .create(&t, JobDetails::named("Smith").with_formulas(["nope", "f2"]))
                .unwrap()
        });

        let summary = events
            .iter()
            .find(|e| e.level == Level::WARN && e.field("failed").is_some())
            .expect("partial sync summary");
        assert_eq!(summary.field("failed"), Some("1"));
        assert_eq!(summary.field("attached"), Some("1"));
        assert_eq!(summary.field("tenant"), Some("acct1"));
    }
}
