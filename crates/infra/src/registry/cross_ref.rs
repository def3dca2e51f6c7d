//! Formula back-reference repair.
//!
//! A job's `formulas` list is authoritative; each formula's `jobs` list is
//! its reciprocal and is patched here after the job write has succeeded.
//! Each formula is loaded and written on its own. A failure on one is logged
//! and the rest are still processed.

use std::sync::Arc;

use tracing::{error, warn};

use mixbook_core::{FormulaId, JobId, TenantId};
use mixbook_jobs::{Formula, FormulaChanges};

use crate::store::FormulaStore;

/// What a sync pass managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attached: usize,
    pub detached: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Clone)]
pub struct FormulaReferenceSync {
    formulas: Arc<dyn FormulaStore>,
}

impl core::fmt::Debug for FormulaReferenceSync {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FormulaReferenceSync").finish_non_exhaustive()
    }
}

impl FormulaReferenceSync {
    pub fn new(formulas: Arc<dyn FormulaStore>) -> Self {
        Self { formulas }
    }

    /// Attach `job_id` to every formula in `changes.additions` and detach it
    /// from every formula in `changes.removals`.
    pub fn sync(&self, tenant: &TenantId, job_id: &JobId, changes: &FormulaChanges) -> SyncReport {
        let mut report = SyncReport::default();

        for formula_id in &changes.additions {
            let done = self.patch(tenant, job_id, formula_id, |f| {
                f.attach_job(job_id);
            });
            if done {
                report.attached += 1;
            } else {
                report.failed += 1;
            }
        }

        for formula_id in &changes.removals {
            let done = self.patch(tenant, job_id, formula_id, |f| {
                f.detach_job(job_id);
            });
            if done {
                report.detached += 1;
            } else {
                report.failed += 1;
            }
        }

        report
    }

    fn patch(
        &self,
        tenant: &TenantId,
        job_id: &JobId,
        formula_id: &FormulaId,
        edit: impl FnOnce(&mut Formula),
    ) -> bool {
        let mut formula = match self.formulas.get_formula(tenant, formula_id) {
            Ok(f) => f,
            Err(err) => {
                warn!(tenant = %tenant, job = %job_id, formula = %formula_id, error = %err, "failed to load formula");
                return false;
            }
        };

        edit(&mut formula);

        match self.formulas.update_formula(tenant, formula) {
            Ok(()) => true,
            Err(err) => {
                error!(tenant = %tenant, job = %job_id, formula = %formula_id, error = %err, "failed to update formula");
                false
            }
        }
    }
}
