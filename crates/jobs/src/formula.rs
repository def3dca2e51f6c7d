use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use mixbook_core::{Entity, FormulaId, JobId};

/// A formula (recipe) record as seen by the job side.
///
/// Formulas are authored elsewhere; this crate only ever rewrites `jobs`. Any
/// other fields the record carries are kept in `attributes` and written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: FormulaId,
    #[serde(default)]
    pub jobs: Vec<JobId>,
    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
}

impl Formula {
    pub fn new(id: impl Into<FormulaId>) -> Self {
        Self {
            id: id.into(),
            jobs: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn references(&self, job_id: &JobId) -> bool {
        self.jobs.contains(job_id)
    }

    /// Append a back-reference to `job_id`.
    pub fn attach_job(&mut self, job_id: &JobId) {
        self.jobs.push(job_id.clone());
    }

    /// Remove every occurrence of `job_id`, preserving the order of the rest.
    ///
    /// Returns the number of entries removed.
    pub fn detach_job(&mut self, job_id: &JobId) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|j| j != job_id);
        before - self.jobs.len()
    }
}

impl Entity for Formula {
    type Id = FormulaId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
