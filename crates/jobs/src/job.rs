use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mixbook_core::{DomainError, DomainResult, Entity, FormulaId, JobId};

/// Point of contact for a job site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub info: String,
}

/// Caller-supplied job fields (everything except identity and timestamps).
///
/// `formulas` keeps the caller's order and may contain duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDetails {
    pub name: String,
    pub street: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub notes: String,
    pub contact: Contact,
    pub formulas: Vec<FormulaId>,
}

impl JobDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_formulas<I, F>(mut self, formulas: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FormulaId>,
    {
        self.formulas = formulas.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() {
            return Err(DomainError::validation("name required"));
        }
        Ok(())
    }
}

/// A work order owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(flatten)]
    pub details: JobDetails,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Job {
    /// A freshly created job: `created == modified == now`.
    pub fn new(id: JobId, details: JobDetails, now: DateTime<Utc>) -> Self {
        Self {
            id,
            details,
            created: now,
            modified: now,
        }
    }

    /// Full replacement of a job's fields, carrying `created` forward.
    pub fn revise(id: JobId, details: JobDetails, created: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            details,
            created,
            modified: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn formulas(&self) -> &[FormulaId] {
        &self.details.formulas
    }

    /// Text fields a search index should consider for this job.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &str> {
        let d = &self.details;
        [
            d.name.as_str(),
            d.street.as_str(),
            d.street2.as_str(),
            d.city.as_str(),
            d.state.as_str(),
            d.zipcode.as_str(),
            d.notes.as_str(),
            d.contact.name.as_str(),
            d.contact.info.as_str(),
        ]
        .into_iter()
        .chain(d.formulas.iter().map(FormulaId::as_str))
        .filter(|s| !s.is_empty())
    }
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
