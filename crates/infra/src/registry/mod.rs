//! Services that own the authoritative account and job records and keep the
//! derived state (formula back-references, search index) following them.

pub mod accounts;
pub mod cross_ref;
pub mod error;
pub mod jobs;

pub use accounts::AccountDirectory;
pub use cross_ref::{FormulaReferenceSync, SyncReport};
pub use error::{ServiceError, ServiceResult};
pub use jobs::JobRegistry;
