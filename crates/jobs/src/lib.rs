//! Jobs (work orders) and the formula back-references they maintain.

pub mod formula;
pub mod job;
pub mod references;

pub use formula::Formula;
pub use job::{Contact, Job, JobDetails};
pub use references::{FormulaChanges, formula_changes};
