//! Infrastructure layer: storage backends, search index, the services that
//! keep them consistent, background workers and configuration.

pub mod config;
pub mod registry;
pub mod search;
pub mod store;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use config::{Config, ConfigError};
pub use registry::{AccountDirectory, FormulaReferenceSync, JobRegistry, ServiceError, ServiceResult};
pub use search::{Fts5SearchIndex, SearchIndex, SearchIndexMaintainer};
pub use store::{StorageLocation, Stores};
pub use workers::{IndexRebuildWorker, WorkerHandle};
