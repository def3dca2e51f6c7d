use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use super::WorkerHandle;
use crate::search::SearchIndexMaintainer;

const WORKER_NAME: &str = "search-index-rebuild";

/// Periodic full rebuild of the search index.
///
/// - Rebuilds once immediately on spawn
/// - Then waits `interval` and rebuilds again, until shut down
/// - A failed rebuild is logged; the previous generation keeps serving
#[derive(Debug)]
pub struct IndexRebuildWorker;

impl IndexRebuildWorker {
    pub fn spawn(maintainer: SearchIndexMaintainer, interval: Duration) -> io::Result<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker_loop(&maintainer, interval, &shutdown_rx))?;

        Ok(WorkerHandle::new(WORKER_NAME, shutdown_tx, join))
    }
}

fn worker_loop(maintainer: &SearchIndexMaintainer, interval: Duration, shutdown_rx: &mpsc::Receiver<()>) {
    loop {
        if let Err(err) = maintainer.rebuild_index() {
            error!(worker = WORKER_NAME, error = %err, "search index rebuild failed");
        }

        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(worker = WORKER_NAME, "stopped");
}
