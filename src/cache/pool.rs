//! I/O Pool Module
//!
//! Runs blocking disk jobs on tokio's blocking thread pool, at most
//! `size` at a time. Same-digest ordering is left to the disk tier's locks.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

use crate::error::{CacheError, Result};

// == Io Pool ==
#[derive(Debug, Clone)]
pub struct IoPool {
    permits: Arc<Semaphore>,
}

impl IoPool {
    /// Creates a pool of `size` workers. `size` must be at least 1.
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    // == Run ==
    /// Dispatches `job` to a worker and waits for its result.
    ///
    /// The permit travels with the job, so a caller that stops awaiting does
    /// not cancel a job already dispatched: it runs to completion and its
    /// result is dropped.
    pub async fn run<T, F>(&self, op: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| CacheError::WorkerPool(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            error!(op, error = %e, "Disk job did not complete");
            CacheError::WorkerPool(format!("{op}: {e}"))
        })?
    }
}
