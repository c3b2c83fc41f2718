//! Fixed-width worker pool with a scatter/gather barrier.
//!
//! Every item is spawned as its own task up front; a semaphore caps how many
//! run at once, so waiting tasks form the queue. [`WorkerPool::run`] returns
//! only after every task has finished, with one result slot per input item.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Why a unit of work produced no value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// The task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Join(String),
    /// The pool's semaphore was closed before the task got a permit.
    #[error("worker pool closed")]
    Closed,
}

/// Bounded-concurrency executor for independent units of work.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// Create a pool running at most `width` tasks at once (minimum 1).
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `task` over every item and wait for all of them.
    ///
    /// Results are returned in input order. A failing unit never affects the
    /// others; its slot holds a [`PoolError`].
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<Result<R, PoolError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.width));
        let task = Arc::new(task);

        debug!(items = items.len(), width = self.width, "scattering work");

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let sem = semaphore.clone();
                let task = task.clone();
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.map_err(|_| PoolError::Closed)?;
                    Ok::<R, PoolError>(task(item).await)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(inner) => inner,
                Err(e) => {
                    warn!(error = %e, "worker task failed");
                    Err(PoolError::Join(e.to_string()))
                }
            };
            results.push(result);
        }

        debug!(results = results.len(), "gathered all work");
        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(10)
    }
}
