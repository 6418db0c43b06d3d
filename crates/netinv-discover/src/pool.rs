//! Bounded fan-out of async tasks.
//!
//! A semaphore permit is acquired before each task is spawned, so at most
//! `capacity` tasks are ever in flight and launching blocks until a slot
//! frees up.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs a batch of tasks with a fixed concurrency cap.
#[derive(Clone)]
pub struct WorkerPool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `task` over every item and collect outputs in completion order.
    ///
    /// A panicking task is logged and contributes no output; the rest of the
    /// batch still runs.
    pub async fn run<I, F, Fut, T>(&self, items: I, task: F) -> Vec<T>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = JoinSet::new();

        for item in items {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Worker pool semaphore closed");
                    break;
                }
            };
            let work = task(item);
            set.spawn(async move {
                let _permit = permit;
                work.await
            });
        }

        let mut outputs = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(output) => outputs.push(output),
                Err(e) => tracing::error!(error = %e, "Worker task panicked"),
            }
        }
        outputs
    }
}
