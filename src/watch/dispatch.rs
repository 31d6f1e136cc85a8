//! How per-file pipelines are scheduled.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Spawns one task per qualifying event.
///
/// `Unbounded` has no backpressure: a burst of deliveries produces an equal
/// burst of concurrent pipelines. `Bounded` caps how many run at once; extra
/// tasks wait for a permit inside their own task, so the watch loop is never
/// blocked.
#[derive(Debug, Clone)]
pub enum Dispatcher {
    Unbounded,
    Bounded(Arc<Semaphore>),
}

impl Dispatcher {
    /// `None` or `Some(0)` means unbounded.
    pub fn new(max_in_flight: Option<usize>) -> Self {
        match max_in_flight {
            Some(n) if n > 0 => Self::Bounded(Arc::new(Semaphore::new(n))),
            _ => Self::Unbounded,
        }
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Self::Unbounded => {
                tokio::spawn(task);
            }
            Self::Bounded(permits) => {
                let permits = Arc::clone(permits);
                tokio::spawn(async move {
                    // Only fails if the semaphore was closed, which never happens.
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    task.await;
                });
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::Unbounded
    }
}
