// Bounded executor for calls into Google and the attendance portal.
//
// Every call runs on its own task, so a slow request from one user never
// holds up another user's command. The semaphore caps how many of them can
// be in flight at once.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("the integration pool is shut down")]
    Closed,

    #[error("integration task failed: {0}")]
    Join(String),
}

#[derive(Clone)]
pub struct IntegrationPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl IntegrationPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` once a permit is free and wait for its result.
    ///
    /// A panic inside the task is reported as `PoolError::Join` instead of
    /// taking the caller down with it.
    pub async fn run<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });

        handle.await.map_err(|e| {
            tracing::error!("Integration task failed: {}", e);
            PoolError::Join(e.to_string())
        })
    }

    /// Stop handing out permits. Calls already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_returns_task_output() {
        let pool = IntegrationPool::new(2);
        assert_eq!(pool.run(async { 21 * 2 }).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = IntegrationPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut calls = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            calls.push(tokio::spawn(async move {
                pool.run(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let pool = IntegrationPool::new(1);
        let result = pool
            .run(async {
                panic!("portal exploded");
            })
            .await;
        assert!(matches!(result, Err(PoolError::Join(_))));

        // The permit was released despite the panic.
        assert_eq!(pool.run(async { "ok" }).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_work() {
        let pool = IntegrationPool::new(1);
        pool.close();
        assert!(matches!(pool.run(async {}).await, Err(PoolError::Closed)));
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(IntegrationPool::new(0).size(), 1);
    }
}
