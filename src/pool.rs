use crate::worker::{FetchWorker, WorkResult};
use crate::{Parser, PreviewError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

type IdleWorkers<P> = Arc<Mutex<Vec<Arc<FetchWorker<P>>>>>;

/// Fixed-size pool of fetch workers with await-until-done submission.
///
/// Admission goes through a fair semaphore holding one permit per worker, so
/// waiting callers are served in arrival order and at most `size` jobs run at
/// once. The waiting queue itself is unbounded.
pub struct WorkerPool<P> {
    idle: IdleWorkers<P>,
    permits: Arc<Semaphore>,
    size: usize,
    closed: AtomicBool,
}

/// A worker checked out of the idle set, returned to it on drop.
struct Lease<P> {
    idle: IdleWorkers<P>,
    worker: Arc<FetchWorker<P>>,
}

impl<P> Drop for Lease<P> {
    fn drop(&mut self) {
        lock(&self.idle).push(Arc::clone(&self.worker));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: Parser> WorkerPool<P> {
    /// Opens the pool with one executor per worker.
    pub fn open(workers: Vec<FetchWorker<P>>) -> Result<Self, PreviewError> {
        if workers.is_empty() {
            return Err(PreviewError::Config(
                "worker pool needs at least one worker".into(),
            ));
        }
        let size = workers.len();
        info!(size, "Worker pool opened");
        Ok(Self {
            idle: Arc::new(Mutex::new(workers.into_iter().map(Arc::new).collect())),
            permits: Arc::new(Semaphore::new(size)),
            size,
            closed: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of jobs currently holding a worker.
    pub fn in_flight(&self) -> usize {
        self.size.saturating_sub(self.permits.available_permits())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waits for an idle worker, runs `job` on it and returns its result.
    ///
    /// The job runs on its own task, so dropping this future does not free
    /// the worker before the job is finished.
    pub async fn submit(&self, job: &str) -> Result<WorkResult, PreviewError> {
        if self.is_closed() {
            return Err(PreviewError::PoolClosed);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PreviewError::PoolClosed)?;

        let worker = lock(&self.idle)
            .pop()
            .ok_or_else(|| PreviewError::WorkerFault("no idle worker behind permit".into()))?;
        let lease = Lease {
            idle: Arc::clone(&self.idle),
            worker: Arc::clone(&worker),
        };
        let job = job.to_string();

        let handle = tokio::spawn(async move {
            // Permit and lease drop with the task, even when the job panics.
            let _permit = permit;
            let _lease = lease;
            debug!(worker = worker.id(), "Job assigned");
            worker.process(&job).await
        });

        handle.await.map_err(|e| {
            warn!(error = %e, "Worker task did not complete");
            PreviewError::WorkerFault(e.to_string())
        })
    }

    /// Stops admission and waits for in-flight jobs to drain.
    ///
    /// Only the first call drains; later calls return immediately.
    pub async fn release(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(in_flight = self.in_flight(), "Releasing worker pool");

        let drained = u32::try_from(self.size)
            .ok()
            .map(|n| self.permits.acquire_many(n));
        if let Some(drained) = drained {
            // Callers already queued ahead of the drain still get served.
            let _all = drained.await;
        }
        self.permits.close();
        info!("Worker pool released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PoolConfig, PreviewInfo};
    use async_trait::async_trait;

    struct Ok200;

    #[async_trait]
    impl Parser for Ok200 {
        async fn parse(&self, _url: &str) -> Option<PreviewInfo> {
            Some(PreviewInfo::with_status(200))
        }
    }

    struct Panics;

    #[async_trait]
    impl Parser for Panics {
        async fn parse(&self, _url: &str) -> Option<PreviewInfo> {
            panic!("parser blew up")
        }
    }

    fn pool<P: Parser>(parsers: Vec<P>) -> WorkerPool<P> {
        let config = Arc::new(PoolConfig::default());
        let workers = parsers
            .into_iter()
            .enumerate()
            .map(|(id, p)| FetchWorker::new(id, p, Arc::clone(&config)))
            .collect();
        WorkerPool::open(workers).unwrap()
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(WorkerPool::<Ok200>::open(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_submit_returns_result() {
        let pool = pool(vec![Ok200, Ok200]);
        let result = pool.submit("http://example.com").await.unwrap();
        assert_eq!(result.outcome_code(), 200);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_dispatch_error_and_recovers() {
        let pool = pool(vec![Panics]);
        let err = pool.submit("http://example.com").await.unwrap_err();
        assert!(matches!(err, PreviewError::WorkerFault(_)));

        // The worker and its permit came back after the panic.
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(lock(&pool.idle).len(), 1);
        let err = pool.submit("http://example.com").await.unwrap_err();
        assert!(err.is_dispatch_error());
    }

    #[tokio::test]
    async fn test_every_worker_returns_to_idle_set() {
        let pool = pool(vec![Ok200, Ok200, Ok200]);
        for _ in 0..7 {
            pool.submit("http://example.com").await.unwrap();
        }
        let mut ids: Vec<usize> = lock(&pool.idle).iter().map(|w| w.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let pool = pool(vec![Ok200]);
        pool.release().await;
        pool.release().await;
        assert!(pool.is_closed());
        assert!(matches!(
            pool.submit("http://example.com").await,
            Err(PreviewError::PoolClosed)
        ));
    }
}
