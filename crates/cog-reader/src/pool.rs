//! Shared worker pool for CPU-bound raster decompression.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::info;

use crate::{CogError, Result};

/// A bounded pool of decode threads shared by every raster source.
///
/// Jobs are plain closures run on a dedicated `rayon` pool; the async side
/// awaits a oneshot channel, so submitting work never blocks the executor.
/// Cloning is cheap and all clones submit to the same threads.
#[derive(Clone)]
pub struct DecodePool {
    pool: Arc<rayon::ThreadPool>,
}

impl DecodePool {
    /// Create a pool with `threads` workers, or one per available core.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("cog-decode-{i}"))
            .build()
            .map_err(|e| CogError::Pool(e.to_string()))?;

        info!(threads, "Created raster decode pool");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result.
    ///
    /// A panicking job is reported as [`CogError::Decode`]; the worker thread
    /// and every other job keep running.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| CogError::decode(panic_message(payload.as_ref())));
            // The receiver may have been dropped; the result is then unused.
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| CogError::Pool("decode job was dropped before completion".to_string()))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("decode job panicked: {detail}")
}

impl std::fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePool")
            .field("threads", &self.threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let pool = DecodePool::new(Some(2)).unwrap();
        assert_eq!(pool.threads(), 2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_zero_threads_falls_back_to_cores() {
        let pool = DecodePool::new(Some(0)).unwrap();
        assert!(pool.threads() >= 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_decode_error() {
        let pool = DecodePool::new(Some(1)).unwrap();

        let err = pool
            .run(|| -> u32 { panic!("corrupt chunk") })
            .await
            .unwrap_err();
        assert!(matches!(err, CogError::Decode(ref msg) if msg.contains("corrupt chunk")));

        // The single worker survived and still serves jobs
        assert_eq!(pool.run(|| 7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_all_complete() {
        let pool = DecodePool::new(Some(2)).unwrap();
        let jobs = (0..16u64).map(|i| {
            let pool = pool.clone();
            async move { pool.run(move || i * i).await.unwrap() }
        });
        let results = futures::future::join_all(jobs).await;
        assert_eq!(results, (0..16u64).map(|i| i * i).collect::<Vec<_>>());
    }
}
