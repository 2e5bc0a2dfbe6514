// Bounded blocking worker pool and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Shared cancellation flag, checked between jobs and between parameters.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs batches of independent jobs on tokio's blocking pool, at most
/// `workers` at a time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    cancel: CancelFlag,
}

impl WorkerPool {
    pub fn new(workers: usize, cancel: CancelFlag) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Run `work` over every job and return `(job index, output)` pairs in
    /// job order.
    ///
    /// A job that returns an error or panics is logged and left out. Once
    /// the cancel flag is set no further job starts; running jobs finish.
    pub async fn run_batch<J, T, F>(&self, jobs: Vec<J>, work: F) -> Vec<(usize, T)>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(J) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let total = jobs.len();
        let work = Arc::new(work);
        let mut set = JoinSet::new();
        let mut started = 0usize;

        for (index, job) in jobs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("worker pool closed: {}", e);
                    break;
                }
            };
            if self.cancel.is_cancelled() {
                break;
            }
            let work = Arc::clone(&work);
            set.spawn_blocking(move || {
                let _permit = permit;
                (index, work(job))
            });
            started += 1;
        }

        if started < total {
            warn!("cancelled: {} of {} jobs not started", total - started, total);
        }

        let mut outputs = Vec::with_capacity(started);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(output))) => outputs.push((index, output)),
                Ok((index, Err(e))) => warn!("job {} failed: {:#}", index, e),
                Err(e) => warn!("job aborted: {}", e),
            }
        }
        outputs.sort_by_key(|(index, _)| *index);
        debug!("batch finished: {}/{} jobs produced results", outputs.len(), total);
        outputs
    }
}

/// Spawn a task that sets `cancel` on SIGINT or SIGTERM. Abort the returned
/// handle to stop listening.
pub fn spawn_signal_listener(cancel: CancelFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("shutdown signal received, finishing in-flight work");
        cancel.cancel();
    })
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
