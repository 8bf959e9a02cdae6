//! Bounded background work pool.
//!
//! One pool per process caps all background work: side-effect jobs queued
//! with [`BackgroundPool::submit`] and the fetcher's per-layer fan-out run
//! through [`BackgroundPool::run`] draw from the same set of permits.
//!
//! ```text
//!   submit() ──try_send──▶ [ bounded queue ] ──▶ dispatcher ──▶ spawned job
//!                                                   │               │
//!   run(fut) ─────────────────────────────┐         ▼               ▼
//!                                         └──▶ Semaphore (workers permits)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{error, warn};

/// A unit of background work. Failures must be handled inside the job.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Default submission queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

struct PoolState {
    permits: Arc<Semaphore>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl PoolState {
    fn finish_job(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// A fixed-capacity pool for fire-and-forget jobs and bounded fan-out.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct BackgroundPool {
    sender: mpsc::Sender<Job>,
    state: Arc<PoolState>,
    workers: usize,
}

impl BackgroundPool {
    /// Create a pool running at most `workers` jobs at once with room for
    /// `queue_depth` waiting jobs. Zero values are raised to one.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let state = Arc::new(PoolState {
            permits: Arc::new(Semaphore::new(workers)),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        });

        tokio::spawn(dispatch(receiver, Arc::clone(&state)));

        Self {
            sender,
            state,
            workers,
        }
    }

    /// Queue a job without waiting.
    ///
    /// Returns `false` and drops the job when the queue is full or closed.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.state.in_flight.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.state.finish_job();
                warn!(workers = self.workers, "Background queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.state.finish_job();
                warn!("Background pool closed, dropping job");
                false
            }
        }
    }

    /// Run a future while holding one of the pool's permits.
    pub async fn run<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed, so a failed acquire only means we
        // run unthrottled.
        let _permit = self.state.permits.acquire().await.ok();
        fut.await
    }

    /// Wait until every accepted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.state.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Jobs accepted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::Acquire)
    }

    /// Maximum number of concurrently running jobs.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<Job>, state: Arc<PoolState>) {
    while let Some(job) = receiver.recv().await {
        let permit = Arc::clone(&state.permits).acquire_owned().await.ok();
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = tokio::spawn(job).await {
                error!(error = %e, "Background job panicked");
            }
            drop(permit);
            state.finish_job();
        });
    }
}
