//! Fixed-size worker pool for units of work.
//!
//! Provides a `WorkerPool` with `W` long-lived tokio tasks that pull units of
//! work from one shared handoff channel. Submission waits for a free worker,
//! which is the pipeline's only backpressure.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counter of executed units, labelled by `outcome` (`ok` / `error` / `panicked`).
pub const UNITS_TOTAL: &str = "itemq_units_total";

/// A single unit of work. Its result is captured by the executing worker
/// and never propagates past it.
pub type UnitOfWork = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

// ---------------------------------------------------------------------------
// PoolState / PoolError
// ---------------------------------------------------------------------------

/// Lifecycle of a pool.
///
/// State machine: Created -> Running -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constructed, no workers yet. Submissions wait.
    Created,
    /// Workers are accepting units of work.
    Running,
    /// No new units are accepted; units already handed off still run.
    Draining,
    /// All workers have exited.
    Stopped,
}

/// Errors returned by pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool was quit before or while the unit was being submitted.
    #[error("worker pool is closed")]
    Closed,
    #[error("worker pool already started")]
    AlreadyStarted,
}

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Live counters maintained by the workers.
#[derive(Debug, Default)]
struct PoolCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    active: AtomicUsize,
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Units that returned `Ok`.
    pub completed: u64,
    /// Units that returned `Err`.
    pub failed: u64,
    /// Units that panicked.
    pub panicked: u64,
    /// Units executing right now.
    pub active: usize,
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

struct Job {
    work: UnitOfWork,
    /// Held until the unit finishes, so at most `size` units are in flight.
    permit: OwnedSemaphorePermit,
}

/// Fixed set of workers executing submitted units of work.
///
/// Handoff works like an unbuffered channel: `submit` first waits for one of
/// `size` permits (one per worker) and only then enqueues the unit, so a
/// queued unit always has an idle worker to take it. Permits are granted by
/// `start` and revoked by `quit`; a submission waiting for a permit when the
/// pool quits fails with `PoolError::Closed` instead of faulting.
///
/// Units are executed to completion. Errors and panics are contained in the
/// worker, counted, and logged; the worker then takes the next unit.
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    tx: parking_lot::Mutex<Option<mpsc::Sender<Job>>>,
    rx: parking_lot::Mutex<Option<mpsc::Receiver<Job>>>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    state: ArcSwap<PoolState>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Creates a pool of `size` workers in the `Created` state. A size of
    /// zero is raised to one.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel(size);
        Self {
            size,
            permits: Arc::new(Semaphore::new(0)),
            tx: parking_lot::Mutex::new(Some(tx)),
            rx: parking_lot::Mutex::new(Some(rx)),
            handles: parking_lot::Mutex::new(Vec::with_capacity(size)),
            state: ArcSwap::from_pointee(PoolState::Created),
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Number of workers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn state(&self) -> PoolState {
        **self.state.load()
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
        }
    }

    /// Spawns the workers and starts accepting units of work.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyStarted` on a second call and
    /// `PoolError::Closed` if the pool was already quit.
    pub fn start(&self) -> Result<(), PoolError> {
        match self.state() {
            PoolState::Created => {}
            PoolState::Running => return Err(PoolError::AlreadyStarted),
            PoolState::Draining | PoolState::Stopped => return Err(PoolError::Closed),
        }
        let rx = self.rx.lock().take().ok_or(PoolError::AlreadyStarted)?;
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = self.handles.lock();
        for worker_id in 0..self.size {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&self.counters),
            )));
        }
        drop(handles);

        self.state.store(Arc::new(PoolState::Running));
        self.permits.add_permits(self.size);
        info!(workers = self.size, "worker pool started");
        Ok(())
    }

    /// Hands a unit of work to an idle worker, waiting until one is free.
    ///
    /// Before `start` this waits until the pool is started.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the pool has been quit, including when
    /// `quit` happens while this call is waiting.
    pub async fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let tx = self.tx.lock().clone().ok_or(PoolError::Closed)?;

        tx.send(Job {
            work: Box::pin(work),
            permit,
        })
        .await
        .map_err(|_| PoolError::Closed)
    }

    /// Stops accepting units of work.
    ///
    /// Units already handed off keep running; workers exit once the handoff
    /// channel is empty. Waiting submissions fail with `PoolError::Closed`.
    /// Calling `quit` more than once is a no-op.
    pub fn quit(&self) {
        let next = match self.state() {
            PoolState::Running => PoolState::Draining,
            // Never started: no worker will ever drain the channel.
            PoolState::Created => PoolState::Stopped,
            PoolState::Draining | PoolState::Stopped => return,
        };
        self.state.store(Arc::new(next));
        self.permits.close();
        self.tx.lock().take();
        self.rx.lock().take();
        info!(state = ?next, "worker pool quit");
    }

    /// Quits the pool and waits for every worker to finish its last unit.
    pub async fn shutdown(&self) {
        self.quit();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed to join");
            }
        }
        self.state.store(Arc::new(PoolState::Stopped));
        let stats = self.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            panicked = stats.panicked,
            "worker pool stopped"
        );
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<PoolCounters>,
) {
    loop {
        // Idle workers queue on the mutex; the holder waits on the channel.
        let job = rx.lock().await.recv().await;
        let Some(Job { work, permit }) = job else {
            break;
        };

        counters.active.fetch_add(1, Ordering::Relaxed);
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        counters.active.fetch_sub(1, Ordering::Relaxed);
        drop(permit);

        match outcome {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(UNITS_TOTAL, "outcome" => "ok").increment(1);
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(UNITS_TOTAL, "outcome" => "error").increment(1);
                warn!(worker_id, error = %e, "unit of work failed");
            }
            Err(payload) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(UNITS_TOTAL, "outcome" => "panicked").increment(1);
                error!(worker_id, panic = %panic_message(payload.as_ref()), "unit of work panicked");
            }
        }
    }
    debug!(worker_id, "worker stopped");
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;

    fn started(size: usize) -> Arc<WorkerPool> {
        let pool = Arc::new(WorkerPool::new(size));
        pool.start().unwrap();
        pool
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_submitted_units() {
        let pool = started(3);
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            pool.submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;

        assert_eq!(ran.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().completed, 10);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_count_under_burst() {
        let pool = started(5);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 5, "peak concurrency was {peak}");
        assert!(peak >= 1);
        assert_eq!(pool.stats().completed, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_blocks_while_all_workers_busy() {
        let pool = started(1);
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        pool.submit(async move {
            gate.notified().await;
            Ok(())
        })
        .await
        .unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), pool.submit(async { Ok(()) })).await;
        assert!(blocked.is_err(), "submission should wait for a free worker");

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(2), pool.submit(async { Ok(()) }))
            .await
            .expect("worker should be free again")
            .unwrap();
        pool.shutdown().await;
        assert_eq!(pool.stats().completed, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_before_start_waits_for_start() {
        let pool = Arc::new(WorkerPool::new(2));
        assert_eq!(pool.state(), PoolState::Created);

        let submitter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(async { Ok(()) }).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!submitter.is_finished());

        pool.start().unwrap();
        submitter.await.unwrap().unwrap();
        pool.shutdown().await;
        assert_eq!(pool.stats().completed, 1);
    }

    #[tokio::test]
    async fn submit_after_quit_returns_closed() {
        let pool = started(2);
        pool.quit();
        assert_eq!(pool.state(), PoolState::Draining);

        let err = pool.submit(async { Ok(()) }).await.unwrap_err();
        assert_eq!(err, PoolError::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiting_submission_fails_cleanly_on_quit() {
        let pool = started(1);
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        pool.submit(async move {
            gate.notified().await;
            Ok(())
        })
        .await
        .unwrap();

        let waiting = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(async { Ok(()) }).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        pool.quit();
        assert_eq!(waiting.await.unwrap(), Err(PoolError::Closed));

        release.notify_one();
        pool.shutdown().await;
        assert_eq!(pool.stats().completed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn quit_drains_handed_off_units() {
        let pool = started(3);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;

        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_and_panicking_units_do_not_kill_workers() {
        let pool = started(1);

        let explode = true;
        pool.submit(async move {
            assert!(!explode, "boom");
            Ok(())
        })
        .await
        .unwrap();
        pool.submit(async { Err(anyhow::anyhow!("dispatch failed")) })
            .await
            .unwrap();
        pool.submit(async { Ok(()) }).await.unwrap();
        pool.shutdown().await;

        let stats = pool.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let pool = started(1);
        assert_eq!(pool.start(), Err(PoolError::AlreadyStarted));
        pool.shutdown().await;
        assert_eq!(pool.start(), Err(PoolError::Closed));
    }

    #[test]
    fn quit_before_start_stops_pool() {
        let pool = WorkerPool::new(4);
        pool.quit();
        assert_eq!(pool.state(), PoolState::Stopped);
        pool.quit();
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn zero_size_is_raised_to_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }

    #[test]
    fn panic_message_extracts_text() {
        let payload: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(payload.as_ref()), "owned text");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
