//! Process-wide stop signal and in-flight unit tracking.
//!
//! One controller is shared by the consumption loop, the producers and the
//! binary's signal handler. Every unit of work handed to the pool holds an
//! [`InFlightGuard`]; draining completes when the last guard drops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

/// Lifecycle of the running service.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Collaborators are being wired; nothing is consumed yet.
    Starting,
    /// Consuming and processing deliveries.
    Ready,
    /// Stop requested; consumption has ended, units in flight still run.
    Draining,
    /// Every in-flight unit has finished.
    Stopped,
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Coordinates an orderly stop of consumption and processing.
#[derive(Debug)]
pub struct ShutdownController {
    signal: watch::Sender<bool>,
    in_flight: Arc<InFlight>,
    state: ArcSwap<ServiceState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal,
            in_flight: Arc::new(InFlight::default()),
            state: ArcSwap::from_pointee(ServiceState::Starting),
        }
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        **self.state.load()
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(ServiceState::Ready));
    }

    /// Receiver that flips to `true` once a stop is requested.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.signal.borrow()
    }

    /// Requests a stop. Idempotent.
    pub fn trigger_shutdown(&self) {
        if self.signal.send_replace(true) {
            return;
        }
        self.state.store(Arc::new(ServiceState::Draining));
        info!(in_flight = self.in_flight_count(), "shutdown requested");
    }

    /// Marks one unit of work as in flight until the guard drops.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Waits until no unit is in flight, for at most `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` when drained. On timeout the
    /// state stays `Draining` and `false` is returned.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, async {
            loop {
                let idle = self.in_flight.idle.notified();
                tokio::pin!(idle);
                // Register before checking the count so a final drop between
                // the check and the await is not missed.
                idle.as_mut().enable();
                if self.in_flight_count() == 0 {
                    return;
                }
                idle.await;
            }
        })
        .await
        .is_ok();

        if drained {
            self.state.store(Arc::new(ServiceState::Stopped));
        } else {
            warn!(
                in_flight = self.in_flight_count(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "drain timed out"
            );
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}
