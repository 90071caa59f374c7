//! Lifecycle tracking for background status workers.
//!
//! A worker registers before it starts and holds the returned
//! [`WorkerGuard`] for as long as it runs. Dropping the guard signals
//! completion, so every exit path (return, early cancel, unwinding panic)
//! releases the worker's slot in the live count.
//!
//! Stopping is cooperative. [`ThreadManager::request_stop`] flips the
//! coordinator into `Stopping`, raises the stop signal every registered
//! worker can poll, and waits for the live count to reach zero or for the
//! timeout to expire, whichever comes first.

use crate::error::ComputeError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default drain deadline used on process shutdown.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Observable state of a [`ThreadManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No workers registered
    Idle,
    /// At least one worker registered
    Running,
    /// A stop request is draining workers
    Stopping,
    /// Workers the last stop gave up on are still running
    StopTimedOut,
}

#[derive(Debug, Default)]
struct Counters {
    live: usize,
    stopping: bool,
    stragglers: usize,
    stop_epoch: u64,
    last_drained: bool,
}

#[derive(Debug, Default)]
struct Shared {
    counters: Mutex<Counters>,
    changed: Condvar,
    stop_generation: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release one worker registered at stop generation `generation`.
    fn complete(&self, generation: u64) {
        let mut counters = self.lock();
        match counters.live.checked_sub(1) {
            Some(live) => counters.live = live,
            None => log::warn!("status worker signalled completion twice"),
        }
        // Workers registered before the latest stop are the ones it gave up on.
        if generation < self.stop_generation.load(Ordering::SeqCst) {
            counters.stragglers = counters.stragglers.saturating_sub(1);
        }
        drop(counters);
        self.changed.notify_all();
    }
}

/// Counts live status workers and orchestrates their cooperative shutdown.
///
/// Cloning yields another handle to the same coordinator. Every method may be
/// called from any thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadManager {
    shared: Arc<Shared>,
}

impl ThreadManager {
    /// Create an idle coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prospective worker.
    ///
    /// Returns `None` while a stop is in progress; the worker must then not
    /// start.
    pub fn try_register(&self) -> Option<WorkerGuard> {
        let mut counters = self.shared.lock();
        if counters.stopping {
            return None;
        }
        counters.live += 1;
        let generation = self.shared.stop_generation.load(Ordering::SeqCst);
        Some(WorkerGuard {
            token: StopToken {
                shared: Arc::clone(&self.shared),
                generation,
            },
        })
    }

    /// Check if a stop request is draining workers.
    pub fn is_stopping(&self) -> bool {
        self.shared.lock().stopping
    }

    /// Number of registered workers that have not completed.
    pub fn live_workers(&self) -> usize {
        self.shared.lock().live
    }

    /// Current coordinator state.
    pub fn state(&self) -> CoordinatorState {
        let counters = self.shared.lock();
        if counters.stopping {
            CoordinatorState::Stopping
        } else if counters.stragglers > 0 {
            CoordinatorState::StopTimedOut
        } else if counters.live > 0 {
            CoordinatorState::Running
        } else {
            CoordinatorState::Idle
        }
    }

    /// Signal every registered worker to stop and wait for them to drain.
    ///
    /// Returns true iff the live count reached zero within `timeout`. A second
    /// caller arriving during a stop joins the one in flight instead of
    /// starting another. Expiry is logged, never raised, and the coordinator
    /// accepts registrations again afterwards.
    pub fn request_stop(&self, timeout: Duration) -> bool {
        let shared = &*self.shared;
        let counters = shared.lock();

        if counters.stopping {
            let epoch = counters.stop_epoch;
            log::debug!("stop already in progress, joining it");
            let (counters, _) = shared
                .changed
                .wait_timeout_while(counters, timeout, |c| c.stopping && c.stop_epoch == epoch)
                .unwrap_or_else(PoisonError::into_inner);
            let finished = !(counters.stopping && counters.stop_epoch == epoch);
            return finished && counters.last_drained;
        }

        let started = Instant::now();
        let mut counters = counters;
        counters.stopping = true;
        counters.stop_epoch += 1;
        shared.stop_generation.fetch_add(1, Ordering::SeqCst);
        log::debug!("stopping {} status worker(s)", counters.live);
        shared.changed.notify_all();

        let (mut counters, _) = shared
            .changed
            .wait_timeout_while(counters, timeout, |c| c.live > 0)
            .unwrap_or_else(PoisonError::into_inner);

        let drained = counters.live == 0;
        counters.stopping = false;
        counters.last_drained = drained;
        counters.stragglers = counters.live;
        let remaining = counters.live;
        drop(counters);
        shared.changed.notify_all();

        if drained {
            log::debug!("status workers drained in {:?}", started.elapsed());
        } else {
            log::warn!(
                "{} status worker(s) still running after {:?}; continuing without them",
                remaining,
                timeout
            );
        }
        drained
    }
}

/// Registration of one running worker. Dropping it signals completion.
#[derive(Debug)]
#[must_use = "dropping the guard immediately signals completion"]
pub struct WorkerGuard {
    token: StopToken,
}

impl WorkerGuard {
    /// Cancellation handle for the worker's computation.
    pub fn token(&self) -> StopToken {
        self.token.clone()
    }

    /// Check if a stop was requested since this worker registered.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_stopping()
    }

    /// Signal completion now instead of at the end of the guard's scope.
    pub fn signal_completion(self) {
        drop(self);
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.token.shared.complete(self.token.generation);
    }
}

/// Cancellation signal a worker polls between computation stages.
#[derive(Debug, Clone)]
pub struct StopToken {
    shared: Arc<Shared>,
    generation: u64,
}

impl StopToken {
    /// A token that is never stopped, for running a computation inline.
    pub fn never() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            generation: 0,
        }
    }

    /// Check if a stop was requested after the owning worker registered.
    pub fn is_stopping(&self) -> bool {
        self.shared.stop_generation.load(Ordering::SeqCst) > self.generation
    }

    /// Return `Err(ComputeError::Cancelled)` once a stop was requested.
    pub fn check(&self) -> Result<(), ComputeError> {
        if self.is_stopping() {
            Err(ComputeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_and_complete() {
        let manager = ThreadManager::new();
        assert_eq!(manager.state(), CoordinatorState::Idle);

        let guard = manager.try_register().unwrap();
        assert_eq!(manager.live_workers(), 1);
        assert_eq!(manager.state(), CoordinatorState::Running);

        guard.signal_completion();
        assert_eq!(manager.live_workers(), 0);
        assert_eq!(manager.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_stop_with_no_workers() {
        let manager = ThreadManager::new();
        assert!(manager.request_stop(Duration::from_millis(10)));
        assert_eq!(manager.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_token_sees_stop() {
        let manager = ThreadManager::new();
        let guard = manager.try_register().unwrap();
        let token = guard.token();
        assert!(token.check().is_ok());

        let worker = thread::spawn(move || {
            while !guard.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
        });

        assert!(manager.request_stop(Duration::from_secs(5)));
        assert!(token.is_stopping());
        assert_eq!(token.check(), Err(ComputeError::Cancelled));
        worker.join().unwrap();
    }

    #[test]
    fn test_reusable_after_stop() {
        let manager = ThreadManager::new();
        assert!(manager.request_stop(Duration::from_millis(10)));

        let guard = manager.try_register().unwrap();
        assert!(!guard.is_cancelled());
        assert!(!manager.is_stopping());
    }

    #[test]
    fn test_refuses_registration_while_stopping() {
        let manager = ThreadManager::new();
        let guard = manager.try_register().unwrap();

        let stopper = {
            let manager = manager.clone();
            thread::spawn(move || manager.request_stop(Duration::from_secs(5)))
        };

        while !manager.is_stopping() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(manager.state(), CoordinatorState::Stopping);
        assert!(manager.try_register().is_none());

        drop(guard);
        assert!(stopper.join().unwrap());
    }

    #[test]
    fn test_timeout_then_late_completion() {
        let manager = ThreadManager::new();
        let guard = manager.try_register().unwrap();

        assert!(!manager.request_stop(Duration::from_millis(20)));
        assert_eq!(manager.state(), CoordinatorState::StopTimedOut);

        drop(guard);
        assert_eq!(manager.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_never_token() {
        assert!(!StopToken::never().is_stopping());
    }
}
