//! Per-document status workers.

use super::backend::{compute_status, StatusBackend};
use super::thread_manager::{ThreadManager, WorkerGuard};
use crate::model::{DocumentData, DocumentId, OutputDocument, StatusSlot};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of asking for a status computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A worker was started
    Started,
    /// A worker for this document is running; it will re-run afterwards
    Coalesced,
    /// The coordinator is stopping (or the thread could not be spawned)
    Refused,
}

/// Report sent by a worker when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The computation ran to the end
    Completed {
        /// Document the status belongs to
        document: DocumentId,
        /// Status revision the computation started on
        revision: u64,
        /// False if an edit superseded the result before it was published
        applied: bool,
        /// The published status carries an error
        data_error: bool,
    },

    /// The computation gave up after a stop request
    Cancelled {
        /// Document the status belongs to
        document: DocumentId,
    },
}

impl StatusEvent {
    /// Document the event refers to.
    pub fn document(&self) -> DocumentId {
        match self {
            StatusEvent::Completed { document, .. } | StatusEvent::Cancelled { document } => {
                *document
            }
        }
    }
}

struct Job {
    data: DocumentData,
    slot: Arc<StatusSlot>,
    revision: u64,
}

impl Job {
    fn for_document(doc: &OutputDocument) -> Self {
        Self {
            data: doc.snapshot(),
            slot: Arc::clone(doc.status_slot()),
            revision: doc.status_slot().revision(),
        }
    }
}

#[derive(Default)]
struct InFlight {
    rerun: Option<Job>,
}

/// Starts at most one status worker per document and collects their reports.
///
/// Owned by the controller thread. Workers publish into the document's
/// [`StatusSlot`] themselves and report over a channel; [`pump`](Self::pump)
/// or [`next_event`](Self::next_event) must be called to start coalesced
/// re-runs.
pub struct StatusScheduler {
    backend: Arc<dyn StatusBackend>,
    manager: ThreadManager,
    in_flight: HashMap<DocumentId, InFlight>,
    events_tx: Sender<StatusEvent>,
    events_rx: Receiver<StatusEvent>,
}

impl StatusScheduler {
    /// Create a scheduler with its own coordinator.
    pub fn new(backend: Arc<dyn StatusBackend>) -> Self {
        Self::with_manager(backend, ThreadManager::new())
    }

    /// Create a scheduler that registers workers with `manager`.
    pub fn with_manager(backend: Arc<dyn StatusBackend>, manager: ThreadManager) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            manager,
            in_flight: HashMap::new(),
            events_tx,
            events_rx,
        }
    }

    /// The worker coordinator.
    pub fn manager(&self) -> &ThreadManager {
        &self.manager
    }

    /// Number of documents with a running worker.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if `document` has a running worker.
    pub fn is_running(&self, document: DocumentId) -> bool {
        self.in_flight.contains_key(&document)
    }

    /// Ask for the status of `doc` to be recomputed from its current state.
    pub fn request(&mut self, doc: &OutputDocument) -> ScheduleOutcome {
        let job = Job::for_document(doc);
        if let Some(entry) = self.in_flight.get_mut(&doc.id()) {
            log::debug!("status worker for {} busy; queuing re-run", doc.id());
            entry.rerun = Some(job);
            return ScheduleOutcome::Coalesced;
        }
        self.spawn(job)
    }

    fn spawn(&mut self, job: Job) -> ScheduleOutcome {
        let Some(guard) = self.manager.try_register() else {
            log::debug!("not starting status worker for {}: stopping", job.data.id);
            return ScheduleOutcome::Refused;
        };

        let document = job.data.id;
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("status-{}", document))
            .spawn(move || run_worker(backend.as_ref(), job, guard, &events));

        match spawned {
            Ok(_) => {
                self.in_flight.insert(document, InFlight::default());
                ScheduleOutcome::Started
            }
            Err(e) => {
                log::warn!("could not spawn status worker for {}: {}", document, e);
                ScheduleOutcome::Refused
            }
        }
    }

    fn handle(&mut self, event: &StatusEvent) {
        let rerun = self
            .in_flight
            .remove(&event.document())
            .and_then(|entry| entry.rerun);
        if let Some(job) = rerun {
            self.spawn(job);
        }
    }

    /// Collect finished workers without blocking.
    pub fn pump(&mut self) -> Vec<StatusEvent> {
        let events: Vec<StatusEvent> = self.events_rx.try_iter().collect();
        for event in &events {
            self.handle(event);
        }
        events
    }

    /// Wait up to `timeout` for the next worker to finish.
    pub fn next_event(&mut self, timeout: Duration) -> Option<StatusEvent> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(&event);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait until no worker is running, or `timeout` passes.
    ///
    /// Returns the events received while waiting and whether the scheduler
    /// went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> (Vec<StatusEvent>, bool) {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_event(remaining) {
                Some(event) => events.push(event),
                None => return (events, false),
            }
        }
        (events, true)
    }

    /// Cancel queued re-runs and stop every worker within `timeout`.
    ///
    /// Returns true iff all workers drained in time.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        for entry in self.in_flight.values_mut() {
            entry.rerun = None;
        }
        let drained = self.manager.request_stop(timeout);
        self.pump();
        drained
    }
}

fn run_worker(backend: &dyn StatusBackend, job: Job, guard: WorkerGuard, events: &Sender<StatusEvent>) {
    let document = job.data.id;
    log::debug!("{} worker started for {}", backend.name(), document);

    let event = match compute_status(backend, &job.data, &guard.token()) {
        Some(status) => {
            let data_error = status.data_error();
            let applied = job.slot.publish(job.revision, status);
            if !applied {
                log::debug!("status for {} superseded by a later edit", document);
            }
            StatusEvent::Completed {
                document,
                revision: job.revision,
                applied,
                data_error,
            }
        }
        None => {
            log::debug!("status worker for {} cancelled", document);
            StatusEvent::Cancelled { document }
        }
    };

    // The receiver is gone only when the scheduler was dropped.
    let _ = events.send(event);
    guard.signal_completion();
}
