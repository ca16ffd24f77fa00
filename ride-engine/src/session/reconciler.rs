//! At-most-once assignment resolution.
//!
//! Push, poll, and the matcher all funnel through [`AssignmentReconciler::
//! resolve`], a non-blocking entry point serialized by an atomic
//! check-and-set. Exactly one event per session can ever commit the
//! `DriverAssigned` transition; everything after it is a provable no-op.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::DriverCandidate;
use crate::trip::TripStateStore;

use super::event::{AssignmentEvent, SessionId};

/// What became of an assignment signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First valid signal: the transition was committed.
    Applied,
    /// The session already resolved; no side effects.
    Duplicate,
    /// Wrong or dead session; discarded.
    Stale,
}

/// Per-session assignment resolver.
pub struct AssignmentReconciler {
    session: SessionId,
    store: Arc<TripStateStore>,
    /// Fired when the session stops wanting background signals, either
    /// because an assignment committed or the session ended.
    stop: CancellationToken,
    resolved: AtomicBool,
    closed: AtomicBool,
    winner: Mutex<Option<DriverCandidate>>,
}

impl AssignmentReconciler {
    pub fn new(session: SessionId, store: Arc<TripStateStore>, stop: CancellationToken) -> Self {
        Self {
            session,
            store,
            stop,
            resolved: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            winner: Mutex::new(None),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// The committed candidate, once resolved.
    pub fn winner(&self) -> Option<DriverCandidate> {
        self.winner.lock().unwrap().clone()
    }

    /// Stop accepting signals. Events arriving after this are stale.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Serialized resolution entry point.
    ///
    /// The first structurally valid event for this session wins: it commits
    /// `Searching → DriverAssigned`, records the winner, and cancels the
    /// stop token so the losing channels wind down. Everything later is
    /// `Duplicate`; events for other or dead sessions are `Stale`. Neither
    /// is an error.
    pub fn resolve(&self, event: AssignmentEvent) -> Resolution {
        if event.session != self.session || self.closed.load(Ordering::Acquire) {
            debug!(
                source = ?event.source,
                event_session = %event.session,
                session = %self.session,
                "discarding stale assignment event"
            );
            return Resolution::Stale;
        }

        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(source = ?event.source, "duplicate assignment event");
            return Resolution::Duplicate;
        }

        match self.store.assign_driver(&event.candidate) {
            Ok(_) => {
                info!(
                    source = ?event.source,
                    driver = %event.candidate.id,
                    "driver assignment committed"
                );
                *self.winner.lock().unwrap() = Some(event.candidate);
                self.stop.cancel();
                Resolution::Applied
            }
            Err(e) => {
                // The lifecycle moved under us (e.g. a concurrent cancel).
                // The flag stays set: this session will never assign.
                warn!(source = ?event.source, error = %e, "assignment lost to a lifecycle race");
                Resolution::Stale
            }
        }
    }
}
