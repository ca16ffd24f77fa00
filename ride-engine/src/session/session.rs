//! One rider-initiated search, end to end.
//!
//! [`SearchSession::run`] submits the trip, then drives the radius matcher
//! and the status polling loop concurrently. Push notifications enter
//! through [`SearchSession::handle_push`]. Whatever channel observes the
//! assignment first wins through the shared reconciler; everything else
//! winds down through the session's cancellation tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::types::PushAssignmentPayload;
use crate::api::{ApiError, RideApi};
use crate::domain::{DriverCandidate, TripId, TripRequest};
use crate::matcher::{DriverMatcher, SearchConfig, SearchOutcome, SearchProgress};
use crate::trip::{IllegalTransition, TripEvent, TripState, TripStateStore};

use super::event::{AssignmentEvent, SessionId};
use super::poll::{PollOutcome, poll_search_status};
use super::reconciler::{AssignmentReconciler, Resolution};

/// Reason the rider's cancellation sends to the server.
const CANCEL_REASON: &str = "client_cancelled";

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    Searching,
    Resolved,
    Exhausted,
    TimedOut,
    Cancelled,
    Failed,
}

/// How a completed session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// A driver was bound to the trip.
    Resolved { candidate: DriverCandidate },
    /// The radius ladder ran out with nobody qualifying.
    Exhausted { max_radius_km: f64, attempts: u32 },
    /// The polling wall clock elapsed before any channel resolved.
    TimedOut,
    /// The rider (or the server) called the search off.
    Cancelled,
}

/// Failures that end a session before (or outside) a search outcome.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("trip submission failed: {0}")]
    Submit(#[from] ApiError),
    #[error("server rejected the trip request: {message}")]
    Rejected { message: String },
    #[error(transparent)]
    Lifecycle(#[from] IllegalTransition),
}

/// A single driver search with its three assignment channels.
pub struct SearchSession<A: RideApi + 'static> {
    api: Arc<A>,
    store: Arc<TripStateStore>,
    config: SearchConfig,
    rider_id: String,
    session: SessionId,
    /// Fired by the rider's `cancel()`. Parent of `stop`.
    cancel: CancellationToken,
    /// Fired when any channel resolves, or on cancellation. Stops the
    /// matcher and the polling loop.
    stop: CancellationToken,
    reconciler: Arc<AssignmentReconciler>,
    status: Mutex<SessionStatus>,
    trip_id: Mutex<Option<TripId>>,
    /// Set once the server-side cancel has been dispatched, whichever of
    /// `cancel()` or `run()` gets there first.
    server_cancelled: AtomicBool,
}

impl<A: RideApi + 'static> SearchSession<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<TripStateStore>,
        config: SearchConfig,
        rider_id: impl Into<String>,
    ) -> Self {
        let session = SessionId::generate();
        let cancel = CancellationToken::new();
        let stop = cancel.child_token();
        let reconciler = Arc::new(AssignmentReconciler::new(session, store.clone(), stop.clone()));
        Self {
            api,
            store,
            config,
            rider_id: rider_id.into(),
            session,
            cancel,
            stop,
            reconciler,
            status: Mutex::new(SessionStatus::Created),
            trip_id: Mutex::new(None),
            server_cancelled: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    /// The server-assigned trip id, once acceptance has happened.
    pub fn trip_id(&self) -> Option<TripId> {
        self.trip_id.lock().unwrap().clone()
    }

    /// Feed a push-notification assignment into the session.
    ///
    /// Payloads naming another trip are dropped as stale without touching
    /// the reconciler; everything else goes through the same at-most-once
    /// resolution as the poll and matcher channels.
    pub fn handle_push(&self, payload: PushAssignmentPayload) -> Resolution {
        let ours = {
            let trip = self.trip_id.lock().unwrap();
            trip.as_ref() == Some(&payload.trip_id)
        };
        if !ours {
            debug!(
                session = %self.session,
                pushed = %payload.trip_id,
                "push names a different trip, dropping"
            );
            return Resolution::Stale;
        }
        self.reconciler.resolve(AssignmentEvent::from_push(self.session, payload))
    }

    /// Call the search off.
    ///
    /// Synchronous: the session status flips and the reconciler closes
    /// before this returns, so a push racing the cancellation cannot land.
    /// The matcher and poll loop stop at their next suspension point. The
    /// server-side cancel is fired best-effort on a detached task; its
    /// failure is logged, never retried, and never blocks the caller.
    pub fn cancel(&self) {
        {
            let mut status = self.status.lock().unwrap();
            match *status {
                SessionStatus::Created | SessionStatus::Searching => {
                    *status = SessionStatus::Cancelled;
                }
                _ => return,
            }
        }
        info!(session = %self.session, "search cancelled by rider");

        self.reconciler.close();
        self.cancel.cancel();

        match self.store.transition(TripEvent::Cancel) {
            Ok(_) => {
                let _ = self.store.transition(TripEvent::AckCancelled);
            }
            Err(e) => debug!(session = %self.session, error = %e, "no lifecycle state to cancel"),
        }

        // The trip id may not be published yet; `run()` fires the server
        // cancel itself when it learns the id after the token flipped.
        if let Some(trip) = self.trip_id.lock().unwrap().clone() {
            self.fire_server_cancel(trip);
        }
    }

    /// Run the search to completion.
    ///
    /// Submits the trip, transitions the lifecycle into `Searching`, then
    /// races the radius matcher against the polling loop until one of the
    /// terminal outcomes. `on_progress` relays the matcher's per-round
    /// progress reports.
    pub async fn run<F>(
        &self,
        mut request: TripRequest,
        on_progress: F,
    ) -> Result<SessionOutcome, SessionError>
    where
        F: FnMut(SearchProgress) + Send,
    {
        self.store.begin_search(&request)?;
        self.set_status(SessionStatus::Searching);

        // A cancel that arrived before this point found nothing to undo:
        // the lifecycle was still idle. Unwind it here, before submitting.
        if self.cancel.is_cancelled() {
            self.settle_cancelled();
            return Ok(SessionOutcome::Cancelled);
        }

        let response = match self.api.create_trip(&self.rider_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                self.abort_search();
                self.set_status(SessionStatus::Failed);
                return Err(SessionError::Submit(e));
            }
        };

        let trip_id = match (response.success, response.trip_id) {
            (true, Some(id)) if id.is_well_formed() => id,
            _ => {
                self.abort_search();
                self.set_status(SessionStatus::Failed);
                return Err(SessionError::Rejected {
                    message: "acceptance carried no usable trip id".into(),
                });
            }
        };

        info!(session = %self.session, trip = %trip_id, "trip accepted, search running");
        *self.trip_id.lock().unwrap() = Some(trip_id.clone());

        // A cancel that raced the submission saw no trip id, so it could
        // not reach the server. Honor it now with the id in hand, and do
        // not re-persist the request the cancel already cleared.
        if self.cancel.is_cancelled() {
            self.settle_cancelled();
            self.fire_server_cancel(trip_id);
            return Ok(SessionOutcome::Cancelled);
        }

        request.accept(trip_id.clone());
        self.store.store_request(&request);

        // Some deployments bind a driver synchronously at acceptance; that
        // still goes through the reconciler like any other channel.
        if let Some(record) = response.driver {
            let event = AssignmentEvent::from_search(self.session, record.into_candidate());
            if self.reconciler.resolve(event) == Resolution::Applied {
                if let Some(candidate) = self.reconciler.winner() {
                    return Ok(self.finish_resolved(candidate));
                }
            }
        }

        let mut poll = tokio::spawn(poll_search_status(
            self.api.clone(),
            trip_id,
            self.session,
            self.reconciler.clone(),
            self.config.poll_interval,
            self.config.poll_timeout,
            self.stop.clone(),
        ));

        let matcher = DriverMatcher::new(self.api.clone(), self.config.clone());
        let search = matcher.search(request.rider.coords, &self.stop, on_progress);
        tokio::pin!(search);

        let (search_outcome, poll_outcome) = tokio::select! {
            joined = &mut poll => {
                // Poll ended first: resolution, timeout, or a terminal
                // server status. Stop the matcher and let it unwind.
                let poll_outcome = joined.unwrap_or_else(|e| {
                    warn!(session = %self.session, error = %e, "poll task failed");
                    PollOutcome::Stopped
                });
                self.stop.cancel();
                let search_outcome = search.await;
                (search_outcome, poll_outcome)
            }
            outcome = &mut search => {
                if let SearchOutcome::Found { candidate, .. } = &outcome {
                    let event =
                        AssignmentEvent::from_search(self.session, candidate.clone());
                    self.reconciler.resolve(event);
                }
                // Resolution already cancelled `stop`; exhaustion and
                // cancellation end the poll the same way.
                self.stop.cancel();
                let poll_outcome = poll.await.unwrap_or_else(|e| {
                    warn!(session = %self.session, error = %e, "poll task failed");
                    PollOutcome::Stopped
                });
                (outcome, poll_outcome)
            }
        };

        self.conclude(search_outcome, poll_outcome)
    }

    fn conclude(
        &self,
        search_outcome: SearchOutcome,
        poll_outcome: PollOutcome,
    ) -> Result<SessionOutcome, SessionError> {
        // A rider cancellation outranks everything, including a winner that
        // squeaked in just before the reconciler closed. `cancel()` drives
        // the lifecycle through CANCELLED when it can; a cancel that beat
        // the search transition could not, so settle the leftover here.
        if self.cancel.is_cancelled() {
            self.settle_cancelled();
            return Ok(SessionOutcome::Cancelled);
        }

        if let Some(candidate) = self.reconciler.winner() {
            return Ok(self.finish_resolved(candidate));
        }

        if let PollOutcome::Terminal(server) = poll_outcome {
            self.store.reconcile_with_server(server);
            self.reconciler.close();
            self.set_status(SessionStatus::Cancelled);
            return Ok(SessionOutcome::Cancelled);
        }

        if poll_outcome == PollOutcome::TimedOut {
            self.reconciler.close();
            self.store.transition(TripEvent::SearchFailed)?;
            self.set_status(SessionStatus::TimedOut);
            return Ok(SessionOutcome::TimedOut);
        }

        if let SearchOutcome::Exhausted {
            max_radius_km,
            attempts,
        } = search_outcome
        {
            self.reconciler.close();
            self.store.transition(TripEvent::SearchFailed)?;
            self.set_status(SessionStatus::Exhausted);
            return Ok(SessionOutcome::Exhausted {
                max_radius_km,
                attempts,
            });
        }

        // Both loops stopped without a winner, a timeout, or a rider
        // cancellation. Treat it as cancelled and recover to idle.
        warn!(session = %self.session, "session stopped without a definite outcome");
        self.reconciler.close();
        let _ = self.store.transition(TripEvent::SearchFailed);
        self.set_status(SessionStatus::Cancelled);
        Ok(SessionOutcome::Cancelled)
    }

    fn finish_resolved(&self, candidate: DriverCandidate) -> SessionOutcome {
        self.set_status(SessionStatus::Resolved);
        SessionOutcome::Resolved { candidate }
    }

    /// Drive a `Searching` lifecycle that an early `cancel()` could not
    /// touch back to idle.
    fn settle_cancelled(&self) {
        if self.store.state() == TripState::Searching
            && self.store.transition(TripEvent::Cancel).is_ok()
        {
            let _ = self.store.transition(TripEvent::AckCancelled);
        }
    }

    /// Best-effort server-side cancel, dispatched at most once per session
    /// on a detached task.
    fn fire_server_cancel(&self, trip: TripId) {
        if self.server_cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.cancel_trip(&trip, CANCEL_REASON).await {
                warn!(trip = %trip, error = %e, "server-side cancel failed");
            }
        });
    }

    /// Roll `Searching` back to `Idle` after a failed submission.
    fn abort_search(&self) {
        if let Err(e) = self.store.transition(TripEvent::SearchFailed) {
            warn!(session = %self.session, error = %e, "could not roll back failed search");
        }
    }

    fn set_status(&self, next: SessionStatus) {
        let mut status = self.status.lock().unwrap();
        // A synchronous cancel outranks anything the run loop reports later.
        if *status == SessionStatus::Cancelled {
            return;
        }
        *status = next;
    }
}
