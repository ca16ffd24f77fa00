//! Trip lifecycle state machine.
//!
//! The transition table is a pure function so it can be tested exhaustively
//! without a store. State ownership and persistence live in
//! [`crate::trip::store::TripStateStore`]; everything else in the crate
//! requests transitions and never writes state directly.

use std::fmt;

/// Authoritative trip lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripState {
    Idle,
    Searching,
    DriverAssigned,
    InRide,
    Completed,
    Cancelled,
}

impl fmt::Display for TripState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TripState::Idle => "idle",
            TripState::Searching => "searching",
            TripState::DriverAssigned => "driver_assigned",
            TripState::InRide => "in_ride",
            TripState::Completed => "completed",
            TripState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl TripState {
    /// Parse the persisted representation (the [`fmt::Display`] output).
    ///
    /// Unknown strings yield `None`; callers treat that as corrupt local
    /// state and fall back to `Idle`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(TripState::Idle),
            "searching" => Some(TripState::Searching),
            "driver_assigned" => Some(TripState::DriverAssigned),
            "in_ride" => Some(TripState::InRide),
            "completed" => Some(TripState::Completed),
            "cancelled" => Some(TripState::Cancelled),
            _ => None,
        }
    }
}

/// Events that request a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripEvent {
    /// Rider submitted a trip request.
    SubmitRequest,
    /// The reconciler committed a driver assignment.
    AssignDriver,
    /// Search ended without a driver (ladder exhausted or poll timeout).
    SearchFailed,
    /// Rider explicitly started the ride.
    StartRide,
    /// Ride finished.
    CompleteRide,
    /// Rider cancelled an active trip.
    Cancel,
    /// Post-completion flows (rating, receipt) finished.
    AckCompleted,
    /// Cancellation housekeeping finished.
    AckCancelled,
    /// Recovery path: local state disagreed with server truth.
    ResetToIdle,
}

/// A transition the table rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition: {event:?} in state {from}")]
pub struct IllegalTransition {
    pub from: TripState,
    pub event: TripEvent,
}

/// Apply an event to a state, yielding the next state or rejecting the edge.
///
/// `ResetToIdle` is the only edge allowed from every state; it exists for
/// reconciliation against authoritative server status, not for callers that
/// want to skip the lifecycle.
pub fn apply(state: TripState, event: TripEvent) -> Result<TripState, IllegalTransition> {
    use TripEvent as E;
    use TripState as S;

    let next = match (state, event) {
        (S::Idle, E::SubmitRequest) => S::Searching,
        (S::Searching, E::AssignDriver) => S::DriverAssigned,
        (S::Searching, E::SearchFailed) => S::Idle,
        (S::DriverAssigned, E::StartRide) => S::InRide,
        (S::InRide, E::CompleteRide) => S::Completed,
        (S::Completed, E::AckCompleted) => S::Idle,
        (S::Searching | S::DriverAssigned | S::InRide, E::Cancel) => S::Cancelled,
        (S::Cancelled, E::AckCancelled) => S::Idle,
        (_, E::ResetToIdle) => S::Idle,
        (from, event) => return Err(IllegalTransition { from, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_end_to_end() {
        let mut state = TripState::Idle;
        for event in [
            TripEvent::SubmitRequest,
            TripEvent::AssignDriver,
            TripEvent::StartRide,
            TripEvent::CompleteRide,
            TripEvent::AckCompleted,
        ] {
            state = apply(state, event).unwrap();
        }
        assert_eq!(state, TripState::Idle);
    }

    #[test]
    fn idle_to_in_ride_is_rejected() {
        let err = apply(TripState::Idle, TripEvent::StartRide).unwrap_err();
        assert_eq!(err.from, TripState::Idle);
        assert_eq!(err.event, TripEvent::StartRide);
    }

    #[test]
    fn assign_requires_searching() {
        assert!(apply(TripState::Idle, TripEvent::AssignDriver).is_err());
        assert!(apply(TripState::InRide, TripEvent::AssignDriver).is_err());
        assert!(apply(TripState::Searching, TripEvent::AssignDriver).is_ok());
    }

    #[test]
    fn cancel_from_active_states() {
        for state in [
            TripState::Searching,
            TripState::DriverAssigned,
            TripState::InRide,
        ] {
            assert_eq!(apply(state, TripEvent::Cancel).unwrap(), TripState::Cancelled);
        }
        assert!(apply(TripState::Idle, TripEvent::Cancel).is_err());
        assert!(apply(TripState::Completed, TripEvent::Cancel).is_err());
    }

    #[test]
    fn cancelled_acks_to_idle() {
        let state = apply(TripState::Cancelled, TripEvent::AckCancelled).unwrap();
        assert_eq!(state, TripState::Idle);
    }

    #[test]
    fn search_failure_resets_to_idle() {
        assert_eq!(
            apply(TripState::Searching, TripEvent::SearchFailed).unwrap(),
            TripState::Idle
        );
        assert!(apply(TripState::DriverAssigned, TripEvent::SearchFailed).is_err());
    }

    #[test]
    fn reset_allowed_everywhere() {
        for state in [
            TripState::Idle,
            TripState::Searching,
            TripState::DriverAssigned,
            TripState::InRide,
            TripState::Completed,
            TripState::Cancelled,
        ] {
            assert_eq!(apply(state, TripEvent::ResetToIdle).unwrap(), TripState::Idle);
        }
    }

    #[test]
    fn display_parse_roundtrip() {
        for state in [
            TripState::Idle,
            TripState::Searching,
            TripState::DriverAssigned,
            TripState::InRide,
            TripState::Completed,
            TripState::Cancelled,
        ] {
            assert_eq!(TripState::parse(&state.to_string()), Some(state));
        }
        assert_eq!(TripState::parse("riding"), None);
        assert_eq!(TripState::parse(""), None);
    }

    #[test]
    fn rejected_transitions_leave_error_details() {
        let err = apply(TripState::Completed, TripEvent::StartRide).unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal transition: StartRide in state completed"
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = TripState> {
        prop_oneof![
            Just(TripState::Idle),
            Just(TripState::Searching),
            Just(TripState::DriverAssigned),
            Just(TripState::InRide),
            Just(TripState::Completed),
            Just(TripState::Cancelled),
        ]
    }

    fn any_event() -> impl Strategy<Value = TripEvent> {
        prop_oneof![
            Just(TripEvent::SubmitRequest),
            Just(TripEvent::AssignDriver),
            Just(TripEvent::SearchFailed),
            Just(TripEvent::StartRide),
            Just(TripEvent::CompleteRide),
            Just(TripEvent::Cancel),
            Just(TripEvent::AckCompleted),
            Just(TripEvent::AckCancelled),
            Just(TripEvent::ResetToIdle),
        ]
    }

    proptest! {
        /// The recovery edge is total.
        #[test]
        fn reset_always_reaches_idle(state in any_state()) {
            prop_assert_eq!(apply(state, TripEvent::ResetToIdle), Ok(TripState::Idle));
        }

        /// Persisted representation survives a roundtrip.
        #[test]
        fn display_parses_back(state in any_state()) {
            prop_assert_eq!(TripState::parse(&state.to_string()), Some(state));
        }

        /// Rejections always name the exact edge that was refused.
        #[test]
        fn rejections_name_their_edge(state in any_state(), event in any_event()) {
            if let Err(e) = apply(state, event) {
                prop_assert_eq!(e.from, state);
                prop_assert_eq!(e.event, event);
            }
        }

        /// Idle is reachable from every state in at most two events.
        #[test]
        fn idle_is_always_two_events_away(state in any_state()) {
            let one_hop = match state {
                TripState::Idle => TripEvent::ResetToIdle,
                TripState::Searching => TripEvent::SearchFailed,
                TripState::DriverAssigned | TripState::InRide => TripEvent::Cancel,
                TripState::Completed => TripEvent::AckCompleted,
                TripState::Cancelled => TripEvent::AckCancelled,
            };
            let next = apply(state, one_hop).unwrap();
            let settled = if next == TripState::Idle {
                next
            } else {
                apply(next, TripEvent::AckCancelled).unwrap()
            };
            prop_assert_eq!(settled, TripState::Idle);
        }
    }
}
