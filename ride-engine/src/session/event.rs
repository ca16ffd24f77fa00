//! Assignment events and their normalization.
//!
//! A driver assignment is one logical fact that can be observed through
//! three producers: the push channel, the polling loop, and the matcher's
//! own winner. All three are normalized into the same [`AssignmentEvent`]
//! shape before they reach the reconciler, so deduplication never has to
//! care where a signal came from.

use std::fmt;

use uuid::Uuid;

use crate::api::types::{DriverRecord, PushAssignmentPayload};
use crate::domain::DriverCandidate;

/// Identity of one search session. Events tagged with another session's id
/// are stale by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which producer observed the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentSource {
    /// Out-of-band push notification.
    Push,
    /// The status polling loop.
    Poll,
    /// The matcher's own radius search (including a driver returned inline
    /// on trip acceptance).
    Search,
}

/// A normalized "driver assigned" signal.
#[derive(Debug, Clone)]
pub struct AssignmentEvent {
    pub source: AssignmentSource,
    pub session: SessionId,
    pub candidate: DriverCandidate,
}

impl AssignmentEvent {
    pub fn from_push(session: SessionId, payload: PushAssignmentPayload) -> Self {
        Self {
            source: AssignmentSource::Push,
            session,
            candidate: payload.into_candidate(),
        }
    }

    pub fn from_poll(session: SessionId, driver: DriverRecord) -> Self {
        Self {
            source: AssignmentSource::Poll,
            session,
            candidate: driver.into_candidate(),
        }
    }

    pub fn from_search(session: SessionId, candidate: DriverCandidate) -> Self {
        Self {
            source: AssignmentSource::Search,
            session,
            candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::driver_record;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn push_and_poll_normalize_to_the_same_candidate_shape() {
        let session = SessionId::generate();

        let record = driver_record("d-1", "Luis", 18.49, -69.93);
        let poll = AssignmentEvent::from_poll(session, record);

        let push_json = r#"{
            "driverId": "d-1",
            "driverName": "Luis",
            "vehicleModel": "Toyota Corolla",
            "vehiclePlate": "A-d-1",
            "driverRating": 4.8,
            "driverLat": 18.49,
            "driverLng": -69.93,
            "tripId": "trip-1"
        }"#;
        let payload: PushAssignmentPayload = serde_json::from_str(push_json).unwrap();
        let push = AssignmentEvent::from_push(session, payload);

        assert_eq!(push.candidate.id, poll.candidate.id);
        assert_eq!(push.candidate.location, poll.candidate.location);
        assert_eq!(push.candidate.vehicle, poll.candidate.vehicle);
        assert_eq!(push.source, AssignmentSource::Push);
        assert_eq!(poll.source, AssignmentSource::Poll);
    }
}
