//! Authoritative trip state ownership, persistence, and reconciliation.

use std::sync::Arc;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::api::types::ServerTripStatus;
use crate::api::{ApiError, RideApi};
use crate::domain::{DriverCandidate, GeoPoint, TripId, TripRequest};
use crate::trip::state::{self, IllegalTransition, TripEvent, TripState};
use crate::trip::storage::{KeyValueStore, keys};

/// Sole owner of the trip lifecycle state.
///
/// All components request transitions through [`TripStateStore::transition`]
/// and friends; none mutate state directly. State changes are persisted to
/// the key-value store: `tripStatus` and `tripRequest` are written jointly,
/// `driverInfo` on assignment, and all three are cleared whenever the
/// lifecycle returns to idle.
pub struct TripStateStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<TripState>,
}

impl TripStateStore {
    /// Create a store, resuming from persisted state if present.
    ///
    /// A missing or unparseable `tripStatus` slot resumes as `Idle`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let current = storage
            .get(keys::TRIP_STATUS)
            .and_then(|s| TripState::parse(&s))
            .unwrap_or(TripState::Idle);
        Self {
            storage,
            current: Mutex::new(current),
        }
    }

    pub fn state(&self) -> TripState {
        *self.current.lock().unwrap()
    }

    /// Apply `event` through the transition table.
    ///
    /// Illegal edges are rejected and leave both in-memory and persisted
    /// state untouched.
    pub fn transition(&self, event: TripEvent) -> Result<TripState, IllegalTransition> {
        let mut current = self.current.lock().unwrap();
        let next = state::apply(*current, event)?;
        *current = next;
        self.persist(next);
        Ok(next)
    }

    /// Submit transition: `Idle → Searching`, persisting the request and
    /// status jointly.
    pub fn begin_search(&self, request: &TripRequest) -> Result<TripState, IllegalTransition> {
        let mut current = self.current.lock().unwrap();
        let next = state::apply(*current, TripEvent::SubmitRequest)?;
        *current = next;
        self.store_request(request);
        // The origin doubles as the fallback position for the next launch;
        // unlike the trip slots it survives the return to idle.
        if let Ok(json) = serde_json::to_string(&request.rider) {
            self.storage.set(keys::USER_LOCATION, json);
        }
        self.persist(next);
        Ok(next)
    }

    /// The origin of the most recent search, used as a fallback position
    /// when no fresh GPS fix is available.
    pub fn last_known_location(&self) -> Option<GeoPoint> {
        let json = self.storage.get(keys::USER_LOCATION)?;
        serde_json::from_str(&json).ok()
    }

    /// Assignment transition: `Searching → DriverAssigned`, persisting the
    /// winning candidate alongside the status.
    pub fn assign_driver(
        &self,
        candidate: &DriverCandidate,
    ) -> Result<TripState, IllegalTransition> {
        let mut current = self.current.lock().unwrap();
        let next = state::apply(*current, TripEvent::AssignDriver)?;
        *current = next;
        if let Ok(json) = serde_json::to_string(candidate) {
            self.storage.set(keys::DRIVER_INFO, json);
        }
        self.persist(next);
        Ok(next)
    }

    /// Re-persist the request, e.g. after the server-assigned trip id was
    /// attached.
    pub fn store_request(&self, request: &TripRequest) {
        if let Ok(json) = serde_json::to_string(request) {
            self.storage.set(keys::TRIP_REQUEST, json);
        }
    }

    /// The trip id of the persisted request, if any.
    pub fn stored_trip_id(&self) -> Option<TripId> {
        let json = self.storage.get(keys::TRIP_REQUEST)?;
        let request: TripRequest = serde_json::from_str(&json).ok()?;
        request.trip_id
    }

    /// Reconcile local state against the server-reported status.
    ///
    /// Server truth is authoritative: a terminal or unknown server status
    /// forces the recovery path to `Idle` regardless of local belief. An
    /// active server status keeps local state as-is.
    pub fn reconcile_with_server(&self, server: ServerTripStatus) -> TripState {
        let mut current = self.current.lock().unwrap();
        if server.is_terminal() && *current != TripState::Idle {
            warn!(
                local = %*current,
                server = ?server,
                "server reports trip over, resetting local state"
            );
            *current = TripState::Idle;
            self.persist(TripState::Idle);
        }
        *current
    }

    /// Startup/resume validation.
    ///
    /// A non-idle local state must be confirmed against the server using the
    /// persisted trip id. A missing or malformed id forces `Idle` without a
    /// network call; otherwise the server's answer is reconciled in, with a
    /// 404 treated as "unknown trip".
    pub async fn validate_on_start<A: RideApi>(&self, api: &A) -> Result<TripState, ApiError> {
        if self.state() == TripState::Idle {
            return Ok(TripState::Idle);
        }

        let trip_id = match self.stored_trip_id() {
            Some(id) if id.is_well_formed() => id,
            _ => {
                warn!("resumed non-idle state without a usable trip id, resetting");
                return Ok(self.force_idle());
            }
        };

        match api.search_status(&trip_id).await {
            Ok(status) => {
                info!(trip = %trip_id, server = ?status.trip_status, "validated resumed trip");
                Ok(self.reconcile_with_server(status.trip_status))
            }
            Err(ApiError::Api { status: 404, .. }) => {
                Ok(self.reconcile_with_server(ServerTripStatus::Unknown))
            }
            Err(e) => Err(e),
        }
    }

    fn force_idle(&self) -> TripState {
        let mut current = self.current.lock().unwrap();
        *current = TripState::Idle;
        self.persist(TripState::Idle);
        TripState::Idle
    }

    /// Write the status slot, clearing all trip slots when idle.
    fn persist(&self, state: TripState) {
        if state == TripState::Idle {
            self.storage.delete(keys::TRIP_STATUS);
            self.storage.delete(keys::TRIP_REQUEST);
            self.storage.delete(keys::DRIVER_INFO);
        } else {
            self.storage.set(keys::TRIP_STATUS, state.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockRideApi, driver_record, terminal_status};
    use crate::domain::{GeoPoint, LatLng, LocationSource, PaymentMethod, VehicleClass};
    use crate::trip::storage::MemoryStore;

    fn request() -> TripRequest {
        TripRequest::new(
            GeoPoint::new(LatLng::new(18.4861, -69.9312), "origin", LocationSource::Gps),
            GeoPoint::new(
                LatLng::new(18.4734, -69.8849),
                "destination",
                LocationSource::Manual,
            ),
            VehicleClass::Economy,
            PaymentMethod::Cash,
            200.0,
        )
    }

    fn candidate() -> DriverCandidate {
        driver_record("d-1", "Luis", 18.49, -69.93).into_candidate()
    }

    fn store() -> (Arc<MemoryStore>, TripStateStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = TripStateStore::new(kv.clone() as Arc<dyn KeyValueStore>);
        (kv, store)
    }

    #[test]
    fn starts_idle_with_empty_storage() {
        let (_kv, store) = store();
        assert_eq!(store.state(), TripState::Idle);
    }

    #[test]
    fn resumes_persisted_state() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(keys::TRIP_STATUS, "driver_assigned".into());
        let store = TripStateStore::new(kv as Arc<dyn KeyValueStore>);
        assert_eq!(store.state(), TripState::DriverAssigned);
    }

    #[test]
    fn garbage_persisted_state_resumes_idle() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(keys::TRIP_STATUS, "definitely-not-a-state".into());
        let store = TripStateStore::new(kv as Arc<dyn KeyValueStore>);
        assert_eq!(store.state(), TripState::Idle);
    }

    #[test]
    fn begin_search_persists_request_and_status_jointly() {
        let (kv, store) = store();
        store.begin_search(&request()).unwrap();
        assert_eq!(store.state(), TripState::Searching);
        assert_eq!(kv.get(keys::TRIP_STATUS), Some("searching".into()));
        assert!(kv.get(keys::TRIP_REQUEST).is_some());
    }

    #[test]
    fn rejected_transition_changes_nothing() {
        let (kv, store) = store();
        let err = store.transition(TripEvent::StartRide).unwrap_err();
        assert_eq!(err.from, TripState::Idle);
        assert_eq!(store.state(), TripState::Idle);
        assert_eq!(kv.get(keys::TRIP_STATUS), None);
    }

    #[test]
    fn assign_driver_persists_driver_info() {
        let (kv, store) = store();
        store.begin_search(&request()).unwrap();
        store.assign_driver(&candidate()).unwrap();
        assert_eq!(store.state(), TripState::DriverAssigned);
        assert!(kv.get(keys::DRIVER_INFO).is_some());
    }

    #[test]
    fn returning_to_idle_clears_trip_slots() {
        let (kv, store) = store();
        store.begin_search(&request()).unwrap();
        store.assign_driver(&candidate()).unwrap();
        store.transition(TripEvent::Cancel).unwrap();
        store.transition(TripEvent::AckCancelled).unwrap();

        assert_eq!(store.state(), TripState::Idle);
        assert_eq!(kv.get(keys::TRIP_STATUS), None);
        assert_eq!(kv.get(keys::TRIP_REQUEST), None);
        assert_eq!(kv.get(keys::DRIVER_INFO), None);
    }

    #[test]
    fn last_known_location_survives_the_trip() {
        let (_kv, store) = store();
        store.begin_search(&request()).unwrap();
        store.transition(TripEvent::Cancel).unwrap();
        store.transition(TripEvent::AckCancelled).unwrap();

        let origin = store.last_known_location().unwrap();
        assert_eq!(origin.coords, LatLng::new(18.4861, -69.9312));
        assert_eq!(origin.source, LocationSource::Gps);
    }

    #[test]
    fn reconcile_forces_idle_on_server_terminal() {
        let (_kv, store) = store();
        store.begin_search(&request()).unwrap();
        let state = store.reconcile_with_server(ServerTripStatus::Completed);
        assert_eq!(state, TripState::Idle);
    }

    #[test]
    fn reconcile_keeps_local_state_when_server_active() {
        let (_kv, store) = store();
        store.begin_search(&request()).unwrap();
        let state = store.reconcile_with_server(ServerTripStatus::Searching);
        assert_eq!(state, TripState::Searching);
    }

    #[tokio::test]
    async fn validate_on_start_idle_makes_no_network_call() {
        let (_kv, store) = store();
        let mock = MockRideApi::new();
        assert_eq!(store.validate_on_start(&mock).await.unwrap(), TripState::Idle);
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn validate_on_start_missing_trip_id_forces_idle_offline() {
        let (_kv, store) = store();
        // Searching, but nothing persisted about the trip itself.
        store.transition(TripEvent::SubmitRequest).unwrap();

        let mock = MockRideApi::new();
        assert_eq!(store.validate_on_start(&mock).await.unwrap(), TripState::Idle);
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn validate_on_start_malformed_trip_id_forces_idle_offline() {
        let (_kv, store) = store();
        let mut req = request();
        req.accept(TripId("not a trip id".into()));
        store.begin_search(&req).unwrap();

        let mock = MockRideApi::new();
        assert_eq!(store.validate_on_start(&mock).await.unwrap(), TripState::Idle);
        assert_eq!(mock.status_calls(), 0);
    }

    #[tokio::test]
    async fn validate_on_start_server_completed_forces_idle() {
        let (_kv, store) = store();
        let mut req = request();
        req.accept(TripId("trip-9".into()));
        store.begin_search(&req).unwrap();

        let mock = MockRideApi::new();
        mock.push_status(terminal_status(ServerTripStatus::Completed));
        assert_eq!(store.validate_on_start(&mock).await.unwrap(), TripState::Idle);
        assert_eq!(mock.status_calls(), 1);
    }

    #[tokio::test]
    async fn validate_on_start_server_searching_keeps_local() {
        let (_kv, store) = store();
        let mut req = request();
        req.accept(TripId("trip-9".into()));
        store.begin_search(&req).unwrap();

        let mock = MockRideApi::new();
        assert_eq!(
            store.validate_on_start(&mock).await.unwrap(),
            TripState::Searching
        );
    }
}
