//! Mock ride backend for testing without network access.
//!
//! Serves scripted responses through the same [`RideApi`] seam the real
//! client implements, records every call, and can inject failures at any
//! endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::api::error::ApiError;
use crate::api::types::{
    CancelTripResponse, CreateTripResponse, DriverRecord, SearchStatusResponse, ServerTripStatus,
    WireLatLng, WireVehicle,
};
use crate::api::RideApi;
use crate::domain::{LatLng, TripId, TripRequest};

/// Build a wire driver record for tests.
pub fn driver_record(id: &str, name: &str, lat: f64, lng: f64) -> DriverRecord {
    DriverRecord {
        id: id.to_string(),
        name: name.to_string(),
        phone: None,
        location: WireLatLng { lat, lng },
        rating: 4.8,
        trips: 420,
        vehicle: WireVehicle {
            model: "Toyota Corolla".to_string(),
            plate: format!("A-{id}"),
        },
        status: None,
    }
}

/// A still-searching status response for a trip.
pub fn searching_status() -> SearchStatusResponse {
    SearchStatusResponse {
        active: true,
        trip_status: ServerTripStatus::Searching,
        current_round: Some(1),
        current_radius: Some(3.0),
        driver_assigned: false,
        driver: None,
    }
}

/// An assigned status response carrying the given driver.
pub fn assigned_status(driver: DriverRecord) -> SearchStatusResponse {
    SearchStatusResponse {
        active: false,
        trip_status: ServerTripStatus::Assigned,
        current_round: None,
        current_radius: None,
        driver_assigned: true,
        driver: Some(driver),
    }
}

/// A terminal status response with no driver.
pub fn terminal_status(status: ServerTripStatus) -> SearchStatusResponse {
    SearchStatusResponse {
        active: false,
        trip_status: status,
        current_round: None,
        current_radius: None,
        driver_assigned: false,
        driver: None,
    }
}

#[derive(Default)]
struct State {
    trip_id: Option<TripId>,
    inline_driver: Option<DriverRecord>,
    create_fails: bool,
    create_delay: Option<std::time::Duration>,
    /// Per-lookup scripted driver sets; once drained, `drivers` serves.
    driver_rounds: VecDeque<Result<Vec<DriverRecord>, ()>>,
    drivers: Vec<DriverRecord>,
    /// Per-poll scripted statuses; once drained, the last one repeats.
    statuses: VecDeque<SearchStatusResponse>,
    last_status: Option<SearchStatusResponse>,
    cancel_calls: Vec<(TripId, String)>,
    create_calls: u32,
    lookup_calls: u32,
    status_calls: u32,
}

/// Scriptable in-memory ride backend.
#[derive(Default)]
pub struct MockRideApi {
    state: Mutex<State>,
}

impl MockRideApi {
    /// A mock that accepts trips as `trip-1`, has no drivers anywhere, and
    /// always reports `searching`.
    pub fn new() -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().trip_id = Some(TripId("trip-1".into()));
        mock
    }

    /// Set the trip id returned on acceptance.
    pub fn with_trip_id(self, id: &str) -> Self {
        self.state.lock().unwrap().trip_id = Some(TripId(id.to_string()));
        self
    }

    /// Attach a driver to the acceptance response itself.
    pub fn with_inline_driver(self, driver: DriverRecord) -> Self {
        self.state.lock().unwrap().inline_driver = Some(driver);
        self
    }

    /// Make `create_trip` fail with a non-retryable API error.
    pub fn with_failing_create(self) -> Self {
        self.state.lock().unwrap().create_fails = true;
        self
    }

    /// Hold each acceptance response for `delay` before answering.
    pub fn with_create_delay(self, delay: std::time::Duration) -> Self {
        self.state.lock().unwrap().create_delay = Some(delay);
        self
    }

    /// Fixed driver set served once scripted rounds are drained.
    pub fn with_drivers(self, drivers: Vec<DriverRecord>) -> Self {
        self.state.lock().unwrap().drivers = drivers;
        self
    }

    /// Script the next lookup round's driver set.
    pub fn push_driver_round(&self, drivers: Vec<DriverRecord>) {
        self.state
            .lock()
            .unwrap()
            .driver_rounds
            .push_back(Ok(drivers));
    }

    /// Script the next lookup round to fail with a transient error.
    pub fn push_failing_round(&self) {
        self.state.lock().unwrap().driver_rounds.push_back(Err(()));
    }

    /// Script the next polled status.
    pub fn push_status(&self, status: SearchStatusResponse) {
        self.state.lock().unwrap().statuses.push_back(status);
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().unwrap().create_calls
    }

    pub fn lookup_calls(&self) -> u32 {
        self.state.lock().unwrap().lookup_calls
    }

    pub fn status_calls(&self) -> u32 {
        self.state.lock().unwrap().status_calls
    }

    /// Cancellations received, as `(trip, reason)` pairs.
    pub fn cancel_calls(&self) -> Vec<(TripId, String)> {
        self.state.lock().unwrap().cancel_calls.clone()
    }
}

impl RideApi for MockRideApi {
    async fn create_trip(
        &self,
        _rider_id: &str,
        _request: &TripRequest,
    ) -> Result<CreateTripResponse, ApiError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            state.create_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.create_fails {
            return Err(ApiError::Api {
                status: 400,
                message: "trip rejected".into(),
            });
        }
        Ok(CreateTripResponse {
            success: true,
            trip_id: state.trip_id.clone(),
            driver: state.inline_driver.clone(),
        })
    }

    async fn search_status(&self, _trip: &TripId) -> Result<SearchStatusResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        if let Some(status) = state.statuses.pop_front() {
            state.last_status = Some(status.clone());
            return Ok(status);
        }
        Ok(state.last_status.clone().unwrap_or_else(searching_status))
    }

    async fn available_drivers(
        &self,
        _around: LatLng,
        _radius_km: f64,
    ) -> Result<Vec<DriverRecord>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.lookup_calls += 1;
        match state.driver_rounds.pop_front() {
            Some(Ok(drivers)) => Ok(drivers),
            Some(Err(())) => Err(ApiError::Transient {
                attempts: 4,
                message: "lookup endpoint unavailable".into(),
            }),
            None => Ok(state.drivers.clone()),
        }
    }

    async fn cancel_trip(
        &self,
        trip: &TripId,
        reason: &str,
    ) -> Result<CancelTripResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls.push((trip.clone(), reason.to_string()));
        Ok(CancelTripResponse {
            success: true,
            penalty_applied: false,
            penalty_amount: None,
        })
    }
}
