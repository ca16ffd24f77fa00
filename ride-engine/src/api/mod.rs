//! HTTP client for the ride backend.
//!
//! [`client::ApiClient`] is the real thing; [`mock::MockRideApi`] serves
//! scripted responses for tests. Both implement [`RideApi`], the seam every
//! higher layer (matcher, poll loop, store validation, session) consumes.

mod auth;
mod client;
mod error;
pub mod mock;
pub mod types;

use std::future::Future;

pub use auth::{TokenPair, TokenStore};
pub use client::{AlwaysOnline, ApiClient, ApiConfig, Auth, ConnectivityProbe};
pub use error::ApiError;

use crate::domain::{LatLng, TripId, TripRequest};
use types::{CancelTripResponse, CreateTripResponse, DriverRecord, SearchStatusResponse};

/// The backend operations the engine depends on.
///
/// Declared with explicit `Send` futures so generic consumers can run these
/// calls inside spawned tasks.
pub trait RideApi: Send + Sync {
    /// Submit a trip request.
    fn create_trip(
        &self,
        rider_id: &str,
        request: &TripRequest,
    ) -> impl Future<Output = Result<CreateTripResponse, ApiError>> + Send;

    /// Read the current search status of a trip.
    fn search_status(
        &self,
        trip: &TripId,
    ) -> impl Future<Output = Result<SearchStatusResponse, ApiError>> + Send;

    /// List available drivers around a point.
    fn available_drivers(
        &self,
        around: LatLng,
        radius_km: f64,
    ) -> impl Future<Output = Result<Vec<DriverRecord>, ApiError>> + Send;

    /// Cancel a trip.
    fn cancel_trip(
        &self,
        trip: &TripId,
        reason: &str,
    ) -> impl Future<Output = Result<CancelTripResponse, ApiError>> + Send;
}

impl RideApi for ApiClient {
    async fn create_trip(
        &self,
        rider_id: &str,
        request: &TripRequest,
    ) -> Result<CreateTripResponse, ApiError> {
        ApiClient::create_trip(self, rider_id, request).await
    }

    async fn search_status(&self, trip: &TripId) -> Result<SearchStatusResponse, ApiError> {
        ApiClient::search_status(self, trip).await
    }

    async fn available_drivers(
        &self,
        around: LatLng,
        radius_km: f64,
    ) -> Result<Vec<DriverRecord>, ApiError> {
        ApiClient::available_drivers(self, around, radius_km).await
    }

    async fn cancel_trip(&self, trip: &TripId, reason: &str) -> Result<CancelTripResponse, ApiError> {
        ApiClient::cancel_trip(self, trip, reason).await
    }
}
