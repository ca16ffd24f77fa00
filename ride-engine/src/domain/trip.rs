//! Trip request types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::GeoPoint;

/// Server-assigned trip identifier, attached once the server accepts a
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub String);

impl TripId {
    /// A stored trip id is usable only if it is non-empty and contains no
    /// whitespace. Anything else is treated as corrupt local state.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated request identifier, minted when the rider submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Vehicle class requested by the rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Economy,
    Comfort,
    Xl,
}

/// How the rider intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
}

/// A rider's submitted trip request.
///
/// Immutable once submitted, with one exception: the server-assigned
/// [`TripId`] is attached on acceptance via [`TripRequest::accept`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub request_id: RequestId,
    pub rider: GeoPoint,
    pub destination: GeoPoint,
    pub vehicle_class: VehicleClass,
    pub payment_method: PaymentMethod,
    /// Quoted price for the trip. Produced by the external fare calculator
    /// and carried here as an opaque amount.
    pub quoted_price: f64,
    pub created_at: DateTime<Utc>,
    pub trip_id: Option<TripId>,
}

impl TripRequest {
    pub fn new(
        rider: GeoPoint,
        destination: GeoPoint,
        vehicle_class: VehicleClass,
        payment_method: PaymentMethod,
        quoted_price: f64,
    ) -> Self {
        Self {
            request_id: RequestId::generate(),
            rider,
            destination,
            vehicle_class,
            payment_method,
            quoted_price,
            created_at: Utc::now(),
            trip_id: None,
        }
    }

    /// Attach the server-assigned trip id on acceptance.
    pub fn accept(&mut self, trip_id: TripId) {
        self.trip_id = Some(trip_id);
    }
}
