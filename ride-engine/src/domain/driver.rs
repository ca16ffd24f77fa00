//! Driver candidate types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::location::LatLng;

/// Assumed average urban driving speed, used to derive pickup ETAs.
const ASSUMED_AVG_SPEED_KMH: f64 = 30.0;

/// Floor for any derived ETA. Nothing arrives in under two minutes.
const MIN_ETA_MINUTES: u32 = 2;

/// Server-assigned driver identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub String);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The vehicle a driver operates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDescriptor {
    /// Make and model, e.g. "Toyota Corolla".
    pub make_model: String,
    /// Licence plate.
    pub plate: String,
}

/// A driver offered as a potential match for a trip.
///
/// Distance to the rider and ETA are derived on demand from the stored
/// location, never cached on the struct, so they cannot go stale when the
/// same candidate is observed through different channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub id: DriverId,
    pub name: String,
    /// Present on push payloads; poll responses may omit it.
    pub phone: Option<String>,
    pub location: LatLng,
    pub rating: f64,
    pub trip_count: u32,
    pub vehicle: VehicleDescriptor,
}

impl DriverCandidate {
    /// Great-circle distance from this driver to the rider, in kilometres.
    pub fn distance_km(&self, rider: &LatLng) -> f64 {
        self.location.haversine_km(rider)
    }

    /// Estimated minutes until this driver reaches the rider.
    ///
    /// `distance / assumed speed`, rounded up, floored at two minutes.
    pub fn eta_minutes(&self, rider: &LatLng) -> u32 {
        let minutes = self.distance_km(rider) / ASSUMED_AVG_SPEED_KMH * 60.0;
        (minutes.ceil() as u32).max(MIN_ETA_MINUTES)
    }
}
