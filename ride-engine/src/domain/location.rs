//! Geographic coordinate types and distance math.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres, used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in kilometres (haversine).
    pub fn haversine_km(&self, other: &LatLng) -> f64 {
        let (lat1, lon1) = (self.lat.to_radians(), self.lng.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lng.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let sin_dlat = (dlat * 0.5).sin();
        let sin_dlon = (dlon * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Where a location value came from.
///
/// A closed set rather than a free-form string, so that every consumer
/// handles all provenances exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Device GPS fix.
    Gps,
    /// Last known position used because no fresh fix was available.
    Fallback,
    /// Typed or pin-dropped by the user.
    Manual,
    /// Picked from the curated popular-places list.
    Popular,
    /// Supplied by an external geocoding provider.
    ThirdParty,
}

/// A coordinate pair paired with its human-readable address and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub coords: LatLng,
    pub address: String,
    pub source: LocationSource,
}

impl GeoPoint {
    pub fn new(coords: LatLng, address: impl Into<String>, source: LocationSource) -> Self {
        Self {
            coords,
            address: address.into(),
            source,
        }
    }
}
