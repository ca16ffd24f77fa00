//! Wire types for the ride backend REST API.
//!
//! The backend speaks camelCase JSON. These structs mirror the wire shapes
//! exactly and are converted into domain types at the client boundary; the
//! push payload (delivered out of band by the notification transport) is
//! normalized through the same [`DriverRecord`]-to-candidate path so both
//! assignment channels produce identical [`DriverCandidate`] values.

use serde::{Deserialize, Serialize};

use crate::domain::{
    DriverCandidate, DriverId, GeoPoint, LatLng, TripId, TripRequest, VehicleDescriptor,
};

/// A lat/lng/address triple as the backend sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

impl From<&GeoPoint> for WireLocation {
    fn from(p: &GeoPoint) -> Self {
        Self {
            lat: p.coords.lat,
            lng: p.coords.lng,
            address: p.address.clone(),
        }
    }
}

/// Body for `POST /trips`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripBody {
    pub rider_id: String,
    pub origin: WireLocation,
    pub destination: WireLocation,
    pub vehicle_type: String,
    pub payment_method: String,
    pub estimated_price: f64,
}

impl CreateTripBody {
    pub fn from_request(rider_id: &str, request: &TripRequest) -> Self {
        let vehicle_type = match request.vehicle_class {
            crate::domain::VehicleClass::Economy => "economy",
            crate::domain::VehicleClass::Comfort => "comfort",
            crate::domain::VehicleClass::Xl => "xl",
        };
        let payment_method = match request.payment_method {
            crate::domain::PaymentMethod::Cash => "cash",
            crate::domain::PaymentMethod::Card => "card",
        };
        Self {
            rider_id: rider_id.to_string(),
            origin: WireLocation::from(&request.rider),
            destination: WireLocation::from(&request.destination),
            vehicle_type: vehicle_type.to_string(),
            payment_method: payment_method.to_string(),
            estimated_price: request.quoted_price,
        }
    }
}

/// Response to `POST /trips`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripResponse {
    pub success: bool,
    pub trip_id: Option<TripId>,
    /// Some deployments assign a driver synchronously at acceptance.
    #[serde(default)]
    pub driver: Option<DriverRecord>,
}

/// `tripStatus` values reported by the search-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerTripStatus {
    Searching,
    Assigned,
    Cancelled,
    Completed,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerTripStatus {
    /// Statuses after which the trip can never become active again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ServerTripStatus::Cancelled | ServerTripStatus::Completed | ServerTripStatus::Unknown
        )
    }
}

/// Response to `GET /trips/{id}/search-status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatusResponse {
    pub active: bool,
    pub trip_status: ServerTripStatus,
    #[serde(default)]
    pub current_round: Option<u32>,
    #[serde(default)]
    pub current_radius: Option<f64>,
    #[serde(default)]
    pub driver_assigned: bool,
    #[serde(default)]
    pub driver: Option<DriverRecord>,
}

/// Driver availability as reported by the lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireDriverStatus {
    Available,
    Busy,
    Offline,
    #[serde(other)]
    Unknown,
}

/// Vehicle descriptor as the backend sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireVehicle {
    pub model: String,
    pub plate: String,
}

/// A driver as returned by the lookup and status endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub location: WireLatLng,
    pub rating: f64,
    #[serde(default)]
    pub trips: u32,
    pub vehicle: WireVehicle,
    #[serde(default)]
    pub status: Option<WireDriverStatus>,
}

/// Bare coordinate pair on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireLatLng {
    pub lat: f64,
    pub lng: f64,
}

impl DriverRecord {
    /// Whether this driver can currently take a trip. Records without a
    /// status field are assumed available (older backend versions omit it).
    pub fn is_available(&self) -> bool {
        matches!(self.status, None | Some(WireDriverStatus::Available))
    }

    pub fn into_candidate(self) -> DriverCandidate {
        DriverCandidate {
            id: DriverId(self.id),
            name: self.name,
            phone: self.phone,
            location: LatLng::new(self.location.lat, self.location.lng),
            rating: self.rating,
            trip_count: self.trips,
            vehicle: VehicleDescriptor {
                make_model: self.vehicle.model,
                plate: self.vehicle.plate,
            },
        }
    }
}

/// Response to `GET /drivers/available`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableDriversResponse {
    pub success: bool,
    pub drivers: Vec<DriverRecord>,
}

/// Body for `PUT /trips/{id}/cancel`.
#[derive(Debug, Clone, Serialize)]
pub struct CancelTripBody {
    pub reason: String,
}

/// Response to `PUT /trips/{id}/cancel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTripResponse {
    pub success: bool,
    #[serde(default)]
    pub penalty_applied: bool,
    #[serde(default)]
    pub penalty_amount: Option<f64>,
}

/// Body for the token refresh call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: String,
}

/// Response to the token refresh call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// The out-of-band push notification payload announcing an assignment.
///
/// Flat key/value shape dictated by the push transport; normalized into a
/// [`DriverCandidate`] before it reaches the reconciler.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAssignmentPayload {
    pub driver_id: String,
    pub driver_name: String,
    #[serde(default)]
    pub driver_phone: Option<String>,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub driver_rating: f64,
    pub driver_lat: f64,
    pub driver_lng: f64,
    pub trip_id: TripId,
}

impl PushAssignmentPayload {
    pub fn into_candidate(self) -> DriverCandidate {
        DriverCandidate {
            id: DriverId(self.driver_id),
            name: self.driver_name,
            phone: self.driver_phone,
            location: LatLng::new(self.driver_lat, self.driver_lng),
            rating: self.driver_rating,
            trip_count: 0,
            vehicle: VehicleDescriptor {
                make_model: self.vehicle_model,
                plate: self.vehicle_plate,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_record_parses_minimal_shape() {
        let json = r#"{
            "id": "d-7",
            "location": {"lat": 18.49, "lng": -69.93},
            "rating": 4.9,
            "vehicle": {"model": "Kia Rio", "plate": "A-555123"}
        }"#;
        let record: DriverRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_available());
        assert_eq!(record.trips, 0);

        let candidate = record.into_candidate();
        assert_eq!(candidate.id.0, "d-7");
        assert_eq!(candidate.vehicle.plate, "A-555123");
    }

    #[test]
    fn busy_driver_is_not_available() {
        let json = r#"{
            "id": "d-7",
            "location": {"lat": 18.49, "lng": -69.93},
            "rating": 4.9,
            "vehicle": {"model": "Kia Rio", "plate": "A-555123"},
            "status": "busy"
        }"#;
        let record: DriverRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_available());
    }

    #[test]
    fn unknown_trip_status_maps_to_unknown() {
        let json = r#"{
            "active": false,
            "tripStatus": "archived",
            "driverAssigned": false
        }"#;
        let status: SearchStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(status.trip_status, ServerTripStatus::Unknown);
        assert!(status.trip_status.is_terminal());
    }

    #[test]
    fn push_payload_normalizes_to_candidate() {
        let json = r#"{
            "driverId": "d-9",
            "driverName": "Maria",
            "driverPhone": "+1-809-555-0101",
            "vehicleModel": "Toyota Corolla",
            "vehiclePlate": "A-998877",
            "driverRating": 4.7,
            "driverLat": 18.5,
            "driverLng": -69.9,
            "tripId": "trip-31"
        }"#;
        let payload: PushAssignmentPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.trip_id, TripId("trip-31".into()));

        let candidate = payload.into_candidate();
        assert_eq!(candidate.name, "Maria");
        assert_eq!(candidate.location.lat, 18.5);
        assert_eq!(candidate.vehicle.make_model, "Toyota Corolla");
    }

    #[test]
    fn search_status_with_driver() {
        let json = r#"{
            "active": true,
            "tripStatus": "assigned",
            "currentRound": 2,
            "currentRadius": 5.0,
            "driverAssigned": true,
            "driver": {
                "id": "d-3",
                "name": "Jose",
                "location": {"lat": 18.47, "lng": -69.91},
                "rating": 4.6,
                "trips": 310,
                "vehicle": {"model": "Hyundai Accent", "plate": "A-443322"}
            }
        }"#;
        let status: SearchStatusResponse = serde_json::from_str(json).unwrap();
        assert!(status.driver_assigned);
        assert_eq!(status.trip_status, ServerTripStatus::Assigned);
        assert_eq!(status.driver.unwrap().name, "Jose");
    }
}
