//! Domain types for the ride matching engine.
//!
//! These are the validated core types the rest of the crate works in terms
//! of. Wire-format shapes live in [`crate::api::types`] and are converted
//! into these at the API boundary.

mod driver;
mod location;
mod trip;

pub use driver::{DriverCandidate, DriverId, VehicleDescriptor};
pub use location::{GeoPoint, LatLng, LocationSource};
pub use trip::{PaymentMethod, RequestId, TripId, TripRequest, VehicleClass};
