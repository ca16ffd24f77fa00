//! Ride matching and synchronization engine.
//!
//! The client-side core of a ride-hailing app: submit a trip request,
//! search for a driver over an expanding radius, keep the trip lifecycle
//! consistent with the server, and resolve the race between the push and
//! poll assignment channels so exactly one driver binds to each search.

pub mod api;
pub mod domain;
pub mod matcher;
pub mod session;
pub mod trip;
