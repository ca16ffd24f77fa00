//! Expanding-radius driver search.
//!
//! The matcher answers "who is the nearest available driver?" by widening a
//! fixed radius ladder one rung at a time. It never decides trip state on
//! its own; its winner is handed to the session's reconciler like any other
//! assignment signal.

mod config;
mod search;

pub use config::SearchConfig;
pub use search::{DriverMatcher, SearchOutcome, SearchProgress};
