//! Trip lifecycle: state machine, persistence, and server reconciliation.

pub mod state;
pub mod storage;
mod store;

pub use state::{IllegalTransition, TripEvent, TripState, apply};
pub use storage::{KeyValueStore, MemoryStore};
pub use store::TripStateStore;
