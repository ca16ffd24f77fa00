//! Key-value persistence seam.
//!
//! The host platform provides a durable key-value store; its on-disk
//! mechanics are out of scope here. This trait is the whole contract the
//! engine needs, and [`MemoryStore`] backs it for tests and ephemeral use.

use std::collections::HashMap;
use std::sync::Mutex;

/// Names for every persisted slot the engine writes.
pub mod keys {
    pub const TRIP_STATUS: &str = "tripStatus";
    pub const TRIP_REQUEST: &str = "tripRequest";
    pub const DRIVER_INFO: &str = "driverInfo";
    pub const USER_LOCATION: &str = "userLocation";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
}

/// A durable string-keyed store with independent slots.
///
/// Implementations must be safe to share across tasks; the engine calls
/// these from the polling loop, the matcher, and push handlers.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn delete(&self, key: &str);
}

/// In-memory store. Used by tests and as a stand-in when the platform
/// store is not wired up.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}
