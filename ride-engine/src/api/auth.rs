//! Auth token storage and the single-flight refresh guard.
//!
//! Tokens are owned and mutated here exclusively. The refresh flow is
//! single-flight: one caller holds the refresh gate while every other
//! request that hits a 401 in the meantime waits on the same gate and then
//! observes the already-bumped generation instead of refreshing again.

use std::future::Future;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::trip::storage::{KeyValueStore, keys};

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Shared token state. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn KeyValueStore>,
    tokens: RwLock<Option<TokenPair>>,
    /// Held for the duration of a refresh call. See [`TokenStore::refresh_gate`].
    refresh_gate: Mutex<()>,
    /// Bumped on every install or clear, so a waiter can tell whether the
    /// refresh it queued behind already replaced the token it saw fail.
    generation: AtomicU64,
}

impl TokenStore {
    /// Load whatever token pair the key-value store holds.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let tokens = match (storage.get(keys::AUTH_TOKEN), storage.get(keys::REFRESH_TOKEN)) {
            (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        };
        Self {
            inner: Arc::new(Inner {
                storage,
                tokens: RwLock::new(tokens),
                refresh_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .tokens
            .read()
            .unwrap()
            .as_ref()
            .map(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .tokens
            .read()
            .unwrap()
            .as_ref()
            .map(|t| t.refresh.clone())
    }

    /// Current token generation. Compare before and after waiting on the
    /// refresh gate to detect a refresh that someone else completed.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Refresh the token pair through `refresh_call`, single-flight.
    ///
    /// `observed` is the generation the caller saw when its request was
    /// rejected. Whoever acquires the gate first performs the refresh;
    /// everyone queued behind it finds the generation already bumped and
    /// returns without a second call. A rejected refresh token clears all
    /// tokens and reports [`ApiError::AuthExpired`].
    pub async fn refresh_with<F, Fut>(&self, observed: u64, refresh_call: F) -> Result<(), ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenPair, ApiError>>,
    {
        let _gate = self.inner.refresh_gate.lock().await;
        if self.generation() != observed {
            debug!("token already refreshed by a concurrent request");
            return Ok(());
        }

        let refresh = self.refresh_token().ok_or(ApiError::AuthExpired)?;
        match refresh_call(refresh).await {
            Ok(pair) => {
                self.install(pair);
                info!("auth token refreshed");
                Ok(())
            }
            Err(ApiError::AuthExpired)
            | Err(ApiError::Api {
                status: 401 | 403, ..
            }) => {
                warn!("refresh token rejected, clearing tokens");
                self.clear();
                Err(ApiError::AuthExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Install a new token pair and persist it.
    pub fn install(&self, pair: TokenPair) {
        self.inner
            .storage
            .set(keys::AUTH_TOKEN, pair.access.clone());
        self.inner
            .storage
            .set(keys::REFRESH_TOKEN, pair.refresh.clone());
        *self.inner.tokens.write().unwrap() = Some(pair);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop all tokens, in memory and persisted. Used when auth is
    /// irrecoverably broken.
    pub fn clear(&self) {
        self.inner.storage.delete(keys::AUTH_TOKEN);
        self.inner.storage.delete(keys::REFRESH_TOKEN);
        *self.inner.tokens.write().unwrap() = None;
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }
}
