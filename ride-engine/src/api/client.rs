//! Ride backend HTTP client.
//!
//! Layering, outermost first: a connectivity gate (fail fast when offline,
//! no retries consumed), an auth interceptor (single refresh-and-retry on
//! 401), and a retry policy (exponential backoff for transient failures).
//! The interceptor sits outside the retry loop so refresh triggering and
//! retry counting never share state.
//!
//! The client takes no cancellation token: callers race client futures
//! against their session token with `tokio::select!`, which aborts at any
//! await point, including mid-backoff.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::auth::{TokenPair, TokenStore};
use crate::api::error::ApiError;
use crate::api::types::{
    AvailableDriversResponse, CancelTripBody, CancelTripResponse, CreateTripBody,
    CreateTripResponse, DriverRecord, RefreshTokenBody, RefreshTokenResponse, SearchStatusResponse,
};
use crate::domain::{LatLng, TripId, TripRequest};

/// Default retry budget: one initial attempt plus this many retries.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff base; retry `n` waits `base * 2^(n-1)`.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Reports whether the device currently has connectivity.
///
/// The actual reachability detector is a platform collaborator; this trait
/// is its seam. The default [`AlwaysOnline`] probe never blocks a call.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probe that always reports connectivity.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Whether a call must carry a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    None,
    Required,
}

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the ride backend.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the initial attempt for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub backoff_base: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff base delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
///
/// With the default 1 s base this yields 1 s, 2 s, 4 s.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Authenticated HTTP client for the ride backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    probe: Arc<dyn ConnectivityProbe>,
    max_retries: u32,
    backoff_base: Duration,
}

impl ApiClient {
    /// Create a client with the given configuration and connectivity probe.
    pub fn new(
        config: ApiConfig,
        tokens: TokenStore,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            tokens,
            probe,
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
        })
    }

    /// Create a client that assumes connectivity is always present.
    pub fn new_always_online(config: ApiConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        Self::new(config, tokens, Arc::new(AlwaysOnline))
    }

    /// Submit a trip request.
    pub async fn create_trip(
        &self,
        rider_id: &str,
        request: &TripRequest,
    ) -> Result<CreateTripResponse, ApiError> {
        let body = serde_json::to_value(CreateTripBody::from_request(rider_id, request))
            .map_err(|e| ApiError::Json {
                message: e.to_string(),
            })?;
        self.request_json(Method::POST, "/trips", Some(body), Auth::Required)
            .await
    }

    /// Poll the search status of a trip.
    pub async fn search_status(&self, trip: &TripId) -> Result<SearchStatusResponse, ApiError> {
        let path = format!("/trips/{trip}/search-status");
        self.request_json(Method::GET, &path, None, Auth::Required)
            .await
    }

    /// List drivers available around a point, already filtered to those the
    /// backend marks available.
    pub async fn available_drivers(
        &self,
        around: LatLng,
        radius_km: f64,
    ) -> Result<Vec<DriverRecord>, ApiError> {
        let path = format!(
            "/drivers/available?lat={}&lng={}&radiusKm={}",
            around.lat, around.lng, radius_km
        );
        let response: AvailableDriversResponse = self
            .request_json(Method::GET, &path, None, Auth::Required)
            .await?;
        Ok(response
            .drivers
            .into_iter()
            .filter(DriverRecord::is_available)
            .collect())
    }

    /// Cancel a trip.
    pub async fn cancel_trip(
        &self,
        trip: &TripId,
        reason: &str,
    ) -> Result<CancelTripResponse, ApiError> {
        let path = format!("/trips/{trip}/cancel");
        let body = json!(CancelTripBody {
            reason: reason.to_string(),
        });
        self.request_json(Method::PUT, &path, Some(body), Auth::Required)
            .await
    }

    /// Issue a request and parse the JSON response.
    ///
    /// Connectivity gate, then retry-wrapped send; on 401 with required
    /// auth, one single-flight token refresh and one retry-wrapped re-send.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: Auth,
    ) -> Result<T, ApiError> {
        if !self.probe.is_online() {
            return Err(ApiError::NetworkUnavailable);
        }

        let observed = self.tokens.generation();
        let first = self.send_with_retry(&method, path, body.as_ref(), auth).await;

        let text = match first {
            Err(ApiError::Api { status: 401, .. }) if auth == Auth::Required => {
                self.refresh_once(observed).await?;
                match self.send_with_retry(&method, path, body.as_ref(), auth).await {
                    Err(ApiError::Api { status: 401, .. }) => {
                        warn!(path, "still unauthorized after token refresh, clearing tokens");
                        self.tokens.clear();
                        return Err(ApiError::AuthExpired);
                    }
                    other => other?,
                }
            }
            other => other?,
        };

        parse_json(&text)
    }

    /// Send one logical request, retrying transient failures with
    /// exponential backoff. Non-transient errors surface immediately; the
    /// last transient error surfaces once the budget is spent.
    async fn send_with_retry(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        auth: Auth,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.max_retries + 1;
        let mut last_message = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff_base, attempt);
                debug!(
                    path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    last = %last_message,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            let mut req = self.http.request(method.clone(), &url);
            if let Some(b) = body {
                req = req.json(b);
            }
            if auth == Auth::Required {
                // Re-read the token every attempt: a concurrent refresh may
                // have replaced it mid-backoff.
                if let Some(token) = self.tokens.access_token() {
                    req = req.bearer_auth(token);
                }
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        last_message = format!("HTTP {}", status.as_u16());
                        continue;
                    }
                    if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(ApiError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    return response.text().await.map_err(ApiError::Http);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_message = e.to_string();
                    continue;
                }
                Err(e) => return Err(ApiError::Http(e)),
            }
        }

        Err(ApiError::Transient {
            attempts,
            message: last_message,
        })
    }

    /// Single-flight token refresh, delegated to [`TokenStore::refresh_with`].
    ///
    /// `observed` is the token generation the caller saw when its request
    /// failed. If the generation moved while waiting for the gate, another
    /// caller already refreshed and this one just reuses the result.
    async fn refresh_once(&self, observed: u64) -> Result<(), ApiError> {
        self.tokens
            .refresh_with(observed, |refresh| async move {
                let body = json!(RefreshTokenBody {
                    refresh_token: refresh,
                });
                let text = self
                    .send_with_retry(&Method::POST, "/auth/refresh", Some(&body), Auth::None)
                    .await?;
                let response: RefreshTokenResponse = parse_json(&text)?;
                Ok(TokenPair {
                    access: response.access_token,
                    refresh: response.refresh_token,
                })
            })
            .await
    }
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Json {
        message: e.to_string(),
    })
}
