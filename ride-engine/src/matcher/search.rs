//! Incremental-radius driver search.
//!
//! Works outward through a fixed radius ladder, one lookup round per rung,
//! until a driver qualifies or the ladder is exhausted. Lookup failures are
//! treated as empty rounds so a flaky endpoint degrades the search instead
//! of killing it; the caller decides whether an exhausted search is worth a
//! manual retry.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::RideApi;
use crate::domain::{DriverCandidate, LatLng};

use super::config::SearchConfig;

/// Progress report issued before each lookup round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchProgress {
    /// 1-based round number.
    pub attempt: u32,
    /// Total rounds the ladder allows.
    pub total_attempts: u32,
    /// Radius for this round, in kilometres.
    pub radius_km: f64,
}

/// Terminal result of a driver search.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// A driver qualified; the nearest one wins.
    Found {
        candidate: DriverCandidate,
        radius_km: f64,
        attempts: u32,
    },
    /// The whole ladder came up empty.
    Exhausted { max_radius_km: f64, attempts: u32 },
    /// The session's cancellation token fired mid-search.
    Cancelled,
}

/// Expanding-radius driver matcher.
pub struct DriverMatcher<A: RideApi> {
    api: Arc<A>,
    config: SearchConfig,
}

impl<A: RideApi> DriverMatcher<A> {
    pub fn new(api: Arc<A>, config: SearchConfig) -> Self {
        Self { api, config }
    }

    /// Run the incremental search around `rider`.
    ///
    /// `on_progress` fires before every round with the attempt counter and
    /// the radius about to be searched. The cancellation token is honored
    /// at every suspension point: before each lookup, during the
    /// inter-attempt delay, and during the dwell padding.
    ///
    /// Both success and exhaustion are withheld until the dwell window
    /// drawn from the config has elapsed, so the caller-visible search
    /// never looks implausibly instantaneous.
    pub async fn search<F>(
        &self,
        rider: LatLng,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> SearchOutcome
    where
        F: FnMut(SearchProgress),
    {
        let started = Instant::now();
        let dwell = self.config.draw_dwell();
        let total_attempts = self.config.max_attempts();

        for (round, &radius_km) in self.config.radius_ladder_km.iter().enumerate() {
            let attempt = round as u32 + 1;
            on_progress(SearchProgress {
                attempt,
                total_attempts,
                radius_km,
            });

            if cancel.is_cancelled() {
                return SearchOutcome::Cancelled;
            }

            let lookup = tokio::select! {
                _ = cancel.cancelled() => return SearchOutcome::Cancelled,
                result = self.api.available_drivers(rider, radius_km) => result,
            };

            let mut qualifying: Vec<DriverCandidate> = match lookup {
                Ok(records) => records
                    .into_iter()
                    .map(|r| r.into_candidate())
                    .filter(|c| c.distance_km(&rider) <= radius_km)
                    .collect(),
                Err(e) => {
                    // Not fatal: this round just found nobody.
                    warn!(attempt, radius_km, error = %e, "driver lookup failed");
                    Vec::new()
                }
            };

            if !qualifying.is_empty() {
                qualifying.sort_by(|a, b| {
                    a.distance_km(&rider).total_cmp(&b.distance_km(&rider))
                });
                let candidate = qualifying.remove(0);
                debug!(
                    attempt,
                    radius_km,
                    driver = %candidate.id,
                    distance_km = candidate.distance_km(&rider),
                    "driver found"
                );
                if !self.wait_out_dwell(started, dwell, cancel).await {
                    return SearchOutcome::Cancelled;
                }
                return SearchOutcome::Found {
                    candidate,
                    radius_km,
                    attempts: attempt,
                };
            }

            if attempt < total_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return SearchOutcome::Cancelled,
                    _ = tokio::time::sleep(self.config.attempt_delay) => {}
                }
            }
        }

        if !self.wait_out_dwell(started, dwell, cancel).await {
            return SearchOutcome::Cancelled;
        }
        SearchOutcome::Exhausted {
            max_radius_km: self.config.max_radius_km(),
            attempts: total_attempts,
        }
    }

    /// Sleep whatever is left of the dwell window. Returns `false` if the
    /// token fired first.
    async fn wait_out_dwell(
        &self,
        started: Instant,
        dwell: std::time::Duration,
        cancel: &CancellationToken,
    ) -> bool {
        let elapsed = started.elapsed();
        if elapsed >= dwell {
            return true;
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(dwell - elapsed) => true,
        }
    }
}
