//! Search configuration for the driver matcher and its companion loops.

use std::time::Duration;

use rand::Rng;

/// Default expanding radius ladder, in kilometres.
const DEFAULT_RADIUS_LADDER_KM: [f64; 5] = [3.0, 5.0, 8.0, 12.0, 20.0];

/// Configuration parameters for a driver search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Radii tried in order, one lookup round each. The ladder length is
    /// the attempt cap.
    pub radius_ladder_km: Vec<f64>,

    /// Pause between lookup rounds.
    pub attempt_delay: Duration,

    /// Minimum caller-visible search duration, drawn uniformly from
    /// `[dwell_min, dwell_max]` per search. Pure pacing for the UI layer;
    /// set both to zero for immediate results.
    pub dwell_min: Duration,
    pub dwell_max: Duration,

    /// Interval of the status polling loop.
    pub poll_interval: Duration,

    /// Wall-clock bound on the polling loop. Fires even if the radius
    /// ladder would keep going, so the tighter bound wins.
    pub poll_timeout: Duration,
}

impl SearchConfig {
    /// Set the radius ladder.
    pub fn with_radius_ladder(mut self, ladder: Vec<f64>) -> Self {
        self.radius_ladder_km = ladder;
        self
    }

    /// Set the inter-attempt delay.
    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    /// Set the dwell window.
    pub fn with_dwell(mut self, min: Duration, max: Duration) -> Self {
        self.dwell_min = min;
        self.dwell_max = max.max(min);
        self
    }

    /// Disable dwell pacing entirely.
    pub fn without_dwell(self) -> Self {
        self.with_dwell(Duration::ZERO, Duration::ZERO)
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the polling wall-clock timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Number of lookup attempts the ladder allows.
    pub fn max_attempts(&self) -> u32 {
        self.radius_ladder_km.len() as u32
    }

    /// The widest radius the ladder will reach.
    pub fn max_radius_km(&self) -> f64 {
        self.radius_ladder_km.last().copied().unwrap_or(0.0)
    }

    /// Draw this search's minimum visible duration from the dwell window.
    pub fn draw_dwell(&self) -> Duration {
        if self.dwell_max.is_zero() {
            return Duration::ZERO;
        }
        let min = self.dwell_min.as_millis() as u64;
        let max = self.dwell_max.as_millis() as u64;
        let ms = if min >= max {
            max
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::from_millis(ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_ladder_km: DEFAULT_RADIUS_LADDER_KM.to_vec(),
            attempt_delay: Duration::from_secs(2),
            dwell_min: Duration::from_secs(30),
            dwell_max: Duration::from_secs(40),
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.radius_ladder_km, vec![3.0, 5.0, 8.0, 12.0, 20.0]);
        assert_eq!(config.attempt_delay, Duration::from_secs(2));
        assert_eq!(config.dwell_min, Duration::from_secs(30));
        assert_eq!(config.dwell_max, Duration::from_secs(40));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.poll_timeout, Duration::from_secs(120));
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.max_radius_km(), 20.0);
    }

    #[test]
    fn dwell_draw_stays_in_window() {
        let config = SearchConfig::default();
        for _ in 0..50 {
            let dwell = config.draw_dwell();
            assert!(dwell >= Duration::from_secs(30));
            assert!(dwell <= Duration::from_secs(40));
        }
    }

    #[test]
    fn zero_dwell_draws_zero() {
        let config = SearchConfig::default().without_dwell();
        assert_eq!(config.draw_dwell(), Duration::ZERO);
    }

    #[test]
    fn dwell_max_never_below_min() {
        let config =
            SearchConfig::default().with_dwell(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(config.dwell_max, Duration::from_secs(10));
    }
}
