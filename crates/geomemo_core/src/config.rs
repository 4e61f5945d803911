//! Monitoring configuration with environment overrides.

use crate::port::location::FixRequest;
use std::time::Duration;

/// Proximity radius used for every fix.
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;
pub const DEFAULT_FIX_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_FIX_MIN_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_FIX_MIN_DISPLACEMENT_METERS: f64 = 10.0;
/// Longest description excerpt shown in a memo notification.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 140;

/// Tunables for the monitoring process.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub radius_meters: f64,
    pub fix_interval: Duration,
    pub fix_min_interval: Duration,
    pub fix_min_displacement_meters: f64,
    pub snippet_max_chars: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
            fix_interval: Duration::from_millis(DEFAULT_FIX_INTERVAL_MS),
            fix_min_interval: Duration::from_millis(DEFAULT_FIX_MIN_INTERVAL_MS),
            fix_min_displacement_meters: DEFAULT_FIX_MIN_DISPLACEMENT_METERS,
            snippet_max_chars: DEFAULT_SNIPPET_MAX_CHARS,
        }
    }
}

impl MonitorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GEOMEMO_RADIUS_METERS` | `200` |
    /// | `GEOMEMO_FIX_INTERVAL_MS` | `10000` |
    /// | `GEOMEMO_FIX_MIN_INTERVAL_MS` | `5000` |
    /// | `GEOMEMO_FIX_MIN_DISPLACEMENT_METERS` | `10` |
    /// | `GEOMEMO_SNIPPET_MAX_CHARS` | `140` |
    ///
    /// Missing, unparseable, or non-positive values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive_f64 = |key: &str, default: f64| {
            lookup(key)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite() && *value > 0.0)
                .unwrap_or(default)
        };
        let positive_u64 = |key: &str, default: u64| {
            lookup(key)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };

        Self {
            radius_meters: positive_f64("GEOMEMO_RADIUS_METERS", defaults.radius_meters),
            fix_interval: Duration::from_millis(positive_u64(
                "GEOMEMO_FIX_INTERVAL_MS",
                DEFAULT_FIX_INTERVAL_MS,
            )),
            fix_min_interval: Duration::from_millis(positive_u64(
                "GEOMEMO_FIX_MIN_INTERVAL_MS",
                DEFAULT_FIX_MIN_INTERVAL_MS,
            )),
            fix_min_displacement_meters: positive_f64(
                "GEOMEMO_FIX_MIN_DISPLACEMENT_METERS",
                defaults.fix_min_displacement_meters,
            ),
            snippet_max_chars: positive_u64(
                "GEOMEMO_SNIPPET_MAX_CHARS",
                defaults.snippet_max_chars as u64,
            ) as usize,
        }
    }

    pub fn with_radius_meters(mut self, radius_meters: f64) -> Self {
        self.radius_meters = radius_meters;
        self
    }

    pub fn with_fix_interval(mut self, interval: Duration) -> Self {
        self.fix_interval = interval;
        self
    }

    pub fn with_fix_min_interval(mut self, min_interval: Duration) -> Self {
        self.fix_min_interval = min_interval;
        self
    }

    pub fn with_fix_min_displacement_meters(mut self, meters: f64) -> Self {
        self.fix_min_displacement_meters = meters;
        self
    }

    /// Cadence handed to the fix source when monitoring starts.
    pub fn fix_request(&self) -> FixRequest {
        FixRequest {
            interval: self.fix_interval,
            min_interval: self.fix_min_interval,
            min_displacement_meters: self.fix_min_displacement_meters,
        }
    }
}
