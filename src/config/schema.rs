//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Durations are given in (fractional) seconds in the file and converted to
//! whole milliseconds when the breaker is built.

use serde::{Deserialize, Serialize};

use crate::resilience::{BreakerConfig, BreakerConfigError, BreakerParameters, FailureCategory};

/// Root configuration for one transfer connector.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TransferConfig {
    /// Connector identity.
    pub connector: ConnectorSettings,

    /// Circuit breaker settings.
    pub breaker: BreakerSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorSettings {
    /// Name used in logs, metrics and the open-circuit message.
    pub name: String,

    /// Remote server host.
    pub host: String,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            name: "ftp".to_string(),
            host: "localhost".to_string(),
        }
    }
}

/// Circuit breaker settings as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Guard the connector with a breaker at all.
    pub enabled: bool,

    /// Minimum requests in the window before the breaker may trip.
    pub request_volume_threshold: i64,

    /// Rolling window length in seconds.
    pub time_window_secs: f64,

    /// Bucket granularity in seconds; must divide the window evenly.
    pub bucket_size_secs: f64,

    /// Failure ratio that must be exceeded to trip (0.0 - 1.0).
    pub failure_threshold: f64,

    /// Seconds to stay open before admitting a trial request.
    pub reset_time_secs: f64,

    /// Error categories that count as failures.
    pub failure_categories: Vec<FailureCategory>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = BreakerParameters::default();
        Self {
            enabled: true,
            request_volume_threshold: defaults.request_volume_threshold,
            time_window_secs: defaults.time_window_millis as f64 / 1000.0,
            bucket_size_secs: defaults.bucket_size_millis as f64 / 1000.0,
            failure_threshold: defaults.failure_threshold,
            reset_time_secs: defaults.reset_time_millis as f64 / 1000.0,
            failure_categories: defaults.failure_categories,
        }
    }
}

impl BreakerSettings {
    /// Millisecond parameters, not yet validated.
    pub fn to_parameters(&self) -> BreakerParameters {
        BreakerParameters {
            request_volume_threshold: self.request_volume_threshold,
            time_window_millis: seconds_to_millis(self.time_window_secs),
            bucket_size_millis: seconds_to_millis(self.bucket_size_secs),
            failure_threshold: self.failure_threshold,
            reset_time_millis: seconds_to_millis(self.reset_time_secs),
            failure_categories: self.failure_categories.clone(),
        }
    }

    pub fn to_breaker_config(&self) -> Result<BreakerConfig, BreakerConfigError> {
        BreakerConfig::new(self.to_parameters())
    }
}

/// Round to the nearest millisecond; non-finite input maps to 0 so it fails
/// validation instead of wrapping.
pub fn seconds_to_millis(secs: f64) -> i64 {
    if !secs.is_finite() {
        return 0;
    }
    (secs * 1000.0).round() as i64
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9091".to_string(),
        }
    }
}
