//! Runtime settings for the data-access layer.
//!
//! Read once at start; nothing here is re-read mid-process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;
use crate::registry::{
    BackoffPolicy, CircuitBreakerConfig, RateLimitConfig, RateLimiterConfig,
};

pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Seconds after which the per-ticker stagger wraps around.
pub const STAGGER_WINDOW_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Primary provider name or alias.
    pub data_source: String,
    /// Fallback provider names tried after the primary. Empty means every
    /// registered provider in registration order.
    pub fallback_order: Vec<String>,
    pub fallback_enabled: bool,
    /// Log a line per provider attempt when no other sink is supplied.
    pub performance_logging: bool,
    /// Treat an empty prices/metrics/line-items/market-cap result as a failure
    /// and move on to the next source.
    pub treat_empty_as_failure: bool,
    pub max_retries: u32,
    pub batch_concurrency: usize,
    pub stagger_tickers: bool,
    /// Request rate applied to every provider. `None` keeps each provider's
    /// declared limit.
    pub requests_per_minute: Option<u32>,
    /// Bucket capacity applied to every provider, like `requests_per_minute`.
    pub burst_capacity: Option<u32>,
    pub error_threshold: u32,
    #[serde(with = "duration_secs")]
    pub open_duration: Duration,
    #[serde(with = "duration_secs")]
    pub backoff_base: Duration,
    #[serde(with = "duration_secs")]
    pub backoff_max: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let limiter = RateLimiterConfig::default();
        Self {
            data_source: ProviderKind::Yahoo.as_str().to_string(),
            fallback_order: Vec::new(),
            fallback_enabled: true,
            performance_logging: true,
            treat_empty_as_failure: true,
            max_retries: crate::adapter::DEFAULT_MAX_RETRIES,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            stagger_tickers: true,
            requests_per_minute: None,
            burst_capacity: None,
            error_threshold: limiter.circuit.error_threshold,
            open_duration: limiter.circuit.open_duration,
            backoff_base: limiter.backoff.base_delay,
            backoff_max: limiter.backoff.max_delay,
        }
    }
}

impl Settings {
    /// An explicit rate or capacity pins both onto every endpoint; the one
    /// left unset takes the limiter default.
    pub fn limiter_config(&self) -> RateLimiterConfig {
        let defaults = RateLimitConfig::default();
        RateLimiterConfig {
            rate: RateLimitConfig {
                requests_per_minute: self
                    .requests_per_minute
                    .unwrap_or(defaults.requests_per_minute),
                burst_capacity: self
                    .burst_capacity
                    .map(f64::from)
                    .unwrap_or(defaults.burst_capacity),
            },
            pin_rate: self.requests_per_minute.is_some() || self.burst_capacity.is_some(),
            circuit: CircuitBreakerConfig {
                error_threshold: self.error_threshold,
                open_duration: self.open_duration,
            },
            backoff: BackoffPolicy {
                base_delay: self.backoff_base,
                max_delay: self.backoff_max,
            },
        }
    }
}

/// Provider API keys. Blank keys count as missing.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub financial_datasets_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("ProviderCredentials")
            .field("financial_datasets_api_key", &mask(&self.financial_datasets_api_key))
            .field("polygon_api_key", &mask(&self.polygon_api_key))
            .field("finnhub_api_key", &mask(&self.finnhub_api_key))
            .finish()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
