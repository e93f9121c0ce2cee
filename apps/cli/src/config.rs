use std::time::Duration;

use finsource_market_data::{ProviderCredentials, Settings};
use log::warn;

pub const DEFAULT_DB_PATH: &str = "./data/finsource-cache.db";

/// Keeps the cache in process memory instead of SQLite.
pub const IN_MEMORY_DB: &str = ":memory:";

pub struct Config {
    pub settings: Settings,
    pub credentials: ProviderCredentials,
    pub db_path: String,
}

impl Config {
    /// Reads the process environment. `.env` must already be loaded.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Settings::default();
        if let Some(source) = var("FINSOURCE_DATA_SOURCE") {
            settings.data_source = source;
        }
        if let Some(order) = var("FINSOURCE_FALLBACK_ORDER") {
            settings.fallback_order = order
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(enabled) = var("FINSOURCE_FALLBACK_ENABLED") {
            settings.fallback_enabled = parse_bool("FINSOURCE_FALLBACK_ENABLED", &enabled)
                .unwrap_or(settings.fallback_enabled);
        }
        if let Some(enabled) = var("FINSOURCE_PERFORMANCE_LOGGING") {
            settings.performance_logging = parse_bool("FINSOURCE_PERFORMANCE_LOGGING", &enabled)
                .unwrap_or(settings.performance_logging);
        }
        if let Some(threshold) = var("FINSOURCE_ERROR_THRESHOLD") {
            settings.error_threshold =
                parse_number("FINSOURCE_ERROR_THRESHOLD", &threshold).unwrap_or(settings.error_threshold);
        }
        if let Some(secs) = var("FINSOURCE_OPEN_DURATION_SECS") {
            if let Some(secs) = parse_number::<u64>("FINSOURCE_OPEN_DURATION_SECS", &secs) {
                settings.open_duration = Duration::from_secs(secs);
            }
        }
        if let Some(rpm) = var("FINSOURCE_REQUESTS_PER_MINUTE") {
            settings.requests_per_minute = parse_number("FINSOURCE_REQUESTS_PER_MINUTE", &rpm);
        }
        if let Some(burst) = var("FINSOURCE_BURST_CAPACITY") {
            settings.burst_capacity = parse_number("FINSOURCE_BURST_CAPACITY", &burst);
        }

        let credentials = ProviderCredentials {
            financial_datasets_api_key: var("FINANCIAL_DATASETS_API_KEY"),
            polygon_api_key: var("POLYGON_API_KEY"),
            finnhub_api_key: var("FINNHUB_API_KEY"),
        };

        Self {
            settings,
            credentials,
            db_path: var("FINSOURCE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        }
    }
}

fn parse_bool(name: &str, raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring invalid boolean {}={}", name, raw);
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid number {}={}", name, raw);
            None
        }
    }
}
