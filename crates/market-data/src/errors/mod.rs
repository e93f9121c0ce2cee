//! Error types and classification for provider calls.
//!
//! - [`ProviderError`]: every failure a data source can report
//! - [`ErrorClass`]: transient vs permanent, see [`ProviderError::class`]

mod retry;

pub use retry::{mentions_rate_limit, ErrorClass, RATE_LIMIT_PHRASES};

use std::time::Duration;

use thiserror::Error;

/// Errors raised while fetching from a data source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider throttled the request (HTTP 429 or a throttling message).
    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// Rate-limit retries were used up on one endpoint.
    #[error("Retries exhausted for '{endpoint}' after {attempts} attempts: {message}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// The endpoint's circuit is open; no request was sent.
    #[error("Circuit open for '{endpoint}', retry in {remaining:?}")]
    CircuitOpen { endpoint: String, remaining: Duration },

    /// The source is not configured (e.g. missing credentials).
    #[error("Provider unavailable: {provider} - {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("{operation} is not supported by {provider}")]
    NotSupported { operation: String, provider: String },

    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("Network error from {provider}: {message}")]
    Network { provider: String, message: String },

    /// Every source in the fallback chain failed.
    #[error("All sources exhausted for {operation} (tried: {}): {last_error}", .attempted.join(", "))]
    AllSourcesExhausted {
        operation: String,
        attempted: Vec<String>,
        last_error: String,
    },
}

impl ProviderError {
    /// Anything [`is_rate_limited`](Self::is_rate_limited) accepts is transient.
    pub fn class(&self) -> ErrorClass {
        if self.is_rate_limited() {
            return ErrorClass::Transient;
        }
        match self {
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::RetriesExhausted { .. }
            | Self::CircuitOpen { .. } => ErrorClass::Transient,

            Self::Http { status, .. } if *status >= 500 => ErrorClass::Transient,

            Self::Unavailable { .. }
            | Self::NotSupported { .. }
            | Self::Http { .. }
            | Self::MalformedResponse { .. }
            | Self::Network { .. }
            | Self::AllSourcesExhausted { .. } => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// True for errors the rate limiter should count and retry.
    ///
    /// Covers explicit throttling, HTTP 429, and provider messages containing
    /// one of [`RATE_LIMIT_PHRASES`].
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http { status: 429, .. } => true,
            Self::Http { message, .. }
            | Self::Network { message, .. }
            | Self::MalformedResponse { message, .. } => mentions_rate_limit(message),
            _ => false,
        }
    }

    pub fn not_supported(operation: &str, provider: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
            provider: provider.to_string(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Maps a reqwest transport error onto the taxonomy.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                provider: provider.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::from_status(provider, status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::malformed(provider, err.to_string());
        }
        Self::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 {
            return Self::RateLimited {
                provider: provider.to_string(),
                message,
            };
        }
        Self::Http {
            provider: provider.to_string(),
            status,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, message: &str) -> ProviderError {
        ProviderError::Http {
            provider: "polygon".to_string(),
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_rate_limited_is_transient_and_retryable() {
        let error = ProviderError::RateLimited {
            provider: "yahoo".to_string(),
            message: "slow down".to_string(),
        };
        assert_eq!(error.class(), ErrorClass::Transient);
        assert!(error.is_rate_limited());
    }

    #[test]
    fn test_status_429_maps_to_rate_limited() {
        let error = ProviderError::from_status("finnhub", 429, "Too Many Requests");
        assert!(matches!(error, ProviderError::RateLimited { .. }));
        assert!(http(429, "").is_rate_limited());
    }

    #[test]
    fn test_throttling_phrase_in_body() {
        assert!(http(400, "API quota exceeded").is_rate_limited());
        assert!(!http(400, "bad ticker").is_rate_limited());
    }

    #[test]
    fn test_throttled_client_error_is_transient() {
        let quota = http(403, "quota exceeded");
        assert!(quota.is_rate_limited());
        assert_eq!(quota.class(), ErrorClass::Transient);
        assert!(ProviderError::malformed("finnhub", "Rate limit reached").is_transient());
        assert_eq!(http(403, "forbidden").class(), ErrorClass::Permanent);
    }

    #[test]
    fn test_timeout_transient_but_not_rate_limited() {
        let error = ProviderError::Timeout {
            provider: "yahoo".to_string(),
        };
        assert!(error.is_transient());
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert_eq!(http(401, "unauthorized").class(), ErrorClass::Permanent);
        assert_eq!(http(404, "not found").class(), ErrorClass::Permanent);
        assert_eq!(http(503, "unavailable").class(), ErrorClass::Transient);
    }

    #[test]
    fn test_unavailable_and_unsupported_are_permanent() {
        let unavailable = ProviderError::Unavailable {
            provider: "polygon".to_string(),
            reason: "POLYGON_API_KEY not set".to_string(),
        };
        assert_eq!(unavailable.class(), ErrorClass::Permanent);
        assert_eq!(
            ProviderError::not_supported("get_insider_trades", "polygon").class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_exhausted_message_lists_sources() {
        let error = ProviderError::AllSourcesExhausted {
            operation: "get_prices".to_string(),
            attempted: vec!["yahoo".to_string(), "polygon".to_string()],
            last_error: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "All sources exhausted for get_prices (tried: yahoo, polygon): boom"
        );
    }
}
