//! Outbound call protection and source lookup.
//!
//! - Per-endpoint token buckets and circuit breakers
//! - Exponential backoff with jitter for rate-limit retries
//! - Lazy, alias-aware registry of data sources

mod backoff;
mod circuit_breaker;
mod rate_limiter;
mod source_registry;

pub use backoff::{BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use circuit_breaker::{
    Circuit, CircuitBreakerConfig, CircuitState, DEFAULT_ERROR_THRESHOLD, DEFAULT_OPEN_DURATION,
};
pub use rate_limiter::{
    EndpointSnapshot, RateLimitConfig, RateLimiter, RateLimiterConfig, DEFAULT_BUCKET_CAPACITY,
    DEFAULT_REQUESTS_PER_MINUTE,
};
pub use source_registry::{SourceFactory, SourceRegistry};
