//! Resilient, cached access to financial data providers.
//!
//! # Overview
//!
//! ```text
//! caller -> FinancialDataService
//!             -> FailoverOrchestrator (primary, then fallback chain)
//!                  -> ProviderAdapter (MergeCache read, RateLimiter, MergeCache write)
//!                       -> ProviderClient (HTTP)
//! ```
//!
//! - [`ProviderClient`]: one per external provider, raw typed fetches
//! - [`ProviderAdapter`]: cache-then-fetch-then-store around a client
//! - [`RateLimiter`]: per-endpoint token bucket and circuit breaker
//! - [`FailoverOrchestrator`]: tries sources in order, emits a
//!   [`PerformanceRecord`] per attempt
//! - [`FinancialDataService`]: the context object wiring it all together

pub mod adapter;
pub mod errors;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod service;
pub mod settings;

pub use adapter::{DataSource, ProviderAdapter};
pub use errors::{ErrorClass, ProviderError};
pub use orchestrator::{
    ChannelSink, FailoverOrchestrator, LogSink, NoopSink, Operation, OperationOutput,
    PerformanceRecord, PerformanceSink,
};
pub use provider::{ProviderCapabilities, ProviderClient, ProviderKind, RateLimit};
pub use registry::{CircuitState, EndpointSnapshot, RateLimiter, RateLimiterConfig, SourceRegistry};
pub use service::{FinancialDataService, ServiceStatus, SourceStatus};
pub use settings::{ProviderCredentials, Settings};
