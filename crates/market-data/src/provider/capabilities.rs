//! What a provider can serve and how hard it may be called.

use finsource_core::DataKind;
use serde::Serialize;

use crate::registry::RateLimitConfig;

/// The operations a provider implements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderCapabilities {
    pub operations: &'static [DataKind],
}

impl ProviderCapabilities {
    pub const ALL: ProviderCapabilities = ProviderCapabilities {
        operations: &DataKind::ALL,
    };

    pub fn supports(&self, kind: DataKind) -> bool {
        self.operations.contains(&kind)
    }
}

/// Rate limiting configuration for a provider.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,
    /// Requests that may be issued back to back before throttling kicks in.
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            burst: 10,
        }
    }
}

impl From<&RateLimit> for RateLimitConfig {
    fn from(limit: &RateLimit) -> Self {
        RateLimitConfig {
            requests_per_minute: limit.requests_per_minute,
            burst_capacity: f64::from(limit.burst),
        }
    }
}
