//! Consecutive-error circuit breaker for a single endpoint.
//!
//! - **Closed**: normal operation, calls go through.
//! - **Open**: `error_threshold` consecutive rate-limit errors were seen; calls
//!   fail fast until `open_until`.
//! - **HalfOpen**: the cooldown elapsed; one call at a time is let through
//!   as a probe. Success closes the circuit, failure re-opens it with a fresh
//!   cooldown. A probe that neither succeeds nor fails within one cooldown is
//!   treated as abandoned and the next caller takes its place.
//!
//! The breaker holds no lock of its own. It lives inside the endpoint's
//! `RateState` so token and breaker updates happen under one mutex.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Default number of consecutive errors before the circuit opens.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Default cooldown while the circuit is open.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive rate-limit errors that open the circuit.
    pub error_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            open_duration: DEFAULT_OPEN_DURATION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Circuit {
    state: CircuitState,
    consecutive_errors: u32,
    open_until: Option<Instant>,
    cooldown: Duration,
    probe_started: Option<Instant>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_errors: 0,
            open_until: None,
            cooldown: DEFAULT_OPEN_DURATION,
            probe_started: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Time left before an open circuit admits a probe.
    pub fn remaining_open(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.open_until) {
            (CircuitState::Open, Some(until)) if until > now => Some(until - now),
            _ => None,
        }
    }

    /// Admits or rejects a call at `now`.
    ///
    /// Moves Open to HalfOpen once the cooldown has elapsed and admits that
    /// caller as the probe. While the probe is in flight every other caller
    /// is rejected. On rejection returns how long until a call may be admitted.
    pub fn check(&mut self, endpoint: &str, now: Instant) -> Result<(), Duration> {
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => match self.probe_started {
                Some(started) if now.duration_since(started) < self.cooldown => {
                    Err(self.cooldown - now.duration_since(started))
                }
                _ => {
                    debug!("Circuit breaker: admitting probe for '{}'", endpoint);
                    self.probe_started = Some(now);
                    Ok(())
                }
            },
            CircuitState::Open => match self.open_until {
                Some(until) if now < until => Err(until - now),
                _ => {
                    info!("Circuit breaker: '{}' Open -> HalfOpen, allowing probe", endpoint);
                    self.state = CircuitState::HalfOpen;
                    self.probe_started = Some(now);
                    Ok(())
                }
            },
        }
    }

    /// Gives up the probe slot without a verdict. The circuit stays HalfOpen.
    pub fn release_probe(&mut self) {
        self.probe_started = None;
    }

    pub fn record_success(&mut self, endpoint: &str) {
        if self.state != CircuitState::Closed {
            info!("Circuit breaker: '{}' recovered, closing circuit", endpoint);
        } else if self.consecutive_errors > 0 {
            debug!("Circuit breaker: success for '{}', error count reset", endpoint);
        }
        self.state = CircuitState::Closed;
        self.consecutive_errors = 0;
        self.open_until = None;
        self.probe_started = None;
    }

    /// Counts one error. Returns the consecutive error count afterwards.
    pub fn record_failure(&mut self, endpoint: &str, config: &CircuitBreakerConfig, now: Instant) -> u32 {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.probe_started = None;

        match self.state {
            CircuitState::Closed if self.consecutive_errors >= config.error_threshold => {
                warn!(
                    "Circuit breaker: opening '{}' for {:?} after {} consecutive errors",
                    endpoint, config.open_duration, self.consecutive_errors
                );
                self.state = CircuitState::Open;
                self.open_until = Some(now + config.open_duration);
                self.cooldown = config.open_duration;
            }
            CircuitState::Closed => {
                debug!(
                    "Circuit breaker: error for '{}' ({}/{})",
                    endpoint, self.consecutive_errors, config.error_threshold
                );
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                warn!("Circuit breaker: probe failed for '{}', re-opening", endpoint);
                self.state = CircuitState::Open;
                self.open_until = Some(now + config.open_duration);
                self.cooldown = config.open_duration;
            }
        }

        self.consecutive_errors
    }
}
