//! Per-endpoint token bucket and circuit breaker guarding outbound calls.
//!
//! Each endpoint name gets one [`RateState`] holding its token bucket and its
//! circuit, behind a single mutex so that token, error-count and open-until
//! updates are one read-modify-write. States are created lazily and never
//! evicted, so endpoint names should come from a bounded set (provider names).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Serialize;

use super::backoff::BackoffPolicy;
use super::circuit_breaker::{Circuit, CircuitBreakerConfig, CircuitState};
use crate::errors::ProviderError;

/// Default rate limit: 30 requests per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;

/// Default bucket capacity (allows bursting).
pub const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

/// Token bucket for a single endpoint.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Refill rate in tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn with_config(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_capacity.max(1.0);
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(config.requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Token bucket settings for an endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            burst_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

/// Tuning for the whole limiter. Per-endpoint bucket overrides go through
/// [`RateLimiter::configure`].
#[derive(Clone, Debug, Default)]
pub struct RateLimiterConfig {
    pub rate: RateLimitConfig,
    /// Apply `rate` to every endpoint and ignore per-endpoint overrides.
    pub pin_rate: bool,
    pub circuit: CircuitBreakerConfig,
    pub backoff: BackoffPolicy,
}

/// Mutable limiter state for one endpoint.
#[derive(Debug)]
pub struct RateState {
    bucket: TokenBucket,
    circuit: Circuit,
}

/// Point-in-time view of one endpoint, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: String,
    pub tokens_remaining: f64,
    pub capacity: f64,
    pub consecutive_errors: u32,
    pub state: CircuitState,
    /// Cooldown left while the circuit is open.
    pub open_remaining: Option<Duration>,
}

/// Rate limiter and circuit breaker keyed by endpoint name.
pub struct RateLimiter {
    config: RateLimiterConfig,
    overrides: Mutex<HashMap<String, RateLimitConfig>>,
    states: Mutex<HashMap<String, Arc<Mutex<RateState>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self {
            config,
            overrides: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<RateState>>>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter states mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_overrides(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.overrides.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter overrides mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_state(state: &Mutex<RateState>) -> MutexGuard<'_, RateState> {
        state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Sets bucket limits for one endpoint, resetting its bucket and circuit.
    pub fn configure(&self, endpoint: &str, config: RateLimitConfig) {
        self.lock_overrides().insert(endpoint.to_string(), config);
        self.lock_states().remove(endpoint);
    }

    fn state_for(&self, endpoint: &str) -> Arc<Mutex<RateState>> {
        let mut states = self.lock_states();
        if let Some(state) = states.get(endpoint) {
            return Arc::clone(state);
        }

        let rate = if self.config.pin_rate {
            self.config.rate.clone()
        } else {
            self.lock_overrides()
                .get(endpoint)
                .cloned()
                .unwrap_or_else(|| self.config.rate.clone())
        };
        let state = Arc::new(Mutex::new(RateState {
            bucket: TokenBucket::with_config(&rate),
            circuit: Circuit::new(),
        }));
        states.insert(endpoint.to_string(), Arc::clone(&state));
        state
    }

    /// Waits for a token on `endpoint`.
    ///
    /// Fails immediately with [`ProviderError::CircuitOpen`] while the
    /// endpoint's circuit is open; otherwise sleeps until a token refills.
    pub async fn acquire(&self, endpoint: &str) -> Result<(), ProviderError> {
        let state = self.state_for(endpoint);
        let mut admitted = false;
        loop {
            let wait_time = {
                let mut guard = Self::lock_state(&state);
                let RateState { bucket, circuit } = &mut *guard;

                if !admitted {
                    if let Err(remaining) = circuit.check(endpoint, Instant::now()) {
                        return Err(ProviderError::CircuitOpen {
                            endpoint: endpoint.to_string(),
                            remaining,
                        });
                    }
                    admitted = true;
                }

                if bucket.try_acquire() {
                    return Ok(());
                }
                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Rate limiter: waiting {:?} for '{}'", wait_time, endpoint);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Takes a token without waiting. Returns false when rate limited or open.
    pub fn try_acquire(&self, endpoint: &str) -> bool {
        let state = self.state_for(endpoint);
        let mut guard = Self::lock_state(&state);
        let RateState { bucket, circuit } = &mut *guard;
        if circuit.check(endpoint, Instant::now()).is_err() {
            return false;
        }
        if bucket.try_acquire() {
            return true;
        }
        circuit.release_probe();
        false
    }

    pub fn record_success(&self, endpoint: &str) {
        let state = self.state_for(endpoint);
        Self::lock_state(&state).circuit.record_success(endpoint);
    }

    /// Frees a half-open probe slot taken by a call that ended without a
    /// rate-limit verdict.
    pub fn release_probe(&self, endpoint: &str) {
        let state = self.state_for(endpoint);
        Self::lock_state(&state).circuit.release_probe();
    }

    /// Counts a rate-limit error. Returns the consecutive error count.
    pub fn record_error(&self, endpoint: &str) -> u32 {
        let state = self.state_for(endpoint);
        let mut guard = Self::lock_state(&state);
        guard
            .circuit
            .record_failure(endpoint, &self.config.circuit, Instant::now())
    }

    /// Runs `call` under the limiter for `endpoint`.
    ///
    /// Each attempt waits for a token first. Rate-limit-class errors are
    /// counted against the circuit and retried with backoff up to
    /// `max_retries` times, then surface as [`ProviderError::RetriesExhausted`].
    /// Any other error is returned at once. An open circuit fails the call
    /// before `call` runs.
    pub async fn execute_with_rate_limiting<T, F, Fut>(
        &self,
        endpoint: &str,
        max_retries: u32,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.acquire(endpoint).await?;

            match call().await {
                Ok(value) => {
                    self.record_success(endpoint);
                    return Ok(value);
                }
                Err(e) if e.is_rate_limited() => {
                    let error_count = self.record_error(endpoint);
                    if attempt >= max_retries {
                        warn!(
                            "Rate limiter: giving up on '{}' after {} attempts: {}",
                            endpoint,
                            attempt + 1,
                            e
                        );
                        return Err(ProviderError::RetriesExhausted {
                            endpoint: endpoint.to_string(),
                            attempts: attempt + 1,
                            message: e.to_string(),
                        });
                    }

                    let delay = self.config.backoff.delay(attempt, error_count);
                    warn!(
                        "Rate limited on '{}' (attempt {}/{}), retrying in {:.1}s",
                        endpoint,
                        attempt + 1,
                        max_retries + 1,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.release_probe(endpoint);
                    return Err(e);
                }
            }
        }
    }

    pub fn snapshot(&self, endpoint: &str) -> Option<EndpointSnapshot> {
        let state = self.lock_states().get(endpoint).cloned()?;
        Some(Self::describe(endpoint, &state))
    }

    /// Snapshots of every endpoint seen so far, sorted by name.
    pub fn snapshots(&self) -> Vec<EndpointSnapshot> {
        let states: Vec<(String, Arc<Mutex<RateState>>)> = self
            .lock_states()
            .iter()
            .map(|(name, state)| (name.clone(), Arc::clone(state)))
            .collect();

        let mut snapshots: Vec<EndpointSnapshot> = states
            .iter()
            .map(|(name, state)| Self::describe(name, state))
            .collect();
        snapshots.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshots
    }

    fn describe(endpoint: &str, state: &Mutex<RateState>) -> EndpointSnapshot {
        let mut guard = Self::lock_state(state);
        guard.bucket.refill();
        EndpointSnapshot {
            endpoint: endpoint.to_string(),
            tokens_remaining: guard.bucket.tokens,
            capacity: guard.bucket.capacity,
            consecutive_errors: guard.circuit.consecutive_errors(),
            state: guard.circuit.state(),
            open_remaining: guard.circuit.remaining_open(Instant::now()),
        }
    }

    /// Forgets all state for `endpoint`.
    pub fn reset(&self, endpoint: &str) {
        self.lock_states().remove(endpoint);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_limiter(threshold: u32, open: Duration) -> RateLimiter {
        RateLimiter::with_config(RateLimiterConfig {
            rate: RateLimitConfig {
                requests_per_minute: 6000,
                burst_capacity: 100.0,
            },
            pin_rate: false,
            circuit: CircuitBreakerConfig {
                error_threshold: threshold,
                open_duration: open,
            },
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        })
    }

    fn throttled() -> ProviderError {
        ProviderError::RateLimited {
            provider: "test".to_string(),
            message: "429 Too Many Requests".to_string(),
        }
    }

    #[test]
    fn test_token_bucket_drains_and_refills() {
        let mut bucket = TokenBucket::with_config(&RateLimitConfig {
            requests_per_minute: 60,
            burst_capacity: 1.0,
        });

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        bucket.last_update = Instant::now() - Duration::from_secs(2);
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_default_capacity_then_exhausted() {
        let limiter = RateLimiter::new();
        for _ in 0..DEFAULT_BUCKET_CAPACITY as usize {
            assert!(limiter.try_acquire("yahoo"));
        }
        assert!(!limiter.try_acquire("yahoo"));
        assert!(limiter.try_acquire("polygon"));
    }

    #[test]
    fn test_configure_overrides_capacity() {
        let limiter = RateLimiter::new();
        limiter.configure(
            "polygon",
            RateLimitConfig {
                requests_per_minute: 120,
                burst_capacity: 3.0,
            },
        );
        for _ in 0..3 {
            assert!(limiter.try_acquire("polygon"));
        }
        assert!(!limiter.try_acquire("polygon"));

        limiter.reset("polygon");
        assert!(limiter.try_acquire("polygon"));
    }

    #[test]
    fn test_pinned_rate_ignores_endpoint_overrides() {
        let limiter = RateLimiter::with_config(RateLimiterConfig {
            rate: RateLimitConfig {
                requests_per_minute: 1,
                burst_capacity: 1.0,
            },
            pin_rate: true,
            ..Default::default()
        });
        limiter.configure(
            "yahoo",
            RateLimitConfig {
                requests_per_minute: 300,
                burst_capacity: 20.0,
            },
        );

        assert!(limiter.try_acquire("yahoo"));
        assert!(!limiter.try_acquire("yahoo"));
        assert_eq!(limiter.snapshot("yahoo").unwrap().capacity, 1.0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new();
        limiter.configure(
            "fast",
            RateLimitConfig {
                requests_per_minute: 6000,
                burst_capacity: 2.0,
            },
        );

        limiter.acquire("fast").await.unwrap();
        limiter.acquire("fast").await.unwrap();

        let start = Instant::now();
        limiter.acquire("fast").await.unwrap();
        assert!(start.elapsed().as_millis() >= 5);
    }

    #[tokio::test]
    async fn test_retries_rate_limit_errors_then_succeeds() {
        let limiter = fast_limiter(10, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let result = limiter
            .execute_with_rate_limiting("yahoo", 3, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(throttled())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.snapshot("yahoo").unwrap().consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let limiter = fast_limiter(10, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let result: Result<(), _> = limiter
            .execute_with_rate_limiting("polygon", 3, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::malformed("polygon", "unexpected token"))
            })
            .await;

        assert!(matches!(result, Err(ProviderError::MalformedResponse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.snapshot("polygon").unwrap().consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_transient_error() {
        let limiter = fast_limiter(10, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let result: Result<(), _> = limiter
            .execute_with_rate_limiting("finnhub", 2, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            })
            .await;

        match result {
            Err(ProviderError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_calling() {
        let limiter = fast_limiter(5, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..5 {
            let _: Result<(), _> = limiter
                .execute_with_rate_limiting("quote", 0, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(throttled())
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let snapshot = limiter.snapshot("quote").unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.open_remaining.is_some());

        let sixth: Result<(), _> = limiter
            .execute_with_rate_limiting("quote", 0, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(sixth, Err(ProviderError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_probe_after_cooldown_closes_circuit() {
        let limiter = fast_limiter(2, Duration::from_millis(50));

        limiter.record_error("quote");
        limiter.record_error("quote");
        assert!(limiter.acquire("quote").await.is_err());

        tokio::time::sleep(Duration::from_millis(70)).await;

        let probe = limiter
            .execute_with_rate_limiting("quote", 0, move || async move { Ok("fresh") })
            .await;
        assert_eq!(probe.unwrap(), "fresh");
        assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_lets_one_caller_through() {
        let limiter = fast_limiter(1, Duration::from_millis(50));
        limiter.record_error("quote");
        tokio::time::sleep(Duration::from_millis(70)).await;

        assert!(limiter.acquire("quote").await.is_ok());
        assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::HalfOpen);
        assert!(matches!(
            limiter.acquire("quote").await,
            Err(ProviderError::CircuitOpen { .. })
        ));
        assert!(!limiter.try_acquire("quote"));

        limiter.record_success("quote");
        assert!(limiter.acquire("quote").await.is_ok());
        assert!(limiter.acquire("quote").await.is_ok());
    }

    #[tokio::test]
    async fn test_half_open_call_ending_in_other_error_frees_the_slot() {
        let limiter = fast_limiter(1, Duration::from_millis(50));
        limiter.record_error("quote");
        tokio::time::sleep(Duration::from_millis(70)).await;

        let first: Result<(), _> = limiter
            .execute_with_rate_limiting("quote", 0, || async {
                Err(ProviderError::Network {
                    provider: "test".to_string(),
                    message: "connection reset".to_string(),
                })
            })
            .await;
        assert!(matches!(first, Err(ProviderError::Network { .. })));
        assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::HalfOpen);

        let next = limiter
            .execute_with_rate_limiting("quote", 0, || async { Ok("fresh") })
            .await;
        assert_eq!(next.unwrap(), "fresh");
        assert_eq!(limiter.snapshot("quote").unwrap().state, CircuitState::Closed);
    }

    #[test]
    fn test_snapshots_sorted_by_endpoint() {
        let limiter = RateLimiter::new();
        limiter.try_acquire("yahoo");
        limiter.try_acquire("financial_datasets");
        let names: Vec<String> = limiter.snapshots().into_iter().map(|s| s.endpoint).collect();
        assert_eq!(names, vec!["financial_datasets".to_string(), "yahoo".to_string()]);
    }
}
