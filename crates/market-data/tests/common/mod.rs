#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use finsource_core::models::{
    CompanyNews, LineItem, LineItemQuery, NewsQuery, Price, PriceQuery,
};
use finsource_core::{DataKind, MergeCache};
use finsource_market_data::registry::{
    BackoffPolicy, CircuitBreakerConfig, RateLimitConfig, RateLimiterConfig,
};
use finsource_market_data::{
    DataSource, ProviderAdapter, ProviderCapabilities, ProviderClient, ProviderError, RateLimit,
    RateLimiter, SourceRegistry,
};

/// What a [`MockClient`] answers with.
#[derive(Clone)]
pub enum Reply {
    Prices(Vec<Price>),
    LineItems(Vec<LineItem>),
    News(Vec<CompanyNews>),
    Fail(ProviderError),
}

/// Scripted client counting every network call.
pub struct MockClient {
    id: &'static str,
    operations: &'static [DataKind],
    reply: Mutex<Reply>,
    available: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockClient {
    pub fn new(id: &'static str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id,
            operations: &DataKind::ALL,
            reply: Mutex::new(reply),
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable(id: &'static str) -> Arc<Self> {
        let client = Self::new(id, Reply::Prices(Vec::new()));
        client.available.store(false, Ordering::SeqCst);
        client
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            operations: self.operations,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6000,
            burst: 100,
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn unavailable_reason(&self) -> Option<String> {
        (!self.is_available()).then(|| format!("{} has no key", self.id))
    }

    async fn fetch_prices(&self, _query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        match self.answer() {
            Reply::Prices(prices) => Ok(prices),
            Reply::Fail(e) => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    async fn fetch_line_items(&self, _query: &LineItemQuery) -> Result<Vec<LineItem>, ProviderError> {
        match self.answer() {
            Reply::LineItems(items) => Ok(items),
            Reply::Fail(e) => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    async fn fetch_company_news(&self, _query: &NewsQuery) -> Result<Vec<CompanyNews>, ProviderError> {
        match self.answer() {
            Reply::News(news) => Ok(news),
            Reply::Fail(e) => Err(e),
            _ => Ok(Vec::new()),
        }
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

pub fn price(time: &str, close: f64) -> Price {
    Price {
        time: time.to_string(),
        open: close,
        close,
        high: close,
        low: close,
        volume: 100,
        adj_close: None,
    }
}

pub fn network_error(provider: &str) -> ProviderError {
    ProviderError::Network {
        provider: provider.to_string(),
        message: "connection reset".to_string(),
    }
}

pub fn rate_limited(provider: &str) -> ProviderError {
    ProviderError::RateLimited {
        provider: provider.to_string(),
        message: "429 Too Many Requests".to_string(),
    }
}

/// Limiter with fast backoff and the given breaker tuning.
pub fn limiter(error_threshold: u32, open_duration: Duration) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::with_config(RateLimiterConfig {
        rate: RateLimitConfig::default(),
        pin_rate: false,
        circuit: CircuitBreakerConfig {
            error_threshold,
            open_duration,
        },
        backoff: BackoffPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    }))
}

pub fn adapter(
    client: Arc<MockClient>,
    cache: &Arc<MergeCache>,
    limiter: &Arc<RateLimiter>,
) -> Arc<dyn DataSource> {
    Arc::new(
        ProviderAdapter::new(client, Arc::clone(cache), Arc::clone(limiter)).with_max_retries(0),
    )
}

/// Registry of adapters over `clients`, in order, defaulting to the first.
pub fn registry(clients: &[Arc<MockClient>], cache: &Arc<MergeCache>) -> SourceRegistry {
    registry_with_limiter(clients, cache, &limiter(5, Duration::from_secs(300)))
}

/// Same as [`registry`], with every adapter sharing `limiter`.
pub fn registry_with_limiter(
    clients: &[Arc<MockClient>],
    cache: &Arc<MergeCache>,
    limiter: &Arc<RateLimiter>,
) -> SourceRegistry {
    let default = clients.first().map(|c| c.id()).unwrap_or("yahoo");
    clients
        .iter()
        .fold(SourceRegistry::new(default), |registry, client| {
            registry.with_source(adapter(Arc::clone(client), cache, limiter))
        })
}
