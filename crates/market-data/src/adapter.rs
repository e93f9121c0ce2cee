//! Cache-then-fetch-then-store wrapper around a [`ProviderClient`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use finsource_core::cache::CacheKeyed;
use finsource_core::models::{
    filter_line_items, CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, LineItem,
    LineItemQuery, MarketCapQuery, MetricsQuery, NewsQuery, Price, PriceQuery,
};
use finsource_core::{CacheNamespace, DataKind, MergeCache};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ProviderError;
use crate::provider::{ProviderCapabilities, ProviderClient};
use crate::registry::{RateLimitConfig, RateLimiter};

/// Default rate-limit retries per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Uniform fetch interface the orchestrator dispatches to.
///
/// `force_refresh` skips the cache read; fetched data is still written back.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    fn is_available(&self) -> bool;

    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    async fn get_prices(
        &self,
        query: &PriceQuery,
        force_refresh: bool,
    ) -> Result<Vec<Price>, ProviderError>;

    async fn get_financial_metrics(
        &self,
        query: &MetricsQuery,
        force_refresh: bool,
    ) -> Result<Vec<FinancialMetrics>, ProviderError>;

    async fn get_market_cap(
        &self,
        query: &MarketCapQuery,
        force_refresh: bool,
    ) -> Result<Option<f64>, ProviderError>;

    /// Returns records narrowed to `query.line_items`.
    async fn search_line_items(
        &self,
        query: &LineItemQuery,
        force_refresh: bool,
    ) -> Result<Vec<LineItem>, ProviderError>;

    async fn get_company_news(
        &self,
        query: &NewsQuery,
        force_refresh: bool,
    ) -> Result<Vec<CompanyNews>, ProviderError>;

    async fn get_insider_trades(
        &self,
        query: &InsiderTradeQuery,
        force_refresh: bool,
    ) -> Result<Vec<InsiderTrade>, ProviderError>;
}

/// A provider client behind the shared cache and rate limiter.
///
/// The client's id doubles as the limiter endpoint, so every provider gets its
/// own bucket and circuit.
pub struct ProviderAdapter {
    client: Arc<dyn ProviderClient>,
    cache: Arc<MergeCache>,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
}

impl ProviderAdapter {
    pub fn new(
        client: Arc<dyn ProviderClient>,
        cache: Arc<MergeCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        limiter.configure(client.id(), RateLimitConfig::from(&client.rate_limit()));
        Self {
            client,
            cache,
            limiter,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Fails fast, without I/O, when the client cannot serve `kind`.
    fn ensure_ready(&self, kind: DataKind) -> Result<(), ProviderError> {
        if !self.client.is_available() {
            return Err(ProviderError::Unavailable {
                provider: self.client.id().to_string(),
                reason: self
                    .client
                    .unavailable_reason()
                    .unwrap_or_else(|| "not configured".to_string()),
            });
        }
        if !self.client.capabilities().supports(kind) {
            return Err(ProviderError::not_supported(kind.operation_name(), self.client.id()));
        }
        Ok(())
    }

    fn store<T: Serialize>(&self, namespace: CacheNamespace, key: &str, records: &[T]) {
        if let Err(e) = self.cache.set_records(namespace, key, records) {
            warn!("Skipping cache write for {}/{}: {}", namespace, key, e);
        }
    }

    /// Reads a non-empty cached list, or fetches under the limiter and merges
    /// the result into the cache.
    async fn cached_list<T, F, Fut>(
        &self,
        kind: DataKind,
        key: String,
        force_refresh: bool,
        fetch: F,
    ) -> Result<Vec<T>, ProviderError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, ProviderError>> + Send,
    {
        self.ensure_ready(kind)?;
        let namespace = kind.namespace();

        if let Some(records) = self.cache.get_records::<T>(namespace, &key, force_refresh) {
            return Ok(records);
        }

        debug!("{} fetching {} for {}", self.client.id(), namespace, key);
        let records = self
            .limiter
            .execute_with_rate_limiting(self.client.id(), self.max_retries, fetch)
            .await?;

        if !records.is_empty() {
            self.store(namespace, &key, &records);
        }
        Ok(records)
    }
}

#[async_trait]
impl DataSource for ProviderAdapter {
    fn name(&self) -> &str {
        self.client.id()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.client.capabilities()
    }

    fn is_available(&self) -> bool {
        self.client.is_available()
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.client.unavailable_reason()
    }

    async fn get_prices(
        &self,
        query: &PriceQuery,
        force_refresh: bool,
    ) -> Result<Vec<Price>, ProviderError> {
        let client = &self.client;
        self.cached_list(DataKind::Prices, query.cache_key(), force_refresh, || {
            client.fetch_prices(query)
        })
        .await
    }

    async fn get_financial_metrics(
        &self,
        query: &MetricsQuery,
        force_refresh: bool,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        let client = &self.client;
        self.cached_list(
            DataKind::FinancialMetrics,
            query.cache_key(),
            force_refresh,
            || client.fetch_financial_metrics(query),
        )
        .await
    }

    async fn get_market_cap(
        &self,
        query: &MarketCapQuery,
        force_refresh: bool,
    ) -> Result<Option<f64>, ProviderError> {
        self.ensure_ready(DataKind::MarketCap)?;
        let key = query.cache_key();

        if let Some(cap) = self
            .cache
            .get_scalar::<f64>(CacheNamespace::MarketCap, &key, force_refresh)
        {
            return Ok(Some(cap));
        }

        let client = &self.client;
        let cap = self
            .limiter
            .execute_with_rate_limiting(client.id(), self.max_retries, || {
                client.fetch_market_cap(query)
            })
            .await?;

        if let Some(value) = cap {
            if let Err(e) = self.cache.set_scalar(CacheNamespace::MarketCap, &key, &value) {
                warn!("Skipping cache write for {}/{}: {}", CacheNamespace::MarketCap, key, e);
            }
        }
        Ok(cap)
    }

    async fn search_line_items(
        &self,
        query: &LineItemQuery,
        force_refresh: bool,
    ) -> Result<Vec<LineItem>, ProviderError> {
        let client = &self.client;
        let superset = self
            .cached_list(DataKind::LineItems, query.cache_key(), force_refresh, || {
                client.fetch_line_items(query)
            })
            .await?;
        Ok(filter_line_items(&superset, &query.line_items))
    }

    async fn get_company_news(
        &self,
        query: &NewsQuery,
        force_refresh: bool,
    ) -> Result<Vec<CompanyNews>, ProviderError> {
        let client = &self.client;
        self.cached_list(
            DataKind::CompanyNews,
            query.cache_key(),
            force_refresh,
            || client.fetch_company_news(query),
        )
        .await
    }

    async fn get_insider_trades(
        &self,
        query: &InsiderTradeQuery,
        force_refresh: bool,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        let client = &self.client;
        self.cached_list(
            DataKind::InsiderTrades,
            query.cache_key(),
            force_refresh,
            || client.fetch_insider_trades(query),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RateLimit;
    use chrono::NaiveDate;
    use finsource_core::cache::CacheEntry;
    use finsource_core::{CacheBackend, CacheError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
        available: bool,
    }

    impl CountingClient {
        fn new(available: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                available,
            }
        }
    }

    #[async_trait]
    impl ProviderClient for CountingClient {
        fn id(&self) -> &'static str {
            "counting"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                operations: &[DataKind::Prices, DataKind::MarketCap],
            }
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit {
                requests_per_minute: 600,
                burst: 50,
            }
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn fetch_prices(&self, _query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Price {
                time: "2024-01-02".to_string(),
                open: 1.0,
                close: 2.0,
                high: 2.0,
                low: 1.0,
                volume: 10,
                adj_close: None,
            }])
        }

        async fn fetch_market_cap(
            &self,
            _query: &MarketCapQuery,
        ) -> Result<Option<f64>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn adapter(client: Arc<CountingClient>) -> ProviderAdapter {
        ProviderAdapter::new(
            client,
            Arc::new(MergeCache::in_memory()),
            Arc::new(RateLimiter::new()),
        )
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let client = Arc::new(CountingClient::new(true));
        let adapter = adapter(client.clone());
        let query = PriceQuery::new("aapl", day(1), day(5)).unwrap();

        let first = adapter.get_prices(&query, false).await.unwrap();
        let second = adapter.get_prices(&query, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    struct BrokenStore;

    impl CacheBackend for BrokenStore {
        fn load(&self, _: CacheNamespace, _: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Backend("database is locked".to_string()))
        }

        fn store(&self, _: CacheNamespace, _: &str, _: CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Backend("database is locked".to_string()))
        }

        fn remove(&self, _: CacheNamespace, _: &str) -> Result<bool, CacheError> {
            Ok(false)
        }

        fn keys(&self, _: CacheNamespace) -> Result<Vec<String>, CacheError> {
            Ok(Vec::new())
        }

        fn clear(&self, _: Option<CacheNamespace>) -> Result<usize, CacheError> {
            Ok(0)
        }

        fn entry_counts(&self) -> Result<Vec<(CacheNamespace, usize)>, CacheError> {
            Ok(Vec::new())
        }

        fn approximate_size(&self) -> Result<u64, CacheError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_cache_failure_still_returns_fetched_records() {
        let client = Arc::new(CountingClient::new(true));
        let adapter = ProviderAdapter::new(
            client.clone(),
            Arc::new(MergeCache::new(Arc::new(BrokenStore))),
            Arc::new(RateLimiter::new()),
        );
        let query = PriceQuery::new("AAPL", day(1), day(5)).unwrap();

        let prices = adapter.get_prices(&query, false).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].close, 2.0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_refetches() {
        let client = Arc::new(CountingClient::new(true));
        let adapter = adapter(client.clone());
        let query = PriceQuery::new("AAPL", day(1), day(5)).unwrap();

        adapter.get_prices(&query, false).await.unwrap();
        adapter.get_prices(&query, true).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_fails_without_io() {
        let client = Arc::new(CountingClient::new(false));
        let adapter = adapter(client.clone());
        let query = PriceQuery::new("AAPL", day(1), day(5)).unwrap();

        let err = adapter.get_prices(&query, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        assert!(!err.is_transient());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_operation_fails_without_io() {
        let client = Arc::new(CountingClient::new(true));
        let adapter = adapter(client.clone());
        let query = NewsQuery::new("AAPL", day(5)).unwrap();

        let err = adapter.get_company_news(&query, false).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotSupported { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_market_cap_not_cached() {
        let client = Arc::new(CountingClient::new(true));
        let adapter = adapter(client.clone());
        let query = MarketCapQuery::new("AAPL", day(5)).unwrap();

        assert_eq!(adapter.get_market_cap(&query, false).await.unwrap(), None);
        assert_eq!(adapter.get_market_cap(&query, false).await.unwrap(), None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
