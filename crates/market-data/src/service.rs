//! The context object callers hold: one cache, one limiter, one registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use finsource_core::cache::{analysis_key, CacheStats};
use finsource_core::models::{
    CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, LineItem, LineItemQuery,
    MarketCapQuery, MetricsQuery, NewsQuery, Price, PriceQuery,
};
use finsource_core::{CacheError, CacheNamespace, DataKind, MergeCache};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::adapter::{DataSource, ProviderAdapter};
use crate::errors::ProviderError;
use crate::orchestrator::{
    FailoverOrchestrator, LogSink, NoopSink, Operation, OperationOutput, PerformanceSink,
};
use crate::provider::ProviderKind;
use crate::registry::{EndpointSnapshot, RateLimiter, SourceRegistry};
use crate::settings::{ProviderCredentials, Settings, STAGGER_WINDOW_SECS};

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub available: bool,
    pub reason: Option<String>,
    pub operations: Vec<DataKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub data_source: String,
    pub fallback_enabled: bool,
    pub fallback_chain: Vec<String>,
    pub sources: Vec<SourceStatus>,
    pub rate_limits: Vec<EndpointSnapshot>,
    pub cache: Option<CacheStats>,
}

/// Entry point for fetching financial data.
///
/// Construct once at start and share by reference. [`shutdown`](Self::shutdown)
/// flushes the cache backend.
pub struct FinancialDataService {
    settings: Settings,
    cache: Arc<MergeCache>,
    limiter: Arc<RateLimiter>,
    orchestrator: FailoverOrchestrator,
}

impl FinancialDataService {
    /// Wires the built-in providers over `cache`.
    ///
    /// With no `sink`, attempts are logged when `performance_logging` is on.
    pub fn new(
        settings: Settings,
        credentials: ProviderCredentials,
        cache: Arc<MergeCache>,
        sink: Option<Arc<dyn PerformanceSink>>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::with_config(settings.limiter_config()));
        let default_source = ProviderKind::from_name(&settings.data_source)
            .unwrap_or(ProviderKind::Yahoo)
            .as_str();

        let mut registry = SourceRegistry::new(default_source);
        for kind in ProviderKind::ALL {
            let credentials = credentials.clone();
            let cache = Arc::clone(&cache);
            let limiter = Arc::clone(&limiter);
            let max_retries = settings.max_retries;
            registry.register(kind.as_str(), kind.aliases(), move || {
                let client = kind.build_client(&credentials);
                Arc::new(
                    ProviderAdapter::new(client, Arc::clone(&cache), Arc::clone(&limiter))
                        .with_max_retries(max_retries),
                ) as Arc<dyn DataSource>
            });
        }

        Self::with_registry(settings, cache, limiter, registry, sink)
    }

    /// Uses a caller-built registry, e.g. with custom sources.
    pub fn with_registry(
        settings: Settings,
        cache: Arc<MergeCache>,
        limiter: Arc<RateLimiter>,
        registry: SourceRegistry,
        sink: Option<Arc<dyn PerformanceSink>>,
    ) -> Self {
        let sink = sink.unwrap_or_else(|| {
            if settings.performance_logging {
                Arc::new(LogSink)
            } else {
                Arc::new(NoopSink)
            }
        });
        let orchestrator = FailoverOrchestrator::from_settings(Arc::new(registry), sink, &settings);
        Self {
            settings,
            cache,
            limiter,
            orchestrator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &MergeCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn orchestrator(&self) -> &FailoverOrchestrator {
        &self.orchestrator
    }

    /// Canonical name of the configured primary source.
    pub fn current_source(&self) -> String {
        self.orchestrator
            .registry()
            .resolve_name(&self.settings.data_source)
    }

    /// Runs `op` against the configured chain. Degrades to an empty output
    /// when every source fails.
    pub async fn execute(&self, op: &Operation, force_refresh: bool) -> OperationOutput {
        self.orchestrator
            .execute(op, Some(&self.settings.data_source), force_refresh)
            .await
    }

    /// Strict variant of the `get_*` methods.
    pub async fn try_execute(
        &self,
        op: &Operation,
        force_refresh: bool,
    ) -> Result<OperationOutput, ProviderError> {
        self.orchestrator
            .try_execute(op, Some(&self.settings.data_source), force_refresh)
            .await
    }

    pub async fn get_prices(&self, query: &PriceQuery, force_refresh: bool) -> Vec<Price> {
        self.execute(&Operation::Prices(query.clone()), force_refresh)
            .await
            .into_prices()
    }

    pub async fn get_financial_metrics(
        &self,
        query: &MetricsQuery,
        force_refresh: bool,
    ) -> Vec<FinancialMetrics> {
        self.execute(&Operation::FinancialMetrics(query.clone()), force_refresh)
            .await
            .into_financial_metrics()
    }

    pub async fn get_market_cap(&self, query: &MarketCapQuery, force_refresh: bool) -> Option<f64> {
        self.execute(&Operation::MarketCap(query.clone()), force_refresh)
            .await
            .into_market_cap()
    }

    pub async fn search_line_items(
        &self,
        query: &LineItemQuery,
        force_refresh: bool,
    ) -> Vec<LineItem> {
        self.execute(&Operation::LineItems(query.clone()), force_refresh)
            .await
            .into_line_items()
    }

    pub async fn get_company_news(&self, query: &NewsQuery, force_refresh: bool) -> Vec<CompanyNews> {
        self.execute(&Operation::CompanyNews(query.clone()), force_refresh)
            .await
            .into_company_news()
    }

    pub async fn get_insider_trades(
        &self,
        query: &InsiderTradeQuery,
        force_refresh: bool,
    ) -> Vec<InsiderTrade> {
        self.execute(&Operation::InsiderTrades(query.clone()), force_refresh)
            .await
            .into_insider_trades()
    }

    /// Prices for several tickers, at most `batch_concurrency` in flight.
    ///
    /// With `stagger_tickers`, the ticker at position `i` starts after
    /// `i mod 10` seconds. Invalid tickers are logged and left out.
    pub async fn prices_for_tickers(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
    ) -> BTreeMap<String, Vec<Price>> {
        let stagger = self.settings.stagger_tickers;
        let concurrency = self.settings.batch_concurrency.max(1);

        stream::iter(tickers.iter().enumerate())
            .map(|(index, ticker)| async move {
                let query = match PriceQuery::new(ticker, start, end) {
                    Ok(query) => query,
                    Err(e) => {
                        warn!("Skipping ticker '{}': {}", ticker, e);
                        return None;
                    }
                };
                if stagger {
                    let delay = Duration::from_secs(index as u64 % STAGGER_WINDOW_SECS);
                    tokio::time::sleep(delay).await;
                }
                let prices = self.get_prices(&query, force_refresh).await;
                Some((query.ticker, prices))
            })
            .buffer_unordered(concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await
    }

    pub fn get_analysis(&self, ticker: &str, analysis: &str, as_of: NaiveDate) -> Option<Value> {
        self.cache.get(
            CacheNamespace::AnalysisResults,
            &analysis_key(ticker, analysis, as_of),
            false,
        )
    }

    pub fn set_analysis(
        &self,
        ticker: &str,
        analysis: &str,
        as_of: NaiveDate,
        result: &Value,
    ) -> Result<(), CacheError> {
        self.cache.set_scalar(
            CacheNamespace::AnalysisResults,
            &analysis_key(ticker, analysis, as_of),
            result,
        )
    }

    pub fn list_analysis_keys(&self) -> Result<Vec<String>, CacheError> {
        self.cache.keys(CacheNamespace::AnalysisResults)
    }

    pub fn get_llm_response(&self, key: &str) -> Option<Value> {
        self.cache.get(CacheNamespace::LlmResponses, key, false)
    }

    pub fn set_llm_response(&self, key: &str, response: &Value) -> Result<(), CacheError> {
        self.cache
            .set_scalar(CacheNamespace::LlmResponses, key, response)
    }

    pub fn list_llm_keys(&self) -> Result<Vec<String>, CacheError> {
        self.cache.keys(CacheNamespace::LlmResponses)
    }

    pub fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats()
    }

    pub fn clear_all(&self) -> Result<usize, CacheError> {
        let removed = self.cache.clear(None)?;
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    pub fn clear_for_ticker(&self, ticker: &str) -> Result<usize, CacheError> {
        self.cache.clear_by_ticker(ticker)
    }

    /// Builds every registered source to report its availability.
    pub fn status(&self) -> ServiceStatus {
        let registry = self.orchestrator.registry();
        let sources = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(&name))
            .map(|source| SourceStatus {
                name: source.name().to_string(),
                available: source.is_available(),
                reason: source.unavailable_reason(),
                operations: source.capabilities().operations.to_vec(),
            })
            .collect();

        let cache = match self.cache.stats() {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Cache stats unavailable: {}", e);
                None
            }
        };

        ServiceStatus {
            data_source: self.current_source(),
            fallback_enabled: self.orchestrator.fallback_enabled(),
            fallback_chain: self.orchestrator.chain(Some(&self.settings.data_source)),
            sources,
            rate_limits: self.limiter.snapshots(),
            cache,
        }
    }

    /// Flushes the cache backend. Call once before exit.
    pub fn shutdown(&self) -> Result<(), CacheError> {
        self.cache.flush()?;
        info!("Financial data service shut down");
        Ok(())
    }
}
