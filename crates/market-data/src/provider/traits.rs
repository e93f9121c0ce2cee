//! Provider trait definitions.
//!
//! [`ProviderClient`] is the thin HTTP layer: one implementation per external
//! provider, turning a query into typed records. It knows nothing about
//! caching or rate limiting; [`ProviderAdapter`](crate::adapter::ProviderAdapter)
//! wraps it with both.

use async_trait::async_trait;
use finsource_core::models::{
    CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, LineItem, LineItemQuery,
    MarketCapQuery, MetricsQuery, NewsQuery, Price, PriceQuery,
};
use finsource_core::DataKind;

use crate::errors::ProviderError;

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Raw fetch interface of an external data provider.
///
/// Every operation has a default returning [`ProviderError::NotSupported`], so
/// a client only implements what its capability set declares.
///
/// # Example
///
/// ```ignore
/// struct MyClient;
///
/// #[async_trait]
/// impl ProviderClient for MyClient {
///     fn id(&self) -> &'static str {
///         "my_provider"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities { operations: &[DataKind::Prices] }
///     }
///
///     async fn fetch_prices(&self, query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
///         // ... call the API
///     }
/// }
/// ```
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Canonical provider name, e.g. "yahoo". Also the rate limiter endpoint.
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> ProviderCapabilities;

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Whether the client is configured well enough to make calls.
    fn is_available(&self) -> bool {
        true
    }

    /// Why the client is unavailable, if it is.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    async fn fetch_prices(&self, _query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        Err(ProviderError::not_supported(DataKind::Prices.operation_name(), self.id()))
    }

    async fn fetch_financial_metrics(
        &self,
        _query: &MetricsQuery,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        Err(ProviderError::not_supported(
            DataKind::FinancialMetrics.operation_name(),
            self.id(),
        ))
    }

    async fn fetch_market_cap(&self, _query: &MarketCapQuery) -> Result<Option<f64>, ProviderError> {
        Err(ProviderError::not_supported(DataKind::MarketCap.operation_name(), self.id()))
    }

    /// Fetches every available statement field for the query's period.
    ///
    /// Implementations ignore `query.line_items`; narrowing happens after caching.
    async fn fetch_line_items(&self, _query: &LineItemQuery) -> Result<Vec<LineItem>, ProviderError> {
        Err(ProviderError::not_supported(DataKind::LineItems.operation_name(), self.id()))
    }

    async fn fetch_company_news(&self, _query: &NewsQuery) -> Result<Vec<CompanyNews>, ProviderError> {
        Err(ProviderError::not_supported(DataKind::CompanyNews.operation_name(), self.id()))
    }

    async fn fetch_insider_trades(
        &self,
        _query: &InsiderTradeQuery,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        Err(ProviderError::not_supported(
            DataKind::InsiderTrades.operation_name(),
            self.id(),
        ))
    }
}
