//! Finnhub client.
//!
//! - Daily candles via `/stock/candle`
//! - Basic financials via `/stock/metric`
//! - Market cap via `/stock/profile2`
//! - News via `/company-news`
//! - Insider transactions via `/stock/insider-transactions`
//!
//! Free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use finsource_core::models::{
    CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, MarketCapQuery, MetricsQuery,
    NewsQuery, Price, PriceQuery,
};
use finsource_core::DataKind;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::errors::ProviderError;
use crate::provider::http::{build_client, send_json, unix_end_of, unix_start_of};
use crate::provider::{ProviderCapabilities, ProviderClient, RateLimit};

pub const PROVIDER_ID: &str = "finnhub";
const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Lookback used when a news or insider query has no start date.
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Response from /stock/candle
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// "ok" or "no_data"
    s: String,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
    #[serde(default)]
    t: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    /// In millions.
    market_capitalization: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    headline: String,
    /// Unix seconds.
    datetime: i64,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsiderResponse {
    #[serde(default)]
    data: Vec<InsiderTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsiderTransaction {
    name: Option<String>,
    /// Shares held after the transaction.
    share: Option<f64>,
    /// Signed change in shares.
    change: Option<f64>,
    filing_date: Option<String>,
    transaction_date: Option<String>,
    transaction_price: Option<f64>,
}

pub struct FinnhubClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FinnhubClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: build_client(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| ProviderError::Unavailable {
            provider: PROVIDER_ID.to_string(),
            reason: "FINNHUB_API_KEY is not set".to_string(),
        })?;
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Finnhub-Token", key))
    }

    fn candles_to_prices(response: &CandleResponse) -> Vec<Price> {
        if response.s != "ok" {
            return Vec::new();
        }
        response
            .t
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let time = Utc.timestamp_opt(*ts, 0).single()?;
                Some(Price {
                    time: time.format("%Y-%m-%d").to_string(),
                    open: *response.o.get(i)?,
                    close: *response.c.get(i)?,
                    high: *response.h.get(i)?,
                    low: *response.l.get(i)?,
                    volume: response.v.get(i).map(|v| v.round() as i64).unwrap_or(0),
                    adj_close: None,
                })
            })
            .collect()
    }

    /// Maps Finnhub's `metric` bag onto one TTM snapshot dated `report_period`.
    ///
    /// Finnhub reports margins and returns in percent; they are scaled to ratios.
    fn metrics_snapshot(
        ticker: &str,
        report_period: &str,
        metric: &HashMap<String, serde_json::Value>,
    ) -> Option<FinancialMetrics> {
        let num = |key: &str| metric.get(key).and_then(serde_json::Value::as_f64);
        let pct = |key: &str| num(key).map(|v| v / 100.0);

        let snapshot = FinancialMetrics {
            ticker: ticker.to_string(),
            report_period: report_period.to_string(),
            period: "ttm".to_string(),
            currency: "USD".to_string(),
            market_cap: num("marketCapitalization").map(|m| m * 1_000_000.0),
            price_to_earnings_ratio: num("peTTM"),
            price_to_book_ratio: num("pbAnnual"),
            price_to_sales_ratio: num("psTTM"),
            gross_margin: pct("grossMarginTTM"),
            operating_margin: pct("operatingMarginTTM"),
            net_margin: pct("netProfitMarginTTM"),
            return_on_equity: pct("roeTTM"),
            return_on_assets: pct("roaTTM"),
            current_ratio: num("currentRatioAnnual"),
            quick_ratio: num("quickRatioAnnual"),
            debt_to_equity: num("totalDebt/totalEquityAnnual"),
            revenue_growth: pct("revenueGrowthTTMYoy"),
            earnings_per_share_growth: pct("epsGrowthTTMYoy"),
            payout_ratio: pct("payoutRatioTTM"),
            earnings_per_share: num("epsTTM"),
            book_value_per_share: num("bookValuePerShareAnnual"),
            ..FinancialMetrics::default()
        };

        if metric.is_empty() {
            None
        } else {
            Some(snapshot)
        }
    }

    fn to_news(ticker: &str, item: NewsItem) -> Option<CompanyNews> {
        let date = Utc.timestamp_opt(item.datetime, 0).single()?;
        Some(CompanyNews {
            ticker: ticker.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            title: item.headline,
            content: item.summary,
            url: item.url,
            source: item.source,
            author: None,
            sentiment: None,
        })
    }

    fn to_insider_trade(ticker: &str, tx: InsiderTransaction) -> Option<InsiderTrade> {
        let filing_date = tx.filing_date?;
        let shares_after = tx.share;
        let shares_before = match (tx.share, tx.change) {
            (Some(after), Some(change)) => Some(after - change),
            _ => None,
        };
        Some(InsiderTrade {
            ticker: ticker.to_string(),
            filing_date,
            name: tx.name,
            transaction_date: tx.transaction_date,
            transaction_shares: tx.change,
            transaction_price_per_share: tx.transaction_price,
            transaction_value: tx.change.zip(tx.transaction_price).map(|(c, p)| c * p),
            shares_owned_before_transaction: shares_before,
            shares_owned_after_transaction: shares_after,
            ..InsiderTrade::default()
        })
    }

    fn date_window(start: Option<chrono::NaiveDate>, end: chrono::NaiveDate) -> (String, String) {
        let start = start.unwrap_or_else(|| end - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS));
        (start.to_string(), end.to_string())
    }
}

#[async_trait]
impl ProviderClient for FinnhubClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            operations: &[
                DataKind::Prices,
                DataKind::FinancialMetrics,
                DataKind::MarketCap,
                DataKind::CompanyNews,
                DataKind::InsiderTrades,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60,
            burst: 10,
        }
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.api_key.is_none() {
            Some("FINNHUB_API_KEY is not set".to_string())
        } else {
            None
        }
    }

    async fn fetch_prices(&self, query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        debug!("Finnhub candles for {}", query.ticker);
        let request = self.get("/stock/candle")?.query(&[
            ("symbol", query.ticker.clone()),
            ("resolution", "D".to_string()),
            ("from", unix_start_of(query.start_date).to_string()),
            ("to", unix_end_of(query.end_date).to_string()),
        ]);
        let response: CandleResponse = send_json(PROVIDER_ID, request).await?;
        Ok(Self::candles_to_prices(&response))
    }

    async fn fetch_financial_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        let request = self
            .get("/stock/metric")?
            .query(&[("symbol", query.ticker.as_str()), ("metric", "all")]);
        let response: MetricResponse = send_json(PROVIDER_ID, request).await?;
        Ok(
            Self::metrics_snapshot(&query.ticker, &query.end_date.to_string(), &response.metric)
                .into_iter()
                .collect(),
        )
    }

    async fn fetch_market_cap(&self, query: &MarketCapQuery) -> Result<Option<f64>, ProviderError> {
        let request = self
            .get("/stock/profile2")?
            .query(&[("symbol", query.ticker.as_str())]);
        let response: ProfileResponse = send_json(PROVIDER_ID, request).await?;
        debug!(
            "Finnhub profile for {} reports currency {:?}",
            query.ticker, response.currency
        );
        Ok(response.market_capitalization.map(|m| m * 1_000_000.0))
    }

    async fn fetch_company_news(&self, query: &NewsQuery) -> Result<Vec<CompanyNews>, ProviderError> {
        let (from, to) = Self::date_window(query.start_date, query.end_date);
        let request = self.get("/company-news")?.query(&[
            ("symbol", query.ticker.as_str()),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ]);
        let items: Vec<NewsItem> = send_json(PROVIDER_ID, request).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| Self::to_news(&query.ticker, item))
            .take(query.limit)
            .collect())
    }

    async fn fetch_insider_trades(
        &self,
        query: &InsiderTradeQuery,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        let (from, to) = Self::date_window(query.start_date, query.end_date);
        let request = self.get("/stock/insider-transactions")?.query(&[
            ("symbol", query.ticker.as_str()),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ]);
        let response: InsiderResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response
            .data
            .into_iter()
            .filter_map(|tx| Self::to_insider_trade(&query.ticker, tx))
            .take(query.limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candles_zip_by_index() {
        let response: CandleResponse = serde_json::from_value(json!({
            "s": "ok",
            "c": [2.0, 3.0], "h": [2.5, 3.5], "l": [1.5, 2.5], "o": [1.8, 2.8],
            "v": [100.0, 200.0], "t": [1704067200, 1704153600]
        }))
        .unwrap();
        let prices = FinnhubClient::candles_to_prices(&response);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].time, "2024-01-02");
        assert_eq!(prices[1].volume, 200);
    }

    #[test]
    fn test_no_data_yields_empty() {
        let response: CandleResponse = serde_json::from_value(json!({"s": "no_data"})).unwrap();
        assert!(FinnhubClient::candles_to_prices(&response).is_empty());
    }

    #[test]
    fn test_metrics_scale_percentages() {
        let metric: HashMap<String, serde_json::Value> = serde_json::from_value(json!({
            "roeTTM": 150.0,
            "peTTM": 30.5,
            "marketCapitalization": 3000000.0
        }))
        .unwrap();
        let snapshot = FinnhubClient::metrics_snapshot("AAPL", "2024-01-31", &metric).unwrap();
        assert_eq!(snapshot.return_on_equity, Some(1.5));
        assert_eq!(snapshot.price_to_earnings_ratio, Some(30.5));
        assert_eq!(snapshot.market_cap, Some(3_000_000_000_000.0));
        assert!(FinnhubClient::metrics_snapshot("AAPL", "2024-01-31", &HashMap::new()).is_none());
    }

    #[test]
    fn test_insider_trade_requires_filing_date() {
        let tx: InsiderTransaction = serde_json::from_value(json!({
            "name": "Jane Doe",
            "share": 1000.0,
            "change": -200.0,
            "filingDate": "2024-02-01",
            "transactionPrice": 10.0
        }))
        .unwrap();
        let trade = FinnhubClient::to_insider_trade("AAPL", tx).unwrap();
        assert_eq!(trade.shares_owned_before_transaction, Some(1200.0));
        assert_eq!(trade.transaction_value, Some(-2000.0));

        let missing: InsiderTransaction = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert!(FinnhubClient::to_insider_trade("AAPL", missing).is_none());
    }
}
