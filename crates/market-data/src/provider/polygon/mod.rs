//! Polygon.io client.
//!
//! - Daily aggregates via `/v2/aggs`
//! - Market cap via `/v3/reference/tickers/{ticker}`
//! - Statement fields via `/vX/reference/financials`
//! - News via `/v2/reference/news`
//!
//! Requires an API key. API documentation: https://polygon.io/docs/stocks

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use finsource_core::models::{
    CompanyNews, LineItem, LineItemQuery, MarketCapQuery, NewsQuery, Period, Price, PriceQuery,
};
use finsource_core::DataKind;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use urlencoding::encode;

use crate::errors::ProviderError;
use crate::provider::http::{build_client, send_json};
use crate::provider::{ProviderCapabilities, ProviderClient, RateLimit};

pub const PROVIDER_ID: &str = "polygon";
const BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<Aggregate>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
    /// Bar start, unix milliseconds.
    t: i64,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    title: String,
    published_utc: String,
    #[serde(default)]
    article_url: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    publisher: Option<Publisher>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialsReport>,
}

#[derive(Debug, Deserialize)]
struct FinancialsReport {
    end_date: String,
    #[serde(default)]
    financials: BTreeMap<String, BTreeMap<String, Value>>,
}

pub struct PolygonClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl PolygonClient {
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
            reason: "POLYGON_API_KEY is not set".to_string(),
        })?;
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("apiKey", key)]))
    }

    fn timeframe(period: Period) -> &'static str {
        match period {
            Period::Ttm => "ttm",
            Period::Annual => "annual",
            Period::Quarterly => "quarterly",
        }
    }

    fn to_price(bar: &Aggregate) -> Option<Price> {
        let time = Utc.timestamp_millis_opt(bar.t).single()?;
        Some(Price {
            time: time.format("%Y-%m-%d").to_string(),
            open: bar.o,
            close: bar.c,
            high: bar.h,
            low: bar.l,
            volume: bar.v.round() as i64,
            adj_close: None,
        })
    }

    fn to_news(ticker: &str, article: NewsArticle) -> CompanyNews {
        CompanyNews {
            ticker: ticker.to_string(),
            date: article
                .published_utc
                .get(..10)
                .unwrap_or(&article.published_utc)
                .to_string(),
            title: article.title,
            content: article.description,
            url: article.article_url,
            source: article.publisher.and_then(|p| p.name),
            author: article.author,
            sentiment: None,
        }
    }

    /// Flattens every statement section into one field map.
    ///
    /// Polygon nests values as `financials.<statement>.<field>.value`.
    fn to_line_item(ticker: &str, period: Period, report: FinancialsReport) -> LineItem {
        let mut item = LineItem::new(ticker, &report.end_date, period.as_str(), "USD");
        for fields in report.financials.values() {
            for (name, entry) in fields {
                if let Some(value) = entry.get("value").and_then(Value::as_f64) {
                    item.values.entry(name.clone()).or_insert(Some(value));
                }
            }
        }
        item
    }
}

#[async_trait]
impl ProviderClient for PolygonClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            operations: &[
                DataKind::Prices,
                DataKind::MarketCap,
                DataKind::LineItems,
                DataKind::CompanyNews,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 300,
            burst: 20,
        }
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.api_key.is_none() {
            Some("POLYGON_API_KEY is not set".to_string())
        } else {
            None
        }
    }

    async fn fetch_prices(&self, query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        let path = format!(
            "/v2/aggs/ticker/{}/range/1/day/{}/{}",
            encode(&query.ticker),
            query.start_date,
            query.end_date
        );
        debug!("Polygon aggregates for {}", query.ticker);
        let request = self.get(&path)?.query(&[
            ("adjusted", "true"),
            ("sort", "asc"),
            ("limit", "50000"),
        ]);
        let response: AggregatesResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.results.iter().filter_map(Self::to_price).collect())
    }

    async fn fetch_market_cap(&self, query: &MarketCapQuery) -> Result<Option<f64>, ProviderError> {
        let path = format!("/v3/reference/tickers/{}", encode(&query.ticker));
        let request = self.get(&path)?.query(&[("date", query.end_date.to_string())]);
        let response: TickerDetailsResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.results.and_then(|d| d.market_cap))
    }

    async fn fetch_line_items(&self, query: &LineItemQuery) -> Result<Vec<LineItem>, ProviderError> {
        let request = self.get("/vX/reference/financials")?.query(&[
            ("ticker", query.ticker.clone()),
            ("period_of_report_date.lte", query.end_date.to_string()),
            ("timeframe", Self::timeframe(query.period).to_string()),
            ("limit", query.limit.to_string()),
            ("sort", "period_of_report_date".to_string()),
            ("order", "desc".to_string()),
        ]);
        let response: FinancialsResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response
            .results
            .into_iter()
            .map(|report| Self::to_line_item(&query.ticker, query.period, report))
            .collect())
    }

    async fn fetch_company_news(&self, query: &NewsQuery) -> Result<Vec<CompanyNews>, ProviderError> {
        let mut params = vec![
            ("ticker", query.ticker.clone()),
            ("published_utc.lte", query.end_date.to_string()),
            ("limit", query.limit.min(1000).to_string()),
            ("order", "desc".to_string()),
        ];
        if let Some(start) = query.start_date {
            params.push(("published_utc.gte", start.to_string()));
        }
        let request = self.get("/v2/reference/news")?.query(&params);
        let response: NewsResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response
            .results
            .into_iter()
            .map(|article| Self::to_news(&query.ticker, article))
            .collect())
    }
}
