//! Financial Datasets client.
//!
//! Covers all six operations. Free tickers work without a key; an
//! `X-API-KEY` header is sent when one is configured.
//!
//! API documentation: https://docs.financialdatasets.ai

use async_trait::async_trait;
use finsource_core::models::{
    CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, LineItem, LineItemQuery,
    MarketCapQuery, MetricsQuery, NewsQuery, Price, PriceQuery,
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ProviderError;
use crate::provider::http::{build_client, send_json};
use crate::provider::{ProviderCapabilities, ProviderClient, RateLimit};

pub const PROVIDER_ID: &str = "financial_datasets";
const BASE_URL: &str = "https://api.financialdatasets.ai";

/// Statement fields requested on every line-item search so one cached
/// response can serve any later subset.
pub const STANDARD_LINE_ITEMS: &[&str] = &[
    "revenue",
    "gross_profit",
    "operating_income",
    "net_income",
    "operating_margin",
    "gross_margin",
    "free_cash_flow",
    "capital_expenditure",
    "depreciation_and_amortization",
    "research_and_development",
    "total_assets",
    "total_liabilities",
    "current_assets",
    "current_liabilities",
    "shareholders_equity",
    "working_capital",
    "total_debt",
    "cash_and_equivalents",
    "goodwill_and_intangible_assets",
    "outstanding_shares",
    "earnings_per_share",
    "dividends_and_other_cash_distributions",
    "issuance_or_purchase_of_equity_shares",
    "return_on_invested_capital",
    "debt_to_equity",
];

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    prices: Vec<Price>,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    financial_metrics: Vec<FinancialMetrics>,
}

#[derive(Debug, Deserialize)]
struct LineItemResponse {
    #[serde(default)]
    search_results: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news: Vec<CompanyNews>,
}

#[derive(Debug, Deserialize)]
struct InsiderTradeResponse {
    #[serde(default)]
    insider_trades: Vec<InsiderTrade>,
}

#[derive(Debug, Deserialize)]
struct CompanyFactsResponse {
    company_facts: CompanyFacts,
}

#[derive(Debug, Deserialize)]
struct CompanyFacts {
    #[serde(default)]
    market_cap: Option<f64>,
}

#[derive(Debug, Serialize)]
struct LineItemSearch<'a> {
    tickers: [&'a str; 1],
    line_items: Vec<&'a str>,
    end_date: String,
    period: &'a str,
    limit: usize,
}

pub struct FinancialDatasetsClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FinancialDatasetsClient {
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

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-API-KEY", key),
            None => request,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    /// Requested fields plus the standard set, without duplicates.
    fn superset<'a>(requested: &'a [String]) -> Vec<&'a str> {
        let mut fields: Vec<&str> = STANDARD_LINE_ITEMS.to_vec();
        for field in requested {
            if !fields.contains(&field.as_str()) {
                fields.push(field.as_str());
            }
        }
        fields
    }
}

#[async_trait]
impl ProviderClient for FinancialDatasetsClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::ALL
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60,
            burst: 10,
        }
    }

    async fn fetch_prices(&self, query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        debug!("Financial Datasets prices for {}", query.ticker);
        let request = self.get("/prices/").query(&[
            ("ticker", query.ticker.clone()),
            ("interval", "day".to_string()),
            ("interval_multiplier", "1".to_string()),
            ("start_date", query.start_date.to_string()),
            ("end_date", query.end_date.to_string()),
        ]);
        let response: PriceResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.prices)
    }

    async fn fetch_financial_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        let request = self.get("/financial-metrics/").query(&[
            ("ticker", query.ticker.clone()),
            ("report_period_lte", query.end_date.to_string()),
            ("limit", query.limit.to_string()),
            ("period", query.period.to_string()),
        ]);
        let response: MetricsResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.financial_metrics)
    }

    async fn fetch_market_cap(&self, query: &MarketCapQuery) -> Result<Option<f64>, ProviderError> {
        let request = self
            .get("/company/facts/")
            .query(&[("ticker", query.ticker.as_str())]);
        let response: CompanyFactsResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.company_facts.market_cap)
    }

    async fn fetch_line_items(&self, query: &LineItemQuery) -> Result<Vec<LineItem>, ProviderError> {
        let body = LineItemSearch {
            tickers: [query.ticker.as_str()],
            line_items: Self::superset(&query.line_items),
            end_date: query.end_date.to_string(),
            period: query.period.as_str(),
            limit: query.limit,
        };
        let request = self.authorize(
            self.client
                .post(format!("{}/financials/search/line-items", self.base_url))
                .json(&body),
        );
        let response: LineItemResponse = send_json(PROVIDER_ID, request).await?;
        Ok(response.search_results)
    }

    async fn fetch_company_news(&self, query: &NewsQuery) -> Result<Vec<CompanyNews>, ProviderError> {
        let mut params = vec![
            ("ticker", query.ticker.clone()),
            ("end_date", query.end_date.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(start) = query.start_date {
            params.push(("start_date", start.to_string()));
        }
        let response: NewsResponse = send_json(PROVIDER_ID, self.get("/news/").query(&params)).await?;
        Ok(response.news)
    }

    async fn fetch_insider_trades(
        &self,
        query: &InsiderTradeQuery,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        let mut params = vec![
            ("ticker", query.ticker.clone()),
            ("filing_date_lte", query.end_date.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(start) = query.start_date {
            params.push(("filing_date_gte", start.to_string()));
        }
        let response: InsiderTradeResponse =
            send_json(PROVIDER_ID, self.get("/insider-trades/").query(&params)).await?;
        Ok(response.insider_trades)
    }
}
