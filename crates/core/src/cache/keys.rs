//! Deterministic cache keys derived from request parameters.
//!
//! Keys start with the upper-cased ticker so that [`key_mentions_ticker`] can
//! find every entry for a symbol. The namespace already identifies the domain,
//! so keys carry no domain prefix.

use chrono::NaiveDate;

use super::CacheNamespace;
use crate::models::{
    InsiderTradeQuery, LineItemQuery, MarketCapQuery, MetricsQuery, NewsQuery, PriceQuery,
};

/// A request that maps to exactly one cache entry.
pub trait CacheKeyed {
    const NAMESPACE: CacheNamespace;

    fn cache_key(&self) -> String;
}

fn optional_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string())
}

impl CacheKeyed for PriceQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::Prices;

    fn cache_key(&self) -> String {
        format!("{}_{}_{}", self.ticker, self.start_date, self.end_date)
    }
}

impl CacheKeyed for MetricsQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::FinancialMetrics;

    fn cache_key(&self) -> String {
        format!("{}_{}_{}_{}", self.ticker, self.period, self.end_date, self.limit)
    }
}

impl CacheKeyed for MarketCapQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::MarketCap;

    fn cache_key(&self) -> String {
        format!("{}_{}", self.ticker, self.end_date)
    }
}

impl CacheKeyed for LineItemQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::LineItems;

    /// The requested field list is deliberately absent: one entry holds the
    /// full field superset for `(ticker, end_date, period, limit)`.
    fn cache_key(&self) -> String {
        format!("{}_{}_{}_{}", self.ticker, self.end_date, self.period, self.limit)
    }
}

impl CacheKeyed for NewsQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::CompanyNews;

    fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.ticker,
            optional_date(self.start_date),
            self.end_date,
            self.limit
        )
    }
}

impl CacheKeyed for InsiderTradeQuery {
    const NAMESPACE: CacheNamespace = CacheNamespace::InsiderTrades;

    fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.ticker,
            optional_date(self.start_date),
            self.end_date,
            self.limit
        )
    }
}

/// Key for a stored analysis result, e.g. `AAPL_valuation_2024-01-31`.
pub fn analysis_key(ticker: &str, analysis: &str, as_of: NaiveDate) -> String {
    format!("{}_{}_{}", ticker.trim().to_ascii_uppercase(), analysis, as_of)
}

/// True when `key` belongs to `ticker` under the `_`-delimited naming convention.
///
/// Matches the bare ticker, a `TICKER_` prefix, a `_TICKER` suffix or an
/// embedded `_TICKER_` segment.
pub fn key_mentions_ticker(key: &str, ticker: &str) -> bool {
    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return false;
    }
    let key = key.to_ascii_uppercase();
    key == ticker
        || key.starts_with(&format!("{ticker}_"))
        || key.ends_with(&format!("_{ticker}"))
        || key.contains(&format!("_{ticker}_"))
}
