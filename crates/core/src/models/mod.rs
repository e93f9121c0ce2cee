//! Domain records returned by data providers and the queries that request them.

mod queries;
mod records;

pub use queries::{
    normalize_ticker, InsiderTradeQuery, LineItemQuery, MarketCapQuery, MetricsQuery, NewsQuery,
    Period, PriceQuery,
};
pub use records::{filter_line_items, CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::CacheNamespace;

/// The six kinds of data a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Prices,
    FinancialMetrics,
    MarketCap,
    LineItems,
    CompanyNews,
    InsiderTrades,
}

impl DataKind {
    pub const ALL: [DataKind; 6] = [
        DataKind::Prices,
        DataKind::FinancialMetrics,
        DataKind::MarketCap,
        DataKind::LineItems,
        DataKind::CompanyNews,
        DataKind::InsiderTrades,
    ];

    /// Name of the fetch operation serving this kind, used in telemetry and errors.
    pub fn operation_name(self) -> &'static str {
        match self {
            DataKind::Prices => "get_prices",
            DataKind::FinancialMetrics => "get_financial_metrics",
            DataKind::MarketCap => "get_market_cap",
            DataKind::LineItems => "search_line_items",
            DataKind::CompanyNews => "get_company_news",
            DataKind::InsiderTrades => "get_insider_trades",
        }
    }

    /// Cache namespace holding results of this kind.
    pub fn namespace(self) -> CacheNamespace {
        match self {
            DataKind::Prices => CacheNamespace::Prices,
            DataKind::FinancialMetrics => CacheNamespace::FinancialMetrics,
            DataKind::MarketCap => CacheNamespace::MarketCap,
            DataKind::LineItems => CacheNamespace::LineItems,
            DataKind::CompanyNews => CacheNamespace::CompanyNews,
            DataKind::InsiderTrades => CacheNamespace::InsiderTrades,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_name())
    }
}
