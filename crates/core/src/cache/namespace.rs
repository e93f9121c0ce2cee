use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CacheError;

/// How a namespace treats repeated writes to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Ordered record list, merged append-only on the record's natural key.
    List { key_field: &'static str },
    /// Opaque value, overwritten on every write.
    Scalar,
}

/// A logical partition of the cache, one per domain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    Prices,
    FinancialMetrics,
    LineItems,
    InsiderTrades,
    CompanyNews,
    MarketCap,
    AnalysisResults,
    LlmResponses,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 8] = [
        CacheNamespace::Prices,
        CacheNamespace::FinancialMetrics,
        CacheNamespace::LineItems,
        CacheNamespace::InsiderTrades,
        CacheNamespace::CompanyNews,
        CacheNamespace::MarketCap,
        CacheNamespace::AnalysisResults,
        CacheNamespace::LlmResponses,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Prices => "prices",
            CacheNamespace::FinancialMetrics => "financial_metrics",
            CacheNamespace::LineItems => "line_items",
            CacheNamespace::InsiderTrades => "insider_trades",
            CacheNamespace::CompanyNews => "company_news",
            CacheNamespace::MarketCap => "market_cap",
            CacheNamespace::AnalysisResults => "analysis_results",
            CacheNamespace::LlmResponses => "llm_responses",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            CacheNamespace::Prices => ValueKind::List { key_field: "time" },
            CacheNamespace::FinancialMetrics | CacheNamespace::LineItems => ValueKind::List {
                key_field: "report_period",
            },
            CacheNamespace::InsiderTrades => ValueKind::List {
                key_field: "filing_date",
            },
            CacheNamespace::CompanyNews => ValueKind::List { key_field: "date" },
            CacheNamespace::MarketCap
            | CacheNamespace::AnalysisResults
            | CacheNamespace::LlmResponses => ValueKind::Scalar,
        }
    }

    /// Natural key field for list namespaces, `None` for scalar ones.
    pub fn key_field(self) -> Option<&'static str> {
        match self.kind() {
            ValueKind::List { key_field } => Some(key_field),
            ValueKind::Scalar => None,
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheNamespace {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheNamespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| CacheError::UnknownNamespace(s.to_string()))
    }
}
