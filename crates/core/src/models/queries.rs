use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

pub const DEFAULT_METRICS_LIMIT: usize = 10;
pub const DEFAULT_LINE_ITEMS_LIMIT: usize = 10;
pub const DEFAULT_NEWS_LIMIT: usize = 1000;
pub const DEFAULT_INSIDER_TRADES_LIMIT: usize = 1000;

/// Reporting period of a financial statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Ttm,
    Annual,
    Quarterly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Ttm => "ttm",
            Period::Annual => "annual",
            Period::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ttm" => Ok(Period::Ttm),
            "annual" | "yearly" => Ok(Period::Annual),
            "quarterly" | "quarter" => Ok(Period::Quarterly),
            other => Err(ValidationError::UnknownPeriod(other.to_string())),
        }
    }
}

/// Trims and upper-cases a ticker symbol.
pub fn normalize_ticker(ticker: &str) -> Result<String, ValidationError> {
    let normalized = ticker.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(ValidationError::EmptyTicker);
    }
    Ok(normalized)
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::InvertedDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PriceQuery {
    pub fn new(ticker: &str, start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, ValidationError> {
        check_range(start_date, end_date)?;
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            start_date,
            end_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsQuery {
    pub ticker: String,
    pub end_date: NaiveDate,
    pub period: Period,
    pub limit: usize,
}

impl MetricsQuery {
    pub fn new(ticker: &str, end_date: NaiveDate) -> Result<Self, ValidationError> {
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            end_date,
            period: Period::Ttm,
            limit: DEFAULT_METRICS_LIMIT,
        })
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCapQuery {
    pub ticker: String,
    pub end_date: NaiveDate,
}

impl MarketCapQuery {
    pub fn new(ticker: &str, end_date: NaiveDate) -> Result<Self, ValidationError> {
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            end_date,
        })
    }
}

/// A request for specific statement fields.
///
/// `line_items` selects the fields returned to the caller; the cache key
/// ignores it so every field subset shares one cached superset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemQuery {
    pub ticker: String,
    pub line_items: Vec<String>,
    pub end_date: NaiveDate,
    pub period: Period,
    pub limit: usize,
}

impl LineItemQuery {
    pub fn new<S: AsRef<str>>(
        ticker: &str,
        line_items: &[S],
        end_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let line_items: Vec<String> = line_items
            .iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if line_items.is_empty() {
            return Err(ValidationError::InvalidInput(
                "at least one line item is required".to_string(),
            ));
        }
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            line_items,
            end_date,
            period: Period::Ttm,
            limit: DEFAULT_LINE_ITEMS_LIMIT,
        })
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsQuery {
    pub ticker: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub limit: usize,
}

impl NewsQuery {
    pub fn new(ticker: &str, end_date: NaiveDate) -> Result<Self, ValidationError> {
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            start_date: None,
            end_date,
            limit: DEFAULT_NEWS_LIMIT,
        })
    }

    pub fn with_start(mut self, start_date: NaiveDate) -> Result<Self, ValidationError> {
        check_range(start_date, self.end_date)?;
        self.start_date = Some(start_date);
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsiderTradeQuery {
    pub ticker: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub limit: usize,
}

impl InsiderTradeQuery {
    pub fn new(ticker: &str, end_date: NaiveDate) -> Result<Self, ValidationError> {
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
            start_date: None,
            end_date,
            limit: DEFAULT_INSIDER_TRADES_LIMIT,
        })
    }

    pub fn with_start(mut self, start_date: NaiveDate) -> Result<Self, ValidationError> {
        check_range(start_date, self.end_date)?;
        self.start_date = Some(start_date);
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_ticker_is_normalized() {
        let q = PriceQuery::new(" aapl ", date("2024-01-01"), date("2024-01-31")).unwrap();
        assert_eq!(q.ticker, "AAPL");
    }

    #[test]
    fn test_empty_ticker_rejected() {
        assert_eq!(
            MarketCapQuery::new("  ", date("2024-01-01")).unwrap_err(),
            ValidationError::EmptyTicker
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = PriceQuery::new("AAPL", date("2024-02-01"), date("2024-01-01")).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedDateRange { .. }));
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("TTM".parse::<Period>().unwrap(), Period::Ttm);
        assert_eq!("quarter".parse::<Period>().unwrap(), Period::Quarterly);
        assert!("weekly".parse::<Period>().is_err());
    }

    #[test]
    fn test_line_item_query_requires_fields() {
        let empty: [&str; 0] = [];
        assert!(LineItemQuery::new("AAPL", &empty, date("2024-01-01")).is_err());
        let q = LineItemQuery::new("AAPL", &["revenue", " "], date("2024-01-01")).unwrap();
        assert_eq!(q.line_items, vec!["revenue".to_string()]);
    }
}
