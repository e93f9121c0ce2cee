use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single OHLCV price bar. `time` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub time: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
}

/// Valuation, profitability and growth metrics for one reporting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub report_period: String,
    pub period: String,
    pub currency: String,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub price_to_earnings_ratio: Option<f64>,
    pub price_to_book_ratio: Option<f64>,
    pub price_to_sales_ratio: Option<f64>,
    pub enterprise_value_to_ebitda_ratio: Option<f64>,
    pub enterprise_value_to_revenue_ratio: Option<f64>,
    pub free_cash_flow_yield: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub return_on_invested_capital: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub inventory_turnover: Option<f64>,
    pub receivables_turnover: Option<f64>,
    pub days_sales_outstanding: Option<f64>,
    pub operating_cycle: Option<f64>,
    pub working_capital_turnover: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub cash_ratio: Option<f64>,
    pub operating_cash_flow_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub debt_to_assets: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub book_value_growth: Option<f64>,
    pub earnings_per_share_growth: Option<f64>,
    pub free_cash_flow_growth: Option<f64>,
    pub operating_income_growth: Option<f64>,
    pub ebitda_growth: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub earnings_per_share: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
}

/// A financial statement snapshot carrying an open set of named fields.
///
/// Providers disagree on which statement fields they expose, so the values
/// live in a flattened map rather than fixed struct fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticker: String,
    pub report_period: String,
    pub period: String,
    pub currency: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl LineItem {
    pub fn new(ticker: &str, report_period: &str, period: &str, currency: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            report_period: report_period.to_string(),
            period: period.to_string(),
            currency: currency.to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), Some(value));
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    /// Narrows the record to `fields`, or `None` if it carries none of them.
    pub fn project(&self, fields: &[String]) -> Option<LineItem> {
        let values: BTreeMap<String, Option<f64>> = fields
            .iter()
            .filter_map(|field| self.value(field).map(|v| (field.clone(), Some(v))))
            .collect();

        if values.is_empty() {
            return None;
        }

        Some(LineItem {
            ticker: self.ticker.clone(),
            report_period: self.report_period.clone(),
            period: self.period.clone(),
            currency: self.currency.clone(),
            values,
        })
    }
}

/// Filters a superset of line items down to the requested fields.
///
/// Records contributing none of the requested fields are dropped.
pub fn filter_line_items(items: &[LineItem], fields: &[String]) -> Vec<LineItem> {
    items.iter().filter_map(|item| item.project(fields)).collect()
}

/// A news article mentioning a ticker. `date` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyNews {
    pub ticker: String,
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

/// An insider transaction filing. `filing_date` is the natural key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsiderTrade {
    pub ticker: String,
    pub filing_date: String,
    pub issuer: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub is_board_director: Option<bool>,
    pub transaction_date: Option<String>,
    pub transaction_shares: Option<f64>,
    pub transaction_price_per_share: Option<f64>,
    pub transaction_value: Option<f64>,
    pub shares_owned_before_transaction: Option<f64>,
    pub shares_owned_after_transaction: Option<f64>,
    pub security_title: Option<String>,
}
