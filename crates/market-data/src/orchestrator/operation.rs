//! The six logical operations as data, and their dispatch onto a source.

use finsource_core::models::{
    CompanyNews, FinancialMetrics, InsiderTrade, InsiderTradeQuery, LineItem, LineItemQuery,
    MarketCapQuery, MetricsQuery, NewsQuery, Price, PriceQuery,
};
use finsource_core::DataKind;
use serde::Serialize;

use crate::adapter::DataSource;
use crate::errors::ProviderError;

/// A logical request, independent of which source serves it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Prices(PriceQuery),
    FinancialMetrics(MetricsQuery),
    MarketCap(MarketCapQuery),
    LineItems(LineItemQuery),
    CompanyNews(NewsQuery),
    InsiderTrades(InsiderTradeQuery),
}

impl Operation {
    pub fn kind(&self) -> DataKind {
        match self {
            Operation::Prices(_) => DataKind::Prices,
            Operation::FinancialMetrics(_) => DataKind::FinancialMetrics,
            Operation::MarketCap(_) => DataKind::MarketCap,
            Operation::LineItems(_) => DataKind::LineItems,
            Operation::CompanyNews(_) => DataKind::CompanyNews,
            Operation::InsiderTrades(_) => DataKind::InsiderTrades,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().operation_name()
    }

    pub fn ticker(&self) -> &str {
        match self {
            Operation::Prices(q) => &q.ticker,
            Operation::FinancialMetrics(q) => &q.ticker,
            Operation::MarketCap(q) => &q.ticker,
            Operation::LineItems(q) => &q.ticker,
            Operation::CompanyNews(q) => &q.ticker,
            Operation::InsiderTrades(q) => &q.ticker,
        }
    }

    /// Calls the matching method on `source`.
    pub async fn dispatch(
        &self,
        source: &dyn DataSource,
        force_refresh: bool,
    ) -> Result<OperationOutput, ProviderError> {
        Ok(match self {
            Operation::Prices(q) => OperationOutput::Prices(source.get_prices(q, force_refresh).await?),
            Operation::FinancialMetrics(q) => OperationOutput::FinancialMetrics(
                source.get_financial_metrics(q, force_refresh).await?,
            ),
            Operation::MarketCap(q) => {
                OperationOutput::MarketCap(source.get_market_cap(q, force_refresh).await?)
            }
            Operation::LineItems(q) => {
                OperationOutput::LineItems(source.search_line_items(q, force_refresh).await?)
            }
            Operation::CompanyNews(q) => {
                OperationOutput::CompanyNews(source.get_company_news(q, force_refresh).await?)
            }
            Operation::InsiderTrades(q) => {
                OperationOutput::InsiderTrades(source.get_insider_trades(q, force_refresh).await?)
            }
        })
    }
}

/// Result of an [`Operation`]: a record list, or an optional scalar for
/// market cap.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Prices(Vec<Price>),
    FinancialMetrics(Vec<FinancialMetrics>),
    MarketCap(Option<f64>),
    LineItems(Vec<LineItem>),
    CompanyNews(Vec<CompanyNews>),
    InsiderTrades(Vec<InsiderTrade>),
}

impl OperationOutput {
    /// The "nothing found" value for `kind`: an empty list or `None`.
    pub fn empty_for(kind: DataKind) -> Self {
        match kind {
            DataKind::Prices => OperationOutput::Prices(Vec::new()),
            DataKind::FinancialMetrics => OperationOutput::FinancialMetrics(Vec::new()),
            DataKind::MarketCap => OperationOutput::MarketCap(None),
            DataKind::LineItems => OperationOutput::LineItems(Vec::new()),
            DataKind::CompanyNews => OperationOutput::CompanyNews(Vec::new()),
            DataKind::InsiderTrades => OperationOutput::InsiderTrades(Vec::new()),
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            OperationOutput::Prices(v) => v.len(),
            OperationOutput::FinancialMetrics(v) => v.len(),
            OperationOutput::MarketCap(v) => usize::from(v.is_some()),
            OperationOutput::LineItems(v) => v.len(),
            OperationOutput::CompanyNews(v) => v.len(),
            OperationOutput::InsiderTrades(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    pub fn into_prices(self) -> Vec<Price> {
        match self {
            OperationOutput::Prices(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_financial_metrics(self) -> Vec<FinancialMetrics> {
        match self {
            OperationOutput::FinancialMetrics(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_market_cap(self) -> Option<f64> {
        match self {
            OperationOutput::MarketCap(v) => v,
            _ => None,
        }
    }

    pub fn into_line_items(self) -> Vec<LineItem> {
        match self {
            OperationOutput::LineItems(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_company_news(self) -> Vec<CompanyNews> {
        match self {
            OperationOutput::CompanyNews(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_insider_trades(self) -> Vec<InsiderTrade> {
        match self {
            OperationOutput::InsiderTrades(v) => v,
            _ => Vec::new(),
        }
    }
}
