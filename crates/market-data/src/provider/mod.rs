//! External data providers.
//!
//! This module contains:
//! - The [`ProviderClient`] trait every provider implements
//! - Capability sets and per-provider rate limits
//! - The concrete clients (Yahoo, Financial Datasets, Polygon, Finnhub)
//! - [`ProviderKind`], mapping configured names and aliases to clients

mod capabilities;
mod http;
mod traits;

pub mod financial_datasets;
pub mod finnhub;
pub mod polygon;
pub mod yahoo;

use std::sync::Arc;

use serde::Serialize;

pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::ProviderClient;

use crate::settings::ProviderCredentials;

/// The built-in providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Yahoo,
    FinancialDatasets,
    Polygon,
    Finnhub,
}

impl ProviderKind {
    /// Registration order, which is also the default fallback order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Yahoo,
        ProviderKind::FinancialDatasets,
        ProviderKind::Polygon,
        ProviderKind::Finnhub,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Yahoo => yahoo::PROVIDER_ID,
            ProviderKind::FinancialDatasets => financial_datasets::PROVIDER_ID,
            ProviderKind::Polygon => polygon::PROVIDER_ID,
            ProviderKind::Finnhub => finnhub::PROVIDER_ID,
        }
    }

    /// Alternative names accepted in configuration.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Yahoo => &["yfinance", "yahoo_finance", "free"],
            ProviderKind::FinancialDatasets => &["fd", "financialdatasets", "premium"],
            ProviderKind::Polygon => &["polygon.io", "poly"],
            ProviderKind::Finnhub => &[],
        }
    }

    /// Case-insensitive lookup by canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.aliases().contains(&name.as_str()))
    }

    pub fn build_client(self, credentials: &ProviderCredentials) -> Arc<dyn ProviderClient> {
        match self {
            ProviderKind::Yahoo => Arc::new(yahoo::YahooClient::new()),
            ProviderKind::FinancialDatasets => Arc::new(
                financial_datasets::FinancialDatasetsClient::new(
                    credentials.financial_datasets_api_key.clone(),
                ),
            ),
            ProviderKind::Polygon => {
                Arc::new(polygon::PolygonClient::new(credentials.polygon_api_key.clone()))
            }
            ProviderKind::Finnhub => {
                Arc::new(finnhub::FinnhubClient::new(credentials.finnhub_api_key.clone()))
            }
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
