//! Yahoo Finance client.
//!
//! Free and keyless, but only daily price history is exposed through the
//! chart API; every other operation reports `NotSupported`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use finsource_core::models::{Price, PriceQuery};
use finsource_core::DataKind;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::ProviderError;
use crate::provider::http::{unix_end_of, unix_start_of};
use crate::provider::{ProviderCapabilities, ProviderClient, RateLimit};

pub const PROVIDER_ID: &str = "yahoo";

pub struct YahooClient {
    connector: Result<yahoo::YahooConnector, String>,
}

impl YahooClient {
    /// Builds the client. A connector that fails to initialise leaves the
    /// client unavailable instead of failing construction.
    pub fn new() -> Self {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            warn!("Failed to initialize Yahoo connector: {}", e);
            e.to_string()
        });
        Self { connector }
    }

    fn connector(&self) -> Result<&yahoo::YahooConnector, ProviderError> {
        self.connector.as_ref().map_err(|reason| ProviderError::Unavailable {
            provider: PROVIDER_ID.to_string(),
            reason: reason.clone(),
        })
    }

    fn to_offset(timestamp: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(timestamp).unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn convert(quote: &yahoo::Quote) -> Option<Price> {
        let time: DateTime<Utc> = Utc.timestamp_opt(quote.timestamp as i64, 0).single()?;
        Some(Price {
            time: time.format("%Y-%m-%d").to_string(),
            open: quote.open,
            close: quote.close,
            high: quote.high,
            low: quote.low,
            volume: i64::try_from(quote.volume).unwrap_or(i64::MAX),
            adj_close: Some(quote.adjclose),
        })
    }

    fn in_range(price: &Price, start: NaiveDate, end: NaiveDate) -> bool {
        NaiveDate::parse_from_str(&price.time, "%Y-%m-%d")
            .map(|day| day >= start && day <= end)
            .unwrap_or(false)
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for YahooClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            operations: &[DataKind::Prices],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 30,
            burst: 5,
        }
    }

    fn is_available(&self) -> bool {
        self.connector.is_ok()
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.connector.as_ref().err().cloned()
    }

    async fn fetch_prices(&self, query: &PriceQuery) -> Result<Vec<Price>, ProviderError> {
        let connector = self.connector()?;
        debug!(
            "Fetching Yahoo prices for {} from {} to {}",
            query.ticker, query.start_date, query.end_date
        );

        let start = Self::to_offset(unix_start_of(query.start_date));
        let end = Self::to_offset(unix_end_of(query.end_date));

        let response = match connector.get_quote_history(&query.ticker, start, end).await {
            Ok(response) => response,
            Err(yahoo::YahooError::NoQuotes) | Err(yahoo::YahooError::NoResult) => {
                return Ok(Vec::new())
            }
            Err(e) => {
                return Err(ProviderError::Network {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })
            }
        };

        match response.quotes() {
            Ok(quotes) => Ok(quotes
                .iter()
                .filter_map(Self::convert)
                .filter(|p| Self::in_range(p, query.start_date, query.end_date))
                .collect()),
            Err(yahoo::YahooError::NoQuotes) => Ok(Vec::new()),
            Err(e) => Err(ProviderError::malformed(PROVIDER_ID, e.to_string())),
        }
    }
}
