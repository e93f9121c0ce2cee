//! Shared request plumbing for the HTTP-based clients.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{mentions_rate_limit, ProviderError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Sends `request` and decodes a JSON body.
///
/// Non-success statuses map through [`ProviderError::from_status`]; a 200 whose
/// body is a bare throttling notice maps to `RateLimited`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    debug!("{} responded {} ({} bytes)", provider, status, body.len());

    if !status.is_success() {
        return Err(ProviderError::from_status(provider, status.as_u16(), truncate(&body)));
    }

    serde_json::from_str(&body).map_err(|e| {
        if mentions_rate_limit(&body) && body.len() < MAX_ERROR_BODY {
            ProviderError::RateLimited {
                provider: provider.to_string(),
                message: body.clone(),
            }
        } else {
            ProviderError::malformed(provider, format!("{e}: {}", truncate(&body)))
        }
    })
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Midnight UTC of `date` as a unix timestamp.
pub(crate) fn unix_start_of(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Last second of `date` (UTC) as a unix timestamp.
pub(crate) fn unix_end_of(date: NaiveDate) -> i64 {
    unix_start_of(date) + 86_399
}
