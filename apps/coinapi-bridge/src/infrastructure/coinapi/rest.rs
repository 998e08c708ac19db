//! CoinAPI REST OHLCV Client
//!
//! Adapter implementing [`OhlcvEndpoint`] over the vendor's historical
//! OHLCV endpoint:
//!
//! `GET {base}/v1/ohlcv/{symbol_id}/history?period_id=&limit=&time_start=&time_end=`
//!
//! Window bounds go out in ISO-8601 without a zone suffix; the endpoint
//! treats them as UTC. Rate-limit accounting is parsed from the
//! `x-ratelimit-*` response headers and handed back with every page.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use uuid::Uuid;

use crate::application::ports::{OhlcvEndpoint, OhlcvPage, OhlcvRequest, OhlcvRow, RateLimitUsage, RestError};

/// REST client for the vendor's historical OHLCV endpoint.
pub struct CoinApiRestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CoinApiRestClient {
    /// Create a client against `base_url`.
    ///
    /// # Errors
    ///
    /// [`RestError::Transport`] when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(base_url: impl Into<String>, api_key: Uuid) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| RestError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn history_url(&self, request: &OhlcvRequest) -> String {
        format!(
            "{}/v1/ohlcv/{}/history?period_id={}&limit={}&time_start={}&time_end={}",
            self.base_url,
            request.symbol_id,
            request.period_id,
            request.limit,
            format_time(request.time_start),
            format_time(request.time_end),
        )
    }
}

#[async_trait]
impl OhlcvEndpoint for CoinApiRestClient {
    async fn fetch_window(&self, request: &OhlcvRequest) -> Result<OhlcvPage, RestError> {
        let url = self.history_url(request);
        tracing::debug!(url = %url, "fetching ohlcv window");

        let response = self
            .http
            .get(&url)
            .header("X-CoinAPI-Key", &self.api_key)
            .send()
            .await
            .map_err(|error| RestError::Transport(error.to_string()))?;

        let rate_limit = rate_limit_from_headers(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(RestError::Status(status.as_u16()));
        }

        let rows = response
            .json::<Vec<OhlcvRow>>()
            .await
            .map_err(|error| RestError::Decode(error.to_string()))?;

        Ok(OhlcvPage { rows, rate_limit })
    }
}

/// ISO-8601 seconds precision, e.g. `2024-03-01T10:05:00`.
fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitUsage {
    let parse = |name: &str| -> Option<i64> {
        headers.get(name)?.to_str().ok()?.parse().ok()
    };

    RateLimitUsage {
        limit: parse("x-ratelimit-limit"),
        used: parse("x-ratelimit-used"),
        remaining: parse("x-ratelimit-remaining"),
    }
}
