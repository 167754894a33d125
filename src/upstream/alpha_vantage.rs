//! Alpha Vantage time-series API client
//!
//! Issues `GET /query` requests and classifies the response. The body of a
//! successful response is returned untouched; only the provider's error
//! envelope is inspected.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{UpstreamConfig, UpstreamFailure, UpstreamFetcher};
use crate::data::Granularity;

/// Longest slice of an error body carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the Alpha Vantage `TIME_SERIES_*` functions
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    /// Creates a client with the timeouts and endpoint from `config`
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;

        Ok(Self::with_client(http_client, config))
    }

    /// Creates a client around an existing reqwest client
    ///
    /// Timeouts in `config` are ignored; the supplied client's settings apply.
    pub fn with_client(http_client: Client, config: UpstreamConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    /// Full URL of the query endpoint
    fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    /// Query parameters for one request, in the order the provider documents them
    fn query_params<'a>(
        &'a self,
        granularity: Granularity,
        symbol: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![
            ("function", granularity.function_name()),
            ("symbol", symbol),
        ];
        params.extend_from_slice(granularity.extra_params());
        params.push(("apikey", self.api_key.as_str()));
        params
    }
}

#[async_trait]
impl UpstreamFetcher for AlphaVantageClient {
    async fn fetch(
        &self,
        granularity: Granularity,
        symbol: &str,
    ) -> Result<String, UpstreamFailure> {
        debug!(%granularity, symbol, "requesting time series from Alpha Vantage");

        let response = self
            .http_client
            .get(self.query_url())
            .query(&self.query_params(granularity, symbol))
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;

        classify_response(status.as_u16(), body)
    }
}

/// Maps a reqwest error to `Unavailable`, naming timeouts and connect failures
fn transport_failure(error: reqwest::Error) -> UpstreamFailure {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    UpstreamFailure::Unavailable(format!("{}: {}", kind, error))
}

/// Decides whether a provider response carries usable data
///
/// Non-2xx statuses, empty bodies and the provider's error envelope are all
/// rejected so that they never reach the cache.
fn classify_response(status: u16, body: String) -> Result<String, UpstreamFailure> {
    if !(200..300).contains(&status) {
        return Err(UpstreamFailure::Rejected {
            status,
            message: truncate(&body),
        });
    }

    if body.trim().is_empty() {
        return Err(UpstreamFailure::Rejected {
            status,
            message: "empty response body".to_string(),
        });
    }

    if let Some(message) = provider_error_message(&body) {
        return Err(UpstreamFailure::Rejected { status, message });
    }

    Ok(body)
}

/// Extracts the message from an Alpha Vantage error envelope, if `body` is one
///
/// The provider answers 200 for invalid symbols (`"Error Message"`), and for
/// rate limiting or key problems (`"Note"` / `"Information"` with no series).
fn provider_error_message(body: &str) -> Option<String> {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return None;
    };

    if let Some(message) = fields.get("Error Message") {
        return Some(value_text(message));
    }

    let has_series = fields.keys().any(|k| k.starts_with("Time Series"));
    if has_series {
        return None;
    }

    ["Note", "Information"]
        .iter()
        .find_map(|name| fields.get(*name))
        .map(value_text)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    }
}
