//! Upstream market data providers
//!
//! The gateway only talks to providers through the `UpstreamFetcher` trait.
//! `AlphaVantageClient` is the production implementation; tests plug in stubs.

mod alpha_vantage;

pub use alpha_vantage::AlphaVantageClient;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::Granularity;

/// Default provider endpoint
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Provider's public demo key; only works for a handful of symbols
pub const DEFAULT_API_KEY: &str = "demo";

/// Default TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Errors reported by an upstream provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    /// The provider could not be reached, or did not answer in time
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but not with usable data
    #[error("Upstream rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Source of raw time-series payloads
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// Fetches the raw payload for `symbol` at `granularity`
    ///
    /// The symbol is passed through exactly as the caller supplied it.
    async fn fetch(&self, granularity: Granularity, symbol: &str)
        -> Result<String, UpstreamFailure>;
}

/// Connection settings for the upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Scheme and host of the provider, without the `/query` path
    pub base_url: String,
    /// API key sent as the `apikey` query parameter
    pub api_key: String,
    /// Maximum time to establish the TCP/TLS connection
    pub connect_timeout: Duration,
    /// Maximum time to wait between reads of the response
    pub read_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}
