//! Command-line interface parsing for quotegate
//!
//! This module handles parsing of CLI arguments using clap: the upstream
//! connection options shared by every command, and the `fetch` and
//! `load-test` subcommands.

use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::data::{Granularity, ParseGranularityError};
use crate::load_test::LoadTestConfig;
use crate::upstream::{
    UpstreamConfig, DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_READ_TIMEOUT_MS,
};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified granularity name is not recognized
    #[error(transparent)]
    InvalidGranularity(#[from] ParseGranularityError),

    /// A count argument was zero or not a number
    #[error("Invalid count: '{0}'. Expected a positive integer")]
    InvalidCount(String),
}

/// quotegate - cached time-series market data from Alpha Vantage
#[derive(Parser, Debug)]
#[command(name = "quotegate")]
#[command(about = "Read-through cache for stock market time series")]
#[command(version)]
pub struct Cli {
    /// Alpha Vantage API key
    #[arg(long, global = true, env = "ALPHAVANTAGE_APIKEY", default_value = DEFAULT_API_KEY, hide_env_values = true)]
    pub api_key: String,

    /// Provider base URL
    #[arg(long, global = true, env = "ALPHAVANTAGE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Connect timeout in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one series and print the raw payload
    ///
    /// Examples:
    ///   quotegate fetch daily IBM
    ///   quotegate fetch intraday msft --repeat 3
    Fetch {
        /// intraday, daily, weekly or monthly
        #[arg(value_parser = parse_granularity_arg)]
        granularity: Granularity,

        /// Ticker symbol, sent to the provider as given
        symbol: String,

        /// Issue the same request this many times, reporting latency for each
        #[arg(long, default_value = "1", value_parser = parse_count_arg)]
        repeat: usize,
    },

    /// Run concurrent requests through the cache and report latencies
    LoadTest {
        /// Total number of requests
        #[arg(long, default_value = "20", value_parser = parse_count_arg)]
        requests: usize,

        /// Maximum requests in flight
        #[arg(long, default_value = "20", value_parser = parse_count_arg)]
        concurrency: usize,

        /// Comma-separated symbols to rotate through
        #[arg(long, value_delimiter = ',', default_value = "IBM,MSFT,AAPL")]
        symbols: Vec<String>,

        /// Comma-separated granularities to rotate through
        #[arg(long, value_delimiter = ',', default_value = "daily,weekly,monthly", value_parser = parse_granularity_arg)]
        granularities: Vec<Granularity>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parses a granularity argument into a Granularity enum.
///
/// # Arguments
/// * `s` - The granularity string from CLI
///
/// # Returns
/// * `Ok(Granularity)` if the string names a granularity, in any case
/// * `Err(CliError::InvalidGranularity)` otherwise
pub fn parse_granularity_arg(s: &str) -> Result<Granularity, CliError> {
    Ok(s.parse::<Granularity>()?)
}

/// Parses a strictly positive count
pub fn parse_count_arg(s: &str) -> Result<usize, CliError> {
    match s.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CliError::InvalidCount(s.to_string())),
    }
}

impl Cli {
    /// Upstream connection settings from the global options
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

impl Command {
    /// Load test settings, if this is the `load-test` command
    pub fn load_test_config(&self) -> Option<LoadTestConfig> {
        match self {
            Command::LoadTest {
                requests,
                concurrency,
                symbols,
                granularities,
                ..
            } => Some(LoadTestConfig {
                requests: *requests,
                concurrency: *concurrency,
                symbols: symbols.clone(),
                granularities: granularities.clone(),
            }),
            Command::Fetch { .. } => None,
        }
    }
}
