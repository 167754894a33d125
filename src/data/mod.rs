//! Core data types for quotegate
//!
//! This module contains the types shared by the cache, the gateway and the
//! upstream client: the time-series granularity, the cache key built from it,
//! and the opaque payload handed back to callers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque upstream response body, shared between the store and every caller
pub type Payload = Arc<str>;

/// Time resolution of a requested series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    /// Five-minute bars for the current trading window
    Intraday,
    Daily,
    Weekly,
    Monthly,
}

/// Error returned when a granularity name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid granularity: '{0}'. Valid granularities: intraday, daily, weekly, monthly")]
pub struct ParseGranularityError(pub String);

impl Granularity {
    /// All granularities in ascending order of period length
    pub const ALL: [Granularity; 4] = [
        Granularity::Intraday,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    /// Tag used as the cache key namespace
    pub fn tag(self) -> &'static str {
        match self {
            Granularity::Intraday => "INTRADAY",
            Granularity::Daily => "DAILY",
            Granularity::Weekly => "WEEKLY",
            Granularity::Monthly => "MONTHLY",
        }
    }

    /// Value of the provider's `function` query parameter
    pub fn function_name(self) -> &'static str {
        match self {
            Granularity::Intraday => "TIME_SERIES_INTRADAY",
            Granularity::Daily => "TIME_SERIES_DAILY",
            Granularity::Weekly => "TIME_SERIES_WEEKLY",
            Granularity::Monthly => "TIME_SERIES_MONTHLY",
        }
    }

    /// Query parameters specific to this granularity, beyond function/symbol/apikey
    pub fn extra_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Granularity::Intraday => &[("interval", "5min")],
            Granularity::Daily | Granularity::Weekly | Granularity::Monthly => &[],
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intraday" => Ok(Granularity::Intraday),
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

/// Cache key of the form `{TAG}_{SYMBOL}`, e.g. `DAILY_IBM`
///
/// The symbol is trimmed and ASCII-uppercased so that `ibm` and `IBM` share an
/// entry. The upstream still receives the symbol exactly as the caller gave it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(granularity: Granularity, symbol: &str) -> Self {
        Self(format!(
            "{}_{}",
            granularity.tag(),
            normalize_symbol(symbol)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a ticker symbol for key construction
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
