//! quotegate library
//!
//! A read-through cache in front of a rate-limited time-series market data
//! provider. The gateway, store and upstream client are exposed for embedding
//! and for integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod gateway;
pub mod logging;
pub mod upstream;

pub use cache::{CacheStore, ConcurrentStore};
pub use data::{CacheKey, Granularity, Payload};
pub use gateway::{DataGateway, GatewayError};
pub use upstream::{AlphaVantageClient, UpstreamConfig, UpstreamFailure, UpstreamFetcher};
