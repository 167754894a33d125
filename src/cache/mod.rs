//! In-memory cache for upstream responses
//!
//! This module provides the `CacheStore` capability used by the gateway and the
//! default `ConcurrentStore` implementation. Entries never expire; they live as
//! long as the store instance that holds them.

mod store;

pub use store::{CacheStore, ConcurrentStore};
