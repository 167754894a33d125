//! Cache-aside gateway in front of the upstream provider
//!
//! `DataGateway::fetch` serves a payload from the store when present. On a
//! miss it runs at most one upstream fetch per key at a time: the first caller
//! spawns the fetch on its own task and registers a shared handle to it, later
//! callers for the same key await that handle instead of calling the provider
//! again. The task runs to completion even if every caller stops waiting.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, ConcurrentStore};
use crate::data::{CacheKey, Granularity, Payload};
use crate::upstream::{UpstreamFailure, UpstreamFetcher};

/// Errors returned to gateway callers
///
/// Cloneable so one failed upstream fetch can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider could not be reached or timed out
    #[error("Upstream unavailable for {key}: {reason}")]
    UpstreamUnavailable { key: CacheKey, reason: String },

    /// The provider answered with a non-success status or an error payload
    #[error("Upstream error for {key} (status {status}): {message}")]
    UpstreamError {
        key: CacheKey,
        status: u16,
        message: String,
    },
}

impl GatewayError {
    fn from_upstream(key: CacheKey, failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Unavailable(reason) => {
                GatewayError::UpstreamUnavailable { key, reason }
            }
            UpstreamFailure::Rejected { status, message } => GatewayError::UpstreamError {
                key,
                status,
                message,
            },
        }
    }

    /// Cache key of the request that failed
    pub fn key(&self) -> &CacheKey {
        match self {
            GatewayError::UpstreamUnavailable { key, .. } => key,
            GatewayError::UpstreamError { key, .. } => key,
        }
    }
}

type Flight = Shared<BoxFuture<'static, Result<Payload, GatewayError>>>;

/// Outcome of looking up the in-flight table after a store miss
enum Slot {
    /// A flight finished between the store check and the table lookup
    Cached(Payload),
    Waiting(Flight),
}

/// Read-through gateway over a `CacheStore` and an `UpstreamFetcher`
pub struct DataGateway<S: CacheStore = ConcurrentStore> {
    store: Arc<S>,
    upstream: Arc<dyn UpstreamFetcher>,
    in_flight: Arc<DashMap<CacheKey, Flight>>,
}

impl<S: CacheStore> Clone for DataGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl DataGateway<ConcurrentStore> {
    /// Creates a gateway with a fresh, empty `ConcurrentStore`
    pub fn new(upstream: Arc<dyn UpstreamFetcher>) -> Self {
        Self::with_store(Arc::new(ConcurrentStore::new()), upstream)
    }
}

impl<S: CacheStore> DataGateway<S> {
    /// Creates a gateway over an existing store
    pub fn with_store(store: Arc<S>, upstream: Arc<dyn UpstreamFetcher>) -> Self {
        Self {
            store,
            upstream,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Returns the payload for `symbol` at `granularity`, fetching it on a miss
    ///
    /// # Arguments
    /// * `granularity` - Time resolution of the series
    /// * `symbol` - Ticker symbol, forwarded to the provider unchanged
    ///
    /// # Returns
    /// * `Ok(Payload)` - The cached or freshly fetched body
    /// * `Err(GatewayError)` - The upstream fetch failed; nothing was cached
    pub async fn fetch(
        &self,
        granularity: Granularity,
        symbol: &str,
    ) -> Result<Payload, GatewayError> {
        let key = CacheKey::new(granularity, symbol);

        if let Some(payload) = self.store.get(&key) {
            debug!(%key, "cache hit");
            return Ok(payload);
        }

        match self.join_or_start(&key, granularity, symbol) {
            Slot::Cached(payload) => {
                debug!(%key, "cache hit after in-flight fetch completed");
                Ok(payload)
            }
            Slot::Waiting(flight) => flight.await,
        }
    }

    /// Returns the 5-minute intraday series for `symbol`
    pub async fn intraday(&self, symbol: &str) -> Result<Payload, GatewayError> {
        self.fetch(Granularity::Intraday, symbol).await
    }

    /// Returns the daily series for `symbol`
    pub async fn daily(&self, symbol: &str) -> Result<Payload, GatewayError> {
        self.fetch(Granularity::Daily, symbol).await
    }

    /// Returns the weekly series for `symbol`
    pub async fn weekly(&self, symbol: &str) -> Result<Payload, GatewayError> {
        self.fetch(Granularity::Weekly, symbol).await
    }

    /// Returns the monthly series for `symbol`
    pub async fn monthly(&self, symbol: &str) -> Result<Payload, GatewayError> {
        self.fetch(Granularity::Monthly, symbol).await
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Removes every cached payload
    ///
    /// Fetches already in flight still populate the store when they finish.
    pub fn clear_cache(&self) {
        let evicted = self.store.len();
        self.store.clear();
        info!(evicted, "cache cleared");
    }

    /// Number of upstream fetches currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn join_or_start(&self, key: &CacheKey, granularity: Granularity, symbol: &str) -> Slot {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!(%key, "cache miss, joining in-flight fetch");
                Slot::Waiting(occupied.get().clone())
            }
            Entry::Vacant(vacant) => {
                // The slot is released only after the store is populated, so a
                // vacant slot with a stored value means a flight just finished.
                if let Some(payload) = self.store.get(key) {
                    return Slot::Cached(payload);
                }

                debug!(%key, "cache miss, fetching from upstream");
                let flight = self.start_flight(key.clone(), granularity, symbol.to_string());
                vacant.insert(flight.clone());
                Slot::Waiting(flight)
            }
        }
    }

    /// Spawns the task that fetches, stores and releases the slot
    ///
    /// The returned future only awaits the task's handle, so dropping every
    /// waiter leaves the fetch running and the slot is still released.
    fn start_flight(&self, key: CacheKey, granularity: Granularity, symbol: String) -> Flight {
        let store = Arc::clone(&self.store);
        let upstream = Arc::clone(&self.upstream);
        let release = SlotRelease {
            in_flight: Arc::clone(&self.in_flight),
            key: key.clone(),
        };
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let _release = release;
            let key = task_key;
            let started = Instant::now();
            let result = upstream.fetch(granularity, &symbol).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(body) => {
                    let payload = Payload::from(body);
                    store.put(key.clone(), Arc::clone(&payload));
                    info!(%key, elapsed_ms, bytes = payload.len(), "cached upstream response");
                    Ok(payload)
                }
                Err(failure) => {
                    warn!(%key, elapsed_ms, error = %failure, "upstream fetch failed");
                    Err(GatewayError::from_upstream(key, failure))
                }
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!(%key, error = %join_error, "upstream fetch task failed");
                    Err(GatewayError::UpstreamUnavailable {
                        key,
                        reason: format!("fetch task failed: {}", join_error),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Removes a key's in-flight entry when its fetch finishes, fails or panics
struct SlotRelease {
    in_flight: Arc<DashMap<CacheKey, Flight>>,
    key: CacheKey,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
