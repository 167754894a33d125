//! Integration tests for the cache-aside gateway
//!
//! Exercises the gateway through the public API with counting upstream stubs,
//! including the concurrent same-key miss scenario.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quotegate::{
    CacheKey, CacheStore, ConcurrentStore, DataGateway, GatewayError, Granularity,
    UpstreamFailure, UpstreamFetcher,
};

/// Upstream stub that sleeps, counts invocations and numbers its responses
struct SlowUpstream {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl SlowUpstream {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: false,
        })
    }

    fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamFetcher for SlowUpstream {
    async fn fetch(
        &self,
        granularity: Granularity,
        symbol: &str,
    ) -> Result<String, UpstreamFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(UpstreamFailure::Rejected {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(format!(
            "{{\"granularity\":\"{}\",\"symbol\":\"{}\",\"response\":{}}}",
            granularity, symbol, n
        ))
    }
}

/// Upstream stub returning a fixed body
struct FixedUpstream {
    calls: AtomicUsize,
    body: &'static str,
}

#[async_trait]
impl UpstreamFetcher for FixedUpstream {
    async fn fetch(&self, _: Granularity, _: &str) -> Result<String, UpstreamFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.to_string())
    }
}

#[tokio::test]
async fn test_end_to_end_daily_msft() {
    let upstream = Arc::new(FixedUpstream {
        calls: AtomicUsize::new(0),
        body: r#"{"price":100}"#,
    });
    let store = Arc::new(ConcurrentStore::new());
    let gateway = DataGateway::with_store(store.clone(), upstream.clone());

    let first = gateway.fetch(Granularity::Daily, "MSFT").await.unwrap();
    assert_eq!(&*first, r#"{"price":100}"#);

    let key = CacheKey::new(Granularity::Daily, "MSFT");
    assert_eq!(key.as_str(), "DAILY_MSFT");
    assert_eq!(store.get(&key).as_deref(), Some(r#"{"price":100}"#));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

    let second = gateway.fetch(Granularity::Daily, "MSFT").await.unwrap();
    assert_eq!(&*second, r#"{"price":100}"#);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prepopulated_store_is_served_without_upstream() {
    let upstream = SlowUpstream::new(Duration::ZERO);
    let store = Arc::new(ConcurrentStore::new());
    store.put(
        CacheKey::new(Granularity::Weekly, "IBM"),
        Arc::from("seeded"),
    );
    let gateway = DataGateway::with_store(store, upstream.clone());

    let payload = gateway.weekly("ibm").await.unwrap();

    assert_eq!(&*payload, "seeded");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_same_key_misses_call_upstream_once() {
    const CALLERS: usize = 50;
    let upstream = SlowUpstream::new(Duration::from_millis(100));
    let gateway = DataGateway::new(upstream.clone());

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.fetch(Granularity::Daily, "IBM").await })
        })
        .collect();

    let mut results = Vec::with_capacity(CALLERS);
    for handle in handles {
        results.push(handle.await.expect("task panicked").expect("fetch failed"));
    }

    assert_eq!(upstream.calls(), 1, "single-flight should collapse concurrent misses");
    let cached = gateway
        .store()
        .get(&CacheKey::new(Granularity::Daily, "IBM"))
        .expect("value should be cached");
    assert!(results.iter().all(|r| *r == cached));
    assert_eq!(gateway.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_misses_on_different_keys_run_in_parallel() {
    let upstream = SlowUpstream::new(Duration::from_millis(50));
    let gateway = DataGateway::new(upstream.clone());
    let symbols = ["IBM", "MSFT", "AAPL", "GOOGL"];

    let handles: Vec<_> = symbols
        .iter()
        .flat_map(|symbol| Granularity::ALL.iter().map(move |g| (*symbol, *g)))
        .flat_map(|request| std::iter::repeat(request).take(5))
        .map(|(symbol, granularity)| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.fetch(granularity, symbol).await })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task panicked").expect("fetch failed");
    }

    assert_eq!(upstream.calls(), symbols.len() * Granularity::ALL.len());
    assert_eq!(gateway.store().len(), symbols.len() * Granularity::ALL.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_failures_share_error_and_cache_nothing() {
    let upstream = SlowUpstream::failing(Duration::from_millis(100));
    let gateway = DataGateway::new(upstream.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.fetch(Granularity::Daily, "IBM").await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.expect("task panicked").unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamError { status: 503, .. }));
    }

    let calls_after_burst = upstream.calls();
    assert_eq!(calls_after_burst, 1, "concurrent failures should share one upstream call");
    assert!(gateway.store().is_empty());
    assert_eq!(gateway.in_flight(), 0);

    // A later retry goes upstream again rather than seeing a cached failure
    assert!(gateway.daily("IBM").await.is_err());
    assert_eq!(upstream.calls(), calls_after_burst + 1);
}

#[tokio::test]
async fn test_put_on_one_key_leaves_others_untouched() {
    let upstream = SlowUpstream::new(Duration::ZERO);
    let gateway = DataGateway::new(upstream);

    gateway.daily("IBM").await.unwrap();
    let msft = CacheKey::new(Granularity::Daily, "MSFT");
    assert!(!gateway.store().contains_key(&msft));

    gateway.daily("MSFT").await.unwrap();
    let ibm = gateway
        .store()
        .get(&CacheKey::new(Granularity::Daily, "IBM"))
        .unwrap();
    assert!(ibm.contains("\"symbol\":\"IBM\""));
}

#[tokio::test]
async fn test_clear_resets_every_populated_key() {
    let upstream = SlowUpstream::new(Duration::ZERO);
    let gateway = DataGateway::new(upstream);

    let mut keys = Vec::new();
    for granularity in Granularity::ALL {
        for symbol in ["IBM", "MSFT"] {
            gateway.fetch(granularity, symbol).await.unwrap();
            keys.push(CacheKey::new(granularity, symbol));
        }
    }
    assert_eq!(gateway.store().len(), keys.len());

    gateway.clear_cache();

    for key in &keys {
        assert!(!gateway.store().contains_key(key), "{} should be cleared", key);
    }
    assert!(gateway.store().is_empty());
}
