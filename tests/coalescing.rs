//! Coalescing, failure and timeout behavior of the cache interceptor.
//!
//! A gated mock network holds every call until the test releases it, so
//! concurrent callers are guaranteed to overlap.

use async_trait::async_trait;
use fetch_cache::cache::{CacheConfig, CacheStore};
use fetch_cache::{CacheInterceptor, Error, FetchRequest, FetchResponse, Network};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

struct GatedNetwork {
    calls: AtomicUsize,
    gate: Semaphore,
    fail: bool,
}

impl GatedNetwork {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl Network for GatedNetwork {
    async fn send(&self, request: &FetchRequest) -> fetch_cache::Result<FetchResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        if self.fail {
            return Err(Error::Remote {
                status: 502,
                class: "server_error".into(),
                message: format!("upstream down for {}", request.url),
                retryable: true,
            });
        }
        Ok(FetchResponse::ok(json!({ "url": request.url, "call": call }))
            .with_header("content-type", "application/json"))
    }
}

fn setup(config: CacheConfig, fail: bool) -> (CacheInterceptor, Arc<GatedNetwork>) {
    let network = GatedNetwork::new(fail);
    let dyn_network: Arc<dyn Network> = network.clone();
    (
        CacheInterceptor::new(CacheStore::new(config), dyn_network),
        network,
    )
}

/// Let spawned tasks run until the network has seen `n` calls.
async fn until_calls(network: &GatedNetwork, n: usize) {
    while network.calls() < n {
        tokio::task::yield_now().await;
    }
}

fn alice_case() -> FetchRequest {
    FetchRequest::get("/api/cases/5").with_identity("alice")
}

#[tokio::test]
async fn concurrent_identical_reads_share_one_call() {
    let (ic, network) = setup(CacheConfig::default(), false);

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let ic = ic.clone();
            tokio::spawn(async move { ic.fetch(alice_case()).await })
        })
        .collect();

    until_calls(&network, 1).await;
    // Give the remaining callers a chance to attach.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(ic.store().stats().pending_count, 1);
    network.release(1);

    let results: Vec<_> = futures::future::join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(network.calls(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].body["call"], json!(0));

    // Now cached; no further network traffic.
    let again = ic.fetch(alice_case()).await.unwrap();
    assert_eq!(again, results[0]);
    assert_eq!(network.calls(), 1);
    assert_eq!(ic.store().stats().pending_count, 0);
}

#[tokio::test]
async fn back_to_back_calls_attach_to_the_same_record() {
    let (ic, network) = setup(CacheConfig::default(), false);

    let first = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });
    until_calls(&network, 1).await;

    let second = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(ic.store().stats().coalesced, 1);

    network.release(1);
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(network.calls(), 1);
}

#[tokio::test]
async fn failure_reaches_every_waiter_and_is_not_cached() {
    let (ic, network) = setup(CacheConfig::default(), true);

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let ic = ic.clone();
            tokio::spawn(async move { ic.fetch(alice_case()).await })
        })
        .collect();
    until_calls(&network, 1).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    network.release(1);

    for call in futures::future::join_all(calls).await {
        let err = call.unwrap().unwrap_err();
        match err {
            Error::Remote { status, message, .. } => {
                assert_eq!(status, 502);
                assert!(message.contains("/api/cases/5"));
            }
            other => panic!("expected the network error, got {other:?}"),
        }
    }
    assert_eq!(network.calls(), 1);

    // Back to idle: nothing stored, nothing pending, next call goes out again.
    assert!(ic.store().lookup(&alice_case()).is_none());
    assert!(ic.store().pending(&alice_case()).is_none());

    network.release(1);
    assert!(ic.fetch(alice_case()).await.is_err());
    assert_eq!(network.calls(), 2);
}

#[tokio::test]
async fn different_identities_do_not_coalesce() {
    let (ic, network) = setup(CacheConfig::default(), false);
    let alice = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(FetchRequest::get("/api/cases/5").with_auth_token("a")).await }
    });
    let bob = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(FetchRequest::get("/api/cases/5").with_auth_token("b")).await }
    });

    until_calls(&network, 2).await;
    network.release(2);
    alice.await.unwrap().unwrap();
    bob.await.unwrap().unwrap();
    assert_eq!(network.calls(), 2);
    assert_eq!(ic.store().len(), 2);
}

#[tokio::test]
async fn excluded_urls_always_hit_the_network() {
    let (ic, network) = setup(CacheConfig::new().with_exclude("/api/auth"), false);
    network.release(2);

    let req = FetchRequest::get("/api/auth/session").with_identity("alice");
    ic.fetch(req.clone()).await.unwrap();
    ic.fetch(req).await.unwrap();

    assert_eq!(network.calls(), 2);
    assert!(ic.store().is_empty());
}

#[tokio::test]
async fn abandoning_the_leader_does_not_cancel_the_fetch() {
    let (ic, network) = setup(CacheConfig::default(), false);

    let leader = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });
    until_calls(&network, 1).await;

    let follower = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    network.release(1);
    let resp = follower.await.unwrap().unwrap();
    assert_eq!(resp.body["url"], json!("/api/cases/5"));
    assert_eq!(network.calls(), 1);
    assert!(ic.store().lookup(&alice_case()).is_some());
}

#[tokio::test(start_paused = true)]
async fn stuck_fetch_times_out_for_all_waiters() {
    let (ic, network) = setup(
        CacheConfig::new().with_pending_timeout(Duration::from_secs(30)),
        false,
    );

    let first = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });
    let second = tokio::spawn({
        let ic = ic.clone();
        async move { ic.fetch(alice_case()).await }
    });

    // The gate is never opened; paused time auto-advances to the deadline.
    let a = first.await.unwrap().unwrap_err();
    let b = second.await.unwrap().unwrap_err();
    assert!(a.is_coalescing_timeout());
    assert!(b.is_coalescing_timeout());
    assert_eq!(network.calls(), 1);
    assert!(ic.store().pending(&alice_case()).is_none());

    // The late network result still lands in the cache.
    network.release(1);
    until_cached(&ic).await;
    assert_eq!(network.calls(), 1);
}

async fn until_cached(ic: &CacheInterceptor) {
    while ic.store().is_empty() {
        tokio::task::yield_now().await;
    }
}
