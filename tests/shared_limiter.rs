//! Shared-store limiter behaviour against in-process fake stores.

use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use archive_admission::config::{RateLimitBackend, RateLimitConfig};
use archive_admission::resilience::{BreakerState, ManualClock};
use archive_admission::security::identity::ClientIdentity;
use archive_admission::security::rate_limit::{CounterStore, RateLimiter};
use archive_admission::AdmissionPipeline;
use axum::body::Body;
use axum::http::{Request, StatusCode};

mod common;
use common::*;

fn shared_config(limit: i64, fail_open: bool) -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: limit,
        backend: RateLimitBackend::SharedStore,
        store_url: Some("redis://fake".into()),
        failure_cooldown_seconds: 5,
        fail_open,
        ..RateLimitConfig::default()
    }
}

fn client(ip: &str) -> ClientIdentity {
    ClientIdentity::from(ip.parse::<IpAddr>().unwrap())
}

fn limiter(
    limit: i64,
    fail_open: bool,
    store: Arc<dyn CounterStore>,
    clock: Arc<ManualClock>,
) -> RateLimiter {
    RateLimiter::shared_with_store(&shared_config(limit, fail_open), store, clock)
}

#[tokio::test]
async fn test_breaker_suppresses_store_calls_during_cooldown() {
    for fail_open in [true, false] {
        let store = Arc::new(FailingStore::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let limiter = limiter(10, fail_open, store.clone(), clock.clone());
        let caller = client("203.0.113.5");

        assert_eq!(limiter.allow(&caller).await, fail_open);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        for _ in 0..20 {
            assert_eq!(limiter.allow(&caller).await, fail_open);
            clock.advance(Duration::from_millis(200));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        // 4s elapsed so far; cross the 5s cooldown.
        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.allow(&caller).await, fail_open);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}

#[tokio::test]
async fn test_breaker_uses_monotonic_time_not_wall_clock() {
    let store = Arc::new(FailingStore::default());
    let clock = Arc::new(ManualClock::new(1_000));
    let limiter = limiter(10, false, store.clone(), clock.clone());
    let caller = client("203.0.113.5");

    limiter.allow(&caller).await;
    // Winding the wall clock forward does not end the cooldown.
    clock.set_unix_secs(10_000);
    limiter.allow(&caller).await;
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);

    let RateLimiter::Shared(shared) = &limiter else {
        panic!("expected shared limiter");
    };
    assert!(matches!(shared.breaker_state(), BreakerState::Degraded { .. }));
}

#[tokio::test]
async fn test_stale_script_handle_reloaded_once() {
    let store = Arc::new(AtomicStore::default());
    let clock = Arc::new(ManualClock::new(0));
    let limiter = limiter(5, false, store.clone(), clock);
    let caller = client("198.51.100.3");

    assert!(limiter.allow(&caller).await);
    assert_eq!(store.loads.load(Ordering::SeqCst), 1);

    store.evict_script();
    assert!(limiter.allow(&caller).await);
    assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    // One failed evaluation plus its retry, on top of the first call.
    assert_eq!(store.evals.load(Ordering::SeqCst), 3);

    let RateLimiter::Shared(shared) = &limiter else {
        panic!("expected shared limiter");
    };
    assert_eq!(shared.breaker_state(), BreakerState::Normal);
}

#[tokio::test]
async fn test_keys_carry_prefix_bucket_and_ttl() {
    let store = Arc::new(AtomicStore::default());
    let clock = Arc::new(ManualClock::new(600));
    let limiter = limiter(5, false, store.clone(), clock);

    limiter.allow(&client("198.51.100.3")).await;
    let key = "civic_archive:rate_limit:10:198.51.100.3";
    assert_eq!(store.keys(), vec![key.to_string()]);
    assert_eq!(store.ttl_of(key), Some(65));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_admit_exactly_the_limit() {
    for (callers, limit) in [(50usize, 20i64), (10, 20)] {
        let store = Arc::new(AtomicStore::default());
        let limiter = Arc::new(limiter(limit, false, store, Arc::new(ManualClock::new(0))));
        let caller = client("192.0.2.44");

        let tasks: Vec<_> = (0..callers)
            .map(|_| {
                let limiter = limiter.clone();
                let caller = caller.clone();
                tokio::spawn(async move { limiter.allow(&caller).await })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, callers.min(limit as usize));
    }
}

#[tokio::test]
async fn test_fresh_instances_reproduce_outcomes() {
    async fn run_sequence() -> Vec<bool> {
        let limiter = limiter(
            3,
            false,
            Arc::new(AtomicStore::default()),
            Arc::new(ManualClock::new(0)),
        );
        let mut outcomes = Vec::new();
        for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2", "10.0.0.1", "10.0.0.1", "10.0.0.2"] {
            outcomes.push(limiter.allow(&client(ip)).await);
        }
        outcomes
    }

    let first = run_sequence().await;
    assert_eq!(first, vec![true, true, true, true, false, true]);
    assert_eq!(run_sequence().await, first);
}

#[tokio::test]
async fn test_fail_closed_outage_looks_like_normal_429() {
    let mut config = config_with_limit(10);
    config.rate_limit = shared_config(10, false);
    let limiter = RateLimiter::shared_with_store(
        &config.rate_limit,
        Arc::new(FailingStore::default()),
        Arc::new(ManualClock::new(0)),
    );
    let router = app(AdmissionPipeline::with_limiter(&config, limiter, None).unwrap());

    let req = Request::get("/api/items").body(Body::empty()).unwrap();
    let response = send_from(&router, "203.0.113.8", req).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = json_body(response).await;
    assert_eq!(body["details"]["reason"], "rate_limit_exceeded");
    assert_eq!(body["details"]["backend"], "shared-store");
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_readiness_reports_store_outage() {
    let mut config = config_with_limit(10);
    config.rate_limit = shared_config(10, true);
    let limiter = RateLimiter::shared_with_store(
        &config.rate_limit,
        Arc::new(FailingStore::default()),
        Arc::new(ManualClock::new(0)),
    );
    let router = app(AdmissionPipeline::with_limiter(&config, limiter, None).unwrap());

    let response = send(&router, Request::get("/health/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["rate_limit_backend"]["ok"], false);

    // Liveness does not depend on the store.
    let response = send(&router, Request::get("/health/live").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
}
