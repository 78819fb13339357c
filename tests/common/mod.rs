//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use archive_admission::config::AdmissionConfig;
use archive_admission::http::Rejection;
use archive_admission::security::access::{Claims, TokenRejected, TokenValidator};
use archive_admission::security::rate_limit::{CounterStore, StoreError};
use archive_admission::{AdmissionPipeline, HttpServer};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

pub const SCRIPT_SHA: &str = "e0e1f9fabfc9d4800c877a703b823ac0578ff831";

/// In-memory store with the same atomicity as the server-side script.
#[derive(Default)]
pub struct AtomicStore {
    counts: Mutex<HashMap<String, i64>>,
    ttls: Mutex<HashMap<String, u64>>,
    pub evals: AtomicUsize,
    pub loads: AtomicUsize,
    /// When set, the next evaluation reports the script handle as unknown.
    evicted: AtomicBool,
}

impl AtomicStore {
    pub fn evict_script(&self) {
        self.evicted.store(true, Ordering::SeqCst);
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.ttls.lock().unwrap().get(key).copied()
    }

    pub fn keys(&self) -> Vec<String> {
        self.counts.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl CounterStore for AtomicStore {
    async fn load_script(&self, _script: &str) -> Result<String, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.evicted.store(false, Ordering::SeqCst);
        Ok(SCRIPT_SHA.to_string())
    }

    async fn eval_script(&self, handle: &str, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        self.evals.fetch_add(1, Ordering::SeqCst);
        if self.evicted.load(Ordering::SeqCst) || handle != SCRIPT_SHA {
            return Err(StoreError::NoScript);
        }
        // Yield so concurrent callers interleave between calls.
        tokio::task::yield_now().await;

        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.ttls.lock().unwrap().insert(key.to_string(), ttl_secs);
        }
        Ok(*count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store that is down: every call fails.
#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn load_script(&self, _script: &str) -> Result<String, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn eval_script(&self, _h: &str, _k: &str, _t: u64) -> Result<i64, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

/// Accepts tokens named in its table.
pub struct TableValidator(pub HashMap<&'static str, Value>);

impl TokenValidator for TableValidator {
    fn validate(&self, token: &str) -> Result<Claims, TokenRejected> {
        match self.0.get(token) {
            Some(Value::Object(claims)) => Ok(claims.clone()),
            _ => Err(TokenRejected("unknown token".into())),
        }
    }
}

pub fn config_with_limit(limit: i64) -> AdmissionConfig {
    let mut config = AdmissionConfig::default();
    config.rate_limit.requests_per_minute = limit;
    config
}

async fn echo(body: Bytes) -> Result<Json<Value>, Rejection> {
    if body.is_empty() {
        return Ok(Json(json!({ "you_sent": {} })));
    }
    let value: Value = serde_json::from_slice(&body).map_err(|_| Rejection::BadRequest {
        message: "Request body must be valid JSON",
    })?;
    Ok(Json(json!({ "you_sent": value })))
}

async fn read_then_panic(body: Bytes) -> StatusCode {
    let _ = body.len();
    panic!("handler failed while parsing body");
}

async fn read_then_accept(body: Bytes) -> (StatusCode, String) {
    (StatusCode::CREATED, body.len().to_string())
}

async fn ignore_body() -> StatusCode {
    StatusCode::ACCEPTED
}

/// Outlives any request timeout the router is built with.
async fn slow() -> &'static str {
    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
    "late"
}

/// The layered router with a small set of test handlers.
pub fn app(pipeline: AdmissionPipeline) -> Router {
    let public = Router::new()
        .route("/", get(|| async { "API Server Available" }))
        .route("/slow", get(slow));
    let protected = Router::new()
        .route("/api/echo", post(echo))
        .route(
            "/api/items",
            get(|| async { Json(json!({ "items": [] })) }).post(read_then_accept),
        )
        .route("/api/panic", post(read_then_panic))
        .route("/api/ignore", post(ignore_body));
    HttpServer::build_router(Arc::new(pipeline), &Default::default(), public, protected)
}

/// Send `req` as if it arrived from `peer`.
pub async fn send_from(router: &Router, peer: &str, mut req: Request<Body>) -> Response<Body> {
    let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    router.clone().oneshot(req).await.unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A body delivered in the given chunks, without a length hint.
pub fn chunked(chunks: Vec<Vec<u8>>) -> Body {
    Body::from_stream(futures_util::stream::iter(
        chunks.into_iter().map(Ok::<_, std::io::Error>),
    ))
}

/// A body that records whether anything tried to read it.
pub fn tripwire_body(polled: Arc<AtomicBool>) -> Body {
    let stream = futures_util::stream::once(async move {
        polled.store(true, Ordering::SeqCst);
        Ok::<_, std::io::Error>(Bytes::from_static(b"{}"))
    });
    Body::from_stream(stream)
}

/// Serve `server` on an ephemeral port. Dropping the sender stops it.
pub async fn spawn_server(server: HttpServer) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .run(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx)
}
