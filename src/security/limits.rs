//! Request body size limits.
//!
//! # Responsibilities
//! - Reject a declared Content-Length above the limit before reading the body
//! - Reject an unparseable Content-Length as a malformed request
//! - Count streamed bytes and cut the stream the moment the limit is passed
//!
//! # Design Decisions
//! - Only state-changing writes under the guarded prefix are checked
//! - The body is never buffered here; chunks pass through in order
//! - Overflow is recorded on per-request state so the response layer can turn
//!   any downstream outcome into 413

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, BodyDataStream, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method};
use futures_util::{Stream, StreamExt};

use crate::http::response::Rejection;

/// Which requests are guarded and how large their bodies may be.
#[derive(Debug, Clone)]
pub struct BodyGuardPolicy {
    limit: u64,
    path_prefix: String,
}

impl BodyGuardPolicy {
    pub fn new(limit: u64, path_prefix: impl Into<String>) -> Self {
        Self {
            limit,
            path_prefix: path_prefix.into(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// POST, PUT and PATCH under the guarded prefix.
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        matches!(*method, Method::POST | Method::PUT | Method::PATCH)
            && path.starts_with(&self.path_prefix)
    }

    /// Check the declared length, if any.
    pub fn check_declared_length(&self, headers: &HeaderMap) -> Result<Option<u64>, Rejection> {
        let Some(raw) = headers.get(header::CONTENT_LENGTH) else {
            return Ok(None);
        };
        let value = raw
            .to_str()
            .map_err(|_| Rejection::invalid_content_length())?
            .trim();
        if value.is_empty() {
            return Ok(None);
        }
        let declared: u64 = value
            .parse()
            .map_err(|_| Rejection::invalid_content_length())?;
        if declared > self.limit {
            return Err(Rejection::PayloadTooLarge {
                limit: self.limit,
                declared: Some(declared),
                observed: None,
            });
        }
        Ok(Some(declared))
    }

    /// Apply the guard to `req`.
    ///
    /// Returns the request with its body wrapped, plus the state to inspect
    /// once the handler has run. Unguarded requests pass through untouched.
    pub fn admit(&self, req: Request) -> Result<(Request, Option<Arc<BodyGuardState>>), Rejection> {
        if !self.applies_to(req.method(), req.uri().path()) {
            return Ok((req, None));
        }

        let declared = self.check_declared_length(req.headers())?;
        let state = Arc::new(BodyGuardState::new(self.limit, declared));
        let (parts, body) = req.into_parts();
        let guarded = GuardedBody::new(body, state.clone());
        Ok((Request::from_parts(parts, Body::from_stream(guarded)), Some(state)))
    }
}

/// Per-request guard bookkeeping.
#[derive(Debug)]
pub struct BodyGuardState {
    limit: u64,
    declared: Option<u64>,
    observed: AtomicU64,
    overflow: AtomicBool,
}

impl BodyGuardState {
    pub fn new(limit: u64, declared: Option<u64>) -> Self {
        Self {
            limit,
            declared,
            observed: AtomicU64::new(0),
            overflow: AtomicBool::new(false),
        }
    }

    pub fn observed_bytes(&self) -> u64 {
        self.observed.load(Ordering::Acquire)
    }

    pub fn overflowed(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    /// The 413 to send if the stream overflowed.
    pub fn overflow_rejection(&self) -> Option<Rejection> {
        self.overflowed().then(|| Rejection::PayloadTooLarge {
            limit: self.limit,
            declared: self.declared,
            observed: Some(self.observed_bytes()),
        })
    }

    /// Add a chunk to the running total. Returns false once past the limit.
    fn record(&self, len: usize) -> bool {
        let total = self.observed.fetch_add(len as u64, Ordering::AcqRel) + len as u64;
        if total > self.limit {
            self.overflow.store(true, Ordering::Release);
            false
        } else {
            true
        }
    }
}

/// Body stream that ends early once the byte ceiling is crossed.
pub struct GuardedBody {
    inner: BodyDataStream,
    state: Arc<BodyGuardState>,
    finished: bool,
}

impl GuardedBody {
    pub fn new(body: Body, state: Arc<BodyGuardState>) -> Self {
        Self {
            inner: body.into_data_stream(),
            state,
            finished: false,
        }
    }
}

impl Stream for GuardedBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if self.state.record(chunk.len()) {
                    Poll::Ready(Some(Ok(chunk)))
                } else {
                    tracing::warn!(
                        limit = self.state.limit,
                        observed = self.state.observed_bytes(),
                        "Request body exceeded limit mid-stream"
                    );
                    // Report end-of-body; the rest of the upload is never read.
                    self.finished = true;
                    Poll::Ready(None)
                }
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
