//! Request ID assignment.
//!
//! # Responsibilities
//! - Take the caller's `X-Request-Id`, or generate a UUID v4
//! - Make the ID available to later layers as a request extension
//! - Echo the ID on every response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Request headers are left untouched, so identity resolution only ever
//!   sees an ID the caller actually sent

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::security::identity::X_REQUEST_ID;

/// Longest caller-supplied ID that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The ID attached to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId {
    value: String,
    caller_supplied: bool,
}

impl RequestId {
    pub fn generate() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            caller_supplied: false,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
            .map(|v| Self {
                value: v.to_owned(),
                caller_supplied: true,
            })
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn caller_supplied(&self) -> bool {
        self.caller_supplied
    }
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId::from_headers(req.headers());
    req.extensions_mut().insert(id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
