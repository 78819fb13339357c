//! Rejection responses.
//!
//! # Responsibilities
//! - One enum for every way admission can refuse a request
//! - Render each refusal into the JSON error contract
//! - Echo the request ID in the body and the `X-Request-Id` header
//!
//! # Design Decisions
//! - `error` duplicates `message` for older clients
//! - `details` is omitted entirely when a refusal carries no evidence
//! - Store outages never get their own code; a fail-closed deny is a plain 429

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::config::schema::RateLimitBackend;
use crate::security::identity::X_REQUEST_ID;

/// A request refused before (or instead of) reaching its handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    BadRequest {
        message: &'static str,
    },
    Unauthorized,
    Forbidden,
    PayloadTooLarge {
        limit: u64,
        declared: Option<u64>,
        observed: Option<u64>,
    },
    RateLimited {
        limit: i64,
        backend: RateLimitBackend,
    },
    Internal,
}

impl Rejection {
    pub fn invalid_content_length() -> Self {
        Rejection::BadRequest {
            message: "Invalid Content-Length header",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Rejection::Unauthorized => StatusCode::UNAUTHORIZED,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rejection::BadRequest { .. } => "BAD_REQUEST",
            Rejection::Unauthorized => "UNAUTHORIZED",
            Rejection::Forbidden => "FORBIDDEN",
            Rejection::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Rejection::RateLimited { .. } => "RATE_LIMITED",
            Rejection::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::BadRequest { message } => *message,
            Rejection::Unauthorized => "Unauthorized",
            Rejection::Forbidden => "Forbidden",
            Rejection::PayloadTooLarge { .. } => "Payload Too Large",
            Rejection::RateLimited { .. } => "Too Many Requests",
            Rejection::Internal => "Internal Server Error",
        }
    }

    /// Numeric evidence for the refusal, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Rejection::PayloadTooLarge {
                limit,
                declared,
                observed,
            } => {
                let mut details = Map::new();
                details.insert("max_request_body_bytes".into(), json!(limit));
                if let Some(declared) = declared {
                    details.insert("content_length".into(), json!(declared));
                }
                if let Some(observed) = observed {
                    details.insert("request_body_bytes".into(), json!(observed));
                }
                Some(Value::Object(details))
            }
            Rejection::RateLimited { limit, backend } => Some(json!({
                "reason": "rate_limit_exceeded",
                "limit_per_minute": limit,
                "backend": backend.as_str(),
            })),
            _ => None,
        }
    }

    /// The JSON error body.
    pub fn body(&self, request_id: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("code".into(), json!(self.code()));
        body.insert("message".into(), json!(self.message()));
        body.insert("error".into(), json!(self.message()));
        if let Some(id) = request_id {
            body.insert("request_id".into(), json!(id));
        }
        if let Some(details) = self.details() {
            body.insert("details".into(), details);
        }
        Value::Object(body)
    }

    /// Render for a request whose ID is known.
    pub fn into_response_with_id(self, request_id: Option<&str>) -> Response {
        let mut response = (self.status(), Json(self.body(request_id))).into_response();
        if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        self.into_response_with_id(None)
    }
}
