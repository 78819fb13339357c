//! Axum adapters for the admission pipeline.
//!
//! # Data Flow
//! ```text
//! every request:        request_id → body_guard → (router)
//! protected routes:     access_control → rate_limit → handler
//! ```
//!
//! # Design Decisions
//! - Each middleware is a thin `from_fn_with_state` wrapper; decisions live in
//!   `admission::AdmissionPipeline`
//! - The body guard is global so oversize writes lose to nothing, not even 404

pub mod access_control;
pub mod body_guard;
pub mod rate_limit;

pub use access_control::{access_control_middleware, AuthClaims};
pub use body_guard::body_guard_middleware;
pub use rate_limit::rate_limit_middleware;

use axum::extract::Request;

use crate::http::request::RequestId;

/// Request ID string set by the request-id layer, if it ran.
pub(crate) fn request_id(req: &Request) -> Option<String> {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_owned())
}
