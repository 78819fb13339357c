//! Body guard middleware.
//!
//! Runs outside routing. A declared oversize or malformed length is refused
//! here; a streamed overflow is detected after the inner service returns and
//! replaces whatever it produced, including a caught panic.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::admission::AdmissionPipeline;
use crate::observability::metrics;

use super::request_id;

pub async fn body_guard_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = request_id(&req);

    let (req, guard) = match pipeline.guard_body(req) {
        Ok(admitted) => admitted,
        Err(rejection) => return rejection.into_response_with_id(request_id.as_deref()),
    };

    let response = next.run(req).await;

    match guard.and_then(|state| state.overflow_rejection()) {
        Some(rejection) => {
            tracing::warn!(
                request_id = request_id.as_deref().unwrap_or("-"),
                downstream_status = response.status().as_u16(),
                "Request body overflow, replacing response with 413"
            );
            metrics::record_body_rejection("streamed_overflow");
            rejection.into_response_with_id(request_id.as_deref())
        }
        None => response,
    }
}
