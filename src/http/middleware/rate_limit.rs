//! Rate limit middleware for protected routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::admission::AdmissionPipeline;

use super::request_id;

pub async fn rate_limit_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    req: Request,
    next: Next,
) -> Response {
    // Absent when served without connect info, e.g. in-process tests.
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match pipeline.check_rate_limit(peer, req.headers()).await {
        Ok(()) => next.run(req).await,
        Err(rejection) => rejection.into_response_with_id(request_id(&req).as_deref()),
    }
}
