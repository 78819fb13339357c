//! Access Control Middleware.
//! Enforces bearer-token scope requirements on protected routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::admission::AdmissionPipeline;
use crate::security::access::Claims;

use super::request_id;

/// Claims of an authenticated request, available to handlers as an extension.
#[derive(Clone, Debug)]
pub struct AuthClaims(pub Claims);

pub async fn access_control_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    mut req: Request,
    next: Next,
) -> Response {
    match pipeline.authorize(req.method(), req.headers()) {
        Ok(Some(claims)) => {
            req.extensions_mut().insert(AuthClaims(claims));
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(rejection) => rejection.into_response_with_id(request_id(&req).as_deref()),
    }
}
