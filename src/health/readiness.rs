//! Liveness and readiness endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::admission::AdmissionPipeline;

/// `/health`, `/health/live` and `/health/ready`.
pub fn routes(pipeline: Arc<AdmissionPipeline>) -> Router {
    Router::new()
        .route("/health", get(live))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .with_state(pipeline)
}

async fn live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(pipeline): State<Arc<AdmissionPipeline>>) -> impl IntoResponse {
    let backend = pipeline.check_backend_health().await;
    let (status, label) = if backend.ok {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(detail = ?backend.detail, "Readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "checks": { "rate_limit_backend": backend },
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AdmissionConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_ready_with_memory_backend() {
        let pipeline = AdmissionPipeline::from_config(&AdmissionConfig::default(), None).unwrap();
        let response = routes(Arc::new(pipeline))
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["rate_limit_backend"]["ok"], true);
        assert_eq!(body["checks"]["rate_limit_backend"]["detail"], "memory backend");
    }
}
