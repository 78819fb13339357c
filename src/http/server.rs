//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: health routes, public routes, protected routes
//! - Wire up middleware (tracing, timeout, request ID, body guard, panics)
//! - Bind server to listener and serve until shutdown
//!
//! # Layer order (outermost first)
//! ```text
//! TraceLayer → request_id → TimeoutLayer → body_guard → CatchPanic → router
//! protected routes: access_control → rate_limit → handler
//! ```

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::AdmissionPipeline;
use crate::config::schema::TimeoutConfig;
use crate::health::readiness;
use crate::http::middleware::{
    access_control_middleware, body_guard_middleware, rate_limit_middleware,
};
use crate::http::request::request_id_middleware;
use crate::http::response::Rejection;

/// HTTP server for the archive API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server around `pipeline`.
    ///
    /// `public` routes only pass the global layers; `protected` routes also
    /// pass access control and rate limiting.
    pub fn new(
        pipeline: Arc<AdmissionPipeline>,
        timeouts: &TimeoutConfig,
        public: Router,
        protected: Router,
    ) -> Self {
        let router = Self::build_router(pipeline, timeouts, public, protected);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(
        pipeline: Arc<AdmissionPipeline>,
        timeouts: &TimeoutConfig,
        public: Router,
        protected: Router,
    ) -> Router {
        // Added inner to outer: access control runs before rate limiting.
        let protected = protected
            .layer(from_fn_with_state(pipeline.clone(), rate_limit_middleware))
            .layer(from_fn_with_state(pipeline.clone(), access_control_middleware));

        Router::new()
            .merge(readiness::routes(pipeline.clone()))
            .merge(public)
            .merge(protected)
            // The body guard is the only ceiling; extractors must not impose their own.
            .layer(DefaultBodyLimit::disable())
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(from_fn_with_state(pipeline, body_guard_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Handler panicked");

    Rejection::Internal.into_response()
}
