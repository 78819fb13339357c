//! Archive API admission server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ request_id ─▶ timeout ─▶ body_guard ─▶ router ─┬─▶ /health*   (public)
//!                                                        ├─▶ /          (public)
//!                                                        └─▶ /api/*     (protected)
//!                                                              access_control
//!                                                              → rate_limit
//!                                                              → handler
//! ```
//!
//! Startup is strict: an unreadable or invalid config, or a pipeline that
//! cannot be built, exits non-zero before the listener is bound.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use archive_admission::config::{load_config, AdmissionConfig};
use archive_admission::http::Rejection;
use archive_admission::observability::{logging, metrics};
use archive_admission::{AdmissionPipeline, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "archive-admission")]
#[command(about = "Admission control front for the archive API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AdmissionConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "archive-admission starting"
    );

    // Token verification is supplied by embedders; the binary has none.
    let pipeline = Arc::new(AdmissionPipeline::from_config(&config, None)?);

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let public = Router::new().route("/", get(root));
    let protected = Router::new().route("/api/echo", post(echo));
    let server = HttpServer::new(pipeline, &config.timeouts, public, protected);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "API Server Available"
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

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
