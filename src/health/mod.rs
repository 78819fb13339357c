//! Health reporting.
//!
//! # Data Flow
//! ```text
//! GET /health, /health/live
//!     → always {"status":"ok"} while the process serves requests
//!
//! GET /health/ready
//!     → RateLimiter::check_backend_health (readiness.rs)
//!     → 200 ok / 503 degraded
//! ```
//!
//! # Design Decisions
//! - Liveness never touches the counter store
//! - Readiness checks the store independently of the degraded-mode breaker,
//!   so a recovered store is reported even while the breaker cools down

pub mod readiness;

use serde::Serialize;

/// Result of probing the rate-limit backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub ok: bool,
    pub detail: Option<String>,
}

impl BackendHealth {
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn ok_with(detail: &str) -> Self {
        Self {
            ok: true,
            detail: Some(detail.to_owned()),
        }
    }

    pub fn failing(detail: String) -> Self {
        Self {
            ok: false,
            detail: Some(detail),
        }
    }
}
