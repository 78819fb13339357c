//! Fixed-window rate limiting.
//!
//! # Data Flow
//! ```text
//! ClientIdentity
//!     → RateLimiter::allow
//!         → local.rs  (mutex-protected map, in process)
//!         → shared.rs (atomic script on the shared store, breaker on failure)
//!     → bool (within budget?)
//! ```
//!
//! # Design Decisions
//! - Backend chosen once at construction; callers never branch on it
//! - `requests_per_minute <= 0` disables counting for both backends
//! - Health checks are a side channel, independent of the breaker

pub mod local;
pub mod shared;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{RateLimitBackend, RateLimitConfig};
use crate::health::BackendHealth;
use crate::resilience::clock::{Clock, SystemClock};
use crate::security::identity::ClientIdentity;

pub use local::LocalFixedWindowLimiter;
pub use shared::{SharedFixedWindowLimiter, SharedLimiterSettings};
pub use store::{CounterStore, RedisCounterStore, StoreError};

/// Errors building a limiter from configuration.
#[derive(Debug, thiserror::Error)]
pub enum LimiterBuildError {
    #[error("rate_limit.store_url is required when backend is shared-store")]
    MissingStoreUrl,
    #[error("invalid store URL: {0}")]
    InvalidStoreUrl(#[source] StoreError),
}

/// The configured rate limiter.
pub enum RateLimiter {
    Local(LocalFixedWindowLimiter),
    Shared(SharedFixedWindowLimiter),
}

impl RateLimiter {
    /// Build the limiter named by `config.backend`.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, LimiterBuildError> {
        Self::from_config_with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn from_config_with_clock(
        config: &RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LimiterBuildError> {
        match config.backend {
            RateLimitBackend::Memory => Ok(RateLimiter::Local(
                LocalFixedWindowLimiter::with_clock(config.requests_per_minute, clock),
            )),
            RateLimitBackend::SharedStore => {
                let url = config.store_url().ok_or(LimiterBuildError::MissingStoreUrl)?;
                let store = RedisCounterStore::open(
                    url,
                    Duration::from_millis(config.store_timeout_ms),
                )
                .map_err(LimiterBuildError::InvalidStoreUrl)?;
                Ok(Self::shared_with_store(config, Arc::new(store), clock))
            }
        }
    }

    /// Build a shared-store limiter over an arbitrary store.
    pub fn shared_with_store(
        config: &RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = SharedLimiterSettings {
            requests_per_minute: config.requests_per_minute,
            key_prefix: config.key_prefix.clone(),
            window_seconds: config.window_seconds,
            failure_cooldown: Duration::from_secs(config.failure_cooldown_seconds),
            fail_open: config.fail_open,
        };
        RateLimiter::Shared(SharedFixedWindowLimiter::with_clock(settings, store, clock))
    }

    pub fn enabled(&self) -> bool {
        match self {
            RateLimiter::Local(l) => l.enabled(),
            RateLimiter::Shared(l) => l.enabled(),
        }
    }

    pub fn limit(&self) -> i64 {
        match self {
            RateLimiter::Local(l) => l.limit(),
            RateLimiter::Shared(l) => l.limit(),
        }
    }

    pub fn backend(&self) -> RateLimitBackend {
        match self {
            RateLimiter::Local(_) => RateLimitBackend::Memory,
            RateLimiter::Shared(_) => RateLimitBackend::SharedStore,
        }
    }

    /// Count one request for `identity` and report whether it is within budget.
    pub async fn allow(&self, identity: &ClientIdentity) -> bool {
        match self {
            RateLimiter::Local(l) => l.allow(identity),
            RateLimiter::Shared(l) => l.allow(identity).await,
        }
    }

    /// Readiness check for the backing store.
    pub async fn check_backend_health(&self) -> BackendHealth {
        match self {
            RateLimiter::Local(_) => BackendHealth::ok_with("memory backend"),
            RateLimiter::Shared(l) if !l.enabled() => BackendHealth::ok_with("rate limit disabled"),
            RateLimiter::Shared(l) => match l.store().ping().await {
                Ok(()) => BackendHealth::ok(),
                Err(e) => BackendHealth::failing(e.to_string()),
            },
        }
    }
}
