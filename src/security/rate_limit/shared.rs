//! Fixed-window limiter backed by a shared counter store.
//!
//! # Responsibilities
//! - Key counters as `<prefix>:<minute bucket>:<identity>`
//! - Keep the script handle cached, reloading it once if the store lost it
//! - Absorb store failures with the degraded-mode breaker
//!
//! # Design Decisions
//! - The minute bucket sets the counting granularity; `window_seconds` is only
//!   the key TTL, a cleanup net for abandoned keys
//! - One store failure opens the breaker for the full cooldown (no retries)
//! - While degraded the configured fail-open/fail-closed decision is returned
//!   without touching the store

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerState, DegradedMode};
use crate::resilience::clock::{Clock, SystemClock};
use crate::security::identity::ClientIdentity;
use crate::security::rate_limit::store::{CounterStore, StoreError, WINDOW_SCRIPT};

/// Settings for [`SharedFixedWindowLimiter`].
#[derive(Debug, Clone)]
pub struct SharedLimiterSettings {
    pub requests_per_minute: i64,
    pub key_prefix: String,
    pub window_seconds: u64,
    pub failure_cooldown: Duration,
    pub fail_open: bool,
}

pub struct SharedFixedWindowLimiter {
    settings: SharedLimiterSettings,
    store: Arc<dyn CounterStore>,
    script_handle: ArcSwapOption<String>,
    breaker: DegradedMode,
    clock: Arc<dyn Clock>,
}

impl SharedFixedWindowLimiter {
    pub fn new(settings: SharedLimiterSettings, store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(settings, store, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        mut settings: SharedLimiterSettings,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        settings.requests_per_minute = settings.requests_per_minute.max(0);
        settings.window_seconds = settings.window_seconds.max(1);
        Self {
            settings,
            store,
            script_handle: ArcSwapOption::empty(),
            breaker: DegradedMode::new(),
            clock,
        }
    }

    pub fn enabled(&self) -> bool {
        self.settings.requests_per_minute > 0
    }

    pub fn limit(&self) -> i64 {
        self.settings.requests_per_minute
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state(self.clock.monotonic())
    }

    /// Count one request for `identity` and report whether it is within budget.
    pub async fn allow(&self, identity: &ClientIdentity) -> bool {
        if !self.enabled() {
            return true;
        }

        let now = self.clock.monotonic();
        if self.breaker.is_degraded(now) {
            return self.settings.fail_open;
        }

        let key = self.key_for(identity);
        match self.increment(&key).await {
            Ok(count) => {
                self.breaker.reset();
                count <= self.settings.requests_per_minute
            }
            Err(err) => {
                self.breaker.trip(now, self.settings.failure_cooldown);
                tracing::warn!(
                    error = %err,
                    cooldown_secs = self.settings.failure_cooldown.as_secs(),
                    fail_open = self.settings.fail_open,
                    "Rate limit store error, entering degraded mode"
                );
                metrics::record_degraded_entry(self.settings.fail_open);
                self.settings.fail_open
            }
        }
    }

    fn key_for(&self, identity: &ClientIdentity) -> String {
        format!(
            "{}:{}:{}",
            self.settings.key_prefix,
            self.clock.bucket(),
            identity
        )
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let handle = match self.script_handle.load_full() {
            Some(handle) => handle,
            None => self.reload_script().await?,
        };

        match self
            .store
            .eval_script(&handle, key, self.settings.window_seconds)
            .await
        {
            Err(StoreError::NoScript) => {
                tracing::debug!("Script handle evicted from store, reloading");
                let handle = self.reload_script().await?;
                self.store
                    .eval_script(&handle, key, self.settings.window_seconds)
                    .await
            }
            other => other,
        }
    }

    async fn reload_script(&self) -> Result<Arc<String>, StoreError> {
        let handle = Arc::new(self.store.load_script(WINDOW_SCRIPT).await?);
        self.script_handle.store(Some(handle.clone()));
        Ok(handle)
    }
}
