//! Degraded-mode breaker for the shared counter store.
//!
//! # States
//! - Normal: store calls go through
//! - Degraded: store assumed down, calls are skipped until the cooldown ends
//!
//! # State Transitions
//! ```text
//! Normal → Degraded: any store error (one failure is enough)
//! Degraded → Normal: cooldown elapsed (checked lazily on the next call)
//! any → Normal: successful store call
//! ```
//!
//! # Design Decisions
//! - No half-open state: the first call after the cooldown is the trial
//! - Lock-free: the whole state is one atomic timestamp
//! - Racing trips are benign; the later write wins with a near-identical deadline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Observed breaker state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Normal,
    Degraded { until: Duration },
}

/// Tracks `degraded_until` on the monotonic clock, in nanoseconds.
/// Zero means normal operation.
#[derive(Debug, Default)]
pub struct DegradedMode {
    until_nanos: AtomicU64,
}

impl DegradedMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, now: Duration) -> BreakerState {
        let until = self.until_nanos.load(Ordering::Acquire);
        if until != 0 && as_nanos(now) < until {
            BreakerState::Degraded {
                until: Duration::from_nanos(until),
            }
        } else {
            BreakerState::Normal
        }
    }

    pub fn is_degraded(&self, now: Duration) -> bool {
        matches!(self.state(now), BreakerState::Degraded { .. })
    }

    /// Enter degraded mode for `cooldown` starting at `now`.
    pub fn trip(&self, now: Duration, cooldown: Duration) {
        // max(1) keeps a trip at t=0 distinguishable from "normal".
        let until = as_nanos(now).saturating_add(as_nanos(cooldown)).max(1);
        self.until_nanos.store(until, Ordering::Release);
    }

    pub fn reset(&self) {
        self.until_nanos.store(0, Ordering::Release);
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
