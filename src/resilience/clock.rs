//! Time sources.
//!
//! Fixed windows are aligned to wall-clock minutes, while cooldowns are
//! measured on a monotonic clock so wall-clock adjustments cannot shorten or
//! extend them. Both readings come from one [`Clock`] so tests can drive them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Length of one fixed rate-limit window.
pub const BUCKET_SECS: u64 = 60;

pub trait Clock: Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn unix_secs(&self) -> u64;

    /// Time elapsed since an arbitrary, fixed origin. Never goes backwards.
    fn monotonic(&self) -> Duration;

    /// Index of the current fixed window.
    fn bucket(&self) -> u64 {
        self.unix_secs() / BUCKET_SECS
    }
}

/// The real clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    unix_secs: AtomicU64,
    monotonic_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(unix_secs: u64) -> Self {
        Self {
            unix_secs: AtomicU64::new(unix_secs),
            monotonic_nanos: AtomicU64::new(0),
        }
    }

    /// Move both readings forward.
    pub fn advance(&self, by: Duration) {
        self.unix_secs.fetch_add(by.as_secs(), Ordering::SeqCst);
        self.monotonic_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump the wall clock without touching the monotonic reading.
    pub fn set_unix_secs(&self, secs: u64) {
        self.unix_secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_secs(&self) -> u64 {
        self.unix_secs.load(Ordering::SeqCst)
    }

    fn monotonic(&self) -> Duration {
        Duration::from_nanos(self.monotonic_nanos.load(Ordering::SeqCst))
    }
}
