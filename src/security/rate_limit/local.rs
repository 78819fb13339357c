//! In-process fixed-window limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::resilience::clock::{Clock, SystemClock};
use crate::security::identity::ClientIdentity;

/// Once the map holds this many identities, stale windows are pruned on write.
pub const PRUNE_THRESHOLD: usize = 4096;

/// Per-identity `(window bucket, count)` counters behind one mutex.
pub struct LocalFixedWindowLimiter {
    limit: i64,
    windows: Mutex<HashMap<String, (u64, i64)>>,
    clock: Arc<dyn Clock>,
}

impl LocalFixedWindowLimiter {
    pub fn new(requests_per_minute: i64) -> Self {
        Self::with_clock(requests_per_minute, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(requests_per_minute: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit: requests_per_minute.max(0),
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Count one request for `identity` and report whether it is within budget.
    pub fn allow(&self, identity: &ClientIdentity) -> bool {
        if !self.enabled() {
            return true;
        }

        let bucket = self.clock.bucket();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = windows
            .entry(identity.as_str().to_owned())
            .or_insert((bucket, 0));
        if entry.0 != bucket {
            *entry = (bucket, 0);
        }
        entry.1 += 1;
        let count = entry.1;

        if windows.len() >= PRUNE_THRESHOLD {
            let oldest_kept = bucket.saturating_sub(1);
            windows.retain(|_, (b, _)| *b >= oldest_kept);
        }

        count <= self.limit
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;
    use std::time::Duration;

    fn id(s: &str) -> ClientIdentity {
        ClientIdentity::from(s.parse::<std::net::IpAddr>().unwrap())
    }

    #[test]
    fn test_window_rollover() {
        let clock = Arc::new(ManualClock::new(6_000));
        let limiter = LocalFixedWindowLimiter::with_clock(1, clock.clone());
        let client = id("203.0.113.5");

        assert!(limiter.allow(&client));
        assert!(!limiter.allow(&client));

        clock.advance(Duration::from_secs(60));
        assert!(limiter.allow(&client));
    }

    #[test]
    fn test_identities_counted_separately() {
        let limiter = LocalFixedWindowLimiter::with_clock(2, Arc::new(ManualClock::new(0)));
        let a = id("10.0.0.1");
        let b = id("10.0.0.2");

        assert!(limiter.allow(&a));
        assert!(limiter.allow(&a));
        assert!(!limiter.allow(&a));
        assert!(limiter.allow(&b));
    }

    #[test]
    fn test_disabled_always_allows() {
        for limit in [0, -5] {
            let limiter = LocalFixedWindowLimiter::new(limit);
            assert!(!limiter.enabled());
            for _ in 0..100 {
                assert!(limiter.allow(&ClientIdentity::unknown()));
            }
            assert_eq!(limiter.tracked(), 0);
        }
    }

    fn numbered(subnet: u8, i: usize) -> ClientIdentity {
        let addr = std::net::IpAddr::from([10, subnet, (i / 256) as u8, (i % 256) as u8]);
        ClientIdentity::from(addr)
    }

    #[test]
    fn test_prunes_stale_windows_past_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = LocalFixedWindowLimiter::with_clock(10, clock.clone());

        for i in 0..(PRUNE_THRESHOLD - 1) {
            limiter.allow(&numbered(0, i));
        }
        assert_eq!(limiter.tracked(), PRUNE_THRESHOLD - 1);

        // Two buckets later every existing entry is stale.
        clock.advance(Duration::from_secs(120));
        limiter.allow(&id("192.0.2.1"));
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_previous_bucket_survives_pruning() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = LocalFixedWindowLimiter::with_clock(10, clock.clone());

        for i in 0..(PRUNE_THRESHOLD - 1) {
            limiter.allow(&numbered(1, i));
        }
        clock.advance(Duration::from_secs(60));
        limiter.allow(&id("192.0.2.1"));
        assert_eq!(limiter.tracked(), PRUNE_THRESHOLD);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let limiter = Arc::new(LocalFixedWindowLimiter::with_clock(
            500,
            Arc::new(ManualClock::new(0)),
        ));
        let client = id("198.51.100.1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let client = client.clone();
                std::thread::spawn(move || (0..100).filter(|_| limiter.allow(&client)).count())
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, 500);
    }
}
