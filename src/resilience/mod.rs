//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Shared-store rate limit check:
//!     → circuit_breaker.rs (skip the store while degraded)
//!     → timeouts.rs (sub-second deadline on the store call)
//!     → On failure: circuit_breaker.rs trips for the cooldown
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call has a deadline
//! - No retries on outage; the breaker absorbs failures instead
//! - clock.rs makes windows and cooldowns deterministic under test

pub mod circuit_breaker;
pub mod clock;
pub mod timeouts;

pub use circuit_breaker::{BreakerState, DegradedMode};
pub use clock::{Clock, ManualClock, SystemClock, BUCKET_SECS};
