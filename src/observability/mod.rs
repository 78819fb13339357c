//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission decisions produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or human format)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID is attached to every rejection body and response header
//! - Metrics are cheap (atomic increments); without an installed recorder
//!   they are no-ops

pub mod logging;
pub mod metrics;
