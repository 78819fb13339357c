//! Admission control.
//!
//! # Data Flow
//! ```text
//! AdmissionConfig (validated)
//!     → AdmissionPipeline::from_config (pipeline.rs)
//!         → BodyGuardPolicy      (security::limits)
//!         → AccessControl        (security::access)
//!         → ClientIdentityResolver + RateLimiter
//!     → Arc<AdmissionPipeline>, shared by every request
//! ```
//!
//! # Design Decisions
//! - All admission state is owned by one pipeline value built at startup;
//!   nothing lives in process-wide globals
//! - The pipeline decides; `http::middleware` only adapts it to axum

pub mod pipeline;

pub use pipeline::{AdmissionError, AdmissionPipeline};
