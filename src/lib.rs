//! Admission control for the archive REST API.

pub mod admission;
pub mod config;
pub mod health;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod security;

pub use admission::{AdmissionError, AdmissionPipeline};
pub use config::schema::AdmissionConfig;
pub use http::HttpServer;
