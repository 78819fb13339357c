//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, cooldowns, body limits > 0)
//! - Check cross-field requirements (shared store needs a URL)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdmissionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{AdmissionConfig, RateLimitBackend};
use crate::security::identity::TrustedProxies;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rate_limit.store_url is required when backend is shared-store")]
    MissingStoreUrl,
    #[error("rate_limit.window_seconds must be at least 1")]
    WindowTooSmall,
    #[error("rate_limit.failure_cooldown_seconds must be greater than 0")]
    CooldownNotPositive,
    #[error("rate_limit.store_timeout_ms must be between 1 and 999, got {0}")]
    StoreTimeoutOutOfRange(u64),
    #[error("security.max_request_body_bytes must be greater than 0")]
    BodyLimitNotPositive,
    #[error("security.guarded_path_prefix must start with '/', got {0:?}")]
    InvalidGuardedPrefix(String),
    #[error("security.trusted_proxy_cidrs: invalid entry {0:?}")]
    InvalidTrustedProxy(String),
    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("security.strict_mode requires rate_limit.requests_per_minute > 0")]
    StrictModeWithoutRateLimit,
    #[error("security.strict_mode requires access.require_jwt")]
    StrictModeWithoutAuth,
}

/// Check the whole configuration and collect every problem found.
pub fn validate_config(config: &AdmissionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let rate_limit = &config.rate_limit;
    if rate_limit.backend == RateLimitBackend::SharedStore && rate_limit.store_url().is_none() {
        errors.push(ValidationError::MissingStoreUrl);
    }
    if rate_limit.window_seconds == 0 {
        errors.push(ValidationError::WindowTooSmall);
    }
    if rate_limit.failure_cooldown_seconds == 0 {
        errors.push(ValidationError::CooldownNotPositive);
    }
    if !(1..=999).contains(&rate_limit.store_timeout_ms) {
        errors.push(ValidationError::StoreTimeoutOutOfRange(rate_limit.store_timeout_ms));
    }

    let security = &config.security;
    if security.max_request_body_bytes == 0 {
        errors.push(ValidationError::BodyLimitNotPositive);
    }
    if !security.guarded_path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidGuardedPrefix(
            security.guarded_path_prefix.clone(),
        ));
    }
    if let Err(e) = TrustedProxies::parse(&security.trusted_proxy_cidrs) {
        errors.push(ValidationError::InvalidTrustedProxy(e.0));
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if security.strict_mode {
        if !rate_limit.enabled() {
            errors.push(ValidationError::StrictModeWithoutRateLimit);
        }
        if !config.access.require_jwt {
            errors.push(ValidationError::StrictModeWithoutAuth);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
