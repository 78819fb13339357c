//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the admission
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request body guard and proxy trust settings.
    pub security: SecurityConfig,

    /// Bearer token / scope enforcement.
    pub access: AccessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which counter store backs the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitBackend {
    /// In-process fixed-window counters.
    #[default]
    Memory,
    /// Counters kept in a shared Redis-compatible store.
    #[serde(alias = "redis")]
    SharedStore,
}

impl RateLimitBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitBackend::Memory => "memory",
            RateLimitBackend::SharedStore => "shared-store",
        }
    }
}

impl std::fmt::Display for RateLimitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Budget per client per minute. Zero or negative disables rate limiting.
    pub requests_per_minute: i64,

    /// Counter backend.
    pub backend: RateLimitBackend,

    /// Store URL (e.g., "redis://127.0.0.1:6379/0"). Required for the shared store.
    pub store_url: Option<String>,

    /// Namespace for store keys.
    pub key_prefix: String,

    /// TTL applied to store keys on creation, in seconds.
    pub window_seconds: u64,

    /// How long the shared limiter stays in degraded mode after a store error.
    pub failure_cooldown_seconds: u64,

    /// Decision returned while degraded (true = allow).
    pub fail_open: bool,

    /// Deadline for a single store round trip, in milliseconds.
    pub store_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 0,
            backend: RateLimitBackend::Memory,
            store_url: None,
            key_prefix: "civic_archive:rate_limit".to_string(),
            window_seconds: 65,
            failure_cooldown_seconds: 5,
            fail_open: true,
            store_timeout_ms: 200,
        }
    }
}

impl RateLimitConfig {
    /// Whether any counting happens at all.
    pub fn enabled(&self) -> bool {
        self.requests_per_minute > 0
    }

    /// The store URL with surrounding whitespace removed, if non-empty.
    pub fn store_url(&self) -> Option<&str> {
        self.store_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Networks allowed to supply X-Forwarded-For (CIDR or bare IP).
    pub trusted_proxy_cidrs: Vec<String>,

    /// Maximum body size in bytes for guarded writes.
    pub max_request_body_bytes: u64,

    /// Path prefix of state-changing API routes subject to the body guard.
    pub guarded_path_prefix: String,

    /// Refuse to start unless rate limiting and token checks are both on.
    pub strict_mode: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trusted_proxy_cidrs: Vec::new(),
            max_request_body_bytes: 1_048_576, // 1MB
            guarded_path_prefix: "/api/".to_string(),
            strict_mode: false,
        }
    }
}

/// Bearer token and scope configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Require a valid bearer token on protected routes.
    pub require_jwt: bool,

    /// Scope required for GET/HEAD. Empty means none.
    pub scope_read: String,

    /// Scope required for POST/PUT/PATCH.
    pub scope_write: String,

    /// Scope required for DELETE.
    pub scope_delete: String,

    /// Role that bypasses scope checks.
    pub admin_role: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            require_jwt: false,
            scope_read: "archive:read".to_string(),
            scope_write: "archive:write".to_string(),
            scope_delete: "archive:delete".to_string(),
            admin_role: "admin".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
