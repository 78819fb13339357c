//! Bearer-token access control.
//!
//! # Responsibilities
//! - Extract the bearer token from `Authorization`
//! - Hand it to a [`TokenValidator`] for signature and expiry checks
//! - Check the validated claims carry the scope the method needs
//!
//! # Design Decisions
//! - Signature verification is behind a trait; this module only inspects claims
//! - The admin role bypasses scope checks entirely
//! - An empty configured scope means the method needs no scope

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{header, HeaderMap, Method};
use serde_json::{Map, Value};

use crate::config::schema::AccessConfig;

/// Validated token payload.
pub type Claims = Map<String, Value>;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    /// No usable credentials, or the validator rejected them.
    #[error("unauthorized")]
    Unauthorized,
    /// Valid credentials without the required scope.
    #[error("forbidden")]
    Forbidden,
}

/// The validator refused the token.
#[derive(Debug, thiserror::Error)]
#[error("token rejected: {0}")]
pub struct TokenRejected(pub String);

/// Verifies a bearer token and returns its claims.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Claims, TokenRejected>;
}

/// Scope names per method class, plus the admin role.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    read: Option<String>,
    write: Option<String>,
    delete: Option<String>,
    admin_role: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

impl ScopePolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            read: non_empty(&config.scope_read),
            write: non_empty(&config.scope_write),
            delete: non_empty(&config.scope_delete),
            admin_role: non_empty(&config.admin_role),
        }
    }

    /// Scope needed for `method`, if any.
    pub fn required_scope(&self, method: &Method) -> Option<&str> {
        match *method {
            Method::GET | Method::HEAD => self.read.as_deref(),
            Method::POST | Method::PUT | Method::PATCH => self.write.as_deref(),
            Method::DELETE => self.delete.as_deref(),
            _ => None,
        }
    }

    /// Check `claims` against the scope `method` requires.
    pub fn authorize(&self, method: &Method, claims: &Claims) -> Result<(), AccessDenied> {
        let Some(required) = self.required_scope(method) else {
            return Ok(());
        };

        if let Some(admin) = self.admin_role.as_deref() {
            if claim_values(claims, &["role", "roles"]).contains(admin) {
                return Ok(());
            }
        }

        if claim_values(claims, &["scope", "scopes"]).contains(required) {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden)
        }
    }
}

/// Collect string values under `keys`.
///
/// `scope` is a space-separated list; every other key holds either a single
/// string or a list of strings.
fn claim_values<'a>(claims: &'a Claims, keys: &[&str]) -> HashSet<&'a str> {
    let mut values = HashSet::new();
    for key in keys {
        match claims.get(*key) {
            Some(Value::String(raw)) if *key == "scope" => {
                values.extend(raw.split_whitespace());
            }
            Some(Value::String(raw)) => {
                let raw = raw.trim();
                if !raw.is_empty() {
                    values.insert(raw);
                }
            }
            Some(Value::Array(items)) => {
                values.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty()),
                );
            }
            _ => {}
        }
    }
    values
}

/// Parse `Authorization: Bearer <token>`. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Access control as configured: either disabled, or a validator plus policy.
#[derive(Clone)]
pub enum AccessControl {
    Disabled,
    Bearer {
        validator: Arc<dyn TokenValidator>,
        policy: ScopePolicy,
    },
}

impl AccessControl {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AccessControl::Bearer { .. })
    }

    /// Admit or refuse a request, returning its claims when checked.
    pub fn check(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Option<Claims>, AccessDenied> {
        let AccessControl::Bearer { validator, policy } = self else {
            return Ok(None);
        };

        let token = bearer_token(headers).ok_or(AccessDenied::Unauthorized)?;
        let claims = validator.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AccessDenied::Unauthorized
        })?;
        policy.authorize(method, &claims)?;
        Ok(Some(claims))
    }
}
