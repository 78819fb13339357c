//! Per-request admission decisions.
//!
//! # Responsibilities
//! - Build every admission component from one validated config
//! - Expose each check as a call returning `Ok` or a [`Rejection`]
//!
//! # Design Decisions
//! - Construction fails fast on anything ambiguous: invalid config, an
//!   unusable store URL, or token checks without a validator
//! - Identity is only resolved when rate limiting is enabled

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, Method};

use crate::config::schema::AdmissionConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::health::BackendHealth;
use crate::http::response::Rejection;
use crate::observability::metrics;
use crate::security::access::{AccessControl, AccessDenied, Claims, ScopePolicy, TokenValidator};
use crate::security::identity::{
    ClientIdentity, ClientIdentityResolver, InvalidProxyEntry, TrustedProxies,
};
use crate::security::limits::{BodyGuardPolicy, BodyGuardState};
use crate::security::rate_limit::{LimiterBuildError, RateLimiter};

/// Startup failures wiring the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<ValidationError>),
    #[error(transparent)]
    TrustedProxy(#[from] InvalidProxyEntry),
    #[error("rate limiter: {0}")]
    Limiter(#[from] LimiterBuildError),
    #[error("access.require_jwt is set but no token validator was provided")]
    MissingTokenValidator,
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything needed to admit or refuse a request.
pub struct AdmissionPipeline {
    resolver: ClientIdentityResolver,
    limiter: RateLimiter,
    body_policy: BodyGuardPolicy,
    access: AccessControl,
}

impl AdmissionPipeline {
    /// Build the pipeline, including the configured rate-limit backend.
    pub fn from_config(
        config: &AdmissionConfig,
        validator: Option<Arc<dyn TokenValidator>>,
    ) -> Result<Self, AdmissionError> {
        validate_config(config).map_err(AdmissionError::Config)?;
        let limiter = RateLimiter::from_config(&config.rate_limit)?;
        Self::with_limiter(config, limiter, validator)
    }

    /// Build the pipeline around an already constructed limiter.
    pub fn with_limiter(
        config: &AdmissionConfig,
        limiter: RateLimiter,
        validator: Option<Arc<dyn TokenValidator>>,
    ) -> Result<Self, AdmissionError> {
        let trusted = TrustedProxies::parse(&config.security.trusted_proxy_cidrs)?;
        let resolver = ClientIdentityResolver::new(trusted);
        let body_policy = BodyGuardPolicy::new(
            config.security.max_request_body_bytes,
            config.security.guarded_path_prefix.clone(),
        );
        let access = match (config.access.require_jwt, validator) {
            (false, _) => AccessControl::Disabled,
            (true, Some(validator)) => AccessControl::Bearer {
                validator,
                policy: ScopePolicy::from_config(&config.access),
            },
            (true, None) => return Err(AdmissionError::MissingTokenValidator),
        };

        tracing::info!(
            rate_limit_enabled = limiter.enabled(),
            backend = %limiter.backend(),
            limit_per_minute = limiter.limit(),
            trusted_proxies = resolver.trusted_proxies().len(),
            max_request_body_bytes = body_policy.limit(),
            require_jwt = access.is_enabled(),
            "Admission pipeline ready"
        );

        Ok(Self {
            resolver,
            limiter,
            body_policy,
            access,
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Apply the body guard. See [`BodyGuardPolicy::admit`].
    pub fn guard_body(
        &self,
        req: Request,
    ) -> Result<(Request, Option<Arc<BodyGuardState>>), Rejection> {
        self.body_policy.admit(req).inspect_err(|rejection| {
            let reason = match rejection {
                Rejection::BadRequest { .. } => "invalid_length",
                _ => "declared_length",
            };
            tracing::warn!(
                reason,
                limit = self.body_policy.limit(),
                "Request body rejected before read"
            );
            metrics::record_body_rejection(reason);
        })
    }

    /// Check credentials and scope.
    pub fn authorize(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Option<Claims>, Rejection> {
        self.access.check(method, headers).map_err(|denied| match denied {
            AccessDenied::Unauthorized => Rejection::Unauthorized,
            AccessDenied::Forbidden => Rejection::Forbidden,
        })
    }

    pub fn resolve_identity(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> ClientIdentity {
        self.resolver.resolve(peer, headers)
    }

    /// Count the request against its caller's budget.
    pub async fn check_rate_limit(
        &self,
        peer: Option<IpAddr>,
        headers: &HeaderMap,
    ) -> Result<(), Rejection> {
        if !self.limiter.enabled() {
            return Ok(());
        }

        let identity = self.resolve_identity(peer, headers);
        let allowed = self.limiter.allow(&identity).await;
        let backend = self.limiter.backend();
        metrics::record_rate_limit_decision(backend.as_str(), allowed);

        if allowed {
            Ok(())
        } else {
            tracing::warn!(client = %identity, backend = %backend, "Rate limit exceeded");
            Err(Rejection::RateLimited {
                limit: self.limiter.limit(),
                backend,
            })
        }
    }

    pub async fn check_backend_health(&self) -> BackendHealth {
        self.limiter.check_backend_health().await
    }
}
