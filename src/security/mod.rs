//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → limits.rs (body size ceiling, guarded writes only)
//!     → access.rs (bearer token + scope, protected routes)
//!     → identity.rs (who is calling: peer, trusted proxy chain, fallbacks)
//!     → rate_limit/ (per-identity fixed window)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Cheapest checks first: a declared oversize body never reaches the limiter
//! - Forwarding headers are only believed from configured trusted proxies
//! - Each check is a plain type; the HTTP wiring lives in `http::middleware`

pub mod access;
pub mod identity;
pub mod limits;
pub mod rate_limit;

pub use access::{AccessControl, AccessDenied, Claims, ScopePolicy, TokenRejected, TokenValidator};
pub use identity::{ClientIdentity, ClientIdentityResolver, TrustedProxies};
pub use limits::{BodyGuardPolicy, BodyGuardState};
pub use rate_limit::RateLimiter;
