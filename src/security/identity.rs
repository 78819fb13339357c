//! Client identity resolution for rate limiting.
//!
//! # Responsibilities
//! - Parse the trusted proxy network list once at startup
//! - Derive a stable rate-limit key from the peer address and headers
//!
//! # Design Decisions
//! - X-Forwarded-For is honoured only when the direct peer is a trusted proxy
//! - Only the first hop is used, and only if it is a literal IP address
//! - Unidentifiable callers all share the `request:unknown` bucket

use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identity shared by every caller we cannot tell apart.
pub const UNKNOWN_CLIENT: &str = "request:unknown";

/// A trusted proxy list entry that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid trusted proxy entry: {0}")]
pub struct InvalidProxyEntry(pub String);

/// Immutable set of networks allowed to supply forwarding headers.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parse CIDR blocks or bare addresses. Blank entries are skipped.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, InvalidProxyEntry> {
        let mut networks = Vec::with_capacity(entries.len());
        for raw in entries {
            let value = raw.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            networks.push(parse_network(value)?);
        }
        Ok(Self { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&addr))
    }
}

fn parse_network(value: &str) -> Result<IpNet, InvalidProxyEntry> {
    if let Ok(net) = value.parse::<IpNet>() {
        // Host bits are tolerated; "10.0.0.7/8" means 10.0.0.0/8.
        return Ok(net.trunc());
    }
    value
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| InvalidProxyEntry(value.to_string()))
}

/// The key a request is rate limited under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves who a request comes from.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentityResolver {
    trusted: TrustedProxies,
}

impl ClientIdentityResolver {
    pub fn new(trusted: TrustedProxies) -> Self {
        Self { trusted }
    }

    pub fn trusted_proxies(&self) -> &TrustedProxies {
        &self.trusted
    }

    /// Resolve the identity of a request.
    ///
    /// `headers` must be the headers as sent by the caller; the request ID
    /// fallback only applies to a caller-supplied `X-Request-Id`.
    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> ClientIdentity {
        let Some(peer) = peer else {
            return fallback_identity(headers);
        };

        if self.trusted.is_empty() || !self.trusted.contains(peer) {
            return ClientIdentity::from(peer);
        }

        match forwarded_client(headers) {
            Some(client) => {
                tracing::debug!(
                    peer = %peer,
                    client = %client,
                    "Using X-Forwarded-For from trusted proxy"
                );
                ClientIdentity::from(client)
            }
            None => ClientIdentity::from(peer),
        }
    }
}

/// First hop of X-Forwarded-For, if it is a literal IP address.
fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let first_hop = value.split(',').next()?.trim();
    if first_hop.is_empty() {
        return None;
    }
    first_hop.parse().ok()
}

fn fallback_identity(headers: &HeaderMap) -> ClientIdentity {
    if let Some(request_id) = header_value(headers, X_REQUEST_ID) {
        return ClientIdentity(format!("request-id:{request_id}"));
    }
    if let Some(real_ip) = header_value(headers, X_REAL_IP) {
        return ClientIdentity(real_ip.to_string());
    }
    ClientIdentity::unknown()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
