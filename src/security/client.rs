//! Client identification.
//!
//! The client id keys every piece of guard state. It comes from the first
//! `X-Forwarded-For` entry when forwarded headers are trusted, otherwise from
//! the peer address. Either source can be spoofed or shared (NAT), so the id
//! is an abuse-mitigation heuristic and never an authentication boundary.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

/// Header carrying the original client address when behind a proxy.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Best-effort identifier of the remote client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder used when neither header nor peer address is known.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Resolve the client id of a request.
    pub fn from_request(request: &Request<Body>, trust_forwarded_for: bool) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Self::resolve(request.headers(), peer, trust_forwarded_for)
    }

    /// Resolve from headers and the connection peer.
    pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> Self {
        if trust_forwarded_for {
            if let Some(forwarded) = first_forwarded_for(headers) {
                return Self(forwarded);
            }
        }
        peer.map(|ip| Self(ip.to_string()))
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
