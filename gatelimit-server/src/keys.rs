//! Limiter key derivation from request context
//!
//! Admission state is keyed by client identity. The default derivation
//! walks the usual proxy chain: an explicit [`ClientIp`] extension wins,
//! then the first hop of `x-forwarded-for`, then `x-real-ip`, then the
//! socket peer address, and finally a shared `unknown` bucket so clients
//! that defeat identification are throttled together rather than not at
//! all.

use axum::extract::{ConnectInfo, Request};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Prefix for request-derived keys
pub const KEY_PREFIX: &str = "rate-limit:";

/// Key used for programmatic checks with no request context
pub const GLOBAL_KEY: &str = "rate-limit:global";

/// Explicit client identity set by an upstream layer
///
/// When present as a request extension this wins over every header and
/// socket derivation, letting auth middleware pin the identity it already
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

type KeyFn = dyn Fn(&Request) -> String + Send + Sync;

/// Strategy for deriving the limiter key from a request
#[derive(Clone)]
pub enum KeyExtractor {
    /// Resolve the peer identity and prefix it with `rate-limit:`
    PeerIp,
    /// Full override; the returned key is used verbatim, no prefix added
    Custom(Arc<KeyFn>),
}

impl KeyExtractor {
    /// Build a custom extractor from a closure
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        KeyExtractor::Custom(Arc::new(f))
    }

    /// Derive the limiter key for `req`
    pub fn extract(&self, req: &Request) -> String {
        match self {
            KeyExtractor::PeerIp => match client_ip(req) {
                Some(ip) => format!("{KEY_PREFIX}{ip}"),
                None => format!("{KEY_PREFIX}unknown"),
            },
            KeyExtractor::Custom(f) => f(req),
        }
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExtractor::PeerIp => f.write_str("PeerIp"),
            KeyExtractor::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Default for KeyExtractor {
    fn default() -> Self {
        KeyExtractor::PeerIp
    }
}

fn client_ip(req: &Request) -> Option<String> {
    if let Some(ClientIp(ip)) = req.extensions().get::<ClientIp>() {
        return Some(ip.to_string());
    }

    let headers = req.headers();
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // Only the first hop names the client; the rest are proxies
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
