//! Client identifier resolution.
//!
//! The identifier partitions rate limit state. Order of preference:
//! 1. `x-forwarded-for` (first entry) when the peer is a trusted proxy
//! 2. The peer address of the connection
//! 3. `x-forwarded-for` (first entry)
//! 4. The loopback placeholder

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier used when neither the peer address nor a forwarded header is known.
pub const FALLBACK_CLIENT: &str = "127.0.0.1";

/// Resolves the key under which a request is rate limited.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentifier {
    trusted_proxies: HashSet<IpAddr>,
}

impl ClientIdentifier {
    /// Build from configured proxy addresses. Entries that do not parse are
    /// skipped; config validation reports them.
    pub fn new<I, S>(trusted_proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            trusted_proxies: trusted_proxies
                .into_iter()
                .filter_map(|p| p.as_ref().parse().ok())
                .collect(),
        }
    }

    pub fn resolve(&self, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
        let forwarded = forwarded_for(headers);

        match peer {
            Some(addr) if self.trusted_proxies.contains(&addr.ip()) => {
                forwarded.unwrap_or_else(|| addr.ip().to_string())
            }
            Some(addr) => addr.ip().to_string(),
            None => forwarded.unwrap_or_else(|| FALLBACK_CLIENT.to_string()),
        }
    }
}

/// First non-empty entry of `x-forwarded-for`, i.e. the originating client.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
