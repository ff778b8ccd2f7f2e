//! Request interceptor middleware.
//!
//! Runs in front of every route:
//! - excluded asset prefixes pass through untouched
//! - contact submissions are rate limited per client
//! - every other response gets the security headers

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::EdgeConfig;
use crate::error::RateLimitExceeded;
use crate::observability::metrics;
use crate::security::client_ip::ClientIdentifier;
use crate::security::headers::{InvalidHeader, SecurityHeaders};
use crate::security::rate_limit::{RateLimitDecision, RateLimitPolicy, SlidingWindowLimiter};

/// Clears the caller's ledger entry before evaluation. Test hooks only.
pub const X_TEST_RESET_RATE_LIMIT: &str = "x-test-reset-rate-limit";
/// Skips rate limit evaluation for the request. Test hooks only.
pub const X_TEST_BYPASS_RATE_LIMIT: &str = "x-test-bypass-rate-limit";

/// Reloadable part of the interceptor.
#[derive(Debug)]
pub struct InterceptorPolicy {
    contact_prefix: String,
    excluded_prefixes: Vec<String>,
    test_hooks: bool,
    clients: ClientIdentifier,
    headers: SecurityHeaders,
}

impl InterceptorPolicy {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, InvalidHeader> {
        Ok(Self {
            contact_prefix: config.interceptor.contact_prefix.clone(),
            excluded_prefixes: config.interceptor.excluded_prefixes.clone(),
            test_hooks: config.interceptor.test_hooks,
            clients: ClientIdentifier::new(&config.interceptor.trusted_proxies),
            headers: SecurityHeaders::from_config(&config.headers)?,
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn is_contact(&self, path: &str) -> bool {
        path.starts_with(&self.contact_prefix)
    }
}

/// Shared interceptor state: the rate limit ledger plus the live policy.
#[derive(Debug)]
pub struct Interceptor {
    limiter: Arc<SlidingWindowLimiter>,
    policy: ArcSwap<InterceptorPolicy>,
}

impl Interceptor {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, InvalidHeader> {
        let limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit));
        Self::with_limiter(config, limiter)
    }

    /// Use an externally built limiter, e.g. one driven by a manual clock.
    pub fn with_limiter(
        config: &EdgeConfig,
        limiter: Arc<SlidingWindowLimiter>,
    ) -> Result<Self, InvalidHeader> {
        Ok(Self {
            limiter,
            policy: ArcSwap::from_pointee(InterceptorPolicy::from_config(config)?),
        })
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    /// The prefix the contact route is mounted on.
    pub fn contact_prefix(&self) -> String {
        self.policy.load().contact_prefix.clone()
    }

    /// Swap in settings from a reloaded config. Ledger contents survive.
    ///
    /// The contact prefix is fixed by the router built at startup, so a
    /// changed prefix is ignored until restart.
    pub fn reload(&self, config: &EdgeConfig) -> Result<(), InvalidHeader> {
        let mut policy = InterceptorPolicy::from_config(config)?;
        let current = self.policy.load();
        if policy.contact_prefix != current.contact_prefix {
            tracing::warn!(
                current = %current.contact_prefix,
                requested = %policy.contact_prefix,
                "interceptor.contact_prefix requires a restart; keeping current prefix"
            );
            policy.contact_prefix = current.contact_prefix.clone();
        }
        self.policy.store(Arc::new(policy));
        self.limiter.set_policy(RateLimitPolicy::from(&config.rate_limit));
        Ok(())
    }
}

fn header_is_true(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Middleware entry point, installed with `middleware::from_fn_with_state`.
pub async fn intercept(
    State(interceptor): State<Arc<Interceptor>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let policy = interceptor.policy.load_full();
    let path = request.uri().path().to_string();

    if policy.is_excluded(&path) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = policy.clients.resolve(peer, request.headers());

    let (reset, bypass) = if policy.test_hooks {
        (
            header_is_true(request.headers(), X_TEST_RESET_RATE_LIMIT),
            header_is_true(request.headers(), X_TEST_BYPASS_RATE_LIMIT),
        )
    } else {
        (false, false)
    };

    if reset {
        tracing::debug!(client = %client, "Rate limit reset by test hook");
        interceptor.limiter.reset(&client);
    }

    let contact = policy.is_contact(&path);
    if contact && !bypass {
        match interceptor.limiter.check(&client) {
            RateLimitDecision::Allowed { remaining } => {
                tracing::debug!(client = %client, remaining, "Contact request admitted");
            }
            RateLimitDecision::Limited => {
                tracing::warn!(client = %client, path = %path, "Rate limit exceeded");
                metrics::record_rate_limited();
                let response = RateLimitExceeded.into_response();
                metrics::record_request("contact", response.status().as_u16());
                return response;
            }
        }
    }

    let mut response = next.run(request).await;
    policy.headers.apply(response.headers_mut());
    metrics::record_request(
        if contact { "contact" } else { "site" },
        response.status().as_u16(),
    );
    response
}
