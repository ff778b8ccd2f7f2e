//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the edge service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Static site settings.
    pub site: SiteConfig,

    /// Request interceptor settings (routes, exclusions, proxies).
    pub interceptor: InterceptorConfig,

    /// Rate limiting configuration for the contact route.
    pub rate_limit: RateLimitConfig,

    /// Security response headers.
    pub headers: HeadersConfig,

    /// Outbound mail settings for contact submissions.
    pub mail: MailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
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

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Directory holding the built site.
    pub public_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
        }
    }
}

/// Request interceptor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Path prefix of the contact submission route. Rate limited.
    pub contact_prefix: String,

    /// Path prefixes that bypass the interceptor entirely.
    pub excluded_prefixes: Vec<String>,

    /// Peers whose `x-forwarded-for` header is trusted over the socket address.
    pub trusted_proxies: Vec<String>,

    /// Honor the `x-test-*` control headers. Never enable in production.
    pub test_hooks: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            contact_prefix: "/api/contact".to_string(),
            excluded_prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/favicon.ico".to_string(),
            ],
            trusted_proxies: Vec::new(),
            test_hooks: false,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per client inside one window.
    pub max_requests: usize,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Upper bound on distinct clients held in the ledger.
    pub max_tracked_clients: usize,

    /// How often idle clients are swept from the ledger, in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 15 * 60,
            max_tracked_clients: 100_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Security response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Content-Security-Policy directives, joined with "; ".
    pub content_security_policy: Vec<String>,

    pub content_type_options: String,

    pub frame_options: String,

    pub referrer_policy: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            // 'unsafe-eval' and inline styles are needed by the site's WebGL and
            // animation bundles.
            content_security_policy: [
                "default-src 'self'",
                "script-src 'self' 'unsafe-inline' 'unsafe-eval'",
                "style-src 'self' 'unsafe-inline'",
                "img-src 'self' data:",
                "font-src 'self'",
                "connect-src 'self'",
                "object-src 'none'",
                "base-uri 'self'",
                "form-action 'self'",
                "frame-ancestors 'none'",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            content_type_options: "nosniff".to_string(),
            frame_options: "DENY".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
        }
    }
}

/// Which mail transport handles contact submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Log the message instead of sending it.
    Log,
    /// Relay through an SMTP server.
    Smtp,
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub transport: MailTransport,

    /// SMTP relay address (e.g., "127.0.0.1:25").
    pub smtp_address: String,

    /// Name announced in EHLO.
    pub helo_name: String,

    /// Envelope and header sender.
    pub from: String,

    /// Site owner's inbox.
    pub to: String,

    /// Deadline for a whole SMTP transaction, in seconds.
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            smtp_address: "127.0.0.1:25".to_string(),
            helo_name: "portfolio-edge".to_string(),
            from: String::new(),
            to: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
