//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, limits > 0)
//! - Check that paths, addresses and header values are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderValue;

use crate::config::schema::{EdgeConfig, MailTransport};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `rate_limit.window_secs`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than zero"));
    }

    let rl = &config.rate_limit;
    if rl.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than zero"));
    }
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than zero"));
    }
    if rl.max_tracked_clients == 0 {
        errors.push(ValidationError::new(
            "rate_limit.max_tracked_clients",
            "must be greater than zero",
        ));
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    let ic = &config.interceptor;
    if !ic.contact_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "interceptor.contact_prefix",
            "must start with '/'",
        ));
    }
    for (i, prefix) in ic.excluded_prefixes.iter().enumerate() {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("interceptor.excluded_prefixes[{}]", i),
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }
    for (i, proxy) in ic.trusted_proxies.iter().enumerate() {
        if proxy.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::new(
                format!("interceptor.trusted_proxies[{}]", i),
                format!("'{}' is not an IP address", proxy),
            ));
        }
    }

    let headers = &config.headers;
    let csp = headers.content_security_policy.join("; ");
    for (field, value) in [
        ("headers.content_security_policy", csp.as_str()),
        ("headers.content_type_options", headers.content_type_options.as_str()),
        ("headers.frame_options", headers.frame_options.as_str()),
        ("headers.referrer_policy", headers.referrer_policy.as_str()),
    ] {
        if value.is_empty() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(field, "must be a non-empty header value"));
        }
    }

    let mail = &config.mail;
    if mail.transport == MailTransport::Smtp {
        if mail.from.trim().is_empty() {
            errors.push(ValidationError::new("mail.from", "required when transport is smtp"));
        }
        if mail.to.trim().is_empty() {
            errors.push(ValidationError::new("mail.to", "required when transport is smtp"));
        }
        if mail.smtp_address.trim().is_empty() {
            errors.push(ValidationError::new("mail.smtp_address", "required when transport is smtp"));
        }
        if mail.timeout_secs == 0 {
            errors.push(ValidationError::new("mail.timeout_secs", "must be greater than zero"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
