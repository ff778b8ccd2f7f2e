//! Security response headers.
//!
//! # Responsibilities
//! - Build the Content-Security-Policy from configured directives
//! - Hold the fixed set of hardening headers as pre-validated values
//! - Stamp them onto responses, replacing anything set downstream

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::HeadersConfig;

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {source}")]
pub struct InvalidHeader {
    name: HeaderName,
    #[source]
    source: axum::http::header::InvalidHeaderValue,
}

/// The headers attached to every intercepted response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &HeadersConfig) -> Result<Self, InvalidHeader> {
        let csp = config.content_security_policy.join("; ");
        let pairs = [
            (CONTENT_SECURITY_POLICY, csp.as_str()),
            (X_CONTENT_TYPE_OPTIONS, config.content_type_options.as_str()),
            (X_FRAME_OPTIONS, config.frame_options.as_str()),
            (REFERRER_POLICY, config.referrer_policy.as_str()),
        ];

        let headers = pairs
            .into_iter()
            .map(|(name, value)| match HeaderValue::from_str(value) {
                Ok(v) => Ok((name, v)),
                Err(source) => Err(InvalidHeader { name, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers })
    }

    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_values() {
        let headers = SecurityHeaders::from_config(&HeadersConfig::default()).unwrap();

        assert_eq!(
            headers.get(&CONTENT_SECURITY_POLICY).unwrap(),
            "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
             style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; \
             connect-src 'self'; object-src 'none'; base-uri 'self'; form-action 'self'; \
             frame-ancestors 'none'"
        );
        assert_eq!(headers.get(&X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(&X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(
            headers.get(&REFERRER_POLICY).unwrap(),
            "strict-origin-when-cross-origin"
        );
    }

    #[test]
    fn test_apply_overwrites_existing() {
        let headers = SecurityHeaders::from_config(&HeadersConfig::default()).unwrap();
        let mut target = HeaderMap::new();
        target.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));

        headers.apply(&mut target);
        assert_eq!(target.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(target.get_all(X_FRAME_OPTIONS).iter().count(), 1);
        assert_eq!(target.len(), 4);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let config = HeadersConfig {
            referrer_policy: "no-referrer\n".into(),
            ..HeadersConfig::default()
        };
        let err = SecurityHeaders::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("referrer-policy"));
    }
}
