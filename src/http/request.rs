//! Request identification and tracing spans.
//!
//! # Design Decisions
//! - Request ID assigned at the outermost layer so every log line carries it
//! - A client-supplied `x-request-id` is kept, not replaced
//! - The ID is echoed on the response for support correlation

use axum::{body::Body, http::Request};
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Read the request ID set by `SetRequestIdLayer`.
pub fn request_id(request: &Request<Body>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span factory for `TraceLayer::make_span_with`.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(request),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
