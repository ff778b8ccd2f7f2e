//! Edge service for a personal portfolio site.
//!
//! Serves the built site, relays contact form submissions by mail, and runs
//! every request through an interceptor that rate limits contact submissions
//! per client and stamps security headers on responses.

pub mod config;
pub mod contact;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::EdgeConfig;
pub use http::EdgeServer;
pub use lifecycle::Shutdown;
