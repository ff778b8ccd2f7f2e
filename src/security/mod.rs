//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → interceptor.rs (skip excluded asset prefixes)
//!     → client_ip.rs (derive the client identifier)
//!     → rate_limit.rs (sliding window on the contact route)
//!     → route handler
//!     → headers.rs (stamp security headers on the response)
//! ```
//!
//! # Design Decisions
//! - The ledger is owned by the interceptor state, never global
//! - Rejections carry no security headers and no retry hint
//! - Test control headers are honored only when explicitly enabled

pub mod client_ip;
pub mod headers;
pub mod interceptor;
pub mod rate_limit;

pub use client_ip::ClientIdentifier;
pub use headers::SecurityHeaders;
pub use interceptor::{intercept, Interceptor};
pub use rate_limit::{
    spawn_sweeper, Clock, ManualClock, RateLimitDecision, RateLimitPolicy, SlidingWindowLimiter,
    SystemClock,
};
