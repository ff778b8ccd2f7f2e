//! Contact form subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/contact (already admitted by the interceptor)
//!     → handler.rs (JSON extraction)
//!     → submission.rs (validation, all issues at once)
//!     → sanitize.rs + message.rs (escaped HTML part, MIME rendering)
//!     → mailer.rs (SMTP relay or log)
//! ```

pub mod handler;
pub mod mailer;
pub mod message;
pub mod sanitize;
pub mod submission;

pub use handler::{submit_contact, ContactState};
pub use mailer::{build_mailer, LogMailer, MailError, Mailer, SmtpMailer};
pub use message::OutgoingMail;
pub use submission::{ContactSubmission, ValidSubmission, ValidationIssue};
