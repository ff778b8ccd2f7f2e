//! Contact form payload and its validation rules.

use serde::{Deserialize, Serialize};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Raw JSON body of `POST /api/contact`. Missing fields read as empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A submission that passed validation. Single-line fields are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactSubmission {
    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<ValidSubmission, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let name = self.name.trim();
        check_single_line(&mut issues, "name", name, MAX_NAME_CHARS);

        let email = self.email.trim();
        check_single_line(&mut issues, "email", email, MAX_EMAIL_CHARS);
        if !email.is_empty() && !is_valid_email(email) {
            issues.push(ValidationIssue::new("email", "Invalid email address."));
        }

        let subject = self.subject.trim();
        check_single_line(&mut issues, "subject", subject, MAX_SUBJECT_CHARS);

        let message = self.message.as_str();
        if message.trim().is_empty() {
            issues.push(ValidationIssue::new("message", "Message is required."));
        } else if message.chars().count() > MAX_MESSAGE_CHARS {
            issues.push(ValidationIssue::new(
                "message",
                format!("Message must be at most {} characters.", MAX_MESSAGE_CHARS),
            ));
        }
        if message
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        {
            issues.push(ValidationIssue::new("message", "Message contains control characters."));
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(ValidSubmission {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        })
    }
}

fn capitalized(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn check_single_line(issues: &mut Vec<ValidationIssue>, field: &str, value: &str, max: usize) {
    if value.is_empty() {
        issues.push(ValidationIssue::new(field, format!("{} is required.", capitalized(field))));
        return;
    }
    if value.chars().count() > max {
        issues.push(ValidationIssue::new(
            field,
            format!("{} must be at most {} characters.", capitalized(field), max),
        ));
    }
    // Newlines here would let a sender forge mail headers.
    if value.chars().any(char::is_control) {
        issues.push(ValidationIssue::new(
            field,
            format!("{} contains control characters.", capitalized(field)),
        ));
    }
}

/// Pragmatic `local@domain.tld` check. Rejects characters that would need
/// quoting inside a mail header.
pub fn is_valid_email(email: &str) -> bool {
    // Addresses go into SMTP headers without SMTPUTF8.
    if !email.is_ascii() {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if local
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "<>()[]\\,;:\"".contains(c))
    {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(name: &str, email: &str, subject: &str, message: &str) -> ContactSubmission {
        ContactSubmission {
            name: name.into(),
            email: email.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    fn fields(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.field.as_str()).collect()
    }

    #[test]
    fn test_valid_submission_is_trimmed() {
        let valid = submission("  Ada ", " ada@example.com", "Hello ", "Hi there\nBye")
            .validate()
            .unwrap();
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.email, "ada@example.com");
        assert_eq!(valid.subject, "Hello");
        assert_eq!(valid.message, "Hi there\nBye");
    }

    #[test]
    fn test_empty_fields_report_every_issue() {
        let issues = submission("", "", " ", "").validate().unwrap_err();
        assert_eq!(fields(&issues), vec!["name", "email", "subject", "message"]);
        assert_eq!(issues[0].message, "Name is required.");
    }

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let sub: ContactSubmission = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        let issues = sub.validate().unwrap_err();
        assert_eq!(fields(&issues), vec!["email", "subject", "message"]);
    }

    #[test]
    fn test_length_limits() {
        let long_name = "x".repeat(MAX_NAME_CHARS + 1);
        let issues = submission(&long_name, "a@b.co", "s", "m").validate().unwrap_err();
        assert_eq!(fields(&issues), vec!["name"]);

        let max_name = "x".repeat(MAX_NAME_CHARS);
        assert!(submission(&max_name, "a@b.co", "s", "m").validate().is_ok());

        let long_message = "y".repeat(MAX_MESSAGE_CHARS + 1);
        let issues = submission("a", "a@b.co", "s", &long_message).validate().unwrap_err();
        assert_eq!(fields(&issues), vec!["message"]);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let name = "é".repeat(MAX_NAME_CHARS);
        assert!(submission(&name, "a@b.co", "s", "m").validate().is_ok());
    }

    #[test]
    fn test_header_injection_rejected() {
        let issues = submission("a", "a@b.co", "hi\r\nBcc: victim@example.com", "m")
            .validate()
            .unwrap_err();
        assert_eq!(fields(&issues), vec!["subject"]);
    }

    #[test]
    fn test_markup_is_not_a_validation_error() {
        let sub = submission("<script>alert(\"xss\")</script>", "test@example.com", "Test", "Test");
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@-bad.com"));
        assert!(!is_valid_email("a@example..com"));
        assert!(!is_valid_email("evil>@example.com"));
        assert!(!is_valid_email("josé@example.com"));
        assert!(!is_valid_email("a@exämple.com"));
    }
}
