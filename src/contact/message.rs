//! Notification mail built from a contact submission.

use uuid::Uuid;

use crate::config::MailConfig;
use crate::contact::sanitize::{escape_html, message_to_html};
use crate::contact::submission::ValidSubmission;

/// Line length limit for quoted-printable output (RFC 2045).
const QP_LINE_LIMIT: usize = 76;

/// Longest encoded-word allowed in a header (RFC 2047).
const ENCODED_WORD_LIMIT: usize = 75;
const ENCODED_WORD_PREFIX: &str = "=?utf-8?Q?";
const ENCODED_WORD_SUFFIX: &str = "?=";

/// A fully composed notification, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    /// Display name and address of the visitor.
    pub reply_to_name: String,
    pub reply_to_email: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingMail {
    /// Compose the owner notification for a validated submission.
    pub fn compose(submission: &ValidSubmission, config: &MailConfig) -> Self {
        let html = format!(
            "<p>{}</p><hr/><p>From: {} &lt;{}&gt;</p>",
            message_to_html(&submission.message),
            escape_html(&submission.name),
            escape_html(&submission.email),
        );

        Self {
            from: config.from.clone(),
            to: config.to.clone(),
            reply_to_name: submission.name.clone(),
            reply_to_email: submission.email.clone(),
            subject: format!("Contact Form: {}", submission.subject),
            text: submission.message.clone(),
            html,
        }
    }

    /// `"Name" <address>` with the display name quoted, or as encoded-words
    /// when the name is not ASCII.
    pub fn reply_to(&self) -> String {
        if is_plain_header_text(&self.reply_to_name) {
            let quoted = self.reply_to_name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\" <{}>", quoted, self.reply_to_email)
        } else {
            format!("{} <{}>", encode_header_text(&self.reply_to_name), self.reply_to_email)
        }
    }

    /// Render as an RFC 5322 message with CRLF line endings.
    ///
    /// Both parts are quoted-printable, so no line exceeds the SMTP limit and
    /// the `=_` boundary prefix cannot occur inside a part.
    pub fn render(&self, host: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let boundary = format!("=_edge_{}", id);

        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("To: {}\r\n", self.to));
        out.push_str(&format!("Reply-To: {}\r\n", self.reply_to()));
        out.push_str(&format!("Subject: {}\r\n", encode_header_text(&self.subject)));
        out.push_str(&format!("Message-ID: <{}@{}>\r\n", id, host));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str(&format!(
            "Content-Type: multipart/alternative; boundary=\"{}\"\r\n",
            boundary
        ));
        out.push_str("\r\n");

        for (content_type, body) in [("text/plain", &self.text), ("text/html", &self.html)] {
            out.push_str(&format!("--{}\r\n", boundary));
            out.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
            out.push_str("Content-Transfer-Encoding: quoted-printable\r\n\r\n");
            out.push_str(&quoted_printable(body));
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{}--\r\n", boundary));
        out
    }
}

fn is_plain_header_text(text: &str) -> bool {
    text.bytes().all(|b| (0x20..0x7f).contains(&b))
}

/// Header text as-is when it is printable ASCII, otherwise as folded
/// RFC 2047 Q encoded-words. Characters are never split across words.
pub fn encode_header_text(text: &str) -> String {
    if is_plain_header_text(text) {
        return text.to_string();
    }

    let budget = ENCODED_WORD_LIMIT - ENCODED_WORD_PREFIX.len() - ENCODED_WORD_SUFFIX.len();
    let mut words = Vec::new();
    let mut payload = String::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let mut token = String::new();
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            match b {
                b' ' => token.push('_'),
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                    token.push(b as char)
                }
                _ => token.push_str(&format!("={:02X}", b)),
            }
        }
        if payload.len() + token.len() > budget {
            words.push(std::mem::take(&mut payload));
        }
        payload.push_str(&token);
    }
    if !payload.is_empty() {
        words.push(payload);
    }

    words
        .iter()
        .map(|w| format!("{}{}{}", ENCODED_WORD_PREFIX, w, ENCODED_WORD_SUFFIX))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Quoted-printable encode `input`, keeping its line breaks as hard breaks.
pub fn quoted_printable(input: &str) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }

        let bytes = line.as_bytes();
        let mut width = 0;
        for (j, &b) in bytes.iter().enumerate() {
            let last = j + 1 == bytes.len();
            let literal = match b {
                b'=' => false,
                b' ' | b'\t' => !last,
                33..=126 => true,
                _ => false,
            };
            let token = if literal {
                (b as char).to_string()
            } else {
                format!("={:02X}", b)
            };

            // Reserve one column for the soft break marker.
            if width + token.len() > QP_LINE_LIMIT - 1 {
                out.push_str("=\r\n");
                width = 0;
            }
            out.push_str(&token);
            width += token.len();
        }
    }
    out
}
