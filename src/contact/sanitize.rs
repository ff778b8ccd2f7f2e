//! Escaping of user text before it is embedded in HTML mail.

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a multi-line message and turn its line breaks into `<br/>`.
pub fn message_to_html(message: &str) -> String {
    escape_html(message)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br/>")
}
