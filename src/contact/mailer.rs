//! Mail transports for contact notifications.
//!
//! # Design Decisions
//! - `SmtpMailer` speaks plain SMTP to a relay on the local network; TLS and
//!   authentication toward the outside world belong to that relay
//! - One connection per message, closed with QUIT
//! - The whole transaction runs under a single deadline

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::config::{MailConfig, MailTransport};
use crate::contact::message::OutgoingMail;

/// Errors raised while handing a message to a transport.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<std::io::Error> for MailError {
    fn from(e: std::io::Error) -> Self {
        MailError::Io(e.to_string())
    }
}

/// Delivers a composed notification.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>>;
}

/// Pick the transport named in the config.
pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.transport {
        MailTransport::Smtp => Arc::new(SmtpMailer::from_config(config)),
        MailTransport::Log => Arc::new(LogMailer),
    }
}

/// Writes a summary to the log instead of sending. For development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            tracing::info!(
                to = %mail.to,
                reply_to = %mail.reply_to(),
                subject = %mail.subject,
                text_len = mail.text.len(),
                "Contact message (log transport, not sent)"
            );
            Ok(())
        }
        .boxed()
    }
}

/// Minimal SMTP client relaying to one server.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    address: String,
    helo_name: String,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(address: impl Into<String>, helo_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            helo_name: helo_name.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(
            config.smtp_address.clone(),
            config.helo_name.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn transact(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| MailError::Connect(format!("{}: {}", self.address, e)))?;
        let (reader, writer) = tokio::io::split(stream);
        let mut session = SmtpSession {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        };

        session.expect(220, "banner").await?;
        session
            .command(&format!("EHLO {}", self.helo_name), 250, "EHLO")
            .await?;
        session
            .command(&format!("MAIL FROM:<{}>", mail.from), 250, "MAIL FROM")
            .await?;
        session
            .command(&format!("RCPT TO:<{}>", mail.to), 250, "RCPT TO")
            .await?;
        session.command("DATA", 354, "DATA").await?;

        let data = dot_stuff(&mail.render(&self.helo_name));
        session.writer.write_all(data.as_bytes()).await?;
        session.writer.write_all(b".\r\n").await?;
        session.expect(250, "message").await?;

        // The message is accepted at this point; a failed QUIT is not an error.
        if let Err(e) = session.command("QUIT", 221, "QUIT").await {
            tracing::debug!(error = %e, "SMTP QUIT not acknowledged");
        }

        tracing::info!(
            relay = %self.address,
            to = %mail.to,
            size = data.len(),
            "Contact message relayed"
        );
        Ok(())
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            match tokio::time::timeout(self.timeout, self.transact(mail)).await {
                Ok(result) => result,
                Err(_) => Err(MailError::Timeout(self.timeout)),
            }
        }
        .boxed()
    }
}

struct SmtpSession {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
    line: String,
}

impl SmtpSession {
    async fn command(&mut self, command: &str, expected: u16, stage: &str) -> Result<(), MailError> {
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.expect(expected, stage).await
    }

    /// Read a possibly multi-line reply ("250-..." continues, "250 ..." ends).
    async fn expect(&mut self, expected: u16, stage: &str) -> Result<(), MailError> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Err(MailError::Protocol(format!("connection closed during {}", stage)));
            }
            let code: u16 = self.line.get(..3).and_then(|s| s.parse().ok()).unwrap_or(0);
            if code != expected {
                return Err(MailError::Protocol(format!(
                    "{} rejected: {}",
                    stage,
                    self.line.trim()
                )));
            }
            if self.line.as_bytes().get(3) != Some(&b'-') {
                return Ok(());
            }
        }
    }
}

/// Double a leading dot on every line so the body cannot end DATA early.
pub fn dot_stuff(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 8);
    for line in data.split_inclusive("\r\n") {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    if !out.ends_with("\r\n") {
        out.push_str("\r\n");
    }
    out
}
