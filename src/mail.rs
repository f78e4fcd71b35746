//! Activation mail delivery.
//!
//! `SmtpNotifier` speaks plain SMTP (no TLS) to a relay such as MailHog and
//! authenticates with AUTH PLAIN when credentials are configured and the
//! server advertises it. `LogNotifier` writes the message to the log instead
//! of sending it, for local runs.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("activation mail delivery failed")]
    DeliveryFailed(#[source] anyhow::Error),
}

/// Delivery port used by the registration engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_activation_token(&self, email: &str, token: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

/// A rendered activation mail.
#[derive(Debug, Clone)]
pub struct ActivationMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ActivationMail {
    pub fn new(from: &str, to: &str, token: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Your activation code".to_string(),
            body: format!(
                "Use this token to activate your account.\nToken: {token}"
            ),
        }
    }

    /// RFC 5322 message with CRLF line endings and dot-stuffed body lines.
    pub fn to_wire(&self) -> String {
        let mut msg = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n",
            self.from, self.to, self.subject
        );
        for line in self.body.lines() {
            if line.starts_with('.') {
                msg.push('.');
            }
            msg.push_str(line);
            msg.push_str("\r\n");
        }
        msg
    }
}

#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    async fn deliver(&self, mail: &ActivationMail) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connect to smtp server {addr}"))?;
        let mut conn = SmtpConnection::new(stream);

        conn.expect(220).await.context("smtp greeting")?;
        let capabilities = conn.command("EHLO activation", 250).await?;

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            if !advertises_auth_plain(&capabilities) {
                bail!("smtp server does not advertise AUTH PLAIN");
            }
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("\0{user}\0{pass}"));
            conn.command(&format!("AUTH PLAIN {credentials}"), 235)
                .await
                .context("smtp auth")?;
        }

        conn.command(&format!("MAIL FROM:<{}>", mail.from), 250).await?;
        conn.command(&format!("RCPT TO:<{}>", mail.to), 250).await?;
        conn.command("DATA", 354).await?;
        conn.write_raw(&mail.to_wire()).await?;
        conn.command(".", 250).await.context("smtp message body")?;
        conn.command("QUIT", 221).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, token))]
    async fn send_activation_token(&self, email: &str, token: &str) -> Result<(), NotifyError> {
        let mail = ActivationMail::new(&self.config.from, email, token);
        tokio::time::timeout(self.config.timeout, self.deliver(&mail))
            .await
            .map_err(|_| anyhow::anyhow!("smtp delivery timed out after {:?}", self.config.timeout))
            .and_then(|r| r)
            .map_err(NotifyError::DeliveryFailed)?;
        info!(%email, "activation mail sent");
        Ok(())
    }
}

struct SmtpConnection {
    reader: BufReader<TcpStream>,
}

impl SmtpConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    async fn write_raw(&mut self, data: &str) -> anyhow::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data.as_bytes()).await.context("smtp write")?;
        stream.flush().await.context("smtp flush")?;
        Ok(())
    }

    async fn command(&mut self, line: &str, expected: u16) -> anyhow::Result<Vec<String>> {
        self.write_raw(&format!("{line}\r\n")).await?;
        let verb = line.split_whitespace().next().unwrap_or(line);
        self.expect(expected)
            .await
            .with_context(|| format!("smtp {verb}"))
    }

    /// Reads one (possibly multi-line) reply, checks its code and returns the
    /// text of each line.
    async fn expect(&mut self, expected: u16) -> anyhow::Result<Vec<String>> {
        let mut text = Vec::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.context("smtp read")?;
            if n == 0 {
                bail!("smtp server closed the connection");
            }
            let line = line.trim_end();
            debug!(reply = %line, "smtp reply");
            let code: u16 = line
                .get(..3)
                .and_then(|c| c.parse().ok())
                .with_context(|| format!("malformed smtp reply {line:?}"))?;
            text.push(line.get(4..).unwrap_or_default().to_string());
            if line.as_bytes().get(3) == Some(&b'-') {
                continue;
            }
            if code != expected {
                bail!("unexpected smtp reply {line:?}, wanted {expected}");
            }
            return Ok(text);
        }
    }
}

/// True if an EHLO reply lists `AUTH` with the `PLAIN` mechanism.
fn advertises_auth_plain(capabilities: &[String]) -> bool {
    capabilities.iter().any(|line| {
        let mut words = line.split_whitespace();
        words.next().is_some_and(|kw| kw.eq_ignore_ascii_case("AUTH"))
            && words.any(|mech| mech.eq_ignore_ascii_case("PLAIN"))
    })
}

/// Writes activation mails to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_activation_token(&self, email: &str, token: &str) -> Result<(), NotifyError> {
        info!(to_email = %email, "activation mail send stub");
        debug!(to_email = %email, %token, "activation token");
        Ok(())
    }
}
