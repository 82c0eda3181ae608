//! Lettre-backed SMTP transport and the connection probe.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{ConfigError, ProbeError, SendError, SmtpConfig};
use crate::merge::{BodyFormat, MergedMessage};

/// One authenticated send handle. Each worker owns exactly one for its
/// lifetime; handles are never shared.
#[async_trait]
pub trait MailTransport: Send + 'static {
    async fn send(&mut self, message: &MergedMessage) -> Result<(), SendError>;
}

/// Factory for per-worker transport handles.
///
/// `connect` performs connection and authentication once; the returned
/// handle is reused for every message the worker sends. Cloneable so the
/// dispatcher can hand one connector to each worker.
#[async_trait]
pub trait Connect: Send + Sync + Clone + 'static {
    type Transport: MailTransport;

    async fn connect(&self) -> Result<Self::Transport, SendError>;
}

/// SMTP connector built from an [`SmtpConfig`].
#[derive(Clone)]
pub struct SmtpConnector {
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpConnector {
    pub fn new(config: SmtpConfig) -> Result<Self, ConfigError> {
        let address: Address = config
            .from
            .parse()
            .map_err(|_| ConfigError::InvalidSender(config.from.clone()))?;
        let from = Mailbox::new(config.from_name.clone(), address);
        Ok(Self { config, from })
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        let config = &self.config;

        let mut builder = match config.tls.as_str() {
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| SendError::Connect(e.to_string()))?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| SendError::Connect(e.to_string()))?,
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Connect for SmtpConnector {
    type Transport = SmtpTransport;

    async fn connect(&self) -> Result<SmtpTransport, SendError> {
        let inner = self.build_transport()?;

        // Verifies connection and credentials once per handle, not per
        // message.
        match inner.test_connection().await {
            Ok(true) => Ok(SmtpTransport {
                inner,
                from: self.from.clone(),
            }),
            Ok(false) => Err(SendError::Connect(format!(
                "{}:{} did not accept the session",
                self.config.host, self.config.port
            ))),
            Err(e) => Err(classify(e)),
        }
    }
}

/// A live authenticated connection. The socket is released when the handle
/// is dropped, on every exit path.
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    fn build_message(&self, message: &MergedMessage) -> Result<Message, SendError> {
        // Merge validation should have caught this; a parse failure here is
        // a permanent recipient defect either way.
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| SendError::Permanent(format!("unparseable recipient: {}", message.to)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject);

        match message.body_format {
            BodyFormat::Html => builder.singlepart(SinglePart::html(message.body.clone())),
            BodyFormat::Text => builder.body(message.body.clone()),
        }
        .map_err(|e| SendError::Permanent(format!("message build failed: {e}")))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&mut self, message: &MergedMessage) -> Result<(), SendError> {
        let mail = self.build_message(message)?;
        self.inner.send(mail).await.map_err(classify)?;
        Ok(())
    }
}

/// Map a lettre SMTP error onto the retry taxonomy.
fn classify(err: SmtpError) -> SendError {
    let detail = err.to_string();
    if is_auth_rejection(&detail) {
        SendError::Auth(detail)
    } else if err.is_permanent() {
        SendError::Permanent(detail)
    } else if err.is_transient() {
        SendError::Transient(detail)
    } else {
        // Network-level: timeout, refused, TLS. Retryable within a run.
        SendError::Connect(detail)
    }
}

/// Credential rejections arrive as 535/534 responses or provider-specific
/// "authentication failed" text. Codes are matched on digit-group
/// boundaries so a code inside an address or message id cannot match.
fn is_auth_rejection(detail: &str) -> bool {
    let contains_code = |code: &str| {
        detail
            .split(|c: char| !c.is_ascii_digit())
            .any(|segment| segment == code)
    };

    let lower = detail.to_lowercase();
    lower.contains("authentication") || lower.contains("invalid credentials")
        || contains_code("535")
        || contains_code("534")
}

/// Pre-flight credential check: connect and authenticate, send nothing.
///
/// Reuses the worker connect path, so a passing probe means workers will be
/// able to acquire handles with the same config.
pub async fn probe(config: &SmtpConfig) -> Result<(), ProbeError> {
    let connector =
        SmtpConnector::new(config.clone()).map_err(|e| ProbeError::Connect(e.to_string()))?;

    let result = probe_with(&connector).await;
    match &result {
        Ok(()) => {
            tracing::info!(host = %config.host, port = config.port, "SMTP probe succeeded");
        }
        Err(ProbeError::Auth(detail)) => {
            tracing::warn!(host = %config.host, %detail, "SMTP probe: authentication rejected");
        }
        Err(ProbeError::Connect(detail)) => {
            tracing::warn!(host = %config.host, %detail, "SMTP probe: connection failed");
        }
    }
    result
}

/// Probe any connector: acquire and immediately release one authenticated
/// handle. An `Auth` rejection surfaces as such; every other failure is a
/// connect failure at probe time.
pub async fn probe_with<C: Connect>(connector: &C) -> Result<(), ProbeError> {
    match connector.connect().await {
        Ok(_) => Ok(()),
        Err(SendError::Auth(detail)) => Err(ProbeError::Auth(detail)),
        Err(e) => Err(ProbeError::Connect(e.to_string())),
    }
}
