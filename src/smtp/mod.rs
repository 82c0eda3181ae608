//! SMTP transport: authenticated connection handling, send-failure
//! classification, and the pre-flight connection probe.
//!
//! One [`SmtpConnector`] is shared across the worker pool; each worker
//! calls [`Connect::connect`] once to acquire its own authenticated
//! transport handle and reuses it for every message. Dropping the handle
//! releases the underlying connection on every exit path.

mod config;
mod transport;

pub use config::{ConfigError, SmtpConfig};
pub use transport::{probe, probe_with, Connect, MailTransport, SmtpConnector, SmtpTransport};

use thiserror::Error;

/// A classified send or connect failure.
///
/// Classification drives the retry policy: `Transient` and `Connect` are
/// retryable within a run, `Permanent` is not, and `Auth` is fatal to the
/// entire run because the credential is shared by every worker.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network timeout or 4xx-class provider response; retryable.
    #[error("transient failure: {0}")]
    Transient(String),

    /// 5xx-class rejection or malformed recipient; never retried.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// Credential rejected; fatal for the whole run.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Could not reach the server. Treated as transient within a run,
    /// fatal at probe time.
    #[error("connection failed: {0}")]
    Connect(String),
}

impl SendError {
    /// True when the retry policy may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Connect(_))
    }
}

/// Outcome of the standalone connection probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connect(String),
}
