//! Mail-merge dispatch engine.
//!
//! Merges per-recipient data into a templated email and dispatches the
//! resulting messages over SMTP with a bounded worker pool, tracking each
//! recipient's delivery outcome in a live-pollable ledger.
//!
//! # Architecture
//!
//! - [`template`] — pure `{{placeholder}}` substitution.
//! - [`merge`] — builds one [`MergedMessage`](merge::MergedMessage) per
//!   recipient, rendering subject/body and validating the target address
//!   before any network activity.
//! - [`smtp`] — one authenticated SMTP connection per worker, failure
//!   classification, and a standalone pre-flight connection probe.
//! - [`dispatch`] — the worker pool: bounded concurrency, exponential
//!   backoff retries, cooperative cancellation.
//! - [`ledger`] — append-only per-recipient attempt history; the single
//!   source of truth any display layer polls.
//!
//! # Quick Start
//!
//! ```ignore
//! let config = SmtpConfig::from_env()?;
//!
//! // Pre-flight credential check (no message is sent).
//! smtp::probe(&config).await?;
//!
//! let merged = merge::merge_records(&template, &mapping, &records, "email");
//! let ledger = Arc::new(StatusLedger::for_messages(&merged));
//!
//! let dispatcher = Dispatcher::new(SmtpConnector::new(config.clone())?, RetryPolicy::from(&config))
//!     .workers(config.workers);
//!
//! // Keep a ledger clone for live display; the run owns the messages.
//! let summary = dispatcher.run(merged, ledger.clone()).await;
//! ```

pub mod dispatch;
pub mod ledger;
pub mod merge;
pub mod smtp;
pub mod template;

pub use dispatch::{CancelHandle, Dispatcher, RetryPolicy};
pub use ledger::{DeliveryStatus, RunSummary, SendAttempt, StatusLedger};
pub use merge::{
    merge_records, BodyFormat, MergedMessage, RecipientRecord, Template, VariableMapping, Verdict,
};
pub use smtp::{probe, probe_with, ProbeError, SendError, SmtpConfig, SmtpConnector};
