//! Append-only per-recipient status ledger.
//!
//! The ledger is the single integration point between the dispatch workers
//! and any display layer: workers post transitions, observers poll
//! [`StatusLedger::snapshot`] or [`StatusLedger::summary`]. One mutex per
//! recipient slot, so writes for distinct recipients never contend; writes
//! for the same recipient are naturally serialized because exactly one
//! worker owns a message at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use time::OffsetDateTime;

use crate::merge::{MergedMessage, Verdict};

/// Per-recipient delivery status.
///
/// `Queued`, `Sending`, and `TransientFailure` are in-flight; the rest are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sending,
    Sent,
    TransientFailure,
    PermanentFailure,
    InvalidEmail,
    /// Finalized without sending because the run was cancelled (fatal
    /// authentication failure or user abort).
    Aborted,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Sent | Self::PermanentFailure | Self::InvalidEmail | Self::Aborted
        )
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Sending => write!(f, "sending"),
            Self::Sent => write!(f, "sent"),
            Self::TransientFailure => write!(f, "transient_failure"),
            Self::PermanentFailure => write!(f, "permanent_failure"),
            Self::InvalidEmail => write!(f, "invalid_email"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One send attempt for one recipient. Appended, never edited.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    /// 1-based attempt number, strictly increasing per recipient.
    pub attempt: u32,
    pub outcome: DeliveryStatus,
    pub at: OffsetDateTime,
    pub error: Option<String>,
}

impl SendAttempt {
    pub fn new(attempt: u32, outcome: DeliveryStatus, error: Option<String>) -> Self {
        Self {
            attempt,
            outcome,
            at: OffsetDateTime::now_utc(),
            error,
        }
    }
}

/// One row of a [`StatusLedger::snapshot`], ready for tabular display.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientStatus {
    pub recipient_id: usize,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

/// Final counts for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub sent: usize,
    pub permanent_failures: usize,
    pub invalid_email: usize,
    pub aborted: usize,
    /// True when the run was cut short by a credential rejection.
    pub auth_failed: bool,
}

#[derive(Debug, Default)]
struct Slot {
    status: DeliveryStatus,
    attempts: Vec<SendAttempt>,
    last_error: Option<String>,
}

/// Process-scoped, write-once-per-transition status store.
pub struct StatusLedger {
    // Slot order is the original recipient order; `index` maps recipient id
    // to its slot.
    slots: Vec<(usize, Mutex<Slot>)>,
    index: HashMap<usize, usize>,
    auth_failed: AtomicBool,
}

impl StatusLedger {
    /// Build a ledger with one slot per merged message, preserving input
    /// order. Every slot starts `Queued`.
    pub fn for_messages(messages: &[MergedMessage]) -> Self {
        let slots: Vec<_> = messages
            .iter()
            .map(|m| (m.recipient_id, Mutex::new(Slot::default())))
            .collect();
        let index = messages
            .iter()
            .enumerate()
            .map(|(i, m)| (m.recipient_id, i))
            .collect();
        Self {
            slots,
            index,
            auth_failed: AtomicBool::new(false),
        }
    }

    fn slot(&self, recipient_id: usize) -> Option<&Mutex<Slot>> {
        self.index.get(&recipient_id).map(|&i| &self.slots[i].1)
    }

    /// Mark a recipient as in-flight for the given attempt.
    pub fn begin_attempt(&self, recipient_id: usize, attempt: u32) {
        if let Some(slot) = self.slot(recipient_id) {
            let mut slot = slot.lock().expect("ledger slot poisoned");
            slot.status = DeliveryStatus::Sending;
            tracing::debug!(recipient_id, attempt, "attempt started");
        }
    }

    /// Append a completed attempt. The recipient's current status becomes
    /// the attempt's outcome.
    pub fn record(&self, recipient_id: usize, attempt: SendAttempt) {
        if let Some(slot) = self.slot(recipient_id) {
            let mut slot = slot.lock().expect("ledger slot poisoned");
            slot.status = attempt.outcome;
            slot.last_error = attempt.error.clone();
            slot.attempts.push(attempt);
        }
    }

    /// Move a recipient straight to a terminal status without consuming a
    /// send attempt (invalid address, cancelled before first attempt).
    pub fn finalize(&self, recipient_id: usize, status: DeliveryStatus, detail: Option<String>) {
        if let Some(slot) = self.slot(recipient_id) {
            let mut slot = slot.lock().expect("ledger slot poisoned");
            slot.status = status;
            if detail.is_some() {
                slot.last_error = detail;
            }
        }
    }

    /// Flag the run as aborted by a credential rejection.
    pub fn set_auth_failed(&self) {
        self.auth_failed.store(true, Ordering::SeqCst);
    }

    pub fn auth_failed(&self) -> bool {
        self.auth_failed.load(Ordering::SeqCst)
    }

    pub fn current_status(&self, recipient_id: usize) -> Option<DeliveryStatus> {
        self.slot(recipient_id)
            .map(|s| s.lock().expect("ledger slot poisoned").status)
    }

    /// Number of attempts recorded for a recipient.
    pub fn attempt_count(&self, recipient_id: usize) -> u32 {
        self.slot(recipient_id)
            .map(|s| s.lock().expect("ledger slot poisoned").attempts.len() as u32)
            .unwrap_or(0)
    }

    /// Full attempt history for a recipient, in attempt order.
    pub fn attempts(&self, recipient_id: usize) -> Vec<SendAttempt> {
        self.slot(recipient_id)
            .map(|s| s.lock().expect("ledger slot poisoned").attempts.clone())
            .unwrap_or_default()
    }

    /// Point-in-time view of every recipient, in original recipient order
    /// regardless of completion order.
    pub fn snapshot(&self) -> Vec<RecipientStatus> {
        self.slots
            .iter()
            .map(|(recipient_id, slot)| {
                let slot = slot.lock().expect("ledger slot poisoned");
                RecipientStatus {
                    recipient_id: *recipient_id,
                    status: slot.status,
                    attempt_count: slot.attempts.len() as u32,
                    last_error: slot.last_error.clone(),
                }
            })
            .collect()
    }

    /// Counts per terminal status. Meaningful once the run has completed,
    /// but safe to call at any time.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.slots.len(),
            sent: 0,
            permanent_failures: 0,
            invalid_email: 0,
            aborted: 0,
            auth_failed: self.auth_failed(),
        };
        for (_, slot) in &self.slots {
            match slot.lock().expect("ledger slot poisoned").status {
                DeliveryStatus::Sent => summary.sent += 1,
                DeliveryStatus::PermanentFailure => summary.permanent_failures += 1,
                DeliveryStatus::InvalidEmail => summary.invalid_email += 1,
                DeliveryStatus::Aborted => summary.aborted += 1,
                _ => {}
            }
        }
        summary
    }

    /// True when every recipient has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.slots
            .iter()
            .all(|(_, slot)| slot.lock().expect("ledger slot poisoned").status.is_terminal())
    }
}

/// Pre-finalize messages the merge set already rejected.
pub(crate) fn finalize_unsendable(ledger: &StatusLedger, messages: &[MergedMessage]) {
    for message in messages {
        if let Verdict::InvalidAddress = message.verdict {
            ledger.finalize(
                message.recipient_id,
                DeliveryStatus::InvalidEmail,
                Some(format!("address does not parse: {:?}", message.to)),
            );
        }
    }
}
