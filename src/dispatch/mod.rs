//! Bounded-concurrency dispatch over a shared FIFO queue.
//!
//! # Architecture
//!
//! - [`Dispatcher`] — owns the job queue and worker pool for one run.
//! - [`RetryPolicy`] — pure backoff/finalize decisions, one per run.
//! - [`CancelHandle`] — cooperative run-wide abort for external callers;
//!   a credential rejection trips the same flag internally.
//! - Workers post every transition to the shared
//!   [`StatusLedger`](crate::ledger::StatusLedger); nothing else escapes
//!   the pool.
//!
//! # Quick Start
//!
//! ```ignore
//! let ledger = Arc::new(StatusLedger::for_messages(&merged));
//! let dispatcher = Dispatcher::new(connector, RetryPolicy::from(&config))
//!     .workers(config.workers);
//! let abort = dispatcher.cancel_handle(); // optional, for a UI stop button
//! let summary = dispatcher.run(merged, ledger.clone()).await;
//! ```

mod policy;
mod queue;
mod worker;

pub use policy::{NextAction, RetryPolicy};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ledger::{self, RunSummary, StatusLedger};
use crate::merge::MergedMessage;
use crate::smtp::Connect;

use queue::JobQueue;
use worker::{run_worker, WorkerContext};

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    auth: AtomicBool,
}

/// Shared cooperative cancellation flag. Workers check it before claiming a
/// message and between attempts, never mid-send.
#[derive(Clone, Default)]
pub(crate) struct CancelFlag {
    inner: Arc<CancelInner>,
}

impl CancelFlag {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_user(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn cancel_auth(&self) {
        self.inner.auth.store(true, Ordering::SeqCst);
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn detail(&self) -> &'static str {
        if self.inner.auth.load(Ordering::SeqCst) {
            "run aborted: authentication failed"
        } else {
            "run aborted: cancelled"
        }
    }
}

/// Externally held handle for aborting a run in progress.
///
/// Cancellation is cooperative: in-flight attempts finish, everything still
/// queued is finalized as aborted, and no new connections are opened.
#[derive(Clone)]
pub struct CancelHandle(CancelFlag);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel_user();
    }
}

/// Owns the job queue and worker pool for the duration of one run.
pub struct Dispatcher<C: Connect> {
    connector: C,
    policy: RetryPolicy,
    workers: usize,
    cancel: CancelFlag,
}

impl<C: Connect> Dispatcher<C> {
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            workers: 3,
            cancel: CancelFlag::default(),
        }
    }

    /// Number of concurrent workers (default: 3, minimum 1). A single
    /// worker degenerates to pure sequential sending with identical
    /// outcomes.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    /// Handle for aborting the run from outside the pool. May be cloned and
    /// obtained before [`run`](Self::run).
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Drain the merge set through the worker pool.
    ///
    /// Messages the merge set marked invalid are finalized up front without
    /// consuming a send attempt. The call returns once every worker has
    /// exited; the shared `ledger` is live throughout for polling.
    pub async fn run(self, messages: Vec<MergedMessage>, ledger: Arc<StatusLedger>) -> RunSummary {
        ledger::finalize_unsendable(&ledger, &messages);

        let queue = Arc::new(JobQueue::new(
            messages.into_iter().filter(MergedMessage::is_sendable),
        ));
        tracing::info!(
            jobs = queue.len(),
            workers = self.workers,
            "dispatch started"
        );

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let ctx = WorkerContext {
                queue: Arc::clone(&queue),
                connector: self.connector.clone(),
                ledger: Arc::clone(&ledger),
                policy: self.policy,
                cancel: self.cancel.clone(),
            };
            handles.push(tokio::spawn(run_worker(ctx)));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let summary = ledger.summary();
        tracing::info!(
            sent = summary.sent,
            failed = summary.permanent_failures,
            invalid = summary.invalid_email,
            aborted = summary.aborted,
            auth_failed = summary.auth_failed,
            "dispatch finished"
        );
        summary
    }
}
