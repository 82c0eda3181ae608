//! Shared FIFO job queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::merge::MergedMessage;

/// The only structure the worker pool contends on. Built fully before any
/// worker starts and never refilled, so an empty pop doubles as the
/// end-of-run signal.
pub(crate) struct JobQueue {
    inner: Mutex<VecDeque<MergedMessage>>,
}

impl JobQueue {
    pub(crate) fn new(messages: impl IntoIterator<Item = MergedMessage>) -> Self {
        Self {
            inner: Mutex::new(messages.into_iter().collect()),
        }
    }

    /// Claim the next message in recipient order. `None` means the queue is
    /// drained and the worker should exit.
    pub(crate) fn pop(&self) -> Option<MergedMessage> {
        self.inner.lock().expect("job queue poisoned").pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("job queue poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{BodyFormat, Verdict};

    fn message(id: usize) -> MergedMessage {
        MergedMessage {
            recipient_id: id,
            to: format!("r{id}@example.com"),
            subject: "s".into(),
            body: "b".into(),
            body_format: BodyFormat::Text,
            verdict: Verdict::Valid,
        }
    }

    #[test]
    fn pops_in_fifo_order_then_signals_empty() {
        let queue = JobQueue::new(vec![message(0), message(1), message(2)]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().map(|m| m.recipient_id), Some(0));
        assert_eq!(queue.pop().map(|m| m.recipient_id), Some(1));
        assert_eq!(queue.pop().map(|m| m.recipient_id), Some(2));
        assert!(queue.pop().is_none());
    }
}
