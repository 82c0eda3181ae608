//! Pure retry-policy decisions, separated from the worker loop so they are
//! testable without any network or concurrency.

use std::time::Duration;

use crate::ledger::DeliveryStatus;
use crate::smtp::{SendError, SmtpConfig};

/// What a worker should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Sleep for the given delay (on the owning worker only), then retry.
    Retry(Duration),
    /// Stop and record the given terminal status.
    Finalize(DeliveryStatus),
}

/// Bounded exponential backoff policy.
///
/// `max_retries` counts retries after the first attempt: a message is tried
/// at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration, backoff_cap: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            backoff_cap,
        }
    }

    /// Delay before the attempt after `attempt` (1-based):
    /// `backoff_base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_cap)
    }

    /// Decide what follows the failed `attempt` (1-based).
    ///
    /// Authentication errors finalize immediately — the caller is expected
    /// to escalate them to a run-wide abort. Connect failures count as
    /// transient within a run.
    pub fn next_action(&self, attempt: u32, error: &SendError) -> NextAction {
        match error {
            SendError::Auth(_) => NextAction::Finalize(DeliveryStatus::Aborted),
            SendError::Permanent(_) => NextAction::Finalize(DeliveryStatus::PermanentFailure),
            SendError::Transient(_) | SendError::Connect(_) => {
                if attempt <= self.max_retries {
                    NextAction::Retry(self.backoff(attempt))
                } else {
                    NextAction::Finalize(DeliveryStatus::PermanentFailure)
                }
            }
        }
    }
}

impl From<&SmtpConfig> for RetryPolicy {
    fn from(config: &SmtpConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base(), config.backoff_cap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(100),
            Duration::from_millis(350),
        )
    }

    fn transient() -> SendError {
        SendError::Transient("450 try again".into())
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(350));
        assert_eq!(p.backoff(4), Duration::from_millis(350));
    }

    #[test]
    fn transient_retries_until_budget_exhausted() {
        let p = policy(2);
        assert!(matches!(p.next_action(1, &transient()), NextAction::Retry(_)));
        assert!(matches!(p.next_action(2, &transient()), NextAction::Retry(_)));
        assert_eq!(
            p.next_action(3, &transient()),
            NextAction::Finalize(DeliveryStatus::PermanentFailure)
        );
    }

    #[test]
    fn zero_retries_finalizes_after_first_attempt() {
        let p = policy(0);
        assert_eq!(
            p.next_action(1, &transient()),
            NextAction::Finalize(DeliveryStatus::PermanentFailure)
        );
    }

    #[test]
    fn permanent_never_retries() {
        let p = policy(5);
        assert_eq!(
            p.next_action(1, &SendError::Permanent("550 no such user".into())),
            NextAction::Finalize(DeliveryStatus::PermanentFailure)
        );
    }

    #[test]
    fn connect_failure_counts_as_transient() {
        let p = policy(1);
        assert!(matches!(
            p.next_action(1, &SendError::Connect("refused".into())),
            NextAction::Retry(_)
        ));
    }

    #[test]
    fn auth_finalizes_as_aborted() {
        let p = policy(5);
        assert_eq!(
            p.next_action(1, &SendError::Auth("535".into())),
            NextAction::Finalize(DeliveryStatus::Aborted)
        );
    }
}
