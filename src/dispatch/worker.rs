//! Worker loop: claim a message, drive it through the retry state machine,
//! post every transition to the ledger.

use std::sync::Arc;

use tracing::Instrument;

use super::policy::{NextAction, RetryPolicy};
use super::queue::JobQueue;
use super::CancelFlag;
use crate::ledger::{DeliveryStatus, SendAttempt, StatusLedger};
use crate::merge::MergedMessage;
use crate::smtp::{Connect, MailTransport, SendError};

pub(crate) struct WorkerContext<C: Connect> {
    pub queue: Arc<JobQueue>,
    pub connector: C,
    pub ledger: Arc<StatusLedger>,
    pub policy: RetryPolicy,
    pub cancel: CancelFlag,
}

/// Run one worker to queue exhaustion.
///
/// The worker acquires a single transport handle lazily on first send and
/// reuses it for every message. Cancellation is cooperative: the flag is
/// checked before claiming a message and between attempts, never mid-send.
pub(crate) async fn run_worker<C: Connect>(ctx: WorkerContext<C>) {
    let worker_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("worker", %worker_id);

    async move {
        let mut transport: Option<C::Transport> = None;

        while let Some(message) = ctx.queue.pop() {
            if ctx.cancel.is_cancelled() {
                ctx.ledger.finalize(
                    message.recipient_id,
                    DeliveryStatus::Aborted,
                    Some(ctx.cancel.detail().to_string()),
                );
                continue;
            }
            process_message(&ctx, &mut transport, &message).await;
        }

        tracing::debug!("queue drained, worker exiting");
    }
    .instrument(span)
    .await
}

async fn process_message<C: Connect>(
    ctx: &WorkerContext<C>,
    transport: &mut Option<C::Transport>,
    message: &MergedMessage,
) {
    let recipient_id = message.recipient_id;
    let mut attempt: u32 = 1;

    loop {
        ctx.ledger.begin_attempt(recipient_id, attempt);

        let error = match send_once(&ctx.connector, transport, message).await {
            Ok(()) => {
                ctx.ledger
                    .record(recipient_id, SendAttempt::new(attempt, DeliveryStatus::Sent, None));
                tracing::info!(recipient_id, attempt, "sent");
                return;
            }
            Err(e) => e,
        };

        match ctx.policy.next_action(attempt, &error) {
            NextAction::Retry(delay) => {
                ctx.ledger.record(
                    recipient_id,
                    SendAttempt::new(
                        attempt,
                        DeliveryStatus::TransientFailure,
                        Some(error.to_string()),
                    ),
                );
                tracing::warn!(
                    recipient_id,
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "send failed, retrying"
                );
                // Backoff blocks this worker only.
                tokio::time::sleep(delay).await;
                attempt += 1;

                if ctx.cancel.is_cancelled() {
                    ctx.ledger.finalize(
                        recipient_id,
                        DeliveryStatus::Aborted,
                        Some(ctx.cancel.detail().to_string()),
                    );
                    return;
                }
            }
            NextAction::Finalize(status) => {
                if matches!(error, SendError::Auth(_)) {
                    // The credential is shared: abort the whole run.
                    ctx.ledger.set_auth_failed();
                    ctx.cancel.cancel_auth();
                }
                ctx.ledger.record(
                    recipient_id,
                    SendAttempt::new(attempt, status, Some(error.to_string())),
                );
                tracing::error!(
                    recipient_id,
                    attempt,
                    error = %error,
                    status = %status,
                    "send permanently failed"
                );
                return;
            }
        }
    }
}

/// One send over the worker's persistent handle, connecting first if the
/// worker has no live handle yet. A connection-level failure discards the
/// handle so the next attempt reconnects.
async fn send_once<C: Connect>(
    connector: &C,
    transport: &mut Option<C::Transport>,
    message: &MergedMessage,
) -> Result<(), SendError> {
    let mut handle = match transport.take() {
        Some(handle) => handle,
        None => connector.connect().await?,
    };

    let result = handle.send(message).await;
    // Keep the handle unless the connection itself failed.
    if !matches!(result, Err(SendError::Connect(_))) {
        *transport = Some(handle);
    }
    result
}
