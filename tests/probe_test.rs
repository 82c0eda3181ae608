//! Connection-probe outcomes against a stubbed connector.

use async_trait::async_trait;

use mergemail::smtp::{probe_with, Connect, MailTransport, ProbeError, SendError};
use mergemail::MergedMessage;

#[derive(Clone, Copy)]
enum ConnectOutcome {
    Accept,
    RejectCredentials,
    Refuse,
    Timeout,
}

#[derive(Clone)]
struct ProbeStub {
    outcome: ConnectOutcome,
}

struct NoopTransport;

#[async_trait]
impl MailTransport for NoopTransport {
    async fn send(&mut self, _message: &MergedMessage) -> Result<(), SendError> {
        Ok(())
    }
}

#[async_trait]
impl Connect for ProbeStub {
    type Transport = NoopTransport;

    async fn connect(&self) -> Result<NoopTransport, SendError> {
        match self.outcome {
            ConnectOutcome::Accept => Ok(NoopTransport),
            ConnectOutcome::RejectCredentials => {
                Err(SendError::Auth("535 authentication failed".into()))
            }
            ConnectOutcome::Refuse => Err(SendError::Connect("connection refused".into())),
            ConnectOutcome::Timeout => Err(SendError::Transient("read timed out".into())),
        }
    }
}

#[tokio::test]
async fn probe_succeeds_when_session_accepted() {
    let stub = ProbeStub {
        outcome: ConnectOutcome::Accept,
    };
    assert!(probe_with(&stub).await.is_ok());
}

#[tokio::test]
async fn probe_reports_credential_rejection_as_auth() {
    let stub = ProbeStub {
        outcome: ConnectOutcome::RejectCredentials,
    };
    match probe_with(&stub).await {
        Err(ProbeError::Auth(detail)) => assert!(detail.contains("535")),
        other => panic!("expected auth rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn probe_reports_unreachable_server_as_connect_failure() {
    let stub = ProbeStub {
        outcome: ConnectOutcome::Refuse,
    };
    assert!(matches!(
        probe_with(&stub).await,
        Err(ProbeError::Connect(_))
    ));
}

#[tokio::test]
async fn probe_treats_any_non_auth_failure_as_connect_failure() {
    // Within a run a timeout is retryable; at probe time it is fatal.
    let stub = ProbeStub {
        outcome: ConnectOutcome::Timeout,
    };
    assert!(matches!(
        probe_with(&stub).await,
        Err(ProbeError::Connect(_))
    ));
}
