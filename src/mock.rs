//! Mock transport for testing and development.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::transport::{CallArg, Transport};

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Vec<CallArg>,
}

enum MockReply {
    Payload(String),
    Failure { code: i32, message: String },
}

/// In-memory transport with canned responses.
///
/// Simulates the control plane without a network. Useful for:
/// - Unit and integration testing
/// - Development against an unreachable control plane
/// - Demo environments
///
/// Responses are queued per method name and consumed in order; every
/// call is recorded so tests can assert on the exact wire traffic.
pub struct MockTransport {
    replies: RwLock<HashMap<String, VecDeque<MockReply>>>,
    calls: RwLock<Vec<RecordedCall>>,
    latency: Option<Duration>,
}

impl MockTransport {
    /// Create a mock with no canned responses.
    pub fn new() -> Self {
        Self {
            replies: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            latency: None,
        }
    }

    /// Simulate a per-call round-trip delay.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a successful payload for `method`.
    pub fn respond(&self, method: &str, payload: &str) {
        self.replies
            .write()
            .expect("mock lock poisoned")
            .entry(method.to_string())
            .or_default()
            .push_back(MockReply::Payload(payload.to_string()));
    }

    /// Queue a remote failure for `method`.
    pub fn fail(&self, method: &str, code: i32, message: &str) {
        self.replies
            .write()
            .expect("mock lock poisoned")
            .entry(method.to_string())
            .or_default()
            .push_back(MockReply::Failure {
                code,
                message: message.to_string(),
            });
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().expect("mock lock poisoned").clone()
    }

    /// The calls issued for one method, in order.
    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, method: &str, args: &[CallArg]) -> Result<String> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.calls
            .write()
            .expect("mock lock poisoned")
            .push(RecordedCall {
                method: method.to_string(),
                args: args.to_vec(),
            });

        let reply = self
            .replies
            .write()
            .expect("mock lock poisoned")
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        debug!(method, "mock transport call");
        match reply {
            Some(MockReply::Payload(payload)) => Ok(payload),
            Some(MockReply::Failure { code, message }) => {
                Err(ClientError::Remote { code, message })
            }
            None => Err(ClientError::Remote {
                code: -1,
                message: format!("no canned response for method '{method}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_are_consumed_in_order() {
        let mock = MockTransport::new();
        mock.respond("x.info", "<A/>");
        mock.respond("x.info", "<B/>");

        assert_eq!(mock.call("x.info", &[]).await.unwrap(), "<A/>");
        assert_eq!(mock.call("x.info", &[]).await.unwrap(), "<B/>");
        assert!(mock.call("x.info", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_failures_carry_code_and_message() {
        let mock = MockTransport::new();
        mock.fail("x.delete", 0x0100, "not authorized");

        let err = mock.call("x.delete", &[CallArg::Int(3)]).await.unwrap_err();
        match err {
            ClientError::Remote { code, message } => {
                assert_eq!(code, 0x0100);
                assert_eq!(message, "not authorized");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_latency_delays_replies() {
        let mock = MockTransport::new().with_latency(Duration::from_millis(5));
        mock.respond("x.info", "<A/>");

        let start = std::time::Instant::now();
        mock.call("x.info", &[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let mock = MockTransport::new();
        mock.respond("x.enable", "");
        mock.call("x.enable", &[CallArg::Int(1), CallArg::Bool(true)])
            .await
            .unwrap();

        let calls = mock.calls_for("x.enable");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![CallArg::Int(1), CallArg::Bool(true)]);
    }
}
