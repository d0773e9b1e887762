// SPDX-License-Identifier: MIT OR Apache-2.0
//! Agent RPC boundary.
//!
//! Target nodes are marshalled into an [`AgentRequest`] and handed to an
//! [`AgentClient`]. The transport that actually reaches the instrumented
//! process lives outside this crate; [`ChannelAgent`] forwards requests over a
//! channel to whichever task owns it.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// The attached target session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSession {
    /// Instrumentation session
    pub session_id: String,
    /// Agent script loaded into the target
    pub script_id: String,
}

/// A single call into the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Method name, e.g. `memory.read`
    pub method: String,
    /// Named arguments
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl AgentRequest {
    /// Create a request without arguments
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: serde_json::Map::new(),
        }
    }

    /// Add an argument
    pub fn arg(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }
}

/// Outcome reported by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    /// Call succeeded
    Ok,
    /// Call failed inside the target
    Error,
}

/// The agent's answer to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Success or failure
    pub status: ReplyStatus,
    /// Result value
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Error description
    #[serde(default)]
    pub message: Option<String>,
}

impl AgentReply {
    /// Successful reply
    pub fn ok(value: impl Into<serde_json::Value>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            value: Some(value.into()),
            message: None,
        }
    }

    /// Failed reply
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            value: None,
            message: Some(message.into()),
        }
    }
}

/// Failure to deliver a request or receive its reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Nobody is serving requests anymore
    #[error("Agent transport closed")]
    Closed,

    /// The request was accepted but never answered
    #[error("Agent dropped the request without replying")]
    Dropped,

    /// Transport-specific failure
    #[error("Agent transport error: {0}")]
    Other(String),
}

/// Client able to deliver requests into the target
pub trait AgentClient: Send + Sync + 'static {
    /// Perform one call
    fn call(
        &self,
        session: &TargetSession,
        request: AgentRequest,
    ) -> BoxFuture<'_, Result<AgentReply, TransportError>>;
}

/// A request waiting for the transport task, with its reply slot
#[derive(Debug)]
pub struct AgentEnvelope {
    /// Session the call is for
    pub session: TargetSession,
    /// The call
    pub request: AgentRequest,
    /// Where the transport sends the answer
    pub reply: oneshot::Sender<AgentReply>,
}

/// [`AgentClient`] that forwards requests over a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelAgent {
    tx: mpsc::Sender<AgentEnvelope>,
}

impl ChannelAgent {
    /// Create the client and the receiving end for the transport task
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AgentEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl AgentClient for ChannelAgent {
    fn call(
        &self,
        session: &TargetSession,
        request: AgentRequest,
    ) -> BoxFuture<'_, Result<AgentReply, TransportError>> {
        let session = session.clone();
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            self.tx
                .send(AgentEnvelope {
                    session,
                    request,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| TransportError::Closed)?;
            reply_rx.await.map_err(|_| TransportError::Dropped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> TargetSession {
        TargetSession {
            session_id: "s1".into(),
            script_id: "agent".into(),
        }
    }

    #[tokio::test]
    async fn test_channel_agent_round_trip() {
        let (agent, mut rx) = ChannelAgent::new(4);
        let server = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.session.session_id, "s1");
            assert_eq!(envelope.request.method, "memory.read");
            let _ = envelope.reply.send(AgentReply::ok(42));
        });

        let request = AgentRequest::new("memory.read").arg("address", "0x10");
        let reply = agent.call(&session(), request).await.unwrap();
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(reply.value, Some(json!(42)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let (agent, rx) = ChannelAgent::new(1);
        drop(rx);
        let err = agent.call(&session(), AgentRequest::new("module.base")).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    #[tokio::test]
    async fn test_dropped_reply() {
        let (agent, mut rx) = ChannelAgent::new(1);
        tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            drop(envelope.reply);
        });
        let err = agent.call(&session(), AgentRequest::new("module.base")).await.unwrap_err();
        assert_eq!(err, TransportError::Dropped);
    }

    #[test]
    fn test_reply_wire_form() {
        let reply: AgentReply = serde_json::from_value(json!({"status": "error", "message": "bad address"})).unwrap();
        assert_eq!(reply, AgentReply::error("bad address"));
    }
}
