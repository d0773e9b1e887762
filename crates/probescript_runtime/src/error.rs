// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors that end a run.

use crate::agent::TransportError;
use crate::ui::UiError;
use probescript_graph::{NodeId, NodeKind, PortId, ValueType};
use thiserror::Error;

/// Fatal error raised while evaluating a script
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    /// Entry node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Run started from a node that is not an entry node
    #[error("Node {node} ('{kind}') is not an entry node")]
    NotEntry {
        /// Requested node
        node: NodeId,
        /// Its kind
        kind: NodeKind,
    },

    /// Unconnected input without an inline or template default
    #[error("Missing input '{port}' on node {node}")]
    MissingInput {
        /// Node being evaluated
        node: NodeId,
        /// Input port
        port: PortId,
    },

    /// Variable not declared on the script
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A value input reads an output of a flow node that has not run yet
    #[error("Output '{port}' of node {node} is read before the node executed")]
    NotExecuted {
        /// Producer node
        node: NodeId,
        /// Producer output
        port: PortId,
    },

    /// Pure nodes feed each other in a cycle
    #[error("Value dependency cycle through node {0}")]
    ResolutionCycle(NodeId),

    /// Pure resolution went deeper than allowed
    #[error("Value resolution deeper than {0} nodes")]
    DepthExceeded(usize),

    /// Loops nested deeper than allowed
    #[error("Loops nested deeper than {0} levels")]
    NestingExceeded(usize),

    /// Input holds a value the node cannot use
    #[error("Input '{port}' on node {node} expects {expected}, got {found}")]
    TypeMismatch {
        /// Node being evaluated
        node: NodeId,
        /// Input port
        port: PortId,
        /// Expected type
        expected: ValueType,
        /// Type actually found
        found: ValueType,
    },

    /// Host-side evaluation failed
    #[error("Node {node} failed: {message}")]
    Host {
        /// Failing node
        node: NodeId,
        /// Reason
        message: String,
    },

    /// UI collaborator failed on a read
    #[error(transparent)]
    Ui(#[from] UiError),

    /// Target node reached without an attached session
    #[error("No target session attached")]
    NoSession,

    /// Agent did not answer in time
    #[error("Agent call '{method}' timed out after {timeout_ms} ms")]
    AgentTimeout {
        /// RPC method
        method: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// Agent answered with an error status
    #[error("Agent call '{method}' failed: {message}")]
    Agent {
        /// RPC method
        method: String,
        /// Agent message
        message: String,
    },

    /// Request could not be delivered
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Run was cancelled
    #[error("Run cancelled")]
    Cancelled,
}

impl RunError {
    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn host(node: &NodeId, message: impl Into<String>) -> Self {
        Self::Host {
            node: node.clone(),
            message: message.into(),
        }
    }
}

/// Result alias for evaluator internals
pub type RunResult<T> = std::result::Result<T, RunError>;
