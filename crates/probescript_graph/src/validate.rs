// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection validation.
//!
//! Preconditions are checked in a fixed order and the first violation is
//! reported. A rejected connection never mutates the script.

use crate::node::NodeId;
use crate::port::{PortDirection, PortId, PortKind};
use crate::script::Script;
use crate::value::ValueType;
use thiserror::Error;

/// Reason a connection was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found on the node
    #[error("Port '{port}' not found on node {node}")]
    PortNotFound {
        /// Node searched
        node: NodeId,
        /// Missing port
        port: PortId,
    },

    /// Source is not an output or target is not an input
    #[error("Connections must run from an output to an input")]
    DirectionMismatch,

    /// Source and target are the same node
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Target input already has a connection
    #[error("Input already connected: {port} on node {node}")]
    InputAlreadyConnected {
        /// Target node
        node: NodeId,
        /// Target port
        port: PortId,
    },

    /// Flow port wired to a value port
    #[error("Cannot connect {from} port to {to} port")]
    KindMismatch {
        /// Source kind
        from: PortKind,
        /// Target kind
        to: PortKind,
    },

    /// Value types are not compatible
    #[error("Incompatible value types: {from} -> {to}")]
    IncompatibleTypes {
        /// Source type
        from: ValueType,
        /// Target type
        to: ValueType,
    },
}

/// Check whether an edge may be added to `script`
pub fn check_connection(
    script: &Script,
    from_node: &NodeId,
    from_port: &PortId,
    to_node: &NodeId,
    to_port: &PortId,
) -> Result<(), ConnectionError> {
    let source_node = script
        .node(from_node)
        .ok_or_else(|| ConnectionError::NodeNotFound(from_node.clone()))?;
    let target_node = script
        .node(to_node)
        .ok_or_else(|| ConnectionError::NodeNotFound(to_node.clone()))?;

    let source = source_node.port(from_port).ok_or_else(|| ConnectionError::PortNotFound {
        node: from_node.clone(),
        port: from_port.clone(),
    })?;
    let target = target_node.port(to_port).ok_or_else(|| ConnectionError::PortNotFound {
        node: to_node.clone(),
        port: to_port.clone(),
    })?;

    if source.direction != PortDirection::Output || target.direction != PortDirection::Input {
        return Err(ConnectionError::DirectionMismatch);
    }

    if from_node == to_node {
        return Err(ConnectionError::SelfLoop);
    }

    if script.incoming(to_node, to_port).is_some() {
        return Err(ConnectionError::InputAlreadyConnected {
            node: to_node.clone(),
            port: to_port.clone(),
        });
    }

    if !source.kind.same_kind(target.kind) {
        return Err(ConnectionError::KindMismatch {
            from: source.kind,
            to: target.kind,
        });
    }

    if let (PortKind::Value(from), PortKind::Value(to)) = (source.kind, target.kind) {
        if !from.can_connect_to(to) {
            return Err(ConnectionError::IncompatibleTypes { from, to });
        }
    }

    Ok(())
}
