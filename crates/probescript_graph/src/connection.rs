// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the script graph.

use crate::id::string_id;
use crate::node::NodeId;
use crate::port::PortId;
use serde::{Deserialize, Serialize};

string_id!(
    /// Unique identifier for a connection
    ConnectionId
);

/// A directed output→input connection between two ports.
///
/// Connections are only constructed by [`Script::connect`](crate::Script::connect),
/// which runs the validator first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    #[serde(rename = "fromNodeId")]
    pub from_node: NodeId,
    /// Source port ID
    #[serde(rename = "fromPortId")]
    pub from_port: PortId,
    /// Target node ID
    #[serde(rename = "toNodeId")]
    pub to_node: NodeId,
    /// Target port ID
    #[serde(rename = "toPortId")]
    pub to_port: PortId,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Self {
        Self {
            id,
            from_node,
            from_port,
            to_node,
            to_port,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.from_node == *node_id || self.to_node == *node_id
    }

    /// Check if this connection touches a specific port of a node
    pub fn involves_port(&self, node_id: &NodeId, port_id: &PortId) -> bool {
        (self.from_node == *node_id && self.from_port == *port_id)
            || (self.to_node == *node_id && self.to_port == *port_id)
    }

    /// Check if this connection ends at the given input
    pub fn targets(&self, node_id: &NodeId, port_id: &PortId) -> bool {
        self.to_node == *node_id && self.to_port == *port_id
    }

    /// Check if this connection starts at the given output
    pub fn leaves(&self, node_id: &NodeId, port_id: &PortId) -> bool {
        self.from_node == *node_id && self.from_port == *port_id
    }
}
