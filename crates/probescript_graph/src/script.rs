// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script: the graph aggregate holding nodes, connections and variables.
//!
//! Every structural change goes through a mutation method here, so the
//! invariants (unique ids, one connection per input, one entry node per
//! trigger target) hold for any `Script` value, including ones decoded from
//! an editor snapshot.

use crate::config::{ConfigError, NodeConfig, NodeKind};
use crate::connection::{Connection, ConnectionId};
use crate::id::string_id;
use crate::node::{Node, NodeId};
use crate::port::{PortId, PortKind};
use crate::validate::{check_connection, ConnectionError};
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

string_id!(
    /// Unique identifier for a script
    ScriptId
);

string_id!(
    /// Unique identifier for a variable, scoped to its script
    VariableId
);

/// A script-scoped variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Variable ID
    pub id: VariableId,
    /// Display name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Value before any node writes it
    #[serde(default)]
    pub default_value: Value,
}

impl Variable {
    /// Create a variable
    pub fn new(id: impl Into<VariableId>, name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value_type,
            default_value: Value::Null,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Coerce `value` into the declared type, keeping it as-is when the
    /// lattice does not allow the conversion
    pub fn coerce(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        value.coerce_to(self.value_type).unwrap_or(value)
    }
}

/// What starts a script. Only consulted by the external scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Run on demand
    #[default]
    Manual,
    /// Run when a target session attaches
    OnAttach,
    /// Run when the target session detaches
    OnDetach,
    /// Run when a UI component fires an event
    UiEvent {
        /// Component that fires
        #[serde(rename = "componentId")]
        component_id: String,
        /// Event name
        event: String,
    },
    /// Run on a hotkey
    Hotkey {
        /// Key chord
        keys: String,
    },
    /// Run periodically
    Interval {
        /// Period in milliseconds
        ms: u64,
    },
}

/// Error from a structural mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node ID already used
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Entry node for the same trigger target already present
    #[error("Script already has a '{kind}' entry node (component: {component:?})")]
    DuplicateEntry {
        /// Entry kind
        kind: NodeKind,
        /// Component, for UI event entries
        component: Option<String>,
    },

    /// Connection ID already used
    #[error("Duplicate connection id: {0}")]
    DuplicateConnection(ConnectionId),

    /// Connection not found
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Variable ID already used
    #[error("Duplicate variable id: {0}")]
    DuplicateVariable(VariableId),

    /// Variable not found
    #[error("Variable not found: {0}")]
    VariableNotFound(VariableId),

    /// Config did not decode
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection rejected by the validator
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Key identifying what an entry node is triggered by
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryKey {
    kind: NodeKind,
    component: Option<String>,
}

impl EntryKey {
    fn of(node: &Node) -> Option<Self> {
        if !node.is_entry() {
            return None;
        }
        let component = match node.config() {
            NodeConfig::EventUi(config) => config.component_id.clone(),
            _ => None,
        };
        Some(Self {
            kind: node.kind(),
            component,
        })
    }
}

/// A visual script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScript", into = "RawScript")]
pub struct Script {
    /// Script ID
    pub id: ScriptId,
    /// Script name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Trigger
    pub trigger: Trigger,
    variables: IndexMap<VariableId, Variable>,
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
}

impl Script {
    /// Create a new empty script
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScriptId::new(),
            name: name.into(),
            description: None,
            trigger: Trigger::Manual,
            variables: IndexMap::new(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
        }
    }

    /// Set name and description
    pub fn set_metadata(&mut self, name: impl Into<String>, description: Option<String>) {
        self.name = name.into();
        self.description = description;
    }

    /// Set the trigger
    pub fn set_trigger(&mut self, trigger: Trigger) {
        self.trigger = trigger;
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if let Some(key) = EntryKey::of(&node) {
            self.check_entry_free(&key, None)?;
        }

        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    fn check_entry_free(&self, key: &EntryKey, except: Option<&NodeId>) -> Result<(), GraphError> {
        let taken = self
            .nodes
            .values()
            .filter(|n| Some(&n.id) != except)
            .any(|n| EntryKey::of(n).as_ref() == Some(key));
        if taken {
            return Err(GraphError::DuplicateEntry {
                kind: key.kind,
                component: key.component.clone(),
            });
        }
        Ok(())
    }

    /// Replace a node's config from the editor's map.
    ///
    /// Connections to ports that disappeared, or whose type no longer
    /// matches, are dropped and their ids returned.
    pub fn update_node_config(
        &mut self,
        node_id: &NodeId,
        raw: &serde_json::Value,
    ) -> Result<Vec<ConnectionId>, GraphError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        let config = NodeConfig::decode(node.kind(), raw)?;

        let mut updated = node.clone();
        updated.set_config(config)?;
        if let Some(key) = EntryKey::of(&updated) {
            self.check_entry_free(&key, Some(node_id))?;
        }
        self.nodes.insert(node_id.clone(), updated);

        let stale: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.involves_node(node_id) && !self.still_valid(c))
            .map(|c| c.id.clone())
            .collect();
        for id in &stale {
            self.connections.shift_remove(id);
        }
        if !stale.is_empty() {
            tracing::debug!(node = %node_id, dropped = stale.len(), "dropped connections after config change");
        }
        Ok(stale)
    }

    fn still_valid(&self, connection: &Connection) -> bool {
        let from = self
            .nodes
            .get(&connection.from_node)
            .and_then(|n| n.output(&connection.from_port));
        let to = self
            .nodes
            .get(&connection.to_node)
            .and_then(|n| n.input(&connection.to_port));
        match (from, to) {
            (Some(from), Some(to)) => match (from.kind, to.kind) {
                (PortKind::Flow, PortKind::Flow) => true,
                (PortKind::Value(a), PortKind::Value(b)) => a.can_connect_to(b),
                _ => false,
            },
            _ => false,
        }
    }

    /// Rename a node
    pub fn set_node_label(&mut self, node_id: &NodeId, label: impl Into<String>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        node.label = label.into();
        Ok(())
    }

    /// Move a node on the canvas
    pub fn move_node(&mut self, node_id: &NodeId, x: f32, y: f32) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        node.position = [x, y];
        Ok(())
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.nodes.shift_remove(node_id)
    }

    /// Remove several nodes at once. Entry nodes are skipped.
    ///
    /// Returns the ids actually removed.
    pub fn remove_nodes<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a NodeId>) -> Vec<NodeId> {
        let mut removed = Vec::new();
        for id in node_ids {
            match self.nodes.get(id) {
                Some(node) if node.is_entry() => {
                    tracing::debug!(node = %id, "skipping entry node in bulk delete");
                }
                Some(_) => {
                    self.remove_node(id);
                    removed.push(id.clone());
                }
                None => {}
            }
        }
        removed
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Entry nodes, in insertion order
    pub fn entry_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_entry())
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Add a connection between ports
    pub fn connect(
        &mut self,
        from_node: &NodeId,
        from_port: &PortId,
        to_node: &NodeId,
        to_port: &PortId,
    ) -> Result<ConnectionId, ConnectionError> {
        self.connect_with_id(ConnectionId::new(), from_node, from_port, to_node, to_port)
    }

    fn connect_with_id(
        &mut self,
        id: ConnectionId,
        from_node: &NodeId,
        from_port: &PortId,
        to_node: &NodeId,
        to_port: &PortId,
    ) -> Result<ConnectionId, ConnectionError> {
        check_connection(self, from_node, from_port, to_node, to_port)?;

        let connection = Connection::new(
            id.clone(),
            from_node.clone(),
            from_port.clone(),
            to_node.clone(),
            to_port.clone(),
        );
        self.connections.insert(id.clone(), connection);
        Ok(id)
    }

    /// Check a connection without adding it
    pub fn can_connect(
        &self,
        from_node: &NodeId,
        from_port: &PortId,
        to_node: &NodeId,
        to_port: &PortId,
    ) -> Result<(), ConnectionError> {
        check_connection(self, from_node, from_port, to_node, to_port)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The connection feeding an input, if any
    pub fn incoming(&self, node_id: &NodeId, port_id: &PortId) -> Option<&Connection> {
        self.connections.values().find(|c| c.targets(node_id, port_id))
    }

    /// Connections leaving an output
    pub fn outgoing<'a>(
        &'a self,
        node_id: &'a NodeId,
        port_id: &'a PortId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.leaves(node_id, port_id))
    }

    /// Get connections involving a node
    pub fn connections_for_node<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Add a variable
    pub fn add_variable(&mut self, variable: Variable) -> Result<VariableId, GraphError> {
        if self.variables.contains_key(&variable.id) {
            return Err(GraphError::DuplicateVariable(variable.id));
        }
        let id = variable.id.clone();
        self.variables.insert(id.clone(), variable);
        Ok(id)
    }

    /// Remove a variable
    pub fn remove_variable(&mut self, variable_id: &VariableId) -> Result<Variable, GraphError> {
        self.variables
            .shift_remove(variable_id)
            .ok_or_else(|| GraphError::VariableNotFound(variable_id.clone()))
    }

    /// Get a variable by ID
    pub fn variable(&self, variable_id: &VariableId) -> Option<&Variable> {
        self.variables.get(variable_id)
    }

    /// Get all variables
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Wire form of a script: plain lists, re-validated on load
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScript {
    #[serde(default)]
    id: ScriptId,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    trigger: Trigger,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl TryFrom<RawScript> for Script {
    type Error = GraphError;

    fn try_from(raw: RawScript) -> Result<Self, Self::Error> {
        let mut script = Script {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            trigger: raw.trigger,
            variables: IndexMap::new(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
        };

        for variable in raw.variables {
            script.add_variable(variable)?;
        }
        for node in raw.nodes {
            script.add_node(node)?;
        }
        for c in raw.connections {
            if script.connections.contains_key(&c.id) {
                return Err(GraphError::DuplicateConnection(c.id));
            }
            script.connect_with_id(c.id, &c.from_node, &c.from_port, &c.to_node, &c.to_port)?;
        }
        Ok(script)
    }
}

impl From<Script> for RawScript {
    fn from(script: Script) -> Self {
        Self {
            id: script.id,
            name: script.name,
            description: script.description,
            trigger: script.trigger,
            variables: script.variables.into_values().collect(),
            nodes: script.nodes.into_values().collect(),
            connections: script.connections.into_values().collect(),
        }
    }
}
