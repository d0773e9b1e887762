// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the script graph.

use crate::config::{ConfigError, NodeConfig, NodeKind};
use crate::id::string_id;
use crate::port::{Port, PortId};
use crate::template::{Context, Template, TemplateRegistry};
use serde::{Deserialize, Serialize};

string_id!(
    /// Unique identifier for a node
    NodeId
);

/// A node instance in a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name (can be customized)
    pub label: String,
    /// Position on the canvas
    pub position: [f32; 2],
    config: NodeConfig,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl Node {
    /// Create a node from a decoded config
    pub fn new(id: impl Into<NodeId>, config: NodeConfig) -> Self {
        let template = TemplateRegistry::standard().get(config.kind());
        let (inputs, outputs) = template.ports_for(&config);
        Self {
            id: id.into(),
            label: template.label.to_string(),
            position: [0.0, 0.0],
            config,
            inputs,
            outputs,
        }
    }

    /// Create a node from the editor's free-form config map
    pub fn from_raw(
        id: impl Into<NodeId>,
        kind: NodeKind,
        raw: &serde_json::Value,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(id, NodeConfig::decode(kind, raw)?))
    }

    /// Create a node of `kind` with default config
    pub fn with_kind(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self::new(id, NodeConfig::default_for(kind))
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Template of this node's kind
    pub fn template(&self) -> &'static Template {
        TemplateRegistry::standard().get(self.kind())
    }

    /// Execution context, derived from the template category
    pub fn context(&self) -> Context {
        self.template().context()
    }

    /// Whether this node starts runs
    pub fn is_entry(&self) -> bool {
        self.template().entry
    }

    /// Whether this node is evaluated on demand
    pub fn is_pure(&self) -> bool {
        self.template().is_pure()
    }

    /// Decoded configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Replace the config, regenerating ports for config-driven shapes.
    ///
    /// Returns the ids of ports that no longer exist.
    pub fn set_config(&mut self, config: NodeConfig) -> Result<Vec<PortId>, ConfigError> {
        if config.kind() != self.kind() {
            return Err(ConfigError::KindChanged {
                from: self.kind(),
                to: config.kind(),
            });
        }

        let (inputs, outputs) = self.template().ports_for(&config);
        let removed = self
            .ports()
            .filter(|old| !inputs.iter().chain(outputs.iter()).any(|new| new.id == old.id))
            .map(|p| p.id.clone())
            .collect();

        self.config = config;
        self.inputs = inputs;
        self.outputs = outputs;
        Ok(removed)
    }

    /// Input ports
    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Get an input port by ID
    pub fn input(&self, port_id: &PortId) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == *port_id)
    }

    /// Get an output port by ID
    pub fn output(&self, port_id: &PortId) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == *port_id)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.input(port_id).or_else(|| self.output(port_id))
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Wire form of a node: `type` plus the editor's config map
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: NodeId,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default, skip_deserializing)]
    inputs: Vec<Port>,
    #[serde(default, skip_deserializing)]
    outputs: Vec<Port>,
}

impl TryFrom<RawNode> for Node {
    type Error = ConfigError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let mut node = Node::from_raw(raw.id, raw.kind, &raw.config)?.with_position(raw.x, raw.y);
        if let Some(label) = raw.label {
            node.label = label;
        }
        Ok(node)
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        Self {
            kind: node.kind(),
            config: node.config.encode(),
            id: node.id,
            label: Some(node.label),
            x: node.position[0],
            y: node.position[1],
            inputs: node.inputs,
            outputs: node.outputs,
        }
    }
}
