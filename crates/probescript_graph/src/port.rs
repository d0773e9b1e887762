// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a port, unique within its node.
///
/// Port ids are stable names taken from the node template (`exec_in`, `a`,
/// `arg3`, ...) so connections survive re-decoding a script snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub String);

impl PortId {
    /// Create a port ID from a name
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// What a port carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Control reachability only
    Flow,
    /// Typed data
    Value(ValueType),
}

impl PortKind {
    /// Whether this is a flow port
    pub fn is_flow(self) -> bool {
        matches!(self, Self::Flow)
    }

    /// The value type, for value ports
    pub fn value_type(self) -> Option<ValueType> {
        match self {
            Self::Flow => None,
            Self::Value(ty) => Some(ty),
        }
    }

    /// Whether both ports are flow or both are value ports
    pub fn same_kind(self, other: PortKind) -> bool {
        self.is_flow() == other.is_flow()
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow => f.write_str("flow"),
            Self::Value(ty) => write!(f, "value<{ty}>"),
        }
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Port ID, unique within the node
    pub id: PortId,
    /// Display name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Flow or typed value
    pub kind: PortKind,
    /// Value used when the input is left unconnected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Port {
    /// Create a new port
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: PortKind,
        direction: PortDirection,
    ) -> Self {
        Self {
            id: PortId::new(id),
            name: name.into(),
            direction,
            kind,
            default_value: None,
        }
    }

    /// Create a flow input port
    pub fn flow_input(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, PortKind::Flow, PortDirection::Input)
    }

    /// Create a flow output port
    pub fn flow_output(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, PortKind::Flow, PortDirection::Output)
    }

    /// Create a value input port
    pub fn input(id: impl Into<String>, name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(id, name, PortKind::Value(value_type), PortDirection::Input)
    }

    /// Create a value output port
    pub fn output(id: impl Into<String>, name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(id, name, PortKind::Value(value_type), PortDirection::Output)
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Whether this port carries control flow
    pub fn is_flow(&self) -> bool {
        self.kind.is_flow()
    }

    /// Value type, for value ports
    pub fn value_type(&self) -> Option<ValueType> {
        self.kind.value_type()
    }

    /// Outputs may fan out; inputs accept a single connection
    pub fn accepts_many(&self) -> bool {
        self.direction == PortDirection::Output
    }
}
