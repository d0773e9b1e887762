// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script graph model for probescript.
//!
//! This crate provides the structural half of the engine:
//! - Value types and the connection compatibility lattice
//! - Nodes with template-derived ports and decoded per-kind config
//! - Connection validation
//! - The static node template registry
//! - The `Script` aggregate and its mutation operations
//!
//! ## Architecture
//!
//! Every node kind has a [`Template`] in the [`TemplateRegistry`]. A node's
//! ports are generated from its template and config, and its execution
//! context (host or target) comes from the template category. Evaluation
//! lives in `probescript_runtime`; nothing here executes a graph.

mod catalog;
pub mod config;
pub mod connection;
mod id;
pub mod node;
pub mod port;
pub mod script;
pub mod template;
pub mod validate;
pub mod value;

pub use config::{ConfigError, NodeConfig, NodeKind};
pub use connection::{Connection, ConnectionId};
pub use node::{Node, NodeId};
pub use port::{Port, PortDirection, PortId, PortKind};
pub use script::{GraphError, Script, ScriptId, Trigger, Variable, VariableId};
pub use template::{Category, Context, Dispatch, PortShape, Template, TargetCall, TemplateRegistry};
pub use validate::ConnectionError;
pub use value::{Value, ValueType};
