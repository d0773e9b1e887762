// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script execution for probescript.
//!
//! This crate runs [`probescript_graph::Script`]s:
//! - The [`Engine`] walks flow edges from an entry node and resolves value
//!   inputs on demand
//! - Host nodes (math, strings, variables, UI, device listing) run in process
//! - Target nodes are marshalled into [`AgentRequest`]s and sent through an
//!   [`AgentClient`] under a timeout
//! - Every run produces an [`ExecutionResult`]
//!
//! ## Collaborators
//!
//! The engine talks to the outside world through three traits:
//! [`AgentClient`] for the instrumentation agent, [`UiState`] for the
//! component values of the script's panel and [`DeviceCatalog`] for device
//! and process enumeration. In-memory implementations are provided for each.

pub mod agent;
pub mod config;
pub mod devices;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod state;
pub mod target;
pub mod ui;

pub use agent::{AgentClient, AgentEnvelope, AgentReply, AgentRequest, ChannelAgent, ReplyStatus, TargetSession, TransportError};
pub use config::RuntimeConfig;
pub use devices::{DeviceCatalog, DeviceError, DeviceInfo, ProcessInfo, StaticCatalog};
pub use error::{RunError, RunResult};
pub use evaluator::{find_entry, Engine};
pub use state::{ExecutionResult, LogEntry, Notification, RunStatus, VariableStore};
pub use ui::{InMemoryUiState, UiError, UiState};
