// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution state: the persistent variable store, per-run bindings and the
//! structured run result.

use indexmap::IndexMap;
use parking_lot::RwLock;
use probescript_graph::config::LogLevel;
use probescript_graph::{NodeId, PortId, Script, Value, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Variable values that outlive a single run.
///
/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: Arc<RwLock<HashMap<VariableId, Value>>>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, if the variable has been written
    pub fn get(&self, id: &VariableId) -> Option<Value> {
        self.values.read().get(id).cloned()
    }

    /// Write a value
    pub fn set(&self, id: VariableId, value: Value) {
        self.values.write().insert(id, value);
    }

    /// Forget every stored value
    pub fn clear(&self) {
        self.values.write().clear();
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Current value of every script variable, falling back to its default
    pub fn snapshot(&self, script: &Script) -> IndexMap<String, Value> {
        let values = self.values.read();
        script
            .variables()
            .map(|v| {
                let value = values.get(&v.id).cloned().unwrap_or_else(|| v.default_value.clone());
                (v.id.to_string(), value)
            })
            .collect()
    }
}

/// A line in the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,
    /// Text
    pub message: String,
    /// Node that produced it, absent for engine messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

/// A user notification raised by a `notify` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Title
    pub title: String,
    /// Body
    pub message: String,
}

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Reached the end of the flow, possibly after a bound warning
    Completed,
    /// A node failed
    Failed,
    /// Stopped from outside
    Cancelled,
}

/// Structured result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// How the run ended
    pub status: RunStatus,
    /// Every script variable by id
    pub variables: IndexMap<String, Value>,
    /// Log lines in order
    pub logs: Vec<LogEntry>,
    /// Values recorded by `output` nodes
    pub outputs: IndexMap<String, Value>,
    /// Notifications raised
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
    /// Error message when the run did not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Whether the run completed
    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Log messages without levels
    pub fn log_messages(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(|l| l.message.as_str())
    }
}

/// Run-local evaluation state
#[derive(Debug, Default)]
pub struct RunState {
    /// Outputs bound by executed flow nodes, valid for the rest of the run
    bindings: HashMap<NodeId, HashMap<PortId, Value>>,
    /// Outputs of pure nodes, valid for the current flow step only
    pure_cache: HashMap<NodeId, HashMap<PortId, Value>>,
    /// Pure nodes currently being resolved
    resolving: HashSet<NodeId>,
    pub(crate) logs: Vec<LogEntry>,
    pub(crate) outputs: IndexMap<String, Value>,
    pub(crate) notifications: Vec<Notification>,
    /// Flow nodes executed so far
    pub(crate) steps: usize,
    /// Current loop nesting
    pub(crate) loop_depth: usize,
}

impl RunState {
    /// Create an empty run state
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an output of an executed flow node
    pub fn bind(&mut self, node: &NodeId, port: impl Into<PortId>, value: Value) {
        self.bindings.entry(node.clone()).or_default().insert(port.into(), value);
    }

    /// Read a bound output
    pub fn bound(&self, node: &NodeId, port: &PortId) -> Option<&Value> {
        self.bindings.get(node)?.get(port)
    }

    /// Whether the flow node has bound any outputs this run
    pub fn has_executed(&self, node: &NodeId) -> bool {
        self.bindings.contains_key(node)
    }

    pub(crate) fn bind_all(&mut self, node: &NodeId, outputs: HashMap<PortId, Value>) {
        self.bindings.entry(node.clone()).or_default().extend(outputs);
    }

    pub(crate) fn mark_executed(&mut self, node: &NodeId) {
        self.bindings.entry(node.clone()).or_default();
    }

    pub(crate) fn cached(&self, node: &NodeId) -> Option<&HashMap<PortId, Value>> {
        self.pure_cache.get(node)
    }

    pub(crate) fn cache(&mut self, node: &NodeId, outputs: HashMap<PortId, Value>) {
        self.pure_cache.insert(node.clone(), outputs);
    }

    /// Start a new flow step: pure results from the previous step are stale
    pub(crate) fn next_step(&mut self) {
        self.invalidate();
        self.steps += 1;
    }

    /// Drop cached pure results, e.g. before re-testing a loop condition
    pub(crate) fn invalidate(&mut self) {
        self.pure_cache.clear();
    }

    /// Returns `false` if the node is already being resolved
    pub(crate) fn enter(&mut self, node: &NodeId) -> bool {
        self.resolving.insert(node.clone())
    }

    pub(crate) fn leave(&mut self, node: &NodeId) {
        self.resolving.remove(node);
    }

    /// Depth of the current pure resolution chain
    pub(crate) fn resolution_depth(&self) -> usize {
        self.resolving.len()
    }

    /// Append a log line
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, node: Option<&NodeId>) {
        self.logs.push(LogEntry {
            level,
            message: message.into(),
            node: node.cloned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probescript_graph::{ValueType, Variable};

    #[test]
    fn test_store_is_shared_between_clones() {
        let store = VariableStore::new();
        let other = store.clone();
        store.set("x".into(), Value::Int(1));
        assert_eq!(other.get(&"x".into()), Some(Value::Int(1)));
        other.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_falls_back_to_defaults() {
        let mut script = Script::new("s");
        script
            .add_variable(Variable::new("a", "A", ValueType::Int32).with_default(7i64))
            .unwrap();
        script.add_variable(Variable::new("b", "B", ValueType::String)).unwrap();

        let store = VariableStore::new();
        store.set("b".into(), Value::from("set"));
        store.set("stale".into(), Value::Int(0));

        let snapshot = store.snapshot(&script);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"], Value::Int(7));
        assert_eq!(snapshot["b"], Value::from("set"));
    }

    #[test]
    fn test_pure_cache_is_per_step() {
        let mut state = RunState::new();
        let node = NodeId::from("n");
        state.cache(&node, HashMap::new());
        assert!(state.cached(&node).is_some());
        state.next_step();
        assert!(state.cached(&node).is_none());
        assert_eq!(state.steps, 1);
    }

    #[test]
    fn test_bindings_survive_steps() {
        let mut state = RunState::new();
        let node = NodeId::from("read");
        state.bind(&node, "value", Value::Int(3));
        state.next_step();
        assert_eq!(state.bound(&node, &PortId::from("value")), Some(&Value::Int(3)));
        assert!(state.has_executed(&node));
    }
}
