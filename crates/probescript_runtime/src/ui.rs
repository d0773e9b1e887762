// SPDX-License-Identifier: MIT OR Apache-2.0
//! UI component state collaborator.

use indexmap::IndexMap;
use parking_lot::RwLock;
use probescript_graph::Value;
use thiserror::Error;

/// Error reported by a UI state store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiError {
    /// No component with that id
    #[error("Unknown UI component: {0}")]
    UnknownComponent(String),

    /// Component rejects the value
    #[error("UI component '{component}' rejected value: {reason}")]
    Rejected {
        /// Component id
        component: String,
        /// Why
        reason: String,
    },
}

/// Read/write access to UI component values
pub trait UiState: Send + Sync {
    /// Current value of a component
    fn get_value(&self, component: &str) -> Result<Value, UiError>;

    /// Set a component's value
    fn set_value(&self, component: &str, value: Value) -> Result<(), UiError>;

    /// Every component's value
    fn get_all(&self) -> IndexMap<String, Value>;

    /// Set several values. Returns the components that failed.
    fn set_batch(&self, values: IndexMap<String, Value>) -> Vec<UiError> {
        values
            .into_iter()
            .filter_map(|(component, value)| self.set_value(&component, value).err())
            .collect()
    }
}

/// In-process UI state keyed by component id.
///
/// Only registered components accept values.
#[derive(Debug, Default)]
pub struct InMemoryUiState {
    components: RwLock<IndexMap<String, Value>>,
}

impl InMemoryUiState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with an initial value
    pub fn register(&self, component: impl Into<String>, value: impl Into<Value>) {
        self.components.write().insert(component.into(), value.into());
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_component(self, component: impl Into<String>, value: impl Into<Value>) -> Self {
        self.register(component, value);
        self
    }
}

impl UiState for InMemoryUiState {
    fn get_value(&self, component: &str) -> Result<Value, UiError> {
        self.components
            .read()
            .get(component)
            .cloned()
            .ok_or_else(|| UiError::UnknownComponent(component.to_string()))
    }

    fn set_value(&self, component: &str, value: Value) -> Result<(), UiError> {
        let mut components = self.components.write();
        let slot = components
            .get_mut(component)
            .ok_or_else(|| UiError::UnknownComponent(component.to_string()))?;
        *slot = value;
        Ok(())
    }

    fn get_all(&self) -> IndexMap<String, Value> {
        self.components.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_components_only() {
        let ui = InMemoryUiState::new().with_component("label", "");
        assert!(ui.set_value("label", Value::from("hi")).is_ok());
        assert_eq!(ui.get_value("label"), Ok(Value::from("hi")));
        assert_eq!(
            ui.set_value("missing", Value::Null),
            Err(UiError::UnknownComponent("missing".into()))
        );
        assert!(ui.get_value("missing").is_err());
    }

    #[test]
    fn test_batch_reports_failures() {
        let ui = InMemoryUiState::new().with_component("a", 0i64).with_component("b", 0i64);
        let mut values = IndexMap::new();
        values.insert("a".to_string(), Value::Int(1));
        values.insert("zz".to_string(), Value::Int(2));
        let failures = ui.set_batch(values);
        assert_eq!(failures.len(), 1);
        assert_eq!(ui.get_all()["a"], Value::Int(1));
        assert_eq!(ui.get_all().len(), 2);
    }
}
