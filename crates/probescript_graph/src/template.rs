// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node templates and the static template registry.
//!
//! A template fixes a node kind's category, execution context, dispatch and
//! port shape. The registry is built once and never changes afterwards, so it
//! can be shared freely between the validator, the editor and running scripts.

use crate::catalog;
use crate::config::{NodeConfig, NodeKind};
use crate::port::Port;
use indexmap::IndexMap;
use std::sync::LazyLock;

/// Where a node's effect runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// In the engine's own process
    Host,
    /// Inside the instrumented process, through the agent
    Target,
}

/// Node category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Entry/trigger nodes
    Event,
    /// Constants
    Constant,
    /// Arithmetic and comparisons
    Math,
    /// Boolean logic
    Logic,
    /// String building
    String,
    /// Type conversions
    Conversion,
    /// Flow control
    Flow,
    /// Script variables
    Variable,
    /// Logs, notifications, result outputs
    Output,
    /// UI component state
    Ui,
    /// Device/process enumeration
    System,
    /// Target memory
    Memory,
    /// Target pointer chains
    Pointer,
    /// Target modules
    Module,
    /// Native function calls
    Native,
    /// Function interception
    Interceptor,
}

impl Category {
    /// Execution context implied by the category
    pub fn context(self) -> Context {
        match self {
            Self::Memory | Self::Pointer | Self::Module | Self::Native | Self::Interceptor => {
                Context::Target
            }
            _ => Context::Host,
        }
    }
}

/// RPC method a target node is proxied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCall {
    /// Agent method name
    pub method: &'static str,
}

/// How the evaluator runs a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Executed in process
    Host,
    /// Marshalled into an agent call
    Target(TargetCall),
}

/// Port shape of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortShape {
    /// Ports never change
    Fixed,
    /// Base ports plus `config.argCount` generated `argN` inputs
    NativeArgs,
}

/// Static description of a node kind
#[derive(Debug, Clone)]
pub struct Template {
    /// Node kind
    pub kind: NodeKind,
    /// Display label
    pub label: &'static str,
    /// Description
    pub description: &'static str,
    /// Category
    pub category: Category,
    /// Host or target dispatch
    pub dispatch: Dispatch,
    /// Fixed or config-driven ports
    pub shape: PortShape,
    /// Whether this node starts runs
    pub entry: bool,
    /// Base input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
}

impl Template {
    /// Execution context
    pub fn context(&self) -> Context {
        self.category.context()
    }

    /// A node without flow ports is evaluated on demand
    pub fn is_pure(&self) -> bool {
        !self.inputs.iter().chain(self.outputs.iter()).any(Port::is_flow)
    }

    /// Build the ports of an instance with the given config.
    ///
    /// Regeneration is idempotent: the same config always yields the same ports.
    pub fn ports_for(&self, config: &NodeConfig) -> (Vec<Port>, Vec<Port>) {
        let mut inputs = self.inputs.clone();
        if let (PortShape::NativeArgs, NodeConfig::NativeCall(native)) = (self.shape, config) {
            inputs.extend((0..native.arg_count()).map(|i| {
                Port::input(format!("arg{i}"), format!("Arg {i}"), native.arg_type(i))
            }));
        }
        (inputs, self.outputs.clone())
    }
}

static STANDARD: LazyLock<TemplateRegistry> = LazyLock::new(TemplateRegistry::build);

/// Registry of node templates
pub struct TemplateRegistry {
    templates: IndexMap<NodeKind, Template>,
}

impl TemplateRegistry {
    /// The standard catalog
    pub fn standard() -> &'static TemplateRegistry {
        &STANDARD
    }

    fn build() -> Self {
        let templates = NodeKind::ALL
            .iter()
            .map(|kind| (*kind, catalog::template(*kind)))
            .collect();
        Self { templates }
    }

    /// Get the template of a kind
    pub fn get(&self, kind: NodeKind) -> &Template {
        // `build` registers every kind
        &self.templates[&kind]
    }

    /// Get all templates
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Get templates by category
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Template> {
        self.templates.values().filter(move |t| t.category == category)
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_is_registered() {
        let registry = TemplateRegistry::standard();
        assert_eq!(registry.len(), NodeKind::ALL.len());
        for kind in NodeKind::ALL {
            assert_eq!(registry.get(*kind).kind, *kind);
        }
    }

    #[test]
    fn test_dispatch_matches_category_context() {
        for template in TemplateRegistry::standard().templates() {
            let target = matches!(template.dispatch, Dispatch::Target(_));
            assert_eq!(target, template.context() == Context::Target, "{}", template.kind);
        }
    }

    #[test]
    fn test_port_ids_are_unique_per_template() {
        for template in TemplateRegistry::standard().templates() {
            let mut seen = HashSet::new();
            for port in template.inputs.iter().chain(template.outputs.iter()) {
                assert!(seen.insert(port.id.clone()), "{} repeats {}", template.kind, port.id);
            }
        }
    }

    #[test]
    fn test_entry_templates_have_flow_output_only() {
        for template in TemplateRegistry::standard().templates().filter(|t| t.entry) {
            assert!(template.inputs.is_empty());
            assert_eq!(template.outputs.iter().filter(|p| p.is_flow()).count(), 1);
        }
    }

    #[test]
    fn test_native_ports_follow_arg_count() {
        let template = TemplateRegistry::standard().get(NodeKind::NativeCall);
        for (requested, expected) in [(-1, 0), (3, 3), (16, 16), (99, 16)] {
            let config =
                NodeConfig::decode(NodeKind::NativeCall, &json!({"argCount": requested})).unwrap();
            let (inputs, _) = template.ports_for(&config);
            let args: Vec<_> = inputs.iter().filter(|p| p.id.as_str().starts_with("arg")).collect();
            assert_eq!(args.len(), expected);
            assert!(args.iter().all(|p| p.value_type() == Some(ValueType::Pointer)));
        }
    }

    #[test]
    fn test_target_categories() {
        assert_eq!(Category::Memory.context(), Context::Target);
        assert_eq!(Category::Interceptor.context(), Context::Target);
        assert_eq!(Category::Flow.context(), Context::Host);
        assert_eq!(Category::Ui.context(), Context::Host);
    }

    #[test]
    fn test_pure_templates() {
        let registry = TemplateRegistry::standard();
        assert!(registry.get(NodeKind::Math).is_pure());
        assert!(registry.get(NodeKind::ModuleBase).is_pure());
        assert!(!registry.get(NodeKind::MemoryRead).is_pure());
        assert!(!registry.get(NodeKind::Start).is_pure());
    }
}
