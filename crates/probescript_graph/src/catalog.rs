// SPDX-License-Identifier: MIT OR Apache-2.0
//! The standard node catalog.
//!
//! Flow inputs are named `exec_in` and the plain continuation output
//! `exec_out`; branching nodes name their flow outputs after the branch.

use crate::config::{NodeKind, MAX_SWITCH_CASES};
use crate::port::Port;
use crate::template::{Category, Dispatch, PortShape, Template, TargetCall};
use crate::value::{Value, ValueType};

fn host(kind: NodeKind, label: &'static str, category: Category, description: &'static str) -> Template {
    Template {
        kind,
        label,
        description,
        category,
        dispatch: Dispatch::Host,
        shape: PortShape::Fixed,
        entry: false,
        inputs: vec![],
        outputs: vec![],
    }
}

fn target(
    kind: NodeKind,
    label: &'static str,
    category: Category,
    method: &'static str,
    description: &'static str,
) -> Template {
    Template {
        dispatch: Dispatch::Target(TargetCall { method }),
        ..host(kind, label, category, description)
    }
}

fn entry(kind: NodeKind, label: &'static str, description: &'static str) -> Template {
    Template {
        entry: true,
        outputs: vec![
            exec_out(),
            Port::output("value", "Value", ValueType::Any),
        ],
        ..host(kind, label, Category::Event, description)
    }
}

fn exec_in() -> Port {
    Port::flow_input("exec_in", "Exec")
}

fn exec_out() -> Port {
    Port::flow_output("exec_out", "Then")
}

impl Template {
    fn with_inputs(mut self, inputs: Vec<Port>) -> Self {
        self.inputs = inputs;
        self
    }

    fn with_outputs(mut self, outputs: Vec<Port>) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Build the template for a node kind
pub(crate) fn template(kind: NodeKind) -> Template {
    use Category as C;
    use ValueType as T;

    match kind {
        // ====================================================================
        // Events
        // ====================================================================
        NodeKind::Start => entry(kind, "Start", "Entry point for manual runs"),
        NodeKind::OnAttach => entry(kind, "On Attach", "Runs when a target session attaches"),
        NodeKind::OnDetach => entry(kind, "On Detach", "Runs when the target session detaches"),
        NodeKind::EventHotkey => entry(kind, "Hotkey", "Runs when a hotkey is pressed"),
        NodeKind::EventInterval => entry(kind, "Interval", "Runs periodically"),
        NodeKind::EventUi => {
            let mut template = entry(kind, "UI Event", "Runs when a UI component fires an event");
            template.outputs.push(Port::output("component", "Component", T::String));
            template
        }

        // ====================================================================
        // Constants
        // ====================================================================
        NodeKind::ConstNumber => host(kind, "Number", C::Constant, "Constant number")
            .with_outputs(vec![Port::output("value", "Value", T::Double)]),
        NodeKind::ConstString => host(kind, "String", C::Constant, "Constant string")
            .with_outputs(vec![Port::output("value", "Value", T::String)]),
        NodeKind::ConstBoolean => host(kind, "Boolean", C::Constant, "Constant boolean")
            .with_outputs(vec![Port::output("value", "Value", T::Boolean)]),
        NodeKind::ConstPointer => host(kind, "Pointer", C::Constant, "Constant address")
            .with_outputs(vec![Port::output("value", "Value", T::Pointer)]),

        // ====================================================================
        // Math & logic
        // ====================================================================
        NodeKind::Math => host(kind, "Math", C::Math, "Arithmetic on two numbers")
            .with_inputs(vec![Port::input("a", "A", T::Double), Port::input("b", "B", T::Double)])
            .with_outputs(vec![Port::output("result", "Result", T::Double)]),
        NodeKind::Compare => host(kind, "Compare", C::Math, "Compare two values")
            .with_inputs(vec![Port::input("a", "A", T::Any), Port::input("b", "B", T::Any)])
            .with_outputs(vec![Port::output("result", "Result", T::Boolean)]),
        NodeKind::Logic => host(kind, "Logic", C::Logic, "Boolean and/or/xor/not")
            .with_inputs(vec![
                Port::input("a", "A", T::Boolean),
                Port::input("b", "B", T::Boolean).with_default(false),
            ])
            .with_outputs(vec![Port::output("result", "Result", T::Boolean)]),

        // ====================================================================
        // Strings & conversions
        // ====================================================================
        NodeKind::StringFormat => host(kind, "Format", C::String, "Fill {0}..{3} placeholders")
            .with_inputs(
                (0..4)
                    .map(|i| Port::input(format!("arg{i}"), format!("Arg {i}"), T::Any).with_default(""))
                    .collect(),
            )
            .with_outputs(vec![Port::output("result", "Result", T::String)]),
        NodeKind::StringConcat => host(kind, "Concat", C::String, "Join two strings")
            .with_inputs(vec![Port::input("a", "A", T::String), Port::input("b", "B", T::String)])
            .with_outputs(vec![Port::output("result", "Result", T::String)]),
        NodeKind::ToString => host(kind, "To String", C::Conversion, "Render any value as text")
            .with_inputs(vec![Port::input("value", "Value", T::Any)])
            .with_outputs(vec![Port::output("result", "Result", T::String)]),
        NodeKind::ToNumber => host(kind, "To Number", C::Conversion, "Parse or widen to a number")
            .with_inputs(vec![Port::input("value", "Value", T::Any)])
            .with_outputs(vec![Port::output("result", "Result", T::Double)]),
        NodeKind::ToPointer => host(kind, "To Pointer", C::Conversion, "Interpret as an address")
            .with_inputs(vec![Port::input("value", "Value", T::Any)])
            .with_outputs(vec![Port::output("result", "Result", T::Pointer)]),
        NodeKind::PointerAdd => host(kind, "Pointer Add", C::Conversion, "Offset an address")
            .with_inputs(vec![
                Port::input("base", "Base", T::Pointer),
                Port::input("offset", "Offset", T::Int64).with_default(0i64),
            ])
            .with_outputs(vec![Port::output("result", "Result", T::Pointer)]),

        // ====================================================================
        // Flow control
        // ====================================================================
        NodeKind::If => host(kind, "If", C::Flow, "Branch on a condition")
            .with_inputs(vec![exec_in(), Port::input("condition", "Condition", T::Boolean)])
            .with_outputs(vec![Port::flow_output("true", "True"), Port::flow_output("false", "False")]),
        NodeKind::Switch => {
            let mut outputs: Vec<Port> = (0..MAX_SWITCH_CASES)
                .map(|i| Port::flow_output(format!("case_{i}"), format!("Case {i}")))
                .collect();
            outputs.push(Port::flow_output("default", "Default"));
            host(kind, "Switch", C::Flow, "Route on the string form of a value")
                .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any)])
                .with_outputs(outputs)
        }
        NodeKind::Loop => host(kind, "Loop", C::Flow, "Repeat while a condition holds")
            .with_inputs(vec![exec_in(), Port::input("condition", "Condition", T::Boolean)])
            .with_outputs(vec![
                Port::flow_output("body", "Body"),
                Port::flow_output("completed", "Completed"),
                Port::output("index", "Index", T::Int32),
            ]),
        NodeKind::ForEach => host(kind, "For Each", C::Flow, "Run the body for every array item")
            .with_inputs(vec![exec_in(), Port::input("items", "Items", T::Array)])
            .with_outputs(vec![
                Port::flow_output("body", "Body"),
                Port::flow_output("completed", "Completed"),
                Port::output("item", "Item", T::Any),
                Port::output("index", "Index", T::Int32),
            ]),
        NodeKind::ForRange => host(kind, "For Range", C::Flow, "Count from start to end")
            .with_inputs(vec![
                exec_in(),
                Port::input("start", "Start", T::Int32).with_default(0i64),
                Port::input("end", "End", T::Int32),
                Port::input("step", "Step", T::Int32).with_default(1i64),
            ])
            .with_outputs(vec![
                Port::flow_output("body", "Body"),
                Port::flow_output("completed", "Completed"),
                Port::output("index", "Index", T::Int32),
            ]),
        NodeKind::Delay => host(kind, "Delay", C::Flow, "Wait before continuing")
            .with_inputs(vec![exec_in()])
            .with_outputs(vec![exec_out()]),

        // ====================================================================
        // Variables
        // ====================================================================
        NodeKind::DeclareVariable => host(kind, "Declare Variable", C::Variable, "Initialize a variable")
            .with_inputs(vec![exec_in(), Port::input("initial", "Initial", T::Any)])
            .with_outputs(vec![exec_out()]),
        NodeKind::SetVariable => host(kind, "Set Variable", C::Variable, "Store a value in a variable")
            .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any)])
            .with_outputs(vec![exec_out(), Port::output("value", "Value", T::Any)]),
        NodeKind::GetVariable => host(kind, "Get Variable", C::Variable, "Read a variable")
            .with_outputs(vec![Port::output("value", "Value", T::Any)]),

        // ====================================================================
        // Output
        // ====================================================================
        NodeKind::Log => host(kind, "Log", C::Output, "Append a line to the run log")
            .with_inputs(vec![exec_in(), Port::input("message", "Message", T::Any)])
            .with_outputs(vec![exec_out()]),
        NodeKind::Notify => host(kind, "Notify", C::Output, "Raise a user notification")
            .with_inputs(vec![exec_in(), Port::input("message", "Message", T::Any)])
            .with_outputs(vec![exec_out()]),
        NodeKind::Output => host(kind, "Output", C::Output, "Record a value in the run result")
            .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any)])
            .with_outputs(vec![exec_out()]),

        // ====================================================================
        // UI
        // ====================================================================
        NodeKind::UiGetValue => host(kind, "Get UI Value", C::Ui, "Read a component's value")
            .with_outputs(vec![Port::output("value", "Value", T::Any)]),
        NodeKind::UiGetAll => host(kind, "Get All UI Values", C::Ui, "Read every component's value")
            .with_outputs(vec![Port::output("values", "Values", T::Object)]),
        NodeKind::UiSetValue => host(kind, "Set UI Value", C::Ui, "Write a component's value")
            .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any)])
            .with_outputs(vec![exec_out()]),
        NodeKind::UiSetValues => host(kind, "Set UI Values", C::Ui, "Write several component values")
            .with_inputs(vec![exec_in(), Port::input("values", "Values", T::Object)])
            .with_outputs(vec![exec_out()]),
        NodeKind::BindToLabel => host(kind, "Bind To Label", C::Ui, "Format a value into a label")
            .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any)])
            .with_outputs(vec![exec_out()]),

        // ====================================================================
        // System
        // ====================================================================
        NodeKind::ListDevices => host(kind, "List Devices", C::System, "Enumerate instrumentation devices")
            .with_outputs(vec![Port::output("devices", "Devices", T::Array)]),
        NodeKind::ListProcesses => host(kind, "List Processes", C::System, "Enumerate processes on a device")
            .with_outputs(vec![Port::output("processes", "Processes", T::Array)]),

        // ====================================================================
        // Target: memory
        // ====================================================================
        NodeKind::MemoryRead => target(kind, "Read Memory", C::Memory, "memory.read", "Read a typed value")
            .with_inputs(vec![exec_in(), Port::input("address", "Address", T::Pointer)])
            .with_outputs(vec![exec_out(), Port::output("value", "Value", T::Any)]),
        NodeKind::MemoryWrite => target(kind, "Write Memory", C::Memory, "memory.write", "Write a typed value")
            .with_inputs(vec![
                exec_in(),
                Port::input("address", "Address", T::Pointer),
                Port::input("value", "Value", T::Any),
            ])
            .with_outputs(vec![exec_out()]),
        NodeKind::MemoryScan => target(kind, "Scan Memory", C::Memory, "memory.scan", "Search for a value")
            .with_inputs(vec![exec_in(), Port::input("value", "Value", T::Any).with_default(Value::Null)])
            .with_outputs(vec![
                exec_out(),
                Port::output("results", "Results", T::Array),
                Port::output("count", "Count", T::Int32),
            ]),
        NodeKind::MemoryFreeze => target(kind, "Freeze Memory", C::Memory, "memory.freeze", "Keep rewriting a value")
            .with_inputs(vec![
                exec_in(),
                Port::input("address", "Address", T::Pointer),
                Port::input("value", "Value", T::Any),
            ])
            .with_outputs(vec![exec_out()]),
        NodeKind::MemoryProtect => target(kind, "Protect Memory", C::Memory, "memory.protect", "Change page protection")
            .with_inputs(vec![
                exec_in(),
                Port::input("address", "Address", T::Pointer),
                Port::input("size", "Size", T::Uint64),
            ])
            .with_outputs(vec![exec_out(), Port::output("success", "Success", T::Boolean)]),
        NodeKind::MemoryAlloc => target(kind, "Allocate Memory", C::Memory, "memory.alloc", "Allocate memory in the target")
            .with_inputs(vec![exec_in(), Port::input("size", "Size", T::Uint64)])
            .with_outputs(vec![exec_out(), Port::output("address", "Address", T::Pointer)]),

        // ====================================================================
        // Target: pointers, modules, native code
        // ====================================================================
        NodeKind::PointerRead => target(kind, "Read Pointer", C::Pointer, "pointer.read", "Follow an offset chain and read")
            .with_inputs(vec![exec_in(), Port::input("base", "Base", T::Pointer)])
            .with_outputs(vec![
                exec_out(),
                Port::output("value", "Value", T::Any),
                Port::output("address", "Address", T::Pointer),
            ]),
        NodeKind::PointerWrite => target(kind, "Write Pointer", C::Pointer, "pointer.write", "Follow an offset chain and write")
            .with_inputs(vec![
                exec_in(),
                Port::input("base", "Base", T::Pointer),
                Port::input("value", "Value", T::Any),
            ])
            .with_outputs(vec![exec_out()]),
        NodeKind::ModuleBase => target(kind, "Module Base", C::Module, "module.base", "Base address of a loaded module")
            .with_outputs(vec![Port::output("address", "Address", T::Pointer)]),
        NodeKind::NativeCall => Template {
            shape: PortShape::NativeArgs,
            ..target(kind, "Call Native", C::Native, "native.call", "Call a function in the target")
                .with_inputs(vec![exec_in(), Port::input("address", "Address", T::Pointer)])
                .with_outputs(vec![exec_out(), Port::output("result", "Result", T::Any)])
        },
        NodeKind::InterceptorAttach => target(kind, "Attach Interceptor", C::Interceptor, "interceptor.attach", "Hook a function")
            .with_inputs(vec![exec_in(), Port::input("address", "Address", T::Pointer)])
            .with_outputs(vec![exec_out(), Port::output("hook_id", "Hook", T::String)]),
    }
}
