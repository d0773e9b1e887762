// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kinds and their per-kind configuration.
//!
//! The editor hands nodes a free-form JSON map. At this layer that map is
//! decoded into a closed union, one struct per node kind, so every node's
//! configuration is checked when the node is constructed. Field names follow
//! the editor's camelCase spelling (`argCount`, `maxIterations`, ...).

use crate::port::PortId;
use crate::value::{parse_address, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Most arguments a native call node can take
pub const MAX_NATIVE_ARGS: usize = 16;

/// Most case outputs a switch node has
pub const MAX_SWITCH_CASES: usize = 8;

/// Error decoding a node configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The map did not decode into the kind's config struct
    #[error("Invalid config for '{kind}': {reason}")]
    Invalid {
        /// Node kind being decoded
        kind: NodeKind,
        /// Decoder message
        reason: String,
    },

    /// A field decoded but holds an unusable value
    #[error("Invalid value for '{field}' on '{kind}': {reason}")]
    InvalidField {
        /// Node kind being decoded
        kind: NodeKind,
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Attempt to replace a config with one of another kind
    #[error("Cannot change node kind from '{from}' to '{to}'")]
    KindChanged {
        /// Existing kind
        from: NodeKind,
        /// Requested kind
        to: NodeKind,
    },
}

macro_rules! node_kinds {
    ($($kind:ident = $name:literal => $config:ty),* $(,)?) => {
        /// The `type` of a node, selecting its template
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeKind {
            $(
                #[doc = concat!("`", $name, "` node")]
                #[serde(rename = $name)]
                $kind,
            )*
        }

        impl NodeKind {
            /// Every node kind
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind),*];

            /// Wire name of this kind
            pub fn as_str(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => $name,)*
                }
            }
        }

        /// Decoded configuration of a node, one variant per node kind
        #[derive(Debug, Clone, PartialEq)]
        pub enum NodeConfig {
            $(
                #[doc = concat!("Config of a `", $name, "` node")]
                $kind($config),
            )*
        }

        impl NodeConfig {
            /// The kind this config belongs to
            pub fn kind(&self) -> NodeKind {
                match self {
                    $(NodeConfig::$kind(_) => NodeKind::$kind,)*
                }
            }

            /// Default configuration for a kind
            pub fn default_for(kind: NodeKind) -> Self {
                match kind {
                    $(NodeKind::$kind => NodeConfig::$kind(<$config>::default()),)*
                }
            }

            /// Decode the editor's free-form map for `kind`
            pub fn decode(kind: NodeKind, raw: &serde_json::Value) -> Result<Self, ConfigError> {
                let raw = match raw {
                    serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
                    other => other.clone(),
                };
                let mut config = match kind {
                    $(NodeKind::$kind => serde_json::from_value::<$config>(raw).map(NodeConfig::$kind),)*
                }
                .map_err(|e| ConfigError::Invalid { kind, reason: e.to_string() })?;
                config.normalize()?;
                Ok(config)
            }

            /// Encode back into the editor's map form
            pub fn encode(&self) -> serde_json::Value {
                let encoded = match self {
                    $(NodeConfig::$kind(config) => serde_json::to_value(config),)*
                };
                encoded.unwrap_or_default()
            }
        }
    };
}

node_kinds! {
    Start = "start" => EntryConfig,
    OnAttach = "on_attach" => EntryConfig,
    OnDetach = "on_detach" => EntryConfig,
    EventUi = "event_ui" => UiEventConfig,
    EventHotkey = "event_hotkey" => HotkeyConfig,
    EventInterval = "event_interval" => IntervalConfig,
    ConstNumber = "const_number" => ConstNumberConfig,
    ConstString = "const_string" => ConstStringConfig,
    ConstBoolean = "const_boolean" => ConstBooleanConfig,
    ConstPointer = "const_pointer" => ConstPointerConfig,
    Math = "math" => MathConfig,
    Compare = "compare" => CompareConfig,
    Logic = "logic" => LogicConfig,
    StringFormat = "string_format" => FormatConfig,
    StringConcat = "string_concat" => ConcatConfig,
    ToString = "to_string" => NoConfig,
    ToNumber = "to_number" => NoConfig,
    ToPointer = "to_pointer" => NoConfig,
    PointerAdd = "pointer_add" => NoConfig,
    If = "if" => NoConfig,
    Switch = "switch" => SwitchConfig,
    Loop = "loop" => LoopConfig,
    ForEach = "for_each" => LoopConfig,
    ForRange = "for_range" => ForRangeConfig,
    Delay = "delay" => DelayConfig,
    DeclareVariable = "declare_variable" => VariableConfig,
    SetVariable = "set_variable" => VariableConfig,
    GetVariable = "get_variable" => VariableConfig,
    Log = "log" => LogConfig,
    Notify = "notify" => NotifyConfig,
    Output = "output" => OutputConfig,
    UiGetValue = "ui_get_value" => UiComponentConfig,
    UiGetAll = "ui_get_all" => NoConfig,
    UiSetValue = "ui_set_value" => UiComponentConfig,
    UiSetValues = "ui_set_values" => NoConfig,
    BindToLabel = "bind_to_label" => BindLabelConfig,
    ListDevices = "list_devices" => NoConfig,
    ListProcesses = "list_processes" => ListProcessesConfig,
    MemoryRead = "memory_read" => MemoryAccessConfig,
    MemoryWrite = "memory_write" => MemoryAccessConfig,
    MemoryScan = "memory_scan" => MemoryScanConfig,
    MemoryFreeze = "memory_freeze" => MemoryFreezeConfig,
    MemoryProtect = "memory_protect" => MemoryProtectConfig,
    MemoryAlloc = "memory_alloc" => MemoryAllocConfig,
    PointerRead = "pointer_read" => PointerConfig,
    PointerWrite = "pointer_write" => PointerConfig,
    ModuleBase = "module_base" => ModuleConfig,
    NativeCall = "native_call" => NativeCallConfig,
    InterceptorAttach = "interceptor_attach" => InterceptorConfig,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeConfig {
    /// Clamp bounded fields and validate the rest.
    ///
    /// Idempotent: normalizing an already-normal config changes nothing.
    fn normalize(&mut self) -> Result<(), ConfigError> {
        let kind = self.kind();
        match self {
            NodeConfig::NativeCall(config) => {
                let clamped = config.arg_count.clamp(0, MAX_NATIVE_ARGS as i64);
                if clamped != config.arg_count {
                    tracing::warn!(
                        requested = config.arg_count,
                        clamped,
                        "native call argCount out of range, clamping"
                    );
                    config.arg_count = clamped;
                }
                config.arg_types.truncate(MAX_NATIVE_ARGS);
            }
            NodeConfig::Switch(config) => {
                if config.cases.len() > MAX_SWITCH_CASES {
                    return Err(ConfigError::InvalidField {
                        kind,
                        field: "cases",
                        reason: format!(
                            "{} cases given, a switch has at most {MAX_SWITCH_CASES}",
                            config.cases.len()
                        ),
                    });
                }
            }
            NodeConfig::ConstPointer(config) => {
                if parse_address(&config.value).is_none() {
                    return Err(ConfigError::InvalidField {
                        kind,
                        field: "value",
                        reason: format!("'{}' is not an address", config.value),
                    });
                }
            }
            NodeConfig::Math(config) if config.op.is_none() => {
                config.op = Some(MathOp::Add);
            }
            _ => {}
        }

        for (field, address) in self.inline_addresses() {
            if parse_address(address).is_none() {
                return Err(ConfigError::InvalidField {
                    kind,
                    field,
                    reason: format!("'{address}' is not an address"),
                });
            }
        }
        Ok(())
    }

    fn inline_addresses(&self) -> Vec<(&'static str, &str)> {
        let address = match self {
            NodeConfig::MemoryRead(c) | NodeConfig::MemoryWrite(c) => c.address.as_deref(),
            NodeConfig::MemoryFreeze(c) => c.address.as_deref(),
            NodeConfig::MemoryProtect(c) => c.address.as_deref(),
            NodeConfig::PointerRead(c) | NodeConfig::PointerWrite(c) => c.base.as_deref(),
            NodeConfig::NativeCall(c) => c.address.as_deref(),
            NodeConfig::InterceptorAttach(c) => c.address.as_deref(),
            _ => None,
        };
        address.map(|a| vec![("address", a)]).unwrap_or_default()
    }

    /// Inline value the editor stored for an unconnected input slot
    pub fn inline_default(&self, port: &PortId) -> Option<Value> {
        let port = port.as_str();
        match self {
            NodeConfig::Math(c) => match port {
                "a" => c.a.map(Value::Float),
                "b" => c.b.map(Value::Float),
                _ => None,
            },
            NodeConfig::Compare(c) => match port {
                "a" => c.a.clone(),
                "b" => c.b.clone(),
                _ => None,
            },
            NodeConfig::ForRange(c) => match port {
                "start" => c.start.map(Value::Int),
                "end" => c.end.map(Value::Int),
                "step" => c.step.map(Value::Int),
                _ => None,
            },
            NodeConfig::DeclareVariable(c) if port == "initial" => c.value.clone(),
            NodeConfig::SetVariable(c) if port == "value" => c.value.clone(),
            NodeConfig::Log(c) if port == "message" => c.message.clone().map(Value::String),
            NodeConfig::Notify(c) if port == "message" => c.message.clone().map(Value::String),
            NodeConfig::UiSetValue(c) if port == "value" => c.value.clone(),
            NodeConfig::MemoryRead(c) | NodeConfig::MemoryWrite(c) => match port {
                "address" => c.address.as_deref().and_then(parse_address).map(Value::Pointer),
                "value" => c.value.clone(),
                _ => None,
            },
            NodeConfig::MemoryScan(c) if port == "value" => c.value.clone(),
            NodeConfig::MemoryFreeze(c) => match port {
                "address" => c.address.as_deref().and_then(parse_address).map(Value::Pointer),
                "value" => c.value.clone(),
                _ => None,
            },
            NodeConfig::MemoryProtect(c) => match port {
                "address" => c.address.as_deref().and_then(parse_address).map(Value::Pointer),
                "size" => c.size.map(Value::UInt),
                _ => None,
            },
            NodeConfig::MemoryAlloc(c) if port == "size" => c.size.map(Value::UInt),
            NodeConfig::PointerRead(c) | NodeConfig::PointerWrite(c) => match port {
                "base" => c.base.as_deref().and_then(parse_address).map(Value::Pointer),
                "value" => c.value.clone(),
                _ => None,
            },
            NodeConfig::NativeCall(c) if port == "address" => {
                c.address.as_deref().and_then(parse_address).map(Value::Pointer)
            }
            NodeConfig::InterceptorAttach(c) if port == "address" => {
                c.address.as_deref().and_then(parse_address).map(Value::Pointer)
            }
            _ => None,
        }
    }
}

/// Config for nodes without parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoConfig {}

/// Config of plain entry nodes (`start`, `on_attach`, `on_detach`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryConfig {}

/// UI event entry bound to a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiEventConfig {
    /// Component whose events trigger this entry; `None` accepts any
    pub component_id: Option<String>,
    /// Event name (`click`, `change`, ...)
    pub event: String,
}

/// Hotkey entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotkeyConfig {
    /// Key combination, e.g. `Ctrl+F1`
    pub keys: String,
}

/// Interval entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntervalConfig {
    /// Period in milliseconds
    pub interval_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Numeric constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstNumberConfig {
    /// The number
    pub value: f64,
    /// Width the constant is narrowed to
    pub value_type: ValueType,
}

impl Default for ConstNumberConfig {
    fn default() -> Self {
        Self {
            value: 0.0,
            value_type: ValueType::Double,
        }
    }
}

/// String constant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstStringConfig {
    /// The string
    pub value: String,
}

/// Boolean constant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstBooleanConfig {
    /// The boolean
    pub value: bool,
}

/// Pointer constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstPointerConfig {
    /// Address as `0x` hex or decimal
    pub value: String,
}

impl Default for ConstPointerConfig {
    fn default() -> Self {
        Self {
            value: "0x0".to_string(),
        }
    }
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathOp {
    /// a + b
    Add,
    /// a - b
    Sub,
    /// a * b
    Mul,
    /// a / b
    Div,
    /// a % b
    Mod,
    /// min(a, b)
    Min,
    /// max(a, b)
    Max,
    /// a ^ b
    Pow,
}

/// Arithmetic node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MathConfig {
    /// Operator, `add` when absent
    pub op: Option<MathOp>,
    /// Inline value for `a`
    pub a: Option<f64>,
    /// Inline value for `b`
    pub b: Option<f64>,
}

impl MathConfig {
    /// Operator to apply
    pub fn op(&self) -> MathOp {
        self.op.unwrap_or(MathOp::Add)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// a == b
    #[default]
    Eq,
    /// a != b
    Ne,
    /// a < b
    Lt,
    /// a <= b
    Le,
    /// a > b
    Gt,
    /// a >= b
    Ge,
}

/// Comparison node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompareConfig {
    /// Operator
    pub op: CompareOp,
    /// Inline value for `a`
    pub a: Option<Value>,
    /// Inline value for `b`
    pub b: Option<Value>,
}

/// Boolean operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    /// a && b
    #[default]
    And,
    /// a || b
    Or,
    /// a ^ b
    Xor,
    /// !a
    Not,
}

/// Logic node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogicConfig {
    /// Operator
    pub op: LogicOp,
}

/// String format node config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatConfig {
    /// Template with `{0}`..`{3}` placeholders
    pub template: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            template: "{0}".to_string(),
        }
    }
}

/// String concat node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConcatConfig {
    /// Inserted between `a` and `b`
    pub separator: String,
}

/// Switch node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchConfig {
    /// Case values; case `i` routes to output `case_i`
    pub cases: Vec<String>,
}

/// Config shared by `loop` and `for_each`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopConfig {
    /// Hard iteration cap; runtime default when absent
    pub max_iterations: Option<u32>,
}

/// `for_range` config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForRangeConfig {
    /// Inline start
    pub start: Option<i64>,
    /// Inline end (exclusive)
    pub end: Option<i64>,
    /// Inline step
    pub step: Option<i64>,
    /// Hard iteration cap; runtime default when absent
    pub max_iterations: Option<u32>,
}

/// Delay node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelayConfig {
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Config shared by the variable nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariableConfig {
    /// Referenced variable
    pub variable_id: String,
    /// Inline value (`declare_variable` initializer, `set_variable` value)
    pub value: Option<Value>,
}

/// Log severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Debug
    Debug,
    /// Info
    #[default]
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Log node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Severity
    pub level: LogLevel,
    /// Inline message
    pub message: Option<String>,
}

/// Notify node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotifyConfig {
    /// Notification title
    pub title: String,
    /// Inline message
    pub message: Option<String>,
}

/// Output node config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    /// Key in the run result; node id when empty
    pub name: String,
}

/// Config of nodes bound to one UI component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiComponentConfig {
    /// Component id
    pub component_id: String,
    /// Inline value for `ui_set_value`
    pub value: Option<Value>,
}

/// Bind-to-label node config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindLabelConfig {
    /// Label component id
    pub component_id: String,
    /// Text template; `{value}` is replaced by the input
    pub format: String,
}

impl Default for BindLabelConfig {
    fn default() -> Self {
        Self {
            component_id: String::new(),
            format: "{value}".to_string(),
        }
    }
}

/// Process listing config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListProcessesConfig {
    /// Device to enumerate; local device when absent
    pub device_id: Option<String>,
}

/// Memory read/write config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryAccessConfig {
    /// Type read or written
    pub value_type: ValueType,
    /// Byte length for strings
    pub length: Option<u32>,
    /// Inline address
    pub address: Option<String>,
    /// Inline value for writes
    pub value: Option<Value>,
}

impl Default for MemoryAccessConfig {
    fn default() -> Self {
        Self {
            value_type: ValueType::Int32,
            length: None,
            address: None,
            value: None,
        }
    }
}

/// Memory scan comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Exact value
    #[default]
    Exact,
    /// Greater than value
    GreaterThan,
    /// Less than value
    LessThan,
    /// Unknown initial value
    Unknown,
}

/// Memory scan config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryScanConfig {
    /// Comparison
    pub scan_type: ScanType,
    /// Type scanned for
    pub value_type: ValueType,
    /// Protection filter, e.g. `rw-`
    pub protection: String,
    /// Inline value
    pub value: Option<Value>,
}

impl Default for MemoryScanConfig {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Exact,
            value_type: ValueType::Int32,
            protection: "rw-".to_string(),
            value: None,
        }
    }
}

/// Memory freeze config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryFreezeConfig {
    /// Type written
    pub value_type: ValueType,
    /// Rewrite period in the agent
    pub interval_ms: u64,
    /// Inline address
    pub address: Option<String>,
    /// Inline value
    pub value: Option<Value>,
}

impl Default for MemoryFreezeConfig {
    fn default() -> Self {
        Self {
            value_type: ValueType::Int32,
            interval_ms: 100,
            address: None,
            value: None,
        }
    }
}

/// Memory protect config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryProtectConfig {
    /// New protection, e.g. `rwx`
    pub protection: String,
    /// Inline address
    pub address: Option<String>,
    /// Inline size
    pub size: Option<u64>,
}

impl Default for MemoryProtectConfig {
    fn default() -> Self {
        Self {
            protection: "rwx".to_string(),
            address: None,
            size: None,
        }
    }
}

/// Memory alloc config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryAllocConfig {
    /// Inline size in bytes
    pub size: Option<u64>,
}

/// String encoding for pointer reads/writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    /// UTF-8
    #[default]
    Utf8,
    /// UTF-16
    Utf16,
    /// ANSI code page
    Ansi,
}

/// Pointer read/write config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointerConfig {
    /// Type at the final address
    pub value_type: ValueType,
    /// Offset chain followed from the base
    pub offsets: Vec<i64>,
    /// Encoding when `value_type` is string
    pub encoding: StringEncoding,
    /// Inline base address
    pub base: Option<String>,
    /// Inline value for writes
    pub value: Option<Value>,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            value_type: ValueType::Int32,
            offsets: Vec::new(),
            encoding: StringEncoding::Utf8,
            base: None,
            value: None,
        }
    }
}

/// Module base lookup config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Module name, e.g. `game.dll`
    pub module_name: String,
}

/// Calling convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abi {
    /// Platform default
    #[default]
    Default,
    /// cdecl
    Cdecl,
    /// stdcall
    Stdcall,
    /// fastcall
    Fastcall,
    /// thiscall
    Thiscall,
    /// Win64
    Win64,
    /// System V
    Sysv,
}

/// Native call config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NativeCallConfig {
    /// Inline function address
    pub address: Option<String>,
    /// Calling convention
    pub abi: Abi,
    /// Return type
    pub return_type: ValueType,
    /// Number of `argN` inputs, clamped to `[0, 16]`
    pub arg_count: i64,
    /// Per-argument types; pointer where absent
    pub arg_types: Vec<ValueType>,
}

impl Default for NativeCallConfig {
    fn default() -> Self {
        Self {
            address: None,
            abi: Abi::Default,
            return_type: ValueType::Pointer,
            arg_count: 0,
            arg_types: Vec::new(),
        }
    }
}

impl NativeCallConfig {
    /// Clamped argument count
    pub fn arg_count(&self) -> usize {
        self.arg_count.clamp(0, MAX_NATIVE_ARGS as i64) as usize
    }

    /// Declared type of argument `index`
    pub fn arg_type(&self, index: usize) -> ValueType {
        self.arg_types.get(index).copied().unwrap_or(ValueType::Pointer)
    }
}

/// Interceptor attach config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterceptorConfig {
    /// Inline target address
    pub address: Option<String>,
    /// Report calls on entry
    pub on_enter: bool,
    /// Report calls on return
    pub on_leave: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            address: None,
            on_enter: true,
            on_leave: false,
        }
    }
}
