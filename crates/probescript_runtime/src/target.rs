// SPDX-License-Identifier: MIT OR Apache-2.0
//! Marshalling of target-context nodes into agent calls.
//!
//! Addresses cross the boundary as `0x` hex strings so 64-bit values survive
//! JSON. Typed values are coerced to the node's declared `valueType` before
//! they are sent.

use crate::agent::AgentRequest;
use crate::error::{RunError, RunResult};
use probescript_graph::{Node, NodeConfig, PortId, Value, ValueType};
use serde_json::json;
use std::collections::HashMap;

/// Resolved value inputs of a node, by port
pub type Inputs = HashMap<PortId, Value>;

/// Outputs produced by a node, by port
pub type Outputs = HashMap<PortId, Value>;

fn input<'a>(inputs: &'a Inputs, port: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    inputs.get(&PortId::from(port)).unwrap_or(&NULL)
}

fn address(node: &Node, inputs: &Inputs, port: &str) -> RunResult<String> {
    let value = input(inputs, port);
    match value {
        Value::Float(f) if !f.is_finite() || *f < 0.0 => {
            Err(RunError::host(&node.id, format!("'{value}' is not an address")))
        }
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Pointer(_) | Value::String(_) => value
            .as_u64()
            .map(|a| format!("{a:#x}"))
            .ok_or_else(|| RunError::host(&node.id, format!("'{value}' is not an address"))),
        other => Err(RunError::TypeMismatch {
            node: node.id.clone(),
            port: PortId::from(port),
            expected: ValueType::Pointer,
            found: other.value_type(),
        }),
    }
}

fn typed(node: &Node, inputs: &Inputs, port: &str, ty: ValueType) -> RunResult<serde_json::Value> {
    let value = input(inputs, port);
    value
        .coerce_to(ty)
        .map(|v| v.to_json())
        .ok_or_else(|| RunError::TypeMismatch {
            node: node.id.clone(),
            port: PortId::from(port),
            expected: ty,
            found: value.value_type(),
        })
}

fn size(node: &Node, inputs: &Inputs, port: &str) -> RunResult<u64> {
    let value = input(inputs, port);
    value.as_u64().ok_or_else(|| RunError::TypeMismatch {
        node: node.id.clone(),
        port: PortId::from(port),
        expected: ValueType::Uint64,
        found: value.value_type(),
    })
}

/// Build the agent request for a target node
pub fn request(node: &Node, method: &str, inputs: &Inputs) -> RunResult<AgentRequest> {
    let request = AgentRequest::new(method);
    let request = match node.config() {
        NodeConfig::MemoryRead(c) => {
            let mut request = request
                .arg("address", address(node, inputs, "address")?)
                .arg("type", c.value_type.as_str());
            if let Some(length) = c.length {
                request = request.arg("length", length);
            }
            request
        }
        NodeConfig::MemoryWrite(c) => request
            .arg("address", address(node, inputs, "address")?)
            .arg("type", c.value_type.as_str())
            .arg("value", typed(node, inputs, "value", c.value_type)?),
        NodeConfig::MemoryScan(c) => {
            let value = input(inputs, "value");
            let value = if value.is_null() {
                serde_json::Value::Null
            } else {
                typed(node, inputs, "value", c.value_type)?
            };
            request
                .arg("type", c.value_type.as_str())
                .arg("scanType", serde_json::to_value(c.scan_type).unwrap_or_default())
                .arg("protection", c.protection.as_str())
                .arg("value", value)
        }
        NodeConfig::MemoryFreeze(c) => request
            .arg("address", address(node, inputs, "address")?)
            .arg("type", c.value_type.as_str())
            .arg("value", typed(node, inputs, "value", c.value_type)?)
            .arg("intervalMs", c.interval_ms),
        NodeConfig::MemoryProtect(c) => request
            .arg("address", address(node, inputs, "address")?)
            .arg("size", size(node, inputs, "size")?)
            .arg("protection", c.protection.as_str()),
        NodeConfig::MemoryAlloc(_) => request.arg("size", size(node, inputs, "size")?),
        NodeConfig::PointerRead(c) => request
            .arg("base", address(node, inputs, "base")?)
            .arg("offsets", c.offsets.clone())
            .arg("type", c.value_type.as_str())
            .arg("encoding", serde_json::to_value(c.encoding).unwrap_or_default()),
        NodeConfig::PointerWrite(c) => request
            .arg("base", address(node, inputs, "base")?)
            .arg("offsets", c.offsets.clone())
            .arg("type", c.value_type.as_str())
            .arg("encoding", serde_json::to_value(c.encoding).unwrap_or_default())
            .arg("value", typed(node, inputs, "value", c.value_type)?),
        NodeConfig::ModuleBase(c) => {
            if c.module_name.is_empty() {
                return Err(RunError::host(&node.id, "module name is empty"));
            }
            request.arg("module", c.module_name.as_str())
        }
        NodeConfig::NativeCall(c) => {
            let args = (0..c.arg_count())
                .map(|i| -> RunResult<serde_json::Value> {
                    let ty = c.arg_type(i);
                    let port = format!("arg{i}");
                    let value = if ty == ValueType::Pointer {
                        serde_json::Value::String(address(node, inputs, &port)?)
                    } else {
                        typed(node, inputs, &port, ty)?
                    };
                    Ok(json!({"type": ty.as_str(), "value": value}))
                })
                .collect::<RunResult<Vec<_>>>()?;
            request
                .arg("address", address(node, inputs, "address")?)
                .arg("abi", serde_json::to_value(c.abi).unwrap_or_default())
                .arg("returnType", c.return_type.as_str())
                .arg("args", args)
        }
        NodeConfig::InterceptorAttach(c) => request
            .arg("address", address(node, inputs, "address")?)
            .arg("onEnter", c.on_enter)
            .arg("onLeave", c.on_leave),
        _ => {
            return Err(RunError::host(
                &node.id,
                format!("'{}' is not a target node", node.kind()),
            ))
        }
    };
    Ok(request)
}

fn pointer(json: &serde_json::Value) -> Value {
    Value::from_json_typed(json, ValueType::Pointer).unwrap_or(Value::Null)
}

fn value_of(json: &serde_json::Value, ty: ValueType) -> Value {
    Value::from_json_typed(json, ty).unwrap_or_else(|| Value::from_json(json))
}

/// Turn the agent's reply value into node outputs
pub fn decode(node: &Node, reply: Option<serde_json::Value>) -> RunResult<Outputs> {
    let reply = reply.unwrap_or_default();
    let mut outputs = Outputs::new();
    let mut put = |port: &str, value: Value| {
        outputs.insert(PortId::from(port), value);
    };

    match node.config() {
        NodeConfig::MemoryRead(c) => put("value", value_of(&reply, c.value_type)),
        NodeConfig::MemoryScan(_) => {
            let results: Vec<Value> = match &reply {
                serde_json::Value::Array(items) => items.iter().map(pointer).collect(),
                serde_json::Value::Null => Vec::new(),
                other => {
                    return Err(RunError::host(
                        &node.id,
                        format!("scan returned {other} instead of a list"),
                    ))
                }
            };
            put("count", Value::Int(results.len() as i64));
            put("results", Value::Array(results));
        }
        NodeConfig::MemoryProtect(_) => put("success", Value::Bool(reply.as_bool().unwrap_or(true))),
        NodeConfig::MemoryAlloc(_) | NodeConfig::ModuleBase(_) => {
            let address = pointer(&reply);
            if address.is_null() {
                return Err(RunError::host(&node.id, format!("agent returned no address ({reply})")));
            }
            put("address", address);
        }
        NodeConfig::PointerRead(c) => match &reply {
            serde_json::Value::Object(map) => {
                put("value", map.get("value").map_or(Value::Null, |v| value_of(v, c.value_type)));
                put("address", map.get("address").map_or(Value::Null, pointer));
            }
            other => {
                put("value", value_of(other, c.value_type));
                put("address", Value::Null);
            }
        },
        NodeConfig::NativeCall(c) => put("result", value_of(&reply, c.return_type)),
        NodeConfig::InterceptorAttach(_) => put(
            "hook_id",
            match &reply {
                serde_json::Value::String(id) => Value::String(id.clone()),
                serde_json::Value::Null => Value::Null,
                other => Value::String(other.to_string()),
            },
        ),
        _ => {}
    }
    Ok(outputs)
}
