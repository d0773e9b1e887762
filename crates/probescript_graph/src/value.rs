// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value types, their coercion classes, and runtime values.
//!
//! The compatibility lattice here is what the connection validator consults:
//! two types connect when they are equal, when either is `any`, when both are
//! numeric, or when one is a pointer and the other numeric. Narrowing is a
//! runtime concern handled by [`Value::coerce_to`].

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Data type carried by a value port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// Address inside the target process
    Pointer,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    Uint8,
    /// Unsigned 16-bit integer
    Uint16,
    /// Unsigned 32-bit integer
    Uint32,
    /// Unsigned 64-bit integer
    Uint64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Ordered list of values
    Array,
    /// String-keyed map of values
    Object,
    /// Accepts anything
    Any,
}

/// Coercion class of a value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoercionClass {
    /// Every integer width plus float and double
    Numeric,
    /// Target-process address
    Pointer,
    /// String
    String,
    /// Boolean
    Boolean,
    /// Array
    Array,
    /// Object
    Object,
    /// Wildcard
    Any,
}

impl ValueType {
    /// Every value type, in declaration order
    pub const ALL: [ValueType; 16] = [
        Self::Boolean,
        Self::String,
        Self::Pointer,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float,
        Self::Double,
        Self::Array,
        Self::Object,
        Self::Any,
    ];

    /// Get the coercion class of this type
    pub fn class(self) -> CoercionClass {
        match self {
            Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64
            | Self::Uint8
            | Self::Uint16
            | Self::Uint32
            | Self::Uint64
            | Self::Float
            | Self::Double => CoercionClass::Numeric,
            Self::Pointer => CoercionClass::Pointer,
            Self::String => CoercionClass::String,
            Self::Boolean => CoercionClass::Boolean,
            Self::Array => CoercionClass::Array,
            Self::Object => CoercionClass::Object,
            Self::Any => CoercionClass::Any,
        }
    }

    /// Whether this type is in the numeric class
    pub fn is_numeric(self) -> bool {
        self.class() == CoercionClass::Numeric
    }

    /// Whether this type is a signed integer
    pub fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Whether this type is an unsigned integer
    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }

    /// Size in bytes for fixed-width types
    pub fn byte_width(self) -> Option<u8> {
        match self {
            Self::Boolean | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Float => Some(4),
            Self::Int64 | Self::Uint64 | Self::Double | Self::Pointer => Some(8),
            Self::String | Self::Array | Self::Object | Self::Any => None,
        }
    }

    /// Wire name of this type
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Pointer => "pointer",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// Check if a value of this type can flow into a port of `other`
    pub fn can_connect_to(self, other: ValueType) -> bool {
        if self == other {
            return true;
        }

        match (self.class(), other.class()) {
            (CoercionClass::Any, _) | (_, CoercionClass::Any) => true,
            (CoercionClass::Numeric, CoercionClass::Numeric) => true,
            (CoercionClass::Pointer, CoercionClass::Numeric)
            | (CoercionClass::Numeric, CoercionClass::Pointer) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an address written as `0x...` hex or plain decimal
pub fn parse_address(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// A runtime value flowing along value edges
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer of any width
    UInt(u64),
    /// Float or double
    Float(f64),
    /// Target-process address
    Pointer(u64),
    /// String
    String(String),
    /// Array
    Array(Vec<Value>),
    /// Object with stable key order
    Object(IndexMap<String, Value>),
}

impl Value {
    /// The value type that best describes this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::Int64,
            Self::UInt(_) => ValueType::Uint64,
            Self::Float(_) => ValueType::Double,
            Self::Pointer(_) => ValueType::Pointer,
            Self::String(_) => ValueType::String,
            Self::Array(_) => ValueType::Array,
            Self::Object(_) => ValueType::Object,
        }
    }

    /// Widen a numeric or pointer value to a double
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) | Self::Pointer(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Interpret as a signed integer, truncating floats
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) | Self::Pointer(u) => Some(*u as i64),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        }
    }

    /// Interpret as an unsigned 64-bit address
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(u) | Self::Pointer(u) => Some(*u),
            Self::Int(i) => Some(*i as u64),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64 as u64),
            Self::String(s) => parse_address(s),
            _ => None,
        }
    }

    /// Get the boolean, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the string slice, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the array items, if this is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Loose truthiness used by logic nodes
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::UInt(u) | Self::Pointer(u) => *u != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(a) => !a.is_empty(),
            Self::Object(o) => !o.is_empty(),
        }
    }

    /// Human-readable rendering used for logs, formatting and switch matching
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::UInt(u) => u.to_string(),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Self::Pointer(p) => format!("{p:#x}"),
            Self::String(s) => s.clone(),
            Self::Array(_) | Self::Object(_) => self.to_json().to_string(),
        }
    }

    /// Convert this value into `ty`, narrowing numbers to the target width.
    ///
    /// Returns `None` when the lattice does not allow the conversion.
    pub fn coerce_to(&self, ty: ValueType) -> Option<Value> {
        match ty.class() {
            CoercionClass::Any => Some(self.clone()),
            CoercionClass::Boolean => self.as_bool().map(Value::Bool),
            CoercionClass::String => self.as_str().map(|s| Value::String(s.to_string())),
            CoercionClass::Array => matches!(self, Self::Array(_)).then(|| self.clone()),
            CoercionClass::Object => matches!(self, Self::Object(_)).then(|| self.clone()),
            CoercionClass::Pointer => match self {
                Self::Int(_) | Self::UInt(_) | Self::Float(_) | Self::Pointer(_) => {
                    self.as_u64().map(Value::Pointer)
                }
                _ => None,
            },
            CoercionClass::Numeric => {
                if !matches!(self, Self::Int(_) | Self::UInt(_) | Self::Float(_) | Self::Pointer(_)) {
                    return None;
                }
                let coerced = match ty {
                    ValueType::Float => Value::Float(self.as_f64()? as f32 as f64),
                    ValueType::Double => Value::Float(self.as_f64()?),
                    ValueType::Int8 => Value::Int(self.as_i64()? as i8 as i64),
                    ValueType::Int16 => Value::Int(self.as_i64()? as i16 as i64),
                    ValueType::Int32 => Value::Int(self.as_i64()? as i32 as i64),
                    ValueType::Int64 => Value::Int(self.as_i64()?),
                    ValueType::Uint8 => Value::UInt(self.as_u64()? as u8 as u64),
                    ValueType::Uint16 => Value::UInt(self.as_u64()? as u16 as u64),
                    ValueType::Uint32 => Value::UInt(self.as_u64()? as u32 as u64),
                    _ => Value::UInt(self.as_u64()?),
                };
                Some(coerced)
            }
        }
    }

    /// Convert into JSON for the RPC boundary. Pointers become `0x` strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Pointer(p) => serde_json::Value::String(format!("{p:#x}")),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Build a value from untyped JSON
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Self::Object(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            ),
        }
    }

    /// Build a value from JSON that is expected to hold `ty`.
    ///
    /// Pointers are accepted as numbers or `0x` strings.
    pub fn from_json_typed(json: &serde_json::Value, ty: ValueType) -> Option<Value> {
        if ty == ValueType::Pointer {
            if let serde_json::Value::String(s) = json {
                return parse_address(s).map(Value::Pointer);
            }
        }
        Value::from_json(json).coerce_to(ty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(|json| Value::from_json(&json))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXCLUSIVE: [ValueType; 4] = [
        ValueType::String,
        ValueType::Boolean,
        ValueType::Array,
        ValueType::Object,
    ];

    #[test]
    fn test_compatibility_is_reflexive() {
        for ty in ValueType::ALL {
            assert!(ty.can_connect_to(ty), "{ty} should connect to itself");
        }
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        for a in ValueType::ALL {
            for b in ValueType::ALL {
                assert_eq!(a.can_connect_to(b), b.can_connect_to(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_any_connects_to_everything() {
        for ty in ValueType::ALL {
            assert!(ValueType::Any.can_connect_to(ty));
        }
    }

    #[test]
    fn test_numeric_types_are_mutually_compatible() {
        let numeric: Vec<_> = ValueType::ALL.into_iter().filter(|t| t.is_numeric()).collect();
        assert_eq!(numeric.len(), 10);
        for a in &numeric {
            for b in &numeric {
                assert!(a.can_connect_to(*b));
            }
            assert!(a.can_connect_to(ValueType::Pointer));
        }
    }

    #[test]
    fn test_exclusive_classes_only_match_self_or_any() {
        for a in EXCLUSIVE {
            for b in ValueType::ALL {
                let expected = a == b || b == ValueType::Any;
                assert_eq!(a.can_connect_to(b), expected, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_pointer_does_not_connect_to_string() {
        assert!(!ValueType::Pointer.can_connect_to(ValueType::String));
        assert!(!ValueType::Pointer.can_connect_to(ValueType::Boolean));
    }

    #[test]
    fn test_coerce_narrows_integers() {
        assert_eq!(Value::Int(300).coerce_to(ValueType::Uint8), Some(Value::UInt(44)));
        assert_eq!(Value::Float(-1.9).coerce_to(ValueType::Int32), Some(Value::Int(-1)));
        assert_eq!(Value::Int(16).coerce_to(ValueType::Pointer), Some(Value::Pointer(16)));
        assert_eq!(Value::from("x").coerce_to(ValueType::Int32), None);
        assert_eq!(Value::Bool(true).coerce_to(ValueType::Double), None);
    }

    #[test]
    fn test_display_of_integral_doubles() {
        assert_eq!(Value::Float(3.0).to_display_string(), "3");
        assert_eq!(Value::Float(2.5).to_display_string(), "2.5");
        assert_eq!(Value::Pointer(0x1000).to_display_string(), "0x1000");
    }

    #[test]
    fn test_pointer_json_uses_hex() {
        let json = Value::Pointer(0xdead).to_json();
        assert_eq!(json, serde_json::json!("0xdead"));
        assert_eq!(
            Value::from_json_typed(&json, ValueType::Pointer),
            Some(Value::Pointer(0xdead))
        );
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10"), Some(16));
        assert_eq!(parse_address("42"), Some(42));
        assert_eq!(parse_address("zz"), None);
    }
}
