// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-context operations: arithmetic, comparison, logic, strings and
//! conversions.
//!
//! These are plain functions over [`Value`]s. Errors are messages; the
//! evaluator attaches the failing node.

use probescript_graph::config::{CompareOp, LogicOp, MathOp};
use probescript_graph::value::parse_address;
use probescript_graph::{PortId, Value};
use std::cmp::Ordering;

/// Apply an arithmetic operator in `f64`
pub fn math(op: MathOp, a: f64, b: f64) -> Result<f64, String> {
    let result = match op {
        MathOp::Add => a + b,
        MathOp::Sub => a - b,
        MathOp::Mul => a * b,
        MathOp::Div => {
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            a / b
        }
        MathOp::Mod => {
            if b == 0.0 {
                return Err("modulo by zero".to_string());
            }
            a % b
        }
        MathOp::Min => a.min(b),
        MathOp::Max => a.max(b),
        MathOp::Pow => a.powf(b),
    };
    Ok(result)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Pointer(_) => value.as_f64(),
        _ => None,
    }
}

/// Compare two values.
///
/// Numbers and pointers compare as `f64`, strings lexicographically. Equality
/// of other values is structural; ordering them is an error.
pub fn compare(op: CompareOp, a: &Value, b: &Value) -> Result<bool, String> {
    let ordering = match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        },
    };

    let result = match (op, ordering) {
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        (CompareOp::Eq, None) => a == b,
        (CompareOp::Ne, None) => a != b,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => {
            return Err(format!(
                "cannot order {} and {}",
                a.value_type(),
                b.value_type()
            ))
        }
    };
    Ok(result)
}

/// Apply a boolean operator using truthiness
pub fn logic(op: LogicOp, a: &Value, b: &Value) -> bool {
    let (a, b) = (a.is_truthy(), b.is_truthy());
    match op {
        LogicOp::And => a && b,
        LogicOp::Or => a || b,
        LogicOp::Xor => a ^ b,
        LogicOp::Not => !a,
    }
}

/// Replace `{0}`, `{1}`, ... with the display form of each argument
pub fn format(template: &str, args: &[Value]) -> String {
    args.iter().enumerate().fold(template.to_string(), |text, (i, arg)| {
        text.replace(&format!("{{{i}}}"), &arg.to_display_string())
    })
}

/// Join two values with a separator
pub fn concat(a: &Value, b: &Value, separator: &str) -> String {
    format!("{}{separator}{}", a.to_display_string(), b.to_display_string())
}

/// Convert to a double. Strings may be decimal or `0x` hex.
pub fn to_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let text = s.trim();
            text.parse::<f64>()
                .ok()
                .or_else(|| parse_address(text).map(|a| a as f64))
                .ok_or_else(|| format!("'{s}' is not a number"))
        }
        other => numeric(other).ok_or_else(|| format!("cannot convert {} to a number", other.value_type())),
    }
}

/// Convert to an unsigned 64-bit address
pub fn to_pointer(value: &Value) -> Result<u64, String> {
    match value {
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Pointer(_) | Value::String(_) => value
            .as_u64()
            .ok_or_else(|| format!("'{}' is not an address", value.to_display_string())),
        other => Err(format!("cannot convert {} to a pointer", other.value_type())),
    }
}

/// Offset an address, wrapping in 64 bits
pub fn pointer_add(base: u64, offset: i64) -> u64 {
    base.wrapping_add_signed(offset)
}

/// Pick the switch output for a value: the first case whose text equals the
/// value's display form, otherwise `default`
pub fn switch_branch(value: &Value, cases: &[String]) -> PortId {
    let text = value.to_display_string();
    cases
        .iter()
        .position(|case| *case == text)
        .map(|i| PortId::new(format!("case_{i}")))
        .unwrap_or_else(|| PortId::from("default"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math() {
        assert_eq!(math(MathOp::Add, 5.0, 3.0), Ok(8.0));
        assert_eq!(math(MathOp::Pow, 2.0, 10.0), Ok(1024.0));
        assert_eq!(math(MathOp::Mod, 7.0, 4.0), Ok(3.0));
        assert!(math(MathOp::Div, 1.0, 0.0).is_err());
        assert!(math(MathOp::Mod, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_compare_widens_numbers() {
        assert_eq!(compare(CompareOp::Eq, &Value::Int(3), &Value::Float(3.0)), Ok(true));
        assert_eq!(compare(CompareOp::Lt, &Value::UInt(2), &Value::Int(5)), Ok(true));
        assert_eq!(compare(CompareOp::Ge, &Value::Pointer(0x10), &Value::Int(16)), Ok(true));
        assert_eq!(compare(CompareOp::Lt, &Value::from("a"), &Value::from("b")), Ok(true));
        assert_eq!(compare(CompareOp::Eq, &Value::from("1"), &Value::Int(1)), Ok(false));
        assert!(compare(CompareOp::Lt, &Value::from("1"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_logic() {
        assert!(logic(LogicOp::Xor, &Value::Bool(true), &Value::Bool(false)));
        assert!(!logic(LogicOp::Not, &Value::Bool(true), &Value::Null));
        assert!(logic(LogicOp::And, &Value::Int(1), &Value::from("x")));
    }

    #[test]
    fn test_format() {
        let args = [Value::from("hp"), Value::Float(100.0), Value::from("")];
        assert_eq!(format("{0} = {1}{2}", &args), "hp = 100");
        assert_eq!(format("{3}", &args), "{3}");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_number(&Value::from(" 2.5 ")), Ok(2.5));
        assert_eq!(to_number(&Value::from("0x10")), Ok(16.0));
        assert!(to_number(&Value::from("abc")).is_err());
        assert_eq!(to_pointer(&Value::from("0x1000")), Ok(0x1000));
        assert!(to_pointer(&Value::Bool(true)).is_err());
        assert_eq!(pointer_add(0x1000, -0x10), 0xff0);
    }

    #[test]
    fn test_switch_branch() {
        let cases = vec!["1".to_string(), "two".to_string()];
        assert_eq!(switch_branch(&Value::Float(1.0), &cases), PortId::from("case_0"));
        assert_eq!(switch_branch(&Value::from("two"), &cases), PortId::from("case_1"));
        assert_eq!(switch_branch(&Value::from("3"), &cases), PortId::from("default"));
    }
}
