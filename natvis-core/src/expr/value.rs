//! Value types for expression evaluation
//!
//! Represents the result of evaluating an expression: either a scalar
//! computed by the evaluator or an object living in debuggee memory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::introspect::{Scalar, TypeId, ValueHandle};

/// Runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),

    /// Pointer rvalue; the pointee type drives arithmetic and dereference
    Pointer { address: u64, pointee: TypeId },

    /// Lvalue in debuggee memory
    Object(ValueHandle),
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Pointer { .. } => "pointer",
            Value::Object(_) => "object",
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Char(_)
        )
    }

    /// Integer view with C promotions (bool and char promote to int)
    pub fn to_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(*v as i128),
            Value::Char(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Convert to f64 if numeric
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    /// C truthiness of a loaded scalar; objects have none
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Int(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            Value::Bool(v) => Some(*v),
            Value::Char(v) => Some(*v != '\0'),
            Value::String(_) => Some(true),
            Value::Pointer { address, .. } => Some(*address != 0),
            Value::Object(_) => None,
        }
    }

    pub fn as_handle(&self) -> Option<&ValueHandle> {
        match self {
            Value::Object(handle) => Some(handle),
            _ => None,
        }
    }

    /// Wrap a raw scalar; `pointee` types pointer scalars
    pub fn from_scalar(scalar: Scalar, pointee: Option<TypeId>) -> Self {
        match scalar {
            Scalar::Int(v) => Value::Int(v),
            Scalar::Float(v) => Value::Float(v),
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::Char(v) => Value::Char(v),
            Scalar::Pointer(address) => match pointee {
                Some(pointee) => Value::Pointer { address, pointee },
                None => Value::Int(address as i128),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Pointer { address, .. } => write!(f, "0x{:x}", address),
            Value::Object(handle) => write!(f, "{{object @ 0x{:x}}}", handle.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_names() {
        assert_eq!(Value::Int(42).type_name(), "int");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::String("hello".to_string()).type_name(), "string");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::String("hello".to_string())), "\"hello\"");
        assert_eq!(
            format!(
                "{}",
                Value::Pointer {
                    address: 0x1000,
                    pointee: TypeId(0)
                }
            ),
            "0x1000"
        );
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(Value::Int(0).truthy(), Some(false));
        assert_eq!(Value::Int(-1).truthy(), Some(true));
        assert_eq!(
            Value::Pointer {
                address: 0,
                pointee: TypeId(0)
            }
            .truthy(),
            Some(false)
        );
        assert_eq!(Value::Object(ValueHandle::new(0x10, TypeId(0))).truthy(), None);
    }
}
