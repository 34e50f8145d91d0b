//! Expression error types

use thiserror::Error;

use crate::introspect::IntrospectError;

/// Malformed expression text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at {position}: expected {expected}, found {found}")]
pub struct ParseError {
    /// Byte offset into the expression text
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl ParseError {
    pub fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ParseError {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown identifier: '{name}'")]
    UnknownIdentifier { name: String },

    #[error("Unbound variable: '{name}'")]
    UnboundVariable { name: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Cannot apply operator '{op}' to types {left} and {right}")]
    InvalidOperation { op: String, left: String, right: String },

    #[error("Field '{field}' not found on type {type_name}")]
    FieldNotFound { field: String, type_name: String },

    // Runtime errors
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in '{op}'")]
    Overflow { op: String },

    #[error("Null pointer dereference")]
    NullPointer,

    #[error("{0}")]
    Introspect(#[from] IntrospectError),
}

impl EvalError {
    pub fn unknown_ident(name: impl Into<String>) -> Self {
        EvalError::UnknownIdentifier { name: name.into() }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn invalid_op(op: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        EvalError::InvalidOperation {
            op: op.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn overflow(op: impl Into<String>) -> Self {
        EvalError::Overflow { op: op.into() }
    }
}
