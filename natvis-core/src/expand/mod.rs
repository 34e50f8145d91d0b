//! Child expansion
//!
//! A rule's `<Expand>` items become a lazy sequence of named children. The
//! sequence is driven by [`ExpandCursor`], which remembers where it stopped
//! so that consumers can pull any prefix of it.

mod cursor;

pub use cursor::ExpandCursor;

use thiserror::Error;

use crate::expr::{EvalError, ParseError, Value};

/// Why a child could not be produced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpandError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Eval(#[from] EvalError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildValue {
    /// Evaluated value; scalars are already loaded
    Value(Value),
    /// Display-only text (synthetic items, truncation markers)
    Text(String),
    Error(ExpandError),
}

/// One named child
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    pub name: String,
    pub value: ChildValue,
}

impl Child {
    pub fn new(name: impl Into<String>, value: ChildValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn error(name: impl Into<String>, error: impl Into<ExpandError>) -> Self {
        Self::new(name, ChildValue::Error(error.into()))
    }
}
