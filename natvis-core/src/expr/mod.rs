//! Visualizer expressions
//!
//! The C-like expression sub-language embedded in visualizer attributes and
//! text: parsing once at load time, evaluation many times against live
//! objects.

pub mod ast;
pub mod error;
pub mod eval;
pub mod format;
pub mod parser;
pub mod value;

pub use ast::{Expr, ParsedExpr};
pub use error::{EvalError, ParseError};
pub use eval::{BindingContext, Evaluator};
pub use format::{FormatSpec, FormatSpecifier};
pub use parser::parse_expr;
pub use value::Value;
