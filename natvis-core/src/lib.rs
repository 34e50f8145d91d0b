//! natvis-core
//!
//! Natvis visualizer engine for native debuggers:
//! - Visualizer documents (Natvis XML) and the rule store
//! - Template-aware type matching
//! - Natvis expression parsing and evaluation against debuggee memory
//! - Display strings and lazy child expansion
//! - JSON-RPC protocol types used by natvis-server

pub mod config;
pub mod document;
pub mod expand;
pub mod expr;
pub mod introspect;
pub mod matcher;
pub mod printer;
pub mod protocol;

pub use config::{Config, ConfigError, EngineConfig};
pub use document::{DocumentError, DocumentStore, RuleId, VisualizerDocument};
pub use expand::{Child, ChildValue, ExpandError};
pub use expr::{parse_expr, EvalError, Evaluator, Expr, Value};
pub use introspect::{Introspector, Snapshot, TypeId, ValueHandle};
pub use matcher::{NoMatch, TypeMatcher};
pub use printer::{Children, PrintDriver, Printed};
pub use protocol::{Request, Response};
