//! JSON-RPC Protocol definitions
//!
//! Defines the messages exchanged between debugger bridge scripts and
//! natvis-server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::introspect::{Snapshot, TypeId, ValueHandle};

/// Type of the value to print, by id or by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Id(TypeId),
    Name(String),
}

/// Object to print inside the request's snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRef {
    pub address: u64,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Request from a debugger script to natvis-server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    /// Replace the configuration and load its documents
    #[serde(rename = "initialize")]
    Initialize {
        #[serde(default)]
        config: Option<Config>,
    },

    /// Load a visualizer document from a file or from inline XML
    #[serde(rename = "load")]
    Load {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        content: Option<String>,
    },

    /// Print one value
    #[serde(rename = "print")]
    Print {
        snapshot: Snapshot,
        value: ValueRef,
        #[serde(default)]
        max_children: Option<usize>,
    },

    /// Shutdown the server
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// One child in a print response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub name: String,
    pub display: String,
    /// Whether printing `value` would produce children of its own
    pub expandable: bool,
    /// Object behind the child, for a follow-up print request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueHandle>,
}

/// Response from natvis-server to the debugger script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Printed {
        display: String,
        /// `Name` of the rule that matched, absent when default formatting was used
        matched: Option<String>,
        children: Vec<ChildInfo>,
        /// More children exist beyond `max_children`
        truncated: bool,
    },
    Loaded {
        source: String,
        rules: usize,
        diagnostics: Vec<String>,
    },
    Success { ok: bool },
    Error { error: String },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { ok: true }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { error: msg.into() }
    }

    /// Display string only, no rule
    pub fn printed_default(display: impl Into<String>) -> Self {
        Response::Printed {
            display: display.into(),
            matched: None,
            children: Vec::new(),
            truncated: false,
        }
    }
}

/// JSON-RPC message wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage<T> {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(flatten)]
    pub content: T,
}

impl<T> RpcMessage<T> {
    pub fn new(id: u64, content: T) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            content,
        }
    }
}
