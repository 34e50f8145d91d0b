//! Introspection boundary
//!
//! Read-only access to the type and value information of the debugged
//! process. The host debugger implements [`Introspector`]; the engine only
//! holds copyable identifiers ([`TypeId`], [`ValueHandle`]) and never owns or
//! mutates process state.

mod snapshot;

#[cfg(test)]
pub(crate) mod fixtures;

pub use snapshot::{MemoryRegion, Snapshot};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on typedef/qualifier chains, guards against malformed type tables.
pub(crate) const MAX_TYPE_CHAIN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntrospectError {
    #[error("Unknown type id {0}")]
    UnknownType(u32),

    #[error("Cannot access memory at 0x{address:x} ({size} bytes)")]
    UnreadableMemory { address: u64, size: u64 },

    #[error("Type '{type_name}' cannot be read as a scalar")]
    NotScalar { type_name: String },

    #[error("Type chain starting at id {0} does not terminate")]
    TypeCycle(u32),

    #[error("Address 0x{address:x} + {offset} is outside the address space")]
    AddressOverflow { address: u64, offset: u64 },
}

/// `address + offset`, failing instead of wrapping
pub fn offset_address(address: u64, offset: u64) -> Result<u64, IntrospectError> {
    address
        .checked_add(offset)
        .ok_or(IntrospectError::AddressOverflow { address, offset })
}

/// Address of element `index` of `size`-byte elements starting at `base`
pub fn element_address(base: u64, index: u64, size: u64) -> Result<u64, IntrospectError> {
    let offset = index.checked_mul(size).ok_or(IntrospectError::AddressOverflow {
        address: base,
        offset: u64::MAX,
    })?;
    offset_address(base, offset)
}

/// Identifier of a type in the host's type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Kind of a type, mirroring the debugger's type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCode {
    Struct,
    Union,
    Enum,
    Pointer,
    Reference,
    Array,
    Typedef,
    /// const/volatile wrapper around `target`
    Qualified,
    Int,
    UInt,
    Float,
    Bool,
    Char,
    Void,
}

impl TypeCode {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeCode::Int
                | TypeCode::UInt
                | TypeCode::Float
                | TypeCode::Bool
                | TypeCode::Char
                | TypeCode::Enum
                | TypeCode::Pointer
        )
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, TypeCode::Struct | TypeCode::Union)
    }
}

/// Shape of a runtime type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub code: TypeCode,
    #[serde(default)]
    pub name: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Pointee, referent, element, typedef target or qualified type
    #[serde(default)]
    pub target: Option<TypeId>,
    /// Element count for arrays
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Template arguments as reported by the debugger, used when `name`
    /// carries only the template's base name.
    #[serde(default)]
    pub template_args: Vec<String>,
}

impl TypeDescriptor {
    pub fn scalar(code: TypeCode, name: impl Into<String>, size: u64) -> Self {
        Self {
            code,
            name: Some(name.into()),
            size,
            target: None,
            length: None,
            fields: Vec::new(),
            template_args: Vec::new(),
        }
    }

    pub fn pointer(target: TypeId) -> Self {
        Self {
            code: TypeCode::Pointer,
            name: None,
            size: 8,
            target: Some(target),
            length: None,
            fields: Vec::new(),
            template_args: Vec::new(),
        }
    }

    pub fn reference(target: TypeId) -> Self {
        Self {
            code: TypeCode::Reference,
            ..Self::pointer(target)
        }
    }

    pub fn array(element: TypeId, length: u64, element_size: u64) -> Self {
        Self {
            code: TypeCode::Array,
            name: None,
            size: element_size.saturating_mul(length),
            target: Some(element),
            length: Some(length),
            fields: Vec::new(),
            template_args: Vec::new(),
        }
    }

    pub fn typedef(name: impl Into<String>, target: TypeId) -> Self {
        Self {
            code: TypeCode::Typedef,
            name: Some(name.into()),
            size: 0,
            target: Some(target),
            length: None,
            fields: Vec::new(),
            template_args: Vec::new(),
        }
    }

    pub fn structure(name: impl Into<String>, size: u64, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            code: TypeCode::Struct,
            name: Some(name.into()),
            size,
            target: None,
            length: None,
            fields,
            template_args: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// One data member of a struct or union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// `None` for anonymous struct/union members
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeId,
    pub bit_offset: u64,
    /// Non-zero only for bitfields
    #[serde(default)]
    pub bit_size: u64,
    #[serde(default)]
    pub base_class: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeId, byte_offset: u64) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            bit_offset: byte_offset * 8,
            bit_size: 0,
            base_class: false,
        }
    }

    pub fn base(ty: TypeId, byte_offset: u64) -> Self {
        Self {
            name: None,
            ty,
            bit_offset: byte_offset * 8,
            bit_size: 0,
            base_class: true,
        }
    }

    pub fn anonymous(ty: TypeId, byte_offset: u64) -> Self {
        Self {
            name: None,
            ty,
            bit_offset: byte_offset * 8,
            bit_size: 0,
            base_class: false,
        }
    }

    pub fn bitfield(name: impl Into<String>, ty: TypeId, bit_offset: u64, bit_size: u64) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            bit_offset,
            bit_size,
            base_class: false,
        }
    }
}

/// Bit range of a bitfield relative to its handle's address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitRange {
    pub shift: u32,
    pub size: u32,
}

/// An object located in the debuggee's memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueHandle {
    pub address: u64,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<BitRange>,
}

impl ValueHandle {
    pub fn new(address: u64, ty: TypeId) -> Self {
        Self {
            address,
            ty,
            bits: None,
        }
    }

    /// Member of type `ty` located `bit_offset` bits into this object;
    /// `bit_size` is non-zero for bitfields
    pub fn member(&self, ty: TypeId, bit_offset: u64, bit_size: u64) -> Result<Self, IntrospectError> {
        Ok(Self {
            address: offset_address(self.address, bit_offset / 8)?,
            ty,
            bits: (bit_size > 0).then(|| BitRange {
                shift: (bit_offset % 8) as u32,
                size: bit_size as u32,
            }),
        })
    }

    /// Data member described by `field`
    pub fn field(&self, field: &FieldDescriptor) -> Result<Self, IntrospectError> {
        self.member(field.ty, field.bit_offset, field.bit_size)
    }
}

/// Raw scalar read from the debuggee
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Pointer(u64),
}

/// Capability interface to the debugger's type system and memory
pub trait Introspector {
    /// Describe a type
    fn describe(&self, ty: TypeId) -> Result<&TypeDescriptor, IntrospectError>;

    /// Most-derived type of the object, e.g. found through its vtable
    fn dynamic_type(&self, value: &ValueHandle) -> Result<TypeId, IntrospectError> {
        Ok(value.ty)
    }

    /// Read a scalar object (integers, floats, bools, chars, enums, pointers)
    fn read_scalar(&self, value: &ValueHandle) -> Result<Scalar, IntrospectError>;

    /// Materialize a NUL-terminated string of `char_size` wide characters
    fn read_c_string(
        &self,
        address: u64,
        char_size: u64,
        limit: usize,
    ) -> Result<String, IntrospectError>;

    /// The debugger's own formatting, used when no visualizer applies
    fn format_default(&self, value: &ValueHandle) -> Result<String, IntrospectError>;

    /// Find a type by name
    fn lookup_type(&self, _name: &str) -> Option<TypeId> {
        None
    }

    /// Strip typedefs and cv-qualifiers
    fn strip_typedefs(&self, mut ty: TypeId) -> Result<TypeId, IntrospectError> {
        for _ in 0..MAX_TYPE_CHAIN {
            let desc = self.describe(ty)?;
            match (desc.code, desc.target) {
                (TypeCode::Typedef | TypeCode::Qualified, Some(target)) => ty = target,
                _ => return Ok(ty),
            }
        }
        Err(IntrospectError::TypeCycle(ty.0))
    }

    /// Describe a type after stripping typedefs and qualifiers
    fn describe_resolved(&self, ty: TypeId) -> Result<&TypeDescriptor, IntrospectError> {
        let ty = self.strip_typedefs(ty)?;
        self.describe(ty)
    }
}
