//! In-memory process snapshot
//!
//! A serializable type table plus captured memory regions. Debugger bridge
//! scripts ship one of these with each print request; tests build them by
//! hand.

use serde::{Deserialize, Serialize};

use super::{
    element_address, IntrospectError, Introspector, Scalar, TypeCode, TypeDescriptor, TypeId,
    ValueHandle, MAX_TYPE_CHAIN,
};
use crate::matcher::normalize_type_name;

/// Nesting limit for default struct formatting
const DEFAULT_FORMAT_DEPTH: usize = 3;
/// Element limit for default array formatting
const DEFAULT_FORMAT_ELEMENTS: u64 = 16;

/// A contiguous block of captured debuggee memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub address: u64,
    pub bytes: Vec<u8>,
}

impl MemoryRegion {
    fn slice(&self, address: u64, len: u64) -> Option<&[u8]> {
        let start = address.checked_sub(self.address)?;
        let end = start.checked_add(len)?;
        if end > self.bytes.len() as u64 {
            return None;
        }
        Some(&self.bytes[start as usize..end as usize])
    }
}

/// Little-endian process image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Type table, indexed by [`TypeId`]
    pub types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub memory: Vec<MemoryRegion>,
    /// Most-derived type of polymorphic objects as `[address, type]` pairs
    #[serde(default)]
    pub dynamic_types: Vec<(u64, TypeId)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, desc: TypeDescriptor) -> TypeId {
        self.types.push(desc);
        TypeId((self.types.len() - 1) as u32)
    }

    /// Capture `bytes` at `address`
    pub fn write(&mut self, address: u64, bytes: &[u8]) {
        self.memory.push(MemoryRegion {
            address,
            bytes: bytes.to_vec(),
        });
    }

    pub fn write_i32(&mut self, address: u64, value: i32) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, address: u64, value: u64) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn set_dynamic_type(&mut self, address: u64, ty: TypeId) {
        self.dynamic_types.retain(|(known, _)| *known != address);
        self.dynamic_types.push((address, ty));
    }

    /// Read bytes from the most recently captured region covering the range
    pub fn read_bytes(&self, address: u64, len: u64) -> Result<&[u8], IntrospectError> {
        self.memory
            .iter()
            .rev()
            .find_map(|region| region.slice(address, len))
            .ok_or(IntrospectError::UnreadableMemory { address, size: len })
    }

    fn read_raw(&self, address: u64, len: u64) -> Result<u128, IntrospectError> {
        if len > 16 {
            return Err(IntrospectError::UnreadableMemory { address, size: len });
        }
        let bytes = self.read_bytes(address, len)?;
        let mut buf = [0u8; 16];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(u128::from_le_bytes(buf))
    }

    fn format_handle(&self, value: &ValueHandle, depth: usize) -> Result<String, IntrospectError> {
        let desc = self.describe_resolved(value.ty)?;
        match desc.code {
            TypeCode::Struct | TypeCode::Union | TypeCode::Array
                if depth >= DEFAULT_FORMAT_DEPTH =>
            {
                Ok("{...}".to_string())
            }
            TypeCode::Struct | TypeCode::Union => {
                let mut parts = Vec::new();
                for field in &desc.fields {
                    let text = self.format_handle(&value.field(field)?, depth + 1)?;
                    match &field.name {
                        Some(name) => parts.push(format!("{} = {}", name, text)),
                        None => {
                            let label = self.describe(field.ty)?.display_name().to_string();
                            parts.push(format!("<{}> = {}", label, text));
                        }
                    }
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            TypeCode::Array => {
                let element = desc.target.ok_or(IntrospectError::NotScalar {
                    type_name: desc.display_name().to_string(),
                })?;
                let element_size = self.describe_resolved(element)?.size;
                let length = desc.length.unwrap_or(0);
                let mut parts = Vec::new();
                for i in 0..length.min(DEFAULT_FORMAT_ELEMENTS) {
                    let address = element_address(value.address, i, element_size)?;
                    parts.push(self.format_handle(&ValueHandle::new(address, element), depth + 1)?);
                }
                if length > DEFAULT_FORMAT_ELEMENTS {
                    parts.push("...".to_string());
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            // A reference chain longer than the type chain limit is a cycle
            TypeCode::Reference if depth > MAX_TYPE_CHAIN => {
                Err(IntrospectError::TypeCycle(value.ty.0))
            }
            TypeCode::Reference => match (self.read_scalar(value)?, desc.target) {
                (Scalar::Pointer(address), Some(target)) => {
                    self.format_handle(&ValueHandle::new(address, target), depth + 1)
                }
                (scalar, _) => Ok(scalar_text(scalar)),
            },
            TypeCode::Void => Ok("void".to_string()),
            _ => Ok(scalar_text(self.read_scalar(value)?)),
        }
    }
}

fn scalar_text(scalar: Scalar) -> String {
    match scalar {
        Scalar::Int(v) => v.to_string(),
        Scalar::Float(v) => v.to_string(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Char(v) => format!("'{}'", v),
        Scalar::Pointer(v) => format!("0x{:x}", v),
    }
}

impl Introspector for Snapshot {
    fn describe(&self, ty: TypeId) -> Result<&TypeDescriptor, IntrospectError> {
        self.types
            .get(ty.0 as usize)
            .ok_or(IntrospectError::UnknownType(ty.0))
    }

    fn dynamic_type(&self, value: &ValueHandle) -> Result<TypeId, IntrospectError> {
        Ok(self
            .dynamic_types
            .iter()
            .find(|(address, _)| *address == value.address)
            .map_or(value.ty, |(_, ty)| *ty))
    }

    fn read_scalar(&self, value: &ValueHandle) -> Result<Scalar, IntrospectError> {
        let desc = self.describe_resolved(value.ty)?;
        let size = desc.size;

        let (raw, width) = match value.bits {
            Some(bits) => {
                let needed = (bits.shift as u64 + bits.size as u64 + 7) / 8;
                let raw = self
                    .read_raw(value.address, needed)?
                    .checked_shr(bits.shift)
                    .unwrap_or(0);
                let mask = if bits.size >= 128 {
                    u128::MAX
                } else {
                    (1u128 << bits.size) - 1
                };
                (raw & mask, bits.size)
            }
            None => (self.read_raw(value.address, size)?, (size * 8) as u32),
        };

        let sign_extend = |raw: u128| -> i128 {
            if width == 0 || width >= 128 {
                return raw as i128;
            }
            let shift = 128 - width;
            ((raw << shift) as i128) >> shift
        };

        match desc.code {
            TypeCode::Int | TypeCode::Enum => Ok(Scalar::Int(sign_extend(raw))),
            TypeCode::UInt => Ok(Scalar::Int(raw as i128)),
            TypeCode::Bool => Ok(Scalar::Bool(raw != 0)),
            TypeCode::Char => Ok(Scalar::Char(
                char::from_u32(raw as u32).unwrap_or(char::REPLACEMENT_CHARACTER),
            )),
            TypeCode::Float => match size {
                4 => Ok(Scalar::Float(f32::from_bits(raw as u32) as f64)),
                8 => Ok(Scalar::Float(f64::from_bits(raw as u64))),
                _ => Err(IntrospectError::NotScalar {
                    type_name: desc.display_name().to_string(),
                }),
            },
            TypeCode::Pointer | TypeCode::Reference => Ok(Scalar::Pointer(raw as u64)),
            _ => Err(IntrospectError::NotScalar {
                type_name: desc.display_name().to_string(),
            }),
        }
    }

    fn read_c_string(
        &self,
        address: u64,
        char_size: u64,
        limit: usize,
    ) -> Result<String, IntrospectError> {
        let mut out = String::new();
        for i in 0..limit as u64 {
            let code = self.read_raw(element_address(address, i, char_size)?, char_size)? as u32;
            if code == 0 {
                break;
            }
            out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Ok(out)
    }

    fn format_default(&self, value: &ValueHandle) -> Result<String, IntrospectError> {
        self.format_handle(value, 0)
    }

    /// First type whose name matches, compared after whitespace and
    /// elaborated-keyword normalization
    fn lookup_type(&self, name: &str) -> Option<TypeId> {
        let wanted = normalize_type_name(name);
        self.types
            .iter()
            .position(|desc| {
                desc.name
                    .as_deref()
                    .is_some_and(|n| normalize_type_name(n) == wanted)
            })
            .map(|index| TypeId(index as u32))
    }
}
