//! Static types and byte-layout computation.
//!
//! Pure functions over the supported type set. Unsupported shapes are
//! precondition violations of the SSA input and abort the run.

use std::fmt;

use crate::vector::VectorRegistry;

/// Machine word size in bytes.
pub const WORD_SIZE: usize = 8;

/// Slices are three-word descriptors: data pointer, length, capacity.
pub const SLICE_SIZE: usize = 3 * WORD_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticType {
    Bool,
    Int { signed: bool, bits: u8 },
    Ptr(Box<StaticType>),
    Array { elem: Box<StaticType>, len: usize },
    Slice(Box<StaticType>),
    /// Named fixed-size vector type, resolved through the vector registry.
    Vector(String),
    Tuple(Vec<StaticType>),
}

impl StaticType {
    pub fn int(signed: bool, bits: u8) -> Self {
        Self::Int { signed, bits }
    }

    pub fn ptr(elem: StaticType) -> Self {
        Self::Ptr(Box::new(elem))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Int { signed: true, .. })
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int { signed, bits } => {
                let prefix = if *signed { "i" } else { "u" };
                write!(f, "{}{}", prefix, bits)
            }
            Self::Ptr(elem) => write!(f, "*{}", elem),
            Self::Array { elem, len } => write!(f, "[{}]{}", len, elem),
            Self::Slice(elem) => write!(f, "[]{}", elem),
            Self::Vector(name) => write!(f, "{}", name),
            Self::Tuple(members) => {
                write!(f, "(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Byte size of a static type.
pub fn size_of(ty: &StaticType, vectors: &VectorRegistry) -> usize {
    match ty {
        StaticType::Bool => 1,
        StaticType::Int { bits, .. } => *bits as usize / 8,
        StaticType::Ptr(_) => WORD_SIZE,
        StaticType::Slice(_) => SLICE_SIZE,
        StaticType::Array { elem, len } => len * size_of(elem, vectors),
        StaticType::Vector(name) => match vectors.lookup(name) {
            Some(info) => info.size,
            None => panic!("codegen: unknown vector type `{}` in size computation", name),
        },
        StaticType::Tuple(members) => match members.as_slice() {
            [single] => size_of(single, vectors),
            _ => panic!(
                "codegen: unsupported tuple of {} members in size computation",
                members.len()
            ),
        },
    }
}

/// Byte size of one element of an indexable type.
pub fn elem_size_of(ty: &StaticType, vectors: &VectorRegistry) -> usize {
    match ty {
        StaticType::Array { elem, .. } | StaticType::Slice(elem) => size_of(elem, vectors),
        StaticType::Vector(name) => match vectors.lookup(name) {
            Some(info) => info.elem_size.unwrap_or_else(|| {
                panic!("codegen: vector type `{}` is not element-addressable", name)
            }),
            None => panic!("codegen: unknown vector type `{}`", name),
        },
        other => panic!("codegen: type `{}` is not indexable", other),
    }
}

pub fn align_to(value: usize, align: usize) -> usize {
    debug_assert!(align != 0);
    (value + align - 1) & !(align - 1)
}

/// Storage footprint once placed in a local slot: a word multiple, with
/// single-byte logical values promoted to a full word.
pub fn slot_size(size: usize) -> usize {
    align_to(size.max(1), WORD_SIZE)
}

#[cfg(test)]
#[path = "tests/t_types.rs"]
mod tests;
