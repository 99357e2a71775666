//! Per-function name binding table.
//!
//! Every SSA value and every synthesized local is bound to exactly one frame
//! slot: parameters (and the return slot) live at fixed offsets from FP,
//! locals at fixed offsets from SP. Bindings are created at most once; a
//! second bind of the same name is an internal inconsistency.

use indexmap::IndexMap;
use thiserror::Error;

use crate::regs::{FP, Register, SP};
use crate::types::{StaticType, size_of, slot_size};
use crate::vector::VectorRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Param,
    Local,
}

/// A fixed-offset, fixed-size region of the frame holding one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: SlotKind,
    pub offset: usize,
    pub size: usize,
}

impl Slot {
    /// Addressing base for this slot.
    pub fn base(&self) -> Register {
        match self.kind {
            SlotKind::Param => FP,
            SlotKind::Local => SP,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// How a binding came to exist; on-demand bindings are zeroed in a late pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Param,
    SsaLocal,
    Synthesized,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("unknown name `{0}`")]
    Unknown(String),
}

#[derive(Debug, Clone)]
struct Binding {
    slot: Slot,
    origin: Origin,
    ty: StaticType,
}

#[derive(Debug, Default, Clone)]
pub struct NameTable {
    bindings: IndexMap<String, Binding>,
    /// Next free SP-relative offset. Local slots are word-rounded.
    next_local: usize,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a parameter (or the return slot) at a caller-computed FP offset.
    /// Parameter slots keep the raw type size.
    pub fn bind_param(&mut self, name: &str, ty: StaticType, offset: usize, size: usize) -> Slot {
        let slot = Slot {
            kind: SlotKind::Param,
            offset,
            size,
        };
        self.insert(name, ty, slot, Origin::Param);
        slot
    }

    /// Binds a local at the next free SP offset, rounding the slot up to a
    /// word multiple.
    pub fn bind_local(&mut self, name: &str, ty: StaticType, size: usize, origin: Origin) -> Slot {
        let slot = Slot {
            kind: SlotKind::Local,
            offset: self.next_local,
            size: slot_size(size),
        };
        self.next_local += slot.size;
        self.insert(name, ty, slot, origin);
        slot
    }

    fn insert(&mut self, name: &str, ty: StaticType, slot: Slot, origin: Origin) {
        if self.bindings.contains_key(name) {
            panic!("codegen: rebinding of `{}`", name);
        }
        self.bindings
            .insert(name.to_string(), Binding { slot, origin, ty });
    }

    pub fn slot(&self, name: &str) -> Result<Slot, BindError> {
        self.bindings
            .get(name)
            .map(|b| b.slot)
            .ok_or_else(|| BindError::Unknown(name.to_string()))
    }

    pub fn type_of(&self, name: &str) -> Result<&StaticType, BindError> {
        self.bindings
            .get(name)
            .map(|b| &b.ty)
            .ok_or_else(|| BindError::Unknown(name.to_string()))
    }

    /// Existing slot for `name`, or a fresh synthesized local sized for `ty`.
    pub fn ensure_slot(&mut self, name: &str, ty: &StaticType, vectors: &VectorRegistry) -> Slot {
        if let Ok(slot) = self.slot(name) {
            return slot;
        }
        self.bind_local(name, ty.clone(), size_of(ty, vectors), Origin::Synthesized)
    }

    /// Sum of all local slot sizes; this is the final frame size.
    pub fn locals_size(&self) -> usize {
        self.next_local
    }

    /// Local bindings in creation order, filtered by origin.
    pub fn locals_with_origin(&self, origin: Origin) -> impl Iterator<Item = (&str, Slot)> {
        self.bindings
            .iter()
            .filter(move |(_, b)| b.slot.kind == SlotKind::Local && b.origin == origin)
            .map(|(name, b)| (name.as_str(), b.slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Slot)> {
        self.bindings.iter().map(|(name, b)| (name.as_str(), b.slot))
    }
}

#[cfg(test)]
#[path = "tests/t_binding.rs"]
mod tests;
