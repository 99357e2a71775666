//! Registry of named fixed-size vector types.
//!
//! Treated as an external type-info provider: the layout model queries it by
//! name and never inspects vector internals beyond total and element size.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorType {
    pub name: String,
    /// Total size in bytes.
    pub size: usize,
    /// Element size in bytes for element-addressable types.
    pub elem_size: Option<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct VectorRegistry {
    types: IndexMap<String, VectorType>,
}

impl VectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in vector types.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        for (name, size, elem_size) in [
            ("Int", 8, None),
            ("Int4", 16, Some(4)),
            ("I8x16", 16, Some(1)),
            ("I16x8", 16, Some(2)),
            ("I32x4", 16, Some(4)),
            ("I64x2", 16, Some(8)),
            ("U8x16", 16, Some(1)),
            ("U16x8", 16, Some(2)),
            ("U32x4", 16, Some(4)),
            ("U64x2", 16, Some(8)),
        ] {
            reg.register(VectorType {
                name: name.to_string(),
                size,
                elem_size,
            });
        }
        reg
    }

    pub fn register(&mut self, ty: VectorType) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&VectorType> {
        self.types.get(name)
    }
}
