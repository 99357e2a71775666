use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

use crate::encoding::EncodingError;

/// Source position carried by SSA input nodes and reported errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Recoverable translation errors. The function that produced one is not
/// successfully compiled, but its partial text stays inspectable on the
/// assembler value.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unsupported parameter type `{ty}` for `{name}` at {pos}")]
    UnsupportedParamType {
        name: String,
        ty: String,
        pos: Position,
    },

    #[error("cannot heap-allocate local `{name}` at {pos}")]
    HeapAlloc { name: String, pos: Position },

    #[error("functions with {count} return values are not supported at {pos}")]
    MultiValueReturn { count: usize, pos: Position },

    #[error("store of {size} bytes is not a multiple of the machine word at {pos}")]
    UnalignedStore { size: usize, pos: Position },

    #[error("{source} at {pos}")]
    Encoding {
        #[source]
        source: EncodingError,
        pos: Position,
    },
}
