//! Read-only SSA input contract.
//!
//! Built by an external SSA-construction pass; the code generator only reads
//! it. Instruction kinds form a closed sum with one arm per supported
//! operation; everything outside the subset arrives as [`InstKind::Opaque`]
//! and renders as a comment.
//!
//! Invariant: edge `i` of a phi corresponds positionally to predecessor `i`
//! of its block. Producers that cannot guarantee this ordering are
//! non-conformant.

use crate::diag::Position;
use crate::types::StaticType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub locals: Vec<LocalDecl>,
    pub blocks: Vec<BasicBlock>,
    /// At most one return value.
    pub ret: Option<StaticType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: StaticType,
    pub pos: Position,
}

/// A declared stack allocation. `ty` is the pointee type of the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: String,
    pub ty: StaticType,
    pub heap: bool,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub index: usize,
    pub preds: Vec<usize>,
    pub succs: Vec<usize>,
    pub insts: Vec<Inst>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub kind: InstKind,
    pub pos: Position,
}

/// An instruction operand: a constant materialized as an immediate, or a
/// named value read from its bound storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const { value: i64, ty: StaticType },
    Var { name: String, ty: StaticType },
}

impl Operand {
    pub fn ty(&self) -> &StaticType {
        match self {
            Self::Const { ty, .. } | Self::Var { ty, .. } => ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    Arith,
    Bitwise,
    Cmp,
}

impl BinOp {
    pub fn family(self) -> OpFamily {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem => OpFamily::Arith,
            Self::And | Self::Or | Self::Xor | Self::Shl | Self::Shr | Self::AndNot => {
                OpFamily::Bitwise
            }
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => OpFamily::Cmp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Logical negation of a boolean.
    Not,
    /// Bitwise complement.
    BitNot,
    /// Arithmetic negation.
    Neg,
    /// Pointer dereference.
    Deref,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Stack allocation; the slot itself is reserved by the locals pre-pass.
    Alloc {
        name: String,
        ty: StaticType,
        heap: bool,
    },
    BinOp {
        name: String,
        op: BinOp,
        /// Result type.
        ty: StaticType,
        lhs: Operand,
        rhs: Operand,
    },
    UnOp {
        name: String,
        op: UnOp,
        /// Result type; the pointee type for `Deref`.
        ty: StaticType,
        operand: Operand,
    },
    /// Address of `base[index]`.
    IndexAddr {
        name: String,
        /// Result type: pointer to the element.
        ty: StaticType,
        base: String,
        index: Operand,
    },
    Jump {
        target: usize,
    },
    Branch {
        cond: String,
        then_block: usize,
        else_block: usize,
    },
    /// Control-flow merge; realized entirely by edge-copies at branch sites.
    Phi {
        name: String,
        ty: StaticType,
        /// Edge `i` corresponds to predecessor `i` of the enclosing block.
        edges: Vec<Operand>,
    },
    Return {
        values: Vec<Operand>,
    },
    /// Store a value through the address named by `addr`.
    Store {
        addr: String,
        value: Operand,
    },
    /// Anything outside the supported subset (calls, channels, maps,
    /// interfaces, type assertions, slicing, defers, panics).
    Opaque {
        what: String,
    },
}
