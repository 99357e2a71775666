//! Instruction-encoding catalog.
//!
//! Maps an abstract operation tag plus typed operand descriptors to the
//! literal mnemonic line. Operands carry a data-flow direction so the catalog
//! can reject shapes the assembler would not accept (two memory operands, a
//! write into an immediate). A miss is a recoverable error carried back to
//! the caller, not an abort.

use std::fmt;

use thiserror::Error;

use crate::regs::Register;

/// Operand width. Sub-word widths only appear on moves; every ALU operation
/// runs at `Q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    B,
    W,
    L,
    Q,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Self::B => 1,
            Self::W => 2,
            Self::L => 4,
            Self::Q => 8,
        }
    }

    pub fn from_bytes(bytes: usize) -> Self {
        match bytes {
            1 => Self::B,
            2 => Self::W,
            4 => Self::L,
            8 => Self::Q,
            _ => panic!("codegen: no operand width for {} bytes", bytes),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::W => "W",
            Self::L => "L",
            Self::Q => "Q",
        }
    }
}

/// Condition codes, named by their mnemonic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Below,
    BelowEq,
    Above,
    AboveEq,
}

impl Cond {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Below => "CS",
            Self::BelowEq => "LS",
            Self::Above => "HI",
            Self::AboveEq => "CC",
        }
    }
}

/// Abstract operation tags. The width passed to [`InstrTable::encode`]
/// selects the concrete mnemonic; for the extending moves it names the
/// source width (the destination is always a full word).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Mov,
    /// Zero-extending load to a full word.
    MovZx,
    /// Sign-extending load to a full word.
    MovSx,
    Lea,
    Add,
    Sub,
    Mul,
    /// Signed divide; implicitly reads DX:AX.
    DivS,
    /// Unsigned divide; implicitly reads DX:AX.
    DivU,
    /// Sign-extend AX into DX:AX.
    Cqo,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Shl,
    ShrU,
    ShrS,
    Cmp,
    Set(Cond),
    Jmp,
    Jcc(Cond),
    Ret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    In,
    Out,
    InOut,
}

impl Dir {
    fn readable(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    fn writable(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// Operand shape as the assembler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandKind {
    /// Named frame slot: `sym+off(BASE)`.
    Mem {
        symbol: String,
        offset: usize,
        base: Register,
    },
    /// Register-indirect: `off(BASE)`.
    Ind { base: Register, offset: usize },
    Reg(Register),
    Imm(i64),
    Label(String),
}

impl OperandKind {
    fn is_mem(&self) -> bool {
        matches!(self, Self::Mem { .. } | Self::Ind { .. })
    }

    fn is_reg(&self) -> bool {
        matches!(self, Self::Reg(_))
    }

    fn is_imm(&self) -> bool {
        matches!(self, Self::Imm(_))
    }

    fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mem {
                symbol,
                offset,
                base,
            } => write!(f, "{}+{}({})", symbol, offset, base),
            Self::Ind { base, offset } => {
                if *offset == 0 {
                    write!(f, "({})", base)
                } else {
                    write!(f, "{}({})", offset, base)
                }
            }
            Self::Reg(reg) => write!(f, "{}", reg),
            Self::Imm(value) => write!(f, "${}", value),
            Self::Label(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedOperand {
    pub kind: OperandKind,
    pub dir: Dir,
}

pub fn mem_in(symbol: &str, offset: usize, base: Register) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Mem {
            symbol: symbol.to_string(),
            offset,
            base,
        },
        dir: Dir::In,
    }
}

pub fn mem_out(symbol: &str, offset: usize, base: Register) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Mem {
            symbol: symbol.to_string(),
            offset,
            base,
        },
        dir: Dir::Out,
    }
}

pub fn ind_in(base: Register, offset: usize) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Ind { base, offset },
        dir: Dir::In,
    }
}

pub fn ind_out(base: Register, offset: usize) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Ind { base, offset },
        dir: Dir::Out,
    }
}

pub fn reg_in(reg: Register) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Reg(reg),
        dir: Dir::In,
    }
}

pub fn reg_out(reg: Register) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Reg(reg),
        dir: Dir::Out,
    }
}

pub fn reg_inout(reg: Register) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Reg(reg),
        dir: Dir::InOut,
    }
}

pub fn imm(value: i64) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Imm(value),
        dir: Dir::In,
    }
}

pub fn label(name: &str) -> TypedOperand {
    TypedOperand {
        kind: OperandKind::Label(name.to_string()),
        dir: Dir::In,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("no encoding for `{mnemonic} {operands}`")]
    NoMatch { mnemonic: String, operands: String },
}

/// The encoding catalog. Stateless; exists as a value so callers hold the
/// catalog rather than reaching for free functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstrTable;

impl InstrTable {
    pub fn new() -> Self {
        Self
    }

    /// Renders one instruction line (no indentation), or reports a miss when
    /// the operation/width/operand combination has no encoding.
    pub fn encode(
        &self,
        op: Op,
        width: Width,
        operands: &[TypedOperand],
    ) -> Result<String, EncodingError> {
        let mnemonic = Self::mnemonic(op, width);
        if !Self::matches(op, width, operands) {
            return Err(EncodingError::NoMatch {
                mnemonic,
                operands: render_operands(operands),
            });
        }
        if operands.is_empty() {
            Ok(mnemonic)
        } else {
            Ok(format!("{}  {}", mnemonic, render_operands(operands)))
        }
    }

    fn mnemonic(op: Op, width: Width) -> String {
        match op {
            Op::Mov => format!("MOV{}", width.suffix()),
            Op::MovZx => format!("MOV{}QZX", width.suffix()),
            Op::MovSx => format!("MOV{}QSX", width.suffix()),
            Op::Lea => "LEAQ".to_string(),
            Op::Add => "ADDQ".to_string(),
            Op::Sub => "SUBQ".to_string(),
            Op::Mul => "IMULQ".to_string(),
            Op::DivS => "IDIVQ".to_string(),
            Op::DivU => "DIVQ".to_string(),
            Op::Cqo => "CQO".to_string(),
            Op::And => "ANDQ".to_string(),
            Op::Or => "ORQ".to_string(),
            Op::Xor => "XORQ".to_string(),
            Op::Not => "NOTQ".to_string(),
            Op::Neg => "NEGQ".to_string(),
            Op::Shl => "SHLQ".to_string(),
            Op::ShrU => "SHRQ".to_string(),
            Op::ShrS => "SARQ".to_string(),
            Op::Cmp => "CMPQ".to_string(),
            Op::Set(cond) => format!("SET{}", cond.suffix()),
            Op::Jmp => "JMP".to_string(),
            Op::Jcc(cond) => format!("J{}", cond.suffix()),
            Op::Ret => "RET".to_string(),
        }
    }

    fn matches(op: Op, width: Width, operands: &[TypedOperand]) -> bool {
        match op {
            Op::Mov => match operands {
                [src, dst] => {
                    src.dir.readable()
                        && (src.kind.is_reg() || src.kind.is_mem() || src.kind.is_imm())
                        && dst.dir.writable()
                        && (dst.kind.is_reg() || dst.kind.is_mem())
                        && !(src.kind.is_mem() && dst.kind.is_mem())
                }
                _ => false,
            },
            Op::MovZx | Op::MovSx => match operands {
                // Width names the source; the destination is a full word.
                [src, dst] => {
                    width != Width::Q
                        && src.dir.readable()
                        && (src.kind.is_reg() || src.kind.is_mem())
                        && dst.dir.writable()
                        && dst.kind.is_reg()
                }
                _ => false,
            },
            Op::Lea => match operands {
                [src, dst] => {
                    width == Width::Q
                        && src.dir.readable()
                        && src.kind.is_mem()
                        && dst.dir.writable()
                        && dst.kind.is_reg()
                }
                _ => false,
            },
            Op::Add | Op::Sub | Op::Mul | Op::And | Op::Or | Op::Xor | Op::Shl | Op::ShrU
            | Op::ShrS => match operands {
                [src, dst] => {
                    width == Width::Q
                        && src.dir.readable()
                        && (src.kind.is_reg() || src.kind.is_mem() || src.kind.is_imm())
                        && dst.dir.readable()
                        && dst.dir.writable()
                        && dst.kind.is_reg()
                }
                _ => false,
            },
            Op::Not | Op::Neg => match operands {
                [dst] => {
                    width == Width::Q && dst.dir.readable() && dst.dir.writable() && dst.kind.is_reg()
                }
                _ => false,
            },
            Op::DivS | Op::DivU => match operands {
                [src] => {
                    width == Width::Q
                        && src.dir.readable()
                        && (src.kind.is_reg() || src.kind.is_mem())
                }
                _ => false,
            },
            Op::Cqo | Op::Ret => operands.is_empty(),
            Op::Cmp => match operands {
                [lhs, rhs] => {
                    width == Width::Q
                        && lhs.dir.readable()
                        && rhs.dir.readable()
                        && (lhs.kind.is_reg() || rhs.kind.is_reg())
                        && !lhs.kind.is_label()
                        && !rhs.kind.is_label()
                }
                _ => false,
            },
            Op::Set(_) => match operands {
                [dst] => width == Width::B && dst.dir.writable() && dst.kind.is_reg(),
                _ => false,
            },
            Op::Jmp | Op::Jcc(_) => match operands {
                [target] => target.kind.is_label(),
                _ => false,
            },
        }
    }
}

fn render_operands(operands: &[TypedOperand]) -> String {
    operands
        .iter()
        .map(|op| op.kind.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "tests/t_encoding.rs"]
mod tests;
