//! SSA-to-assembly lowering for a 64-bit x86 target.
//!
//! Input is a function in SSA form; output is one assembler text block per
//! function in Plan 9 syntax, with stack-frame layout, register assignment
//! and phi resolution handled here. See [`codegen::assemble_function`] for
//! the entry point.

pub mod asm;
pub mod binding;
pub mod codegen;
pub mod diag;
pub mod encoding;
pub mod phi;
pub mod regs;
pub mod ssa;
pub mod types;
pub mod vector;

pub use codegen::{FuncAssembler, assemble_function};
pub use diag::CodegenError;
