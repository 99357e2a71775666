//! Assembly text assembly: line model and final rendering.
//!
//! Lines are collected as structured values while the function body is
//! emitted and only flattened to text once the frame size is known. The
//! stack-pointer reset emitted by return lowering depends on that size, so it
//! stays a dedicated variant instead of provisional text; rendering fills in
//! the number.

use std::fmt::Write;

use crate::regs::SP;

/// One logical output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmLine {
    /// Block label, flush left: `block3:`.
    Label(String),
    /// Fully rendered instruction, indented.
    Inst(String),
    /// Informational comment, indented.
    Comment(String),
    /// Stack-pointer reset whose amount is the final frame size.
    SpReset,
}

const INDENT: &str = "        ";

/// Flattens the collected lines, resolving every [`AsmLine::SpReset`] to the
/// given frame size.
pub fn render(lines: &[AsmLine], frame_size: usize) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            AsmLine::Label(name) => {
                let _ = writeln!(out, "{}:", name);
            }
            AsmLine::Inst(text) => {
                let _ = writeln!(out, "{}{}", INDENT, text);
            }
            AsmLine::Comment(text) => {
                let _ = writeln!(out, "{}// {}", INDENT, text);
            }
            AsmLine::SpReset => {
                let _ = writeln!(out, "{}ADDQ  ${}, {}", INDENT, frame_size, SP);
            }
        }
    }
    out
}

/// Label for a basic block.
pub fn block_label(index: usize) -> String {
    format!("block{}", index)
}
