//! Memory-access helpers shared by the instruction emitter.
//!
//! All scalar values are canonicalized on load: sub-word sources reach
//! registers through an extending move (zero-extend for unsigned, boolean
//! and pointer values, sign-extend for signed integers), so every ALU
//! operation runs at full word width. Stores truncate back to the
//! destination's width.

use super::FuncAssembler;
use crate::asm::AsmLine;
use crate::binding::Slot;
use crate::diag::{CodegenError, Position};
use crate::encoding::{Op, TypedOperand, Width, imm, mem_in, mem_out, reg_in, reg_out};
use crate::regs::{RegClass, Register};
use crate::ssa::Operand;
use crate::types::{StaticType, WORD_SIZE, size_of};

/// Register-operand width of a scalar type.
pub(super) fn scalar_width(ty: &StaticType) -> Width {
    match ty {
        StaticType::Bool => Width::B,
        StaticType::Int { bits, .. } => Width::from_bytes(*bits as usize / 8),
        StaticType::Ptr(_) => Width::Q,
        other => panic!("codegen: type `{}` has no scalar width", other),
    }
}

/// Largest move width that fits the remaining byte count.
pub(super) fn chunk_width(remaining: usize) -> Width {
    if remaining >= 8 {
        Width::Q
    } else if remaining >= 4 {
        Width::L
    } else if remaining >= 2 {
        Width::W
    } else {
        Width::B
    }
}

impl FuncAssembler<'_> {
    pub(super) fn push_inst(&mut self, line: AsmLine) {
        self.body.push(line);
    }

    /// Encodes one instruction, attributing a miss to `pos`.
    pub(super) fn inst_line(
        &self,
        op: Op,
        width: Width,
        operands: &[TypedOperand],
        pos: Position,
    ) -> Result<AsmLine, CodegenError> {
        let text = self
            .instrs
            .encode(op, width, operands)
            .map_err(|source| CodegenError::Encoding { source, pos })?;
        Ok(AsmLine::Inst(text))
    }

    pub(super) fn emit(
        &mut self,
        op: Op,
        width: Width,
        operands: &[TypedOperand],
        pos: Position,
    ) -> Result<(), CodegenError> {
        let line = self.inst_line(op, width, operands, pos)?;
        self.push_inst(line);
        Ok(())
    }

    /// Zeroing sequence for one slot, in descending chunk widths.
    pub(super) fn zero_lines_for(
        &self,
        name: &str,
        slot: Slot,
        pos: Position,
    ) -> Result<Vec<AsmLine>, CodegenError> {
        let mut lines = Vec::new();
        let mut offset = 0;
        while offset < slot.size {
            let width = chunk_width(slot.size - offset);
            lines.push(self.inst_line(
                Op::Mov,
                width,
                &[imm(0), mem_out(name, slot.offset + offset, slot.base())],
                pos,
            )?);
            offset += width.bytes();
        }
        Ok(lines)
    }

    /// Loads a scalar operand into a fresh register of the word width,
    /// canonicalizing sub-word values. The caller owns the returned register.
    pub(super) fn load_into(
        &mut self,
        operand: &Operand,
        pos: Position,
    ) -> Result<Register, CodegenError> {
        let class = if operand.ty().is_pointer() {
            RegClass::Addr
        } else {
            RegClass::Data
        };
        let reg = self.pool.allocate(class, WORD_SIZE);
        if let Err(e) = self.load_operand_into(reg, operand, pos) {
            self.pool.free(reg);
            return Err(e);
        }
        Ok(reg)
    }

    /// Loads a scalar operand into a caller-chosen register.
    pub(super) fn load_operand_into(
        &mut self,
        reg: Register,
        operand: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        match operand {
            Operand::Const { value, .. } => {
                self.emit(Op::Mov, Width::Q, &[imm(*value), reg_out(reg)], pos)
            }
            Operand::Var { name, ty } => {
                let slot = self.slot_of(name);
                let src = mem_in(name, slot.offset, slot.base());
                let width = scalar_width(ty);
                if width == Width::Q {
                    self.emit(Op::Mov, Width::Q, &[src, reg_out(reg)], pos)
                } else if ty.is_signed() {
                    self.emit(Op::MovSx, width, &[src, reg_out(reg)], pos)
                } else {
                    self.emit(Op::MovZx, width, &[src, reg_out(reg)], pos)
                }
            }
        }
    }

    /// Store width for an instruction result bound to a word-rounded local
    /// slot. Boolean results are kept as a full canonical word.
    pub(super) fn result_width(&self, ty: &StaticType) -> Width {
        match ty {
            StaticType::Bool => Width::Q,
            other => Width::from_bytes(size_of(other, self.vectors)),
        }
    }

    /// Stores a register into a result slot, truncating to the result width.
    pub(super) fn store_result(
        &mut self,
        name: &str,
        ty: &StaticType,
        reg: Register,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let slot = self.slot_of(name);
        let width = self.result_width(ty);
        self.emit(
            Op::Mov,
            width,
            &[reg_in(reg), mem_out(name, slot.offset, slot.base())],
            pos,
        )
    }

    /// Copies an operand into a named slot. Scalars go through a single
    /// canonicalizing load and a width-exact store; larger values move in
    /// descending chunks through a scratch register.
    pub(super) fn copy_operand_to(
        &mut self,
        src: &Operand,
        dst_name: &str,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let dst = self.slot_of(dst_name);
        let size = size_of(src.ty(), self.vectors);
        if size <= WORD_SIZE {
            let reg = self.load_into(src, pos)?;
            let result = self.emit(
                Op::Mov,
                Width::from_bytes(size),
                &[reg_in(reg), mem_out(dst_name, dst.offset, dst.base())],
                pos,
            );
            self.pool.free(reg);
            return result;
        }
        let Operand::Var { name, .. } = src else {
            panic!("codegen: constant operand of {} bytes", size);
        };
        let src_slot = self.slot_of(name);
        let mut offset = 0;
        while offset < size {
            let width = chunk_width(size - offset);
            let reg = self.pool.allocate(RegClass::Data, WORD_SIZE);
            let result = self
                .emit(
                    Op::Mov,
                    width,
                    &[
                        mem_in(name, src_slot.offset + offset, src_slot.base()),
                        reg_out(reg),
                    ],
                    pos,
                )
                .and_then(|_| {
                    self.emit(
                        Op::Mov,
                        width,
                        &[reg_in(reg), mem_out(dst_name, dst.offset + offset, dst.base())],
                        pos,
                    )
                });
            self.pool.free(reg);
            result?;
            offset += width.bytes();
        }
        Ok(())
    }
}
