//! Per-instruction lowering.
//!
//! Every emission step starts and ends with an empty register pool: scratch
//! registers are freed on all paths, including error returns, before the
//! step completes.

use super::FuncAssembler;
use crate::asm::{self, AsmLine};
use crate::diag::{CodegenError, Position};
use crate::encoding::{
    Cond, Op, Width, imm, ind_in, ind_out, label, mem_in, mem_out, reg_in, reg_inout, reg_out,
};
use crate::phi::EdgeCopy;
use crate::regs::{RegClass, Register};
use crate::ssa::{BasicBlock, BinOp, Inst, InstKind, OpFamily, Operand, UnOp};
use crate::types::{StaticType, WORD_SIZE, elem_size_of, size_of};

impl FuncAssembler<'_> {
    pub(super) fn emit_block(&mut self, block: &BasicBlock) -> Result<(), CodegenError> {
        self.push_inst(AsmLine::Label(asm::block_label(block.index)));
        for inst in &block.insts {
            self.emit_inst(block, inst)?;
        }
        Ok(())
    }

    fn emit_inst(&mut self, block: &BasicBlock, inst: &Inst) -> Result<(), CodegenError> {
        let pos = inst.pos;
        match &inst.kind {
            InstKind::Alloc { name, heap, .. } => {
                if *heap {
                    return Err(CodegenError::HeapAlloc {
                        name: name.clone(),
                        pos,
                    });
                }
                // Slot already reserved by the locals pre-pass.
                Ok(())
            }
            InstKind::BinOp {
                name,
                op,
                ty,
                lhs,
                rhs,
            } => self.emit_binop(name, *op, ty, lhs, rhs, pos),
            InstKind::UnOp {
                name,
                op,
                ty,
                operand,
            } => self.emit_unop(name, *op, ty, operand, pos),
            InstKind::IndexAddr {
                name,
                ty,
                base,
                index,
            } => self.emit_index_addr(name, ty, base, index, pos),
            InstKind::Jump { target } => self.emit_jump(block.index, *target, pos),
            InstKind::Branch {
                cond,
                then_block,
                else_block,
            } => {
                if block.succs.len() != 2 {
                    panic!(
                        "codegen: conditional branch in block {} with {} successors",
                        block.index,
                        block.succs.len()
                    );
                }
                self.emit_branch(block.index, cond, *then_block, *else_block, pos)
            }
            InstKind::Phi { name, ty, .. } => {
                // Realized by edge-copies at the branch sites; only the
                // destination slot is materialized here.
                self.names.ensure_slot(name, ty, self.vectors);
                Ok(())
            }
            InstKind::Return { values } => self.emit_return(values, pos),
            InstKind::Store { addr, value } => self.emit_store(addr, value, pos),
            InstKind::Opaque { what } => {
                self.push_inst(AsmLine::Comment(format!("unsupported: {}", what)));
                Ok(())
            }
        }
    }

    fn emit_binop(
        &mut self,
        name: &str,
        op: BinOp,
        ty: &StaticType,
        lhs: &Operand,
        rhs: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        self.names.ensure_slot(name, ty, self.vectors);
        match op.family() {
            OpFamily::Cmp => self.emit_cmp(name, op, ty, lhs, rhs, pos),
            OpFamily::Arith | OpFamily::Bitwise => match op {
                BinOp::Div | BinOp::Rem => self.emit_divmod(name, op, ty, lhs, rhs, pos),
                BinOp::Shl | BinOp::Shr => self.emit_shift(name, op, ty, lhs, rhs, pos),
                BinOp::AndNot => self.emit_andnot(name, ty, lhs, rhs, pos),
                _ => {
                    let alu = match op {
                        BinOp::Add => Op::Add,
                        BinOp::Sub => Op::Sub,
                        BinOp::Mul => Op::Mul,
                        BinOp::And => Op::And,
                        BinOp::Or => Op::Or,
                        BinOp::Xor => Op::Xor,
                        _ => unreachable!(),
                    };
                    let l = self.load_into(lhs, pos)?;
                    let r = match self.load_into(rhs, pos) {
                        Ok(r) => r,
                        Err(e) => {
                            self.pool.free(l);
                            return Err(e);
                        }
                    };
                    let result = self
                        .emit(alu, Width::Q, &[reg_in(r), reg_inout(l)], pos)
                        .and_then(|_| self.store_result(name, ty, l, pos));
                    self.pool.free(l);
                    self.pool.free(r);
                    result
                }
            },
        }
    }

    /// Division claims AX/DX: the dividend is widened into DX:AX (CQO for
    /// signed, a zeroed DX for unsigned), the quotient lands in AX and the
    /// remainder in DX.
    fn emit_divmod(
        &mut self,
        name: &str,
        op: BinOp,
        ty: &StaticType,
        lhs: &Operand,
        rhs: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let ax = self.pool.allocate_named("AX");
        let dx = self.pool.allocate_named("DX");
        let result = self.load_operand_into(ax, lhs, pos).and_then(|_| {
            let r = self.load_into(rhs, pos)?;
            let signed = ty.is_signed();
            let result = if signed {
                self.emit(Op::Cqo, Width::Q, &[], pos)
            } else {
                self.emit(Op::Mov, Width::Q, &[imm(0), reg_out(dx)], pos)
            }
            .and_then(|_| {
                let div = if signed { Op::DivS } else { Op::DivU };
                self.emit(div, Width::Q, &[reg_in(r)], pos)
            })
            .and_then(|_| {
                let out = if op == BinOp::Rem { dx } else { ax };
                self.store_result(name, ty, out, pos)
            });
            self.pool.free(r);
            result
        });
        self.pool.free(ax);
        self.pool.free(dx);
        result
    }

    /// Variable shift counts claim CX; constant counts encode as immediates.
    fn emit_shift(
        &mut self,
        name: &str,
        op: BinOp,
        ty: &StaticType,
        lhs: &Operand,
        rhs: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let shift = match op {
            BinOp::Shl => Op::Shl,
            _ if ty.is_signed() => Op::ShrS,
            _ => Op::ShrU,
        };
        if let Operand::Const { value, .. } = rhs {
            let l = self.load_into(lhs, pos)?;
            let result = self
                .emit(shift, Width::Q, &[imm(*value), reg_inout(l)], pos)
                .and_then(|_| self.store_result(name, ty, l, pos));
            self.pool.free(l);
            return result;
        }
        let cx = self.pool.allocate_named("CX");
        let result = self.load_operand_into(cx, rhs, pos).and_then(|_| {
            let l = self.load_into(lhs, pos)?;
            let result = self
                .emit(shift, Width::Q, &[reg_in(cx), reg_inout(l)], pos)
                .and_then(|_| self.store_result(name, ty, l, pos));
            self.pool.free(l);
            result
        });
        self.pool.free(cx);
        result
    }

    fn emit_andnot(
        &mut self,
        name: &str,
        ty: &StaticType,
        lhs: &Operand,
        rhs: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let l = self.load_into(lhs, pos)?;
        let r = match self.load_into(rhs, pos) {
            Ok(r) => r,
            Err(e) => {
                self.pool.free(l);
                return Err(e);
            }
        };
        let result = self
            .emit(Op::Not, Width::Q, &[reg_inout(r)], pos)
            .and_then(|_| self.emit(Op::And, Width::Q, &[reg_in(r), reg_inout(l)], pos))
            .and_then(|_| self.store_result(name, ty, l, pos));
        self.pool.free(l);
        self.pool.free(r);
        result
    }

    /// Comparisons set flags at full word width, capture the condition into
    /// the low byte, then zero-extend so the stored result is a canonical
    /// 0/1 word.
    fn emit_cmp(
        &mut self,
        name: &str,
        op: BinOp,
        ty: &StaticType,
        lhs: &Operand,
        rhs: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let signed = lhs.ty().is_signed();
        let cond = match op {
            BinOp::Eq => Cond::Eq,
            BinOp::Ne => Cond::Ne,
            BinOp::Lt if signed => Cond::Lt,
            BinOp::Lt => Cond::Below,
            BinOp::Le if signed => Cond::Le,
            BinOp::Le => Cond::BelowEq,
            BinOp::Gt if signed => Cond::Gt,
            BinOp::Gt => Cond::Above,
            BinOp::Ge if signed => Cond::Ge,
            BinOp::Ge => Cond::AboveEq,
            _ => unreachable!(),
        };
        let l = self.load_into(lhs, pos)?;
        let r = match self.load_into(rhs, pos) {
            Ok(r) => r,
            Err(e) => {
                self.pool.free(l);
                return Err(e);
            }
        };
        let result = self
            .emit(Op::Cmp, Width::Q, &[reg_in(l), reg_in(r)], pos)
            .and_then(|_| self.emit(Op::Set(cond), Width::B, &[reg_out(l)], pos))
            .and_then(|_| self.emit(Op::MovZx, Width::B, &[reg_in(l), reg_out(l)], pos))
            .and_then(|_| self.store_result(name, ty, l, pos));
        self.pool.free(l);
        self.pool.free(r);
        result
    }

    fn emit_unop(
        &mut self,
        name: &str,
        op: UnOp,
        ty: &StaticType,
        operand: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        if op == UnOp::Deref {
            return self.emit_deref(name, ty, operand, pos);
        }
        self.names.ensure_slot(name, ty, self.vectors);
        let reg = self.load_into(operand, pos)?;
        let result = match op {
            // Canonical booleans flip in the lowest bit.
            UnOp::Not => self.emit(Op::Xor, Width::Q, &[imm(1), reg_inout(reg)], pos),
            UnOp::BitNot => self.emit(Op::Not, Width::Q, &[reg_inout(reg)], pos),
            UnOp::Neg => self.emit(Op::Neg, Width::Q, &[reg_inout(reg)], pos),
            UnOp::Deref => unreachable!(),
        }
        .and_then(|_| self.store_result(name, ty, reg, pos));
        self.pool.free(reg);
        result
    }

    /// Indirect load: the pointer into an address register, then the pointee
    /// through it in chunks.
    fn emit_deref(
        &mut self,
        name: &str,
        ty: &StaticType,
        operand: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        if !operand.ty().is_pointer() {
            panic!("codegen: dereference of non-pointer `{}`", operand.ty());
        }
        self.names.ensure_slot(name, ty, self.vectors);
        let dst = self.slot_of(name);
        let size = size_of(ty, self.vectors);
        let ptr = self.load_into(operand, pos)?;
        let mut offset = 0;
        while offset < size {
            let width = super::load_store::chunk_width(size - offset);
            let val = self.pool.allocate(RegClass::Data, WORD_SIZE);
            let result = self
                .emit(Op::Mov, width, &[ind_in(ptr, offset), reg_out(val)], pos)
                .and_then(|_| {
                    self.emit(
                        Op::Mov,
                        width,
                        &[reg_in(val), mem_out(name, dst.offset + offset, dst.base())],
                        pos,
                    )
                });
            self.pool.free(val);
            if let Err(e) = result {
                self.pool.free(ptr);
                return Err(e);
            }
            offset += width.bytes();
        }
        self.pool.free(ptr);
        Ok(())
    }

    /// Address of `base[index]`. Stack-backed bases take their element
    /// address with LEA; pointer and slice bases first load the pointer
    /// value held in the binding.
    fn emit_index_addr(
        &mut self,
        name: &str,
        ty: &StaticType,
        base: &str,
        index: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        self.names.ensure_slot(name, ty, self.vectors);
        let dst = self.slot_of(name);
        let base_slot = self.slot_of(base);
        let base_ty = self
            .names
            .type_of(base)
            .unwrap_or_else(|e| panic!("codegen: {}", e))
            .clone();
        // A pointer-typed binding holds an address, and a slice binding
        // starts with its data pointer; both must be loaded before scaling.
        // Only a non-pointer binding is the element storage itself.
        let (elem_ty, through_ptr) = match &base_ty {
            StaticType::Ptr(inner) => (inner.as_ref().clone(), true),
            StaticType::Slice(_) => (base_ty.clone(), true),
            other => (other.clone(), false),
        };
        let elem = elem_size_of(&elem_ty, self.vectors);

        let addr = self.pool.allocate(RegClass::Addr, WORD_SIZE);
        let result = match index {
            Operand::Const { value, .. } => {
                let scaled = (*value as usize) * elem;
                if through_ptr {
                    self.emit(
                        Op::Mov,
                        Width::Q,
                        &[
                            mem_in(base, base_slot.offset, base_slot.base()),
                            reg_out(addr),
                        ],
                        pos,
                    )
                    .and_then(|_| {
                        if scaled == 0 {
                            Ok(())
                        } else {
                            self.emit(
                                Op::Add,
                                Width::Q,
                                &[imm(scaled as i64), reg_inout(addr)],
                                pos,
                            )
                        }
                    })
                } else {
                    self.emit(
                        Op::Lea,
                        Width::Q,
                        &[
                            mem_in(base, base_slot.offset + scaled, base_slot.base()),
                            reg_out(addr),
                        ],
                        pos,
                    )
                }
            }
            Operand::Var { .. } => {
                let idx = match self.load_into(index, pos) {
                    Ok(idx) => idx,
                    Err(e) => {
                        self.pool.free(addr);
                        return Err(e);
                    }
                };
                let result = if through_ptr {
                    self.emit(
                        Op::Mov,
                        Width::Q,
                        &[
                            mem_in(base, base_slot.offset, base_slot.base()),
                            reg_out(addr),
                        ],
                        pos,
                    )
                } else {
                    self.emit(
                        Op::Lea,
                        Width::Q,
                        &[
                            mem_in(base, base_slot.offset, base_slot.base()),
                            reg_out(addr),
                        ],
                        pos,
                    )
                }
                .and_then(|_| {
                    self.emit(Op::Mul, Width::Q, &[imm(elem as i64), reg_inout(idx)], pos)
                })
                .and_then(|_| self.emit(Op::Add, Width::Q, &[reg_in(idx), reg_inout(addr)], pos));
                self.pool.free(idx);
                result
            }
        }
        .and_then(|_| {
            self.emit(
                Op::Mov,
                Width::Q,
                &[reg_in(addr), mem_out(name, dst.offset, dst.base())],
                pos,
            )
        });
        self.pool.free(addr);
        result
    }

    fn emit_jump(&mut self, from: usize, target: usize, pos: Position) -> Result<(), CodegenError> {
        self.emit_edge_copies(from, target, pos)?;
        self.emit(Op::Jmp, Width::Q, &[label(&asm::block_label(target))], pos)
    }

    /// Both arms' copies are emitted, each immediately before its jump, so
    /// only the taken edge's copies execute.
    fn emit_branch(
        &mut self,
        from: usize,
        cond: &str,
        then_block: usize,
        else_block: usize,
        pos: Position,
    ) -> Result<(), CodegenError> {
        self.emit_edge_copies(from, else_block, pos)?;
        let cond_ty = self
            .names
            .type_of(cond)
            .unwrap_or_else(|e| panic!("codegen: {}", e))
            .clone();
        let cond_op = Operand::Var {
            name: cond.to_string(),
            ty: cond_ty,
        };
        let reg = self.load_into(&cond_op, pos)?;
        let result = self.emit(Op::Cmp, Width::Q, &[reg_in(reg), imm(0)], pos);
        self.pool.free(reg);
        result?;
        self.emit(
            Op::Jcc(Cond::Eq),
            Width::Q,
            &[label(&asm::block_label(else_block))],
            pos,
        )?;
        self.emit_edge_copies(from, then_block, pos)?;
        self.emit(
            Op::Jmp,
            Width::Q,
            &[label(&asm::block_label(then_block))],
            pos,
        )
    }

    fn emit_edge_copies(
        &mut self,
        pred: usize,
        succ: usize,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let copies: Vec<EdgeCopy> = self.plan.copies(pred, succ).to_vec();
        for copy in &copies {
            self.names.ensure_slot(&copy.dst, &copy.ty, self.vectors);
            self.copy_operand_to(&copy.src, &copy.dst, pos)?;
        }
        Ok(())
    }

    fn emit_return(&mut self, values: &[Operand], pos: Position) -> Result<(), CodegenError> {
        if values.len() > 1 {
            return Err(CodegenError::MultiValueReturn {
                count: values.len(),
                pos,
            });
        }
        // Frame size is unknown until all blocks are emitted; the reset is
        // resolved during rendering.
        self.push_inst(AsmLine::SpReset);
        if let Some(value) = values.first() {
            self.copy_operand_to(value, super::RET_SLOT, pos)?;
        }
        self.emit(Op::Ret, Width::Q, &[], pos)
    }

    /// Store through a bound name: a pointer-typed binding is an indirect
    /// destination, anything else is the storage itself.
    fn emit_store(
        &mut self,
        addr: &str,
        value: &Operand,
        pos: Position,
    ) -> Result<(), CodegenError> {
        let size = size_of(value.ty(), self.vectors);
        if size % WORD_SIZE != 0 {
            return Err(CodegenError::UnalignedStore { size, pos });
        }
        let addr_slot = self.slot_of(addr);
        let addr_ty = self
            .names
            .type_of(addr)
            .unwrap_or_else(|e| panic!("codegen: {}", e))
            .clone();
        if !addr_ty.is_pointer() {
            return self.copy_operand_to(value, addr, pos);
        }

        let ptr = self.pool.allocate(RegClass::Addr, WORD_SIZE);
        let result = self
            .emit(
                Op::Mov,
                Width::Q,
                &[
                    mem_in(addr, addr_slot.offset, addr_slot.base()),
                    reg_out(ptr),
                ],
                pos,
            )
            .and_then(|_| self.store_chunks_through(ptr, value, size, pos));
        self.pool.free(ptr);
        result
    }

    fn store_chunks_through(
        &mut self,
        ptr: Register,
        value: &Operand,
        size: usize,
        pos: Position,
    ) -> Result<(), CodegenError> {
        if size <= WORD_SIZE {
            let val = self.load_into(value, pos)?;
            let result = self.emit(
                Op::Mov,
                Width::Q,
                &[reg_in(val), ind_out(ptr, 0)],
                pos,
            );
            self.pool.free(val);
            return result;
        }
        let Operand::Var { name, .. } = value else {
            panic!("codegen: constant operand of {} bytes", size);
        };
        let src_slot = self.slot_of(name);
        let mut offset = 0;
        while offset < size {
            let val = self.pool.allocate(RegClass::Data, WORD_SIZE);
            let result = self
                .emit(
                    Op::Mov,
                    Width::Q,
                    &[
                        mem_in(name, src_slot.offset + offset, src_slot.base()),
                        reg_out(val),
                    ],
                    pos,
                )
                .and_then(|_| self.emit(Op::Mov, Width::Q, &[reg_in(val), ind_out(ptr, offset)], pos));
            self.pool.free(val);
            result?;
            offset += WORD_SIZE;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/t_insts.rs"]
mod tests;
