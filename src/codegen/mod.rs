//! Function assembler: drives the whole lowering pipeline for one function.
//!
//! Pipeline order is fixed: parameter layout, return-slot binding, zeroing
//! code for the return slot and declared locals, the phi pre-pass, block
//! emission, then zeroing for locals synthesized during emission. The frame
//! size is only known after all of that, so the emitted header and the
//! stack-pointer resets are resolved in a final rendering step.

mod insts;
mod load_store;

use crate::asm::{self, AsmLine};
use crate::binding::{NameTable, Origin, Slot};
use crate::diag::{CodegenError, Position};
use crate::encoding::InstrTable;
use crate::phi::EdgeCopyPlan;
use crate::regs::RegisterPool;
use crate::ssa::SsaFunction;
use crate::types::{StaticType, size_of};
use crate::vector::VectorRegistry;

/// Name binding the return slot. The tilde keeps it out of the SSA
/// namespace.
pub const RET_SLOT: &str = "~ret";

/// Lowers one SSA function to its final text block.
pub fn assemble_function(
    func: &SsaFunction,
    vectors: &VectorRegistry,
) -> Result<String, CodegenError> {
    FuncAssembler::new(func, vectors).run()
}

pub struct FuncAssembler<'a> {
    ssa: &'a SsaFunction,
    vectors: &'a VectorRegistry,
    instrs: InstrTable,
    pool: RegisterPool,
    names: NameTable,
    plan: EdgeCopyPlan,
    /// Zeroing for the return slot and declared locals; precedes the body.
    zero_lines: Vec<AsmLine>,
    /// Zeroing for locals synthesized during block emission.
    late_zero_lines: Vec<AsmLine>,
    body: Vec<AsmLine>,
}

impl<'a> FuncAssembler<'a> {
    pub fn new(ssa: &'a SsaFunction, vectors: &'a VectorRegistry) -> Self {
        Self {
            ssa,
            vectors,
            instrs: InstrTable::new(),
            pool: RegisterPool::new(),
            names: NameTable::new(),
            plan: EdgeCopyPlan::default(),
            zero_lines: Vec::new(),
            late_zero_lines: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn run(&mut self) -> Result<String, CodegenError> {
        self.layout_params()?;
        self.bind_ret()?;
        self.zero_ret()?;
        self.zero_declared_locals()?;
        self.plan = EdgeCopyPlan::build(self.ssa);
        let ssa = self.ssa;
        for block in &ssa.blocks {
            self.emit_block(block)?;
        }
        self.zero_synthesized_locals()?;
        Ok(self.finish())
    }

    /// Text produced so far, with the frame size as currently known. After a
    /// failed [`run`](Self::run) this is the diagnostic view of the partial
    /// function.
    pub fn partial(&self) -> String {
        self.finish()
    }

    pub fn pool(&self) -> &RegisterPool {
        &self.pool
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Parameters occupy raw-sized slots at increasing FP offsets, in
    /// declaration order.
    fn layout_params(&mut self) -> Result<(), CodegenError> {
        let mut offset = 0;
        for param in &self.ssa.params {
            match &param.ty {
                StaticType::Bool | StaticType::Int { .. } | StaticType::Ptr(_)
                | StaticType::Slice(_) => {}
                other => {
                    return Err(CodegenError::UnsupportedParamType {
                        name: param.name.clone(),
                        ty: other.to_string(),
                        pos: param.pos,
                    });
                }
            }
            let size = size_of(&param.ty, self.vectors);
            self.names
                .bind_param(&param.name, param.ty.clone(), offset, size);
            offset += size;
        }
        Ok(())
    }

    /// The return slot sits right after the parameter block, also FP-based.
    fn bind_ret(&mut self) -> Result<(), CodegenError> {
        let Some(ret) = &self.ssa.ret else {
            return Ok(());
        };
        let size = size_of(ret, self.vectors);
        self.names
            .bind_param(RET_SLOT, ret.clone(), self.params_size(), size);
        Ok(())
    }

    fn zero_ret(&mut self) -> Result<(), CodegenError> {
        if self.ssa.ret.is_none() {
            return Ok(());
        }
        let slot = self.slot_of(RET_SLOT);
        let lines = self.zero_lines_for(RET_SLOT, slot, Position::default())?;
        self.zero_lines.extend(lines);
        Ok(())
    }

    fn zero_declared_locals(&mut self) -> Result<(), CodegenError> {
        for local in &self.ssa.locals {
            if local.heap {
                return Err(CodegenError::HeapAlloc {
                    name: local.name.clone(),
                    pos: local.pos,
                });
            }
            let size = size_of(&local.ty, self.vectors);
            let slot = self
                .names
                .bind_local(&local.name, local.ty.clone(), size, Origin::SsaLocal);
            let lines = self.zero_lines_for(&local.name, slot, local.pos)?;
            self.zero_lines.extend(lines);
        }
        Ok(())
    }

    fn zero_synthesized_locals(&mut self) -> Result<(), CodegenError> {
        let synthesized: Vec<(String, Slot)> = self
            .names
            .locals_with_origin(Origin::Synthesized)
            .map(|(name, slot)| (name.to_string(), slot))
            .collect();
        for (name, slot) in synthesized {
            let lines = self.zero_lines_for(&name, slot, Position::default())?;
            self.late_zero_lines.extend(lines);
        }
        Ok(())
    }

    fn finish(&self) -> String {
        let frame_size = self.names.locals_size();
        let mut lines = Vec::with_capacity(
            self.zero_lines.len() + self.late_zero_lines.len() + self.body.len(),
        );
        lines.extend_from_slice(&self.zero_lines);
        lines.extend_from_slice(&self.late_zero_lines);
        lines.extend_from_slice(&self.body);
        format!(
            "TEXT ·{}(SB),NOSPLIT,${}-{}\n{}",
            self.ssa.name,
            frame_size,
            self.params_size() + self.ret_size(),
            asm::render(&lines, frame_size)
        )
    }

    fn params_size(&self) -> usize {
        self.ssa
            .params
            .iter()
            .map(|p| size_of(&p.ty, self.vectors))
            .sum()
    }

    fn ret_size(&self) -> usize {
        self.ssa
            .ret
            .as_ref()
            .map(|ty| size_of(ty, self.vectors))
            .unwrap_or(0)
    }

    fn slot_of(&self, name: &str) -> Slot {
        self.names
            .slot(name)
            .unwrap_or_else(|e| panic!("codegen: {}", e))
    }
}

#[cfg(test)]
#[path = "../tests/t_codegen.rs"]
mod tests;
