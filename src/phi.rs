//! Phi pre-pass: flattens every phi node into per-edge copies.
//!
//! A phi contributes one copy per incoming edge, keyed by (predecessor,
//! successor). Branch lowering replays the copies for the edge it is about to
//! take, so at runtime only the taken edge's copies execute.

use indexmap::IndexMap;

use crate::ssa::{InstKind, Operand, SsaFunction};
use crate::types::StaticType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCopy {
    /// Phi destination name.
    pub dst: String,
    pub ty: StaticType,
    pub src: Operand,
}

#[derive(Debug, Default, Clone)]
pub struct EdgeCopyPlan {
    copies: IndexMap<(usize, usize), Vec<EdgeCopy>>,
}

impl EdgeCopyPlan {
    /// Scans all blocks for phis. Edge `i` of a phi pairs with predecessor
    /// `i` of its block; a count mismatch is a malformed graph.
    pub fn build(func: &SsaFunction) -> Self {
        let mut plan = Self::default();
        for block in &func.blocks {
            for inst in &block.insts {
                let InstKind::Phi { name, ty, edges } = &inst.kind else {
                    continue;
                };
                if edges.len() != block.preds.len() {
                    panic!(
                        "codegen: phi `{}` has {} edges for {} predecessors of block {}",
                        name,
                        edges.len(),
                        block.preds.len(),
                        block.index
                    );
                }
                for (pred, src) in block.preds.iter().zip(edges) {
                    plan.copies
                        .entry((*pred, block.index))
                        .or_default()
                        .push(EdgeCopy {
                            dst: name.clone(),
                            ty: ty.clone(),
                            src: src.clone(),
                        });
                }
            }
        }
        plan
    }

    pub fn copies(&self, pred: usize, succ: usize) -> &[EdgeCopy] {
        self.copies
            .get(&(pred, succ))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "tests/t_phi.rs"]
mod tests;
