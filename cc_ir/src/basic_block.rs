//! Basic blocks: an ordered instruction list plus a cached predecessor set.
//!
//! Successors are read off the block's terminator (`Instruction::successors`)
//! rather than cached here, so there is exactly one place that can go stale.
//! Predecessors are cached because maintaining them incrementally (`add_use`
//! in spirit) is cheap and every pass that walks the CFG backwards
//! (`simplify_cfg`, the liveness-adjacent dominator computation in
//! `reorder_blocks`) would otherwise have to rescan every block's terminator.

use smallvec::SmallVec;

use crate::entities::{BlockRef, FuncRef, InstRef};

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub func: Option<FuncRef>,
    pub insts: Vec<InstRef>,
    pub preds: SmallVec<[BlockRef; 4]>,
}

impl BasicBlock {
    pub fn new(func: FuncRef) -> Self {
        Self { func: Some(func), insts: Vec::new(), preds: SmallVec::new() }
    }

    pub fn terminator(&self) -> Option<InstRef> {
        self.insts.last().copied()
    }

    pub fn add_pred(&mut self, pred: BlockRef) {
        self.preds.push(pred);
    }

    pub fn remove_pred(&mut self, pred: BlockRef) {
        if let Some(pos) = self.preds.iter().position(|&p| p == pred) {
            self.preds.remove(pos);
        }
    }

    /// Number of phi instructions at the head of the block; phis must
    /// precede every non-phi instruction (arity invariant in the data
    /// model).
    pub fn phi_count(&self, is_phi: impl Fn(InstRef) -> bool) -> usize {
        self.insts.iter().take_while(|&&i| is_phi(i)).count()
    }
}
