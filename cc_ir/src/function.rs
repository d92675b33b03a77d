//! Functions: a typed argument list plus an owned sequence of basic blocks.
//!
//! A function with an empty `blocks` list is a declaration (external symbol,
//! no body); one with at least one block is a definition whose first block
//! is the entry point. This mirrors how the module printer and the MIR
//! lowering step distinguish "define" from "declare".

use smallvec::SmallVec;

use crate::entities::{ArgRef, BlockRef, TypeId, UseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Visible outside the module; the common case for a compiled function.
    External,
    /// Only referenced within this module; candidate for more aggressive
    /// inlining/dead-code elimination.
    Internal,
}

#[derive(Debug, Clone)]
pub struct ArgData {
    pub func: crate::entities::FuncRef,
    pub ty: TypeId,
    pub index: u32,
    pub use_head: Option<UseId>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub ty: TypeId,
    pub linkage: Linkage,
    pub params: SmallVec<[ArgRef; 4]>,
    pub blocks: Vec<BlockRef>,
    pub use_head: Option<UseId>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Option<BlockRef> {
        self.blocks.first().copied()
    }
}
