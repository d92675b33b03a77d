//! Machine operands: the tagged union every `MirInstruction` slot holds.

use crate::entities::{BlockId, StackObjId};
use crate::reg::RegId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRef {
    pub base: Option<RegId>,
    pub index: Option<RegId>,
    pub scale: u32,
    pub displacement: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    Int(i64),
    FloatBits(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirOperand {
    Register(RegId),
    Const(ConstValue),
    BasicBlock(BlockId),
    StackObject(StackObjId),
    MemoryRef(MemoryRef),
    ExternalSymbol(String),
    /// Reserved: module-scope data not yet surfaced at the instruction level.
    GlobalVariable(String),
}

impl MirOperand {
    pub fn reg(id: RegId) -> Self {
        MirOperand::Register(id)
    }

    pub fn int(v: i64) -> Self {
        MirOperand::Const(ConstValue::Int(v))
    }

    pub fn as_reg(&self) -> Option<RegId> {
        match self {
            MirOperand::Register(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_memory_ref(&self) -> Option<&MemoryRef> {
        match self {
            MirOperand::MemoryRef(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, MirOperand::MemoryRef(_))
    }

    /// Registers read by this operand when it appears as a memory
    /// reference (base/index); registers appearing directly as the whole
    /// operand are defs or uses depending on the instruction's role, not
    /// this method's business.
    pub fn memory_regs(&self) -> smallvec::SmallVec<[RegId; 2]> {
        let mut regs = smallvec::SmallVec::new();
        if let MirOperand::MemoryRef(m) = self {
            if let Some(b) = m.base {
                regs.push(b);
            }
            if let Some(i) = m.index {
                regs.push(i);
            }
        }
        regs
    }
}

pub fn mem(base: Option<RegId>, index: Option<RegId>, scale: u32, displacement: i32) -> MirOperand {
    MirOperand::MemoryRef(MemoryRef { base, index, scale, displacement })
}
