//! Instruction opcodes and the per-instruction data record.
//!
//! Operands that are genuine SSA values (constants, arguments, other
//! instructions, globals, functions) go through `Use` edges in `operands`
//! so RAUW and the use-list invariant cover them. Branch targets are not
//! routed through the use-list: the CFG is maintained directly via
//! `successors` here and the mirrored `preds` list on `BasicBlock`, which is
//! both simpler and cheaper for the passes (`simplify_cfg`, `reorder_blocks`,
//! ...) that only ever need "successors of this block" / "predecessors of
//! that block", never "is this block used as a value".

use smallvec::SmallVec;

use crate::entities::{BlockRef, ConstId, TypeId, UseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ICmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl ICmpPred {
    pub fn is_signed(self) -> bool {
        matches!(self, ICmpPred::Slt | ICmpPred::Sle | ICmpPred::Sgt | ICmpPred::Sge)
    }

    /// The predicate obtained by swapping the two operands.
    pub fn swapped(self) -> ICmpPred {
        match self {
            ICmpPred::Eq => ICmpPred::Eq,
            ICmpPred::Ne => ICmpPred::Ne,
            ICmpPred::Slt => ICmpPred::Sgt,
            ICmpPred::Sle => ICmpPred::Sge,
            ICmpPred::Sgt => ICmpPred::Slt,
            ICmpPred::Sge => ICmpPred::Sle,
            ICmpPred::Ult => ICmpPred::Ugt,
            ICmpPred::Ule => ICmpPred::Uge,
            ICmpPred::Ugt => ICmpPred::Ult,
            ICmpPred::Uge => ICmpPred::Ule,
        }
    }

    pub fn negated(self) -> ICmpPred {
        match self {
            ICmpPred::Eq => ICmpPred::Ne,
            ICmpPred::Ne => ICmpPred::Eq,
            ICmpPred::Slt => ICmpPred::Sge,
            ICmpPred::Sle => ICmpPred::Sgt,
            ICmpPred::Sgt => ICmpPred::Sle,
            ICmpPred::Sge => ICmpPred::Slt,
            ICmpPred::Ult => ICmpPred::Uge,
            ICmpPred::Ule => ICmpPred::Ugt,
            ICmpPred::Ugt => ICmpPred::Ule,
            ICmpPred::Uge => ICmpPred::Ult,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FCmpPred {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    ICmp(ICmpPred),
    FCmp(FCmpPred),
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToSi,
    FpToUi,
    SiToFp,
    UiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
    /// Allocates stack storage for one value of the given type; the
    /// instruction's own type is always `pointer(alloc_ty)`.
    Alloca { alloc_ty: TypeId },
    Load,
    Store,
    /// `operands[0]` is the base pointer, `operands[1..]` the indices.
    Gep { inbounds: bool },
    Br,
    CondBr,
    /// `successors[0]` is the default target; `switch_values[i]` pairs with
    /// `successors[i + 1]`.
    Switch,
    Ret,
    Unreachable,
    /// `operands[i]` pairs with `phi_incoming[i]`.
    Phi,
    Call { vararg: bool },
    Select,
}

impl Opcode {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Br | Opcode::CondBr | Opcode::Switch | Opcode::Ret | Opcode::Unreachable)
    }

    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Opcode::Store | Opcode::Call { .. } | Opcode::Alloca { .. } | Opcode::Load
        ) || self.is_terminator()
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Result type. Void for instructions with no result (`Store`, `Br`,
    /// `Ret`, ...).
    pub ty: TypeId,
    pub block: BlockRef,
    pub operands: SmallVec<[UseId; 4]>,
    pub successors: SmallVec<[BlockRef; 2]>,
    pub phi_incoming: SmallVec<[BlockRef; 4]>,
    pub switch_values: SmallVec<[ConstId; 4]>,
    pub use_head: Option<UseId>,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    pub fn has_result(&self, void_ty: TypeId) -> bool {
        self.ty != void_ty
    }
}
