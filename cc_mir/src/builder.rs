//! Instruction-level MIR builder: one `build_*` method per opcode, mirroring
//! `cc_ir::builder::Builder`'s shape but against a single `MirFunction`
//! rather than a whole-module `Context` (MIR instructions carry no use-list,
//! so there is no cross-entity bookkeeping to thread through here).

use smallvec::SmallVec;

use crate::entities::BlockId;
use crate::function::MirFunction;
use crate::instruction::{ConditionCode, MirInstruction, Opcode};
use crate::operand::MirOperand;

pub struct MirBuilder<'a> {
    pub func: &'a mut MirFunction,
    block: BlockId,
}

impl<'a> MirBuilder<'a> {
    pub fn new(func: &'a mut MirFunction, block: BlockId) -> Self {
        Self { func, block }
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.block
    }

    fn emit(&mut self, opcode: Opcode, operands: &[MirOperand]) -> crate::entities::InstId {
        let id = self.func.insts.push(MirInstruction {
            opcode,
            operands: SmallVec::from_slice(operands),
            block: self.block,
        });
        self.func.block_arena[self.block].insts.push(id);
        id
    }

    fn binop(&mut self, opcode: Opcode, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.emit(opcode, &[dst, src])
    }

    pub fn build_mov(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Mov, dst, src)
    }
    pub fn build_movsx(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::MovSx, dst, src)
    }
    pub fn build_movzx(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::MovZx, dst, src)
    }
    pub fn build_add(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Add, dst, src)
    }
    pub fn build_sub(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Sub, dst, src)
    }
    pub fn build_imul(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::IMul, dst, src)
    }
    pub fn build_and(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::And, dst, src)
    }
    pub fn build_or(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Or, dst, src)
    }
    pub fn build_xor(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Xor, dst, src)
    }
    pub fn build_sar(&mut self, dst: MirOperand, shift: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Sar, dst, shift)
    }
    pub fn build_shr(&mut self, dst: MirOperand, shift: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Shr, dst, shift)
    }
    pub fn build_shl(&mut self, dst: MirOperand, shift: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Shl, dst, shift)
    }
    pub fn build_lea(&mut self, dst: MirOperand, src: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Lea, dst, src)
    }
    pub fn build_cmp(&mut self, lhs: MirOperand, rhs: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Cmp, lhs, rhs)
    }
    pub fn build_test(&mut self, lhs: MirOperand, rhs: MirOperand) -> crate::entities::InstId {
        self.binop(Opcode::Test, lhs, rhs)
    }

    pub fn build_idiv(&mut self, divisor: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::IDiv, &[divisor])
    }
    pub fn build_div(&mut self, divisor: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::Div, &[divisor])
    }
    pub fn build_push(&mut self, op: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::Push, &[op])
    }
    pub fn build_pop(&mut self, op: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::Pop, &[op])
    }
    pub fn build_cdq(&mut self) -> crate::entities::InstId {
        self.emit(Opcode::Cdq, &[])
    }
    pub fn build_cqo(&mut self) -> crate::entities::InstId {
        self.emit(Opcode::Cqo, &[])
    }
    pub fn build_call(&mut self, target: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::Call, &[target])
    }
    pub fn build_ret(&mut self, value: Option<MirOperand>) -> crate::entities::InstId {
        match value {
            Some(v) => self.emit(Opcode::Ret, &[v]),
            None => self.emit(Opcode::Ret, &[]),
        }
    }
    pub fn build_jmp(&mut self, target: BlockId) -> crate::entities::InstId {
        self.emit(Opcode::Jmp, &[MirOperand::BasicBlock(target)])
    }
    pub fn build_jcc(&mut self, cc: ConditionCode, target: BlockId) -> crate::entities::InstId {
        self.emit(Opcode::Jcc(cc), &[MirOperand::BasicBlock(target)])
    }
    pub fn build_setcc(&mut self, cc: ConditionCode, dst: MirOperand) -> crate::entities::InstId {
        self.emit(Opcode::SetCc(cc), &[dst])
    }
    pub fn build_phi(&mut self, dst: MirOperand, incoming: &[MirOperand]) -> crate::entities::InstId {
        let mut operands = SmallVec::from_slice(&[dst]);
        operands.extend_from_slice(incoming);
        self.emit(Opcode::Phi, &operands)
    }
}
