//! Per-opcode def/use extraction: the table the rest of the allocator's
//! liveness and interference-graph construction is built on.

use smallvec::SmallVec;

use crate::instruction::{MirInstruction, Opcode};
use crate::operand::MirOperand;
use crate::reg::{HwReg, RegId, ARG_REGS, CALLER_SAVED_REGS};

pub type RegSet = SmallVec<[RegId; 4]>;

#[derive(Debug, Default)]
pub struct DefUse {
    pub defs: RegSet,
    pub uses: RegSet,
}

fn add_operand_use(uses: &mut RegSet, op: &MirOperand) {
    match op {
        MirOperand::Register(r) => uses.push(*r),
        MirOperand::MemoryRef(m) => {
            if let Some(b) = m.base {
                uses.push(b);
            }
            if let Some(i) = m.index {
                uses.push(i);
            }
        }
        _ => {}
    }
}

fn add_operand_def(defs: &mut RegSet, uses: &mut RegSet, op: &MirOperand) {
    match op {
        MirOperand::Register(r) => defs.push(*r),
        // A memory destination reads its address registers but defines no
        // register of its own.
        MirOperand::MemoryRef(_) => add_operand_use(uses, op),
        _ => {}
    }
}

/// Extracts the registers an instruction defines and uses. Ordering within
/// each list has no meaning; duplicates are harmless (the interference
/// graph and liveness sets this feeds are both set-like).
pub fn def_use(inst: &MirInstruction) -> DefUse {
    let mut du = DefUse::default();
    let ops = &inst.operands;

    match inst.opcode {
        Opcode::Mov | Opcode::MovSx | Opcode::MovZx => {
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
            add_operand_use(&mut du.uses, &ops[1]);
        }
        Opcode::Add | Opcode::Sub | Opcode::IMul | Opcode::Xor | Opcode::And | Opcode::Or => {
            add_operand_use(&mut du.uses, &ops[1]);
            // Destructive two-address form: the destination is both read and written.
            add_operand_use(&mut du.uses, &ops[0]);
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
        }
        Opcode::Sar | Opcode::Shr | Opcode::Shl => {
            add_operand_use(&mut du.uses, &ops[1]);
            add_operand_use(&mut du.uses, &ops[0]);
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
        }
        Opcode::Lea => {
            if let MirOperand::MemoryRef(m) = &ops[1] {
                if let Some(b) = m.base {
                    du.uses.push(b);
                }
                if let Some(i) = m.index {
                    du.uses.push(i);
                }
            }
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
        }
        Opcode::Cmp | Opcode::Test => {
            add_operand_use(&mut du.uses, &ops[0]);
            add_operand_use(&mut du.uses, &ops[1]);
        }
        Opcode::IDiv | Opcode::Div => {
            add_operand_use(&mut du.uses, &ops[0]);
            du.uses.push(HwReg::A.id());
            du.uses.push(HwReg::D.id());
            du.defs.push(HwReg::A.id());
            du.defs.push(HwReg::D.id());
        }
        Opcode::Cdq | Opcode::Cqo => {
            du.uses.push(HwReg::A.id());
            du.defs.push(HwReg::D.id());
        }
        Opcode::Push => {
            add_operand_use(&mut du.uses, &ops[0]);
        }
        Opcode::Pop => {
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
        }
        Opcode::Call => {
            if let Some(target) = ops.first() {
                add_operand_use(&mut du.uses, target);
            }
            // Conservative: every argument register is assumed live into
            // the call regardless of the callee's real arity. A
            // signature-aware version would only use the registers the
            // callee actually reads.
            for r in ARG_REGS {
                du.uses.push(r.id());
            }
            for r in CALLER_SAVED_REGS {
                du.defs.push(r.id());
            }
        }
        Opcode::Ret => {
            if let Some(v) = ops.first() {
                add_operand_use(&mut du.uses, v);
            }
            du.uses.push(HwReg::A.id());
        }
        Opcode::SetCc(_) => {
            add_operand_def(&mut du.defs, &mut du.uses, &ops[0]);
        }
        Opcode::Jmp | Opcode::Jcc(_) => {}
        Opcode::Phi => {
            if let Some(dst) = ops.first() {
                add_operand_def(&mut du.defs, &mut du.uses, dst);
            }
            for incoming in ops.iter().skip(1) {
                add_operand_use(&mut du.uses, incoming);
            }
        }
    }

    du
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BlockId;
    use crate::operand::mem;

    fn inst(opcode: Opcode, operands: &[MirOperand]) -> MirInstruction {
        MirInstruction { opcode, operands: operands.iter().cloned().collect(), block: BlockId::new(0) }
    }

    #[test]
    fn destructive_binop_uses_and_defines_its_destination() {
        let dst = RegId(1000);
        let src = RegId(1001);
        let i = inst(Opcode::Add, &[MirOperand::Register(dst), MirOperand::Register(src)]);
        let du = def_use(&i);
        assert_eq!(&du.defs[..], &[dst]);
        assert!(du.uses.contains(&dst));
        assert!(du.uses.contains(&src));
    }

    #[test]
    fn mov_only_defines_its_destination() {
        let dst = RegId(1000);
        let src = RegId(1001);
        let i = inst(Opcode::Mov, &[MirOperand::Register(dst), MirOperand::Register(src)]);
        let du = def_use(&i);
        assert_eq!(&du.defs[..], &[dst]);
        assert_eq!(&du.uses[..], &[src]);
    }

    #[test]
    fn memory_operand_contributes_uses_not_defs() {
        let base = RegId(1000);
        let index = RegId(1001);
        let value = RegId(1002);
        let dst = mem(Some(base), Some(index), 4, 8);
        let i = inst(Opcode::Mov, &[dst, MirOperand::Register(value)]);
        let du = def_use(&i);
        assert!(du.defs.is_empty());
        assert!(du.uses.contains(&base));
        assert!(du.uses.contains(&index));
        assert!(du.uses.contains(&value));
    }

    #[test]
    fn idiv_implicitly_uses_and_defines_a_and_d() {
        let divisor = RegId(1000);
        let i = inst(Opcode::IDiv, &[MirOperand::Register(divisor)]);
        let du = def_use(&i);
        assert!(du.uses.contains(&HwReg::A.id()));
        assert!(du.uses.contains(&HwReg::D.id()));
        assert!(du.defs.contains(&HwReg::A.id()));
        assert!(du.defs.contains(&HwReg::D.id()));
        assert!(du.uses.contains(&divisor));
    }

    #[test]
    fn call_uses_argument_registers_and_defines_caller_saved() {
        let i = inst(Opcode::Call, &[MirOperand::ExternalSymbol("f".into())]);
        let du = def_use(&i);
        for r in ARG_REGS {
            assert!(du.uses.contains(&r.id()));
        }
        for r in CALLER_SAVED_REGS {
            assert!(du.defs.contains(&r.id()));
        }
    }

    #[test]
    fn ret_uses_a() {
        let i = inst(Opcode::Ret, &[MirOperand::Register(HwReg::A.id())]);
        let du = def_use(&i);
        assert!(du.uses.contains(&HwReg::A.id()));
        assert!(du.defs.is_empty());
    }

    #[test]
    fn jmp_and_jcc_touch_no_registers() {
        use crate::instruction::ConditionCode;
        let jmp = inst(Opcode::Jmp, &[MirOperand::BasicBlock(BlockId::new(1))]);
        assert!(def_use(&jmp).defs.is_empty() && def_use(&jmp).uses.is_empty());
        let jcc = inst(Opcode::Jcc(ConditionCode::E), &[MirOperand::BasicBlock(BlockId::new(1))]);
        assert!(def_use(&jcc).defs.is_empty() && def_use(&jcc).uses.is_empty());
    }
}
