//! Collapses the common `setcc`/`test`/branch idiom a naive instruction
//! selector emits for a boolean compare feeding a branch:
//!
//! ```text
//! cmp   a, b
//! setcc vr, <cc>
//! test  vr, vr
//! jne   target      (or je target)
//! ```
//!
//! into a single conditional jump reading the flags `cmp` already set:
//!
//! ```text
//! cmp a, b
//! jcc target
//! ```
//!
//! `jne` branches on the `setcc` condition directly; `je` branches on its
//! complement.

use crate::entities::BlockId;
use crate::function::MirFunction;
use crate::instruction::{ConditionCode, MirInstruction, Opcode};
use crate::operand::MirOperand;

pub fn run(func: &mut MirFunction) {
    let blocks = func.blocks.clone();
    for block in blocks {
        simplify_block(func, block);
    }
}

fn simplify_block(func: &mut MirFunction, block: BlockId) {
    loop {
        let insts = func.block_arena[block].insts.clone();
        let Some((i, cc, target)) = find_match(func, &insts) else { break };

        let new_id = func.insts.push(MirInstruction {
            opcode: Opcode::Jcc(cc),
            operands: smallvec::smallvec![MirOperand::BasicBlock(target)],
            block,
        });
        let mut new_insts = insts;
        new_insts.splice(i..i + 3, [new_id]);
        func.block_arena[block].insts = new_insts;
    }
}

fn find_match(
    func: &MirFunction,
    insts: &[crate::entities::InstId],
) -> Option<(usize, ConditionCode, BlockId)> {
    for i in 0..insts.len().checked_sub(2)? + 1 {
        let set_cc = match func.insts[insts[i]].opcode {
            Opcode::SetCc(cc) => cc,
            _ => continue,
        };
        let Some(MirOperand::Register(set_dst)) = func.insts[insts[i]].operands.first() else { continue };
        let set_dst = *set_dst;

        let test_inst = &func.insts[insts[i + 1]];
        if test_inst.opcode != Opcode::Test {
            continue;
        }
        let same_reg = matches!(
            (test_inst.operands.get(0), test_inst.operands.get(1)),
            (Some(MirOperand::Register(a)), Some(MirOperand::Register(b))) if *a == set_dst && *b == set_dst
        );
        if !same_reg {
            continue;
        }

        let jcc_inst = &func.insts[insts[i + 2]];
        let jump_cc = match jcc_inst.opcode {
            Opcode::Jcc(cc) if matches!(cc, ConditionCode::Ne | ConditionCode::E) => cc,
            _ => continue,
        };
        let Some(target) = jcc_inst.jump_target() else { continue };

        let result_cc = if matches!(jump_cc, ConditionCode::Ne) { set_cc } else { set_cc.invert() };
        return Some((i, result_cc, target));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::reg::RegId;
    use crate::types::MirType;

    #[test]
    fn collapses_setcc_test_jne_into_a_single_jcc() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let target = func.append_block();
        let vr = RegId(1002);
        {
            let mut b = MirBuilder::new(&mut func, entry);
            b.build_cmp(MirOperand::reg(RegId(1000)), MirOperand::reg(RegId(1001)));
            b.build_setcc(ConditionCode::L, MirOperand::reg(vr));
            b.build_test(MirOperand::reg(vr), MirOperand::reg(vr));
            b.build_jcc(ConditionCode::Ne, target);
        }
        MirBuilder::new(&mut func, target).build_ret(None);

        run(&mut func);

        let insts = &func.block_arena[entry].insts;
        assert_eq!(insts.len(), 2);
        assert_eq!(func.insts[insts[0]].opcode, Opcode::Cmp);
        assert_eq!(func.insts[insts[1]].opcode, Opcode::Jcc(ConditionCode::L));
    }

    #[test]
    fn inverts_the_condition_for_the_je_form() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let target = func.append_block();
        let vr = RegId(1000);
        {
            let mut b = MirBuilder::new(&mut func, entry);
            b.build_cmp(MirOperand::reg(RegId(1001)), MirOperand::reg(RegId(1002)));
            b.build_setcc(ConditionCode::L, MirOperand::reg(vr));
            b.build_test(MirOperand::reg(vr), MirOperand::reg(vr));
            b.build_jcc(ConditionCode::E, target);
        }
        MirBuilder::new(&mut func, target).build_ret(None);

        run(&mut func);

        let insts = &func.block_arena[entry].insts;
        assert_eq!(func.insts[insts[1]].opcode, Opcode::Jcc(ConditionCode::L.invert()));
    }

    #[test]
    fn leaves_unrelated_sequences_alone() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry)
            .build_mov(MirOperand::reg(RegId(1000)), MirOperand::reg(RegId(1001)));
        MirBuilder::new(&mut func, entry).build_ret(None);

        run(&mut func);

        assert_eq!(func.block_arena[entry].insts.len(), 2);
    }
}
