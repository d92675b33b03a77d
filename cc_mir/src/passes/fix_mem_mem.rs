//! x86-64 has no instruction form that reads two memory operands at once.
//! An instruction selector working purely off IR values can still emit one
//! (most commonly `mov [mem], [mem]` when both the source and destination
//! of a load/store pair spilled to the stack); this pass loads the second
//! operand into a fresh virtual register first.

use crate::entities::BlockId;
use crate::function::MirFunction;
use crate::instruction::{MirInstruction, Opcode};
use crate::operand::MirOperand;
use crate::types::MirType;

pub fn run(func: &mut MirFunction) {
    let blocks = func.blocks.clone();
    for block in blocks {
        fix_block(func, block);
    }
}

fn fix_block(func: &mut MirFunction, block: BlockId) {
    let mut insts = func.block_arena[block].insts.clone();
    let mut i = 0;
    while i < insts.len() {
        let inst_id = insts[i];
        let opcode = func.insts[inst_id].opcode;
        if opcode.is_terminator() || matches!(opcode, Opcode::Phi) {
            i += 1;
            continue;
        }
        let operands = func.insts[inst_id].operands.clone();
        if operands.len() < 2 || !(operands[0].is_memory() && operands[1].is_memory()) {
            i += 1;
            continue;
        }

        let vreg = func.new_vreg(MirType::I64);
        let load_id = func.insts.push(MirInstruction {
            opcode: Opcode::Mov,
            operands: smallvec::smallvec![MirOperand::Register(vreg), operands[1].clone()],
            block,
        });
        func.insts[inst_id].operands[1] = MirOperand::Register(vreg);
        insts.insert(i, load_id);
        i += 2;
    }
    func.block_arena[block].insts = insts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::operand::mem;
    use crate::reg::HwReg;

    #[test]
    fn splits_a_mem_to_mem_move_through_a_fresh_vreg() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let dst = mem(Some(HwReg::Bp.id()), None, 1, -8);
        let src = mem(Some(HwReg::Bp.id()), None, 1, -16);
        MirBuilder::new(&mut func, entry).build_mov(dst, src);
        MirBuilder::new(&mut func, entry).build_ret(None);

        run(&mut func);

        let insts = &func.block_arena[entry].insts;
        assert_eq!(insts.len(), 3);
        assert_eq!(func.insts[insts[0]].opcode, Opcode::Mov);
        assert!(func.insts[insts[0]].operands[0].as_reg().is_some());
        assert!(func.insts[insts[0]].operands[1].is_memory());
        assert_eq!(func.insts[insts[1]].opcode, Opcode::Mov);
        assert!(func.insts[insts[1]].operands[0].is_memory());
        assert!(func.insts[insts[1]].operands[1].as_reg().is_some());
    }

    #[test]
    fn leaves_a_reg_to_mem_move_alone() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let dst = mem(Some(HwReg::Bp.id()), None, 1, -8);
        MirBuilder::new(&mut func, entry).build_mov(dst, MirOperand::reg(HwReg::A.id()));
        MirBuilder::new(&mut func, entry).build_ret(None);

        run(&mut func);

        assert_eq!(func.block_arena[entry].insts.len(), 2);
    }
}
