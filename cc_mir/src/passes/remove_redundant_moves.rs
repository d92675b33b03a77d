//! Deletes `mov r, r` where the destination and source name the same
//! register. These show up after coloring, once two virtual registers a
//! selector kept distinct happen to land on the same physical register; the
//! allocator's spill-rewrite cleanup runs this pass again for the same
//! reason after each rewrite iteration.

use crate::function::MirFunction;

pub fn run(func: &mut MirFunction) {
    let blocks = func.blocks.clone();
    for block in blocks {
        let insts = func.block_arena[block].insts.clone();
        let keep: Vec<_> = insts
            .into_iter()
            .filter(|&id| {
                let inst = &func.insts[id];
                !(inst.is_move() && inst.operands[0].as_reg() == inst.operands[1].as_reg())
            })
            .collect();
        func.block_arena[block].insts = keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::FunctionFlags;
    use crate::operand::MirOperand;
    use crate::reg::HwReg;
    use crate::types::MirType;

    #[test]
    fn deletes_a_move_between_the_same_physical_register() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_mov(MirOperand::reg(HwReg::A.id()), MirOperand::reg(HwReg::A.id()));
        b.build_ret(None);

        run(&mut func);

        assert_eq!(func.block_arena[entry].insts.len(), 1);
    }

    #[test]
    fn keeps_a_move_between_distinct_registers() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_mov(MirOperand::reg(HwReg::A.id()), MirOperand::reg(HwReg::C.id()));
        b.build_ret(None);

        run(&mut func);

        assert_eq!(func.block_arena[entry].insts.len(), 2);
    }
}
