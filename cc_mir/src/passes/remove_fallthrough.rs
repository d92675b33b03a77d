//! Deletes a terminating `jmp` whose target is the block immediately
//! following it in the function's block list -- control falls into that
//! block anyway once the current one finishes, so the jump is dead weight.

use crate::function::MirFunction;
use crate::instruction::Opcode;

pub fn run(func: &mut MirFunction) {
    for i in 0..func.blocks.len() {
        let block = func.blocks[i];
        let Some(next) = func.blocks.get(i + 1).copied() else { continue };
        let Some(term) = func.block_arena[block].terminator() else { continue };
        let inst = &func.insts[term];
        if inst.opcode == Opcode::Jmp && inst.jump_target() == Some(next) {
            func.block_arena[block].insts.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::types::MirType;

    #[test]
    fn removes_jump_to_the_immediately_next_block() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let bb0 = func.append_block();
        let bb1 = func.append_block();
        MirBuilder::new(&mut func, bb0).build_jmp(bb1);
        MirBuilder::new(&mut func, bb1).build_ret(None);

        run(&mut func);

        assert!(func.block_arena[bb0].insts.is_empty());
    }

    #[test]
    fn keeps_a_jump_to_a_non_adjacent_block() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let bb0 = func.append_block();
        let bb1 = func.append_block();
        let bb2 = func.append_block();
        MirBuilder::new(&mut func, bb0).build_jmp(bb2);
        MirBuilder::new(&mut func, bb1).build_ret(None);
        MirBuilder::new(&mut func, bb2).build_ret(None);

        run(&mut func);

        assert_eq!(func.block_arena[bb0].insts.len(), 1);
    }
}
