//! Dead code elimination: repeatedly removes instructions with no result
//! uses and no side effects, until a fixpoint. Runs after `constant_fold`,
//! `peephole` and `redundant_phi` so it cleans up whatever those passes
//! orphaned.

use crate::entities::{FuncRef, InstRef, ValueRef};
use crate::Context;

pub fn run(cx: &mut Context, func: FuncRef) {
    loop {
        let insts: Vec<InstRef> = cx.funcs[func].blocks.iter().flat_map(|&b| cx.blocks[b].insts.clone()).collect();
        let mut changed = false;
        for inst in insts {
            let data = &cx.insts[inst];
            if data.opcode.has_side_effects() {
                continue;
            }
            if cx.use_count(ValueRef::Inst(inst)) == 0 {
                cx.remove_instruction(inst);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
