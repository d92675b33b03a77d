//! Successor computation for a `MirFunction`, recovered from terminators
//! and list-order fallthrough rather than cached on the block itself.

use smallvec::SmallVec;

use crate::entities::BlockId;
use crate::function::MirFunction;
use crate::instruction::Opcode;

pub fn successors(func: &MirFunction, block: BlockId) -> SmallVec<[BlockId; 2]> {
    let mut succs = SmallVec::new();
    let Some(term) = func.block_arena[block].terminator() else {
        succs.extend(func.fallthrough_of(block));
        return succs;
    };
    let inst = &func.insts[term];
    match inst.opcode {
        Opcode::Jmp => succs.extend(inst.jump_target()),
        Opcode::Jcc(_) => {
            succs.extend(inst.jump_target());
            succs.extend(func.fallthrough_of(block));
        }
        _ => succs.extend(func.fallthrough_of(block)),
    }
    succs
}
