//! Argument marshalling and prologue/epilogue insertion -- the Windows x64
//! ABI glue a front-end's instruction selector leans on at function entry
//! and `funcEnd`. Translating whole IR functions into MIR instruction
//! sequences (opcode selection) is a front-end concern and out of scope
//! here; this module only covers the parts the calling convention itself
//! dictates.

use crate::builder::MirBuilder;
use crate::entities::BlockId;
use crate::function::{MirFunction, SHADOW_SPACE_BYTES};
use crate::operand::{mem, MirOperand};
use crate::reg::{HwReg, RegId, ARG_REGS};
use crate::types::MirType;

/// Reads the first four integer arguments out of their calling-convention
/// registers into fresh virtual registers, and marks the rest as living at
/// `[bp + 16 + 8*i]` on the incoming frame. Must run once, at the start of
/// the entry block, before any other instruction references an argument.
pub fn marshal_arguments(func: &mut MirFunction, entry: BlockId, arg_types: &[MirType]) {
    let mut b = MirBuilder::new(func, entry);
    for (i, &ty) in arg_types.iter().enumerate() {
        let vreg = b.func.new_vreg(ty);
        if i < ARG_REGS.len() {
            b.build_mov(MirOperand::reg(vreg), MirOperand::reg(ARG_REGS[i].id()));
        } else {
            let stack_arg = mem(Some(HwReg::Bp.id()), None, 1, 16 + 8 * (i as i32 - ARG_REGS.len() as i32));
            b.build_mov(MirOperand::reg(vreg), stack_arg);
        }
        b.func.args.push(vreg);
    }
}

/// `push bp; mov bp, sp; sub sp, frameSize`, skipped entirely for a frame
/// with no locals and no calls.
pub fn insert_prologue(func: &mut MirFunction, entry: BlockId) {
    func.frame.finalize();
    if func.frame.size == 0 {
        return;
    }
    let size = func.frame.size as i64;
    let entry_insts = std::mem::take(&mut func.block_arena[entry].insts);
    let mut b = MirBuilder::new(func, entry);
    b.build_push(MirOperand::reg(HwReg::Bp.id()));
    b.build_mov(MirOperand::reg(HwReg::Bp.id()), MirOperand::reg(HwReg::Sp.id()));
    b.build_sub(MirOperand::reg(HwReg::Sp.id()), MirOperand::int(size));
    func.block_arena[entry].insts.extend(entry_insts);
}

/// `mov sp, bp; pop bp` before every `ret`, mirroring the prologue this
/// frame received.
pub fn insert_epilogue(func: &mut MirFunction) {
    if func.frame.size == 0 {
        return;
    }
    let ret_blocks: Vec<BlockId> = func
        .blocks
        .iter()
        .copied()
        .filter(|&b| {
            matches!(
                func.block_arena[b].terminator().map(|i| func.insts[i].opcode),
                Some(crate::instruction::Opcode::Ret)
            )
        })
        .collect();

    for block in ret_blocks {
        let ret_inst = func.block_arena[block].terminator().unwrap();
        let before: Vec<_> = func.block_arena[block].insts[..func.block_arena[block].insts.len() - 1].to_vec();
        func.block_arena[block].insts = before;
        let mut b = MirBuilder::new(func, block);
        b.build_mov(MirOperand::reg(HwReg::Sp.id()), MirOperand::reg(HwReg::Bp.id()));
        b.build_pop(MirOperand::reg(HwReg::Bp.id()));
        func.block_arena[block].insts.push(ret_inst);
    }
}

/// `allocStackForCall`: every call site must reserve at least the ABI
/// shadow space, and grows the frame's outgoing-argument area if this call
/// passes more than 4 arguments.
pub fn alloc_stack_for_call(func: &mut MirFunction, num_args: u32) {
    func.frame.alloc_stack_for_call(num_args);
    let _ = SHADOW_SPACE_BYTES;
}

/// Runs the whole post-selection sequence: marshal arguments, run the
/// pre-regalloc cleanup passes, color every virtual register (inserting
/// spill code as needed), then finalize the frame and insert
/// prologue/epilogue. Call once per function after its body is fully
/// lowered; register allocation must run before the frame is finalized
/// since spilling grows it.
pub fn finish_function(func: &mut MirFunction, arg_types: &[MirType]) {
    let Some(entry) = func.entry() else { return };
    marshal_arguments(func, entry, arg_types);
    crate::passes::run_all(func);
    crate::regalloc::allocate(func);
    insert_prologue(func, entry);
    insert_epilogue(func);
}

pub fn is_arg_register(reg: RegId) -> bool {
    crate::reg::is_arg_reg(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionFlags;
    use crate::instruction::Opcode;

    #[test]
    fn marshal_arguments_reads_the_first_four_from_argument_registers() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let arg_types = vec![MirType::I64; 4];

        marshal_arguments(&mut func, entry, &arg_types);

        assert_eq!(func.args.len(), 4);
        let insts = &func.block_arena[entry].insts;
        assert_eq!(insts.len(), 4);
        for (i, &inst_id) in insts.iter().enumerate() {
            let inst = &func.insts[inst_id];
            assert_eq!(inst.opcode, Opcode::Mov);
            assert_eq!(inst.operands[1].as_reg(), Some(ARG_REGS[i].id()));
        }
    }

    #[test]
    fn marshal_arguments_reads_the_fifth_argument_from_the_incoming_stack_frame() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let arg_types = vec![MirType::I64; 5];

        marshal_arguments(&mut func, entry, &arg_types);

        assert_eq!(func.args.len(), 5);
        let insts = &func.block_arena[entry].insts;
        let fifth = &func.insts[insts[4]];
        let mem_ref = fifth.operands[1].as_memory_ref().expect("fifth argument reads a memory operand");
        assert_eq!(mem_ref.base, Some(HwReg::Bp.id()));
        assert_eq!(mem_ref.displacement, 16);
    }

    #[test]
    fn prologue_is_skipped_for_a_frame_with_no_locals_and_no_calls() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry).build_ret(None);

        insert_prologue(&mut func, entry);

        assert_eq!(func.block_arena[entry].insts.len(), 1);
    }

    #[test]
    fn prologue_is_inserted_ahead_of_the_entry_blocks_existing_instructions_when_the_frame_has_locals() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        func.frame.alloc_object(8, 8);
        let existing = MirBuilder::new(&mut func, entry).build_ret(None);

        insert_prologue(&mut func, entry);

        let insts = &func.block_arena[entry].insts;
        assert_eq!(insts.len(), 4);
        assert_eq!(func.insts[insts[0]].opcode, Opcode::Push);
        assert_eq!(func.insts[insts[1]].opcode, Opcode::Mov);
        assert_eq!(func.insts[insts[2]].opcode, Opcode::Sub);
        assert_eq!(insts[3], existing);
    }

    #[test]
    fn epilogue_is_inserted_immediately_before_every_ret() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        func.frame.alloc_object(8, 8);
        func.frame.finalize();
        MirBuilder::new(&mut func, entry).build_ret(None);

        insert_epilogue(&mut func);

        let insts = &func.block_arena[entry].insts;
        assert_eq!(insts.len(), 3);
        assert_eq!(func.insts[insts[0]].opcode, Opcode::Mov);
        assert_eq!(func.insts[insts[1]].opcode, Opcode::Pop);
        assert_eq!(func.insts[insts[2]].opcode, Opcode::Ret);
    }

    #[test]
    fn epilogue_is_skipped_for_a_frame_with_no_locals_and_no_calls() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry).build_ret(None);

        insert_epilogue(&mut func);

        assert_eq!(func.block_arena[entry].insts.len(), 1);
    }

    #[test]
    fn alloc_stack_for_call_grows_the_frames_outgoing_argument_area() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        alloc_stack_for_call(&mut func, 6);
        assert_eq!(func.frame.max_call_args, 6);
        alloc_stack_for_call(&mut func, 2);
        assert_eq!(func.frame.max_call_args, 6);
    }
}
