//! Frame layout. Stack grows downward; `sp_offset` is negative and
//! finalized only once every object that will ever be registered has been
//! (`finalize` rounds the total up to 16, per the Windows x64 ABI).

use hashbrown::HashMap;

use crate::basic_block::MirBasicBlock;
use crate::entities::{Arena, BlockId, InstId, StackObjId};
use crate::instruction::MirInstruction;
use crate::reg::{HwReg, RegId, FIRST_VIRTUAL_REGISTER};
use crate::types::MirType;

#[derive(Debug, Clone, Copy)]
pub struct StackObject {
    pub size: u32,
    pub sp_offset: i32,
}

/// Shadow space the caller must reserve before any call: 4 stack slots of
/// 8 bytes, per the Windows x64 ABI, even when the callee takes fewer
/// arguments.
pub const SHADOW_SPACE_SLOTS: u32 = 4;
pub const SHADOW_SPACE_BYTES: u32 = SHADOW_SPACE_SLOTS * 8;

#[derive(Debug, Clone, Default)]
pub struct FrameInfo {
    pub objects: Arena<StackObjId, StackObject>,
    pub size: u32,
    pub max_call_args: u32,
    finalized: bool,
}

impl FrameInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_object(&mut self, size: u32, align: u32) -> StackObjId {
        debug_assert!(!self.finalized, "cannot allocate a frame slot after finalize()");
        let aligned_size = align_up(size.max(1), align);
        let id = self.objects.push(StackObject { size: aligned_size, sp_offset: 0 });
        id
    }

    /// Ensures shadow space (plus any outgoing args beyond the first four)
    /// is reserved for a call passing `num_args` arguments.
    pub fn alloc_stack_for_call(&mut self, num_args: u32) {
        self.max_call_args = self.max_call_args.max(num_args);
    }

    /// Assigns every object a final `sp_offset` and rounds the frame size
    /// up to 16 bytes, per the ABI's stack-alignment requirement at `call`.
    pub fn finalize(&mut self) {
        let outgoing =
            (self.max_call_args.max(SHADOW_SPACE_SLOTS) as i64) * 8;
        let mut offset: i64 = outgoing;
        for id in self.objects.keys() {
            let obj = &mut self.objects[id];
            offset = align_up64(offset, obj.size.max(1) as i64);
            obj.sp_offset = -(offset as i32) - obj.size as i32;
            offset += obj.size as i64;
        }
        self.size = align_up64(offset, 16) as u32;
        self.finalized = true;
    }
}

fn align_up(v: u32, align: u32) -> u32 {
    align_up64(v as i64, align as i64) as u32
}

fn align_up64(v: i64, align: i64) -> i64 {
    if align <= 1 {
        return v;
    }
    (v + align - 1) / align * align
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u32 {
        const VARARG = 1 << 0;
        const EXTERNAL = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct MirFunction {
    pub name: String,
    pub ret_type: MirType,
    /// One virtual register per formal argument; populated by the argument
    /// marshalling step in `lower`.
    pub args: Vec<RegId>,
    pub blocks: Vec<BlockId>,
    pub block_arena: Arena<BlockId, MirBasicBlock>,
    pub insts: Arena<InstId, MirInstruction>,
    pub frame: FrameInfo,
    pub flags: FunctionFlags,
    next_vreg: u32,
    vreg_types: HashMap<RegId, MirType>,
}

impl MirFunction {
    pub fn new(name: impl Into<String>, ret_type: MirType, flags: FunctionFlags) -> Self {
        Self {
            name: name.into(),
            ret_type,
            args: Vec::new(),
            blocks: Vec::new(),
            block_arena: Arena::new(),
            insts: Arena::new(),
            frame: FrameInfo::new(),
            flags,
            next_vreg: FIRST_VIRTUAL_REGISTER,
            vreg_types: HashMap::new(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.flags.contains(FunctionFlags::EXTERNAL)
    }

    pub fn new_vreg(&mut self, ty: MirType) -> RegId {
        let id = RegId(self.next_vreg);
        self.next_vreg += 1;
        self.vreg_types.insert(id, ty);
        id
    }

    pub fn vreg_type(&self, reg: RegId) -> MirType {
        self.vreg_types.get(&reg).copied().unwrap_or(MirType::I64)
    }

    pub fn append_block(&mut self) -> BlockId {
        let id = self.block_arena.push(MirBasicBlock::default());
        self.blocks.push(id);
        id
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    /// The block fallen through to after `block` when it has no explicit
    /// jump; `None` for the last block in the function.
    pub fn fallthrough_of(&self, block: BlockId) -> Option<BlockId> {
        let pos = self.blocks.iter().position(|&b| b == block)?;
        self.blocks.get(pos + 1).copied()
    }

    pub fn hw_arg_count(&self) -> usize {
        self.args.len().min(crate::reg::ARG_REGS.len())
    }
}

pub fn hw(reg: HwReg) -> RegId {
    reg.id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_reserves_at_least_the_abi_shadow_space_when_there_are_no_outgoing_calls() {
        let mut frame = FrameInfo::new();
        frame.finalize();
        assert_eq!(frame.size, SHADOW_SPACE_BYTES.max(16));
    }

    #[test]
    fn finalize_grows_outgoing_space_for_a_call_passing_more_than_four_arguments() {
        let mut frame = FrameInfo::new();
        frame.alloc_stack_for_call(6);
        frame.finalize();
        assert!(frame.size >= 6 * 8);
    }

    #[test]
    fn every_object_gets_a_distinct_non_overlapping_slot() {
        let mut frame = FrameInfo::new();
        let a = frame.alloc_object(8, 8);
        let b = frame.alloc_object(4, 4);
        frame.finalize();

        let a_off = frame.objects[a].sp_offset;
        let b_off = frame.objects[b].sp_offset;
        assert_ne!(a_off, b_off);
        // Every slot sits below the outgoing-argument area and within the
        // final frame size.
        assert!(a_off < 0 && b_off < 0);
        assert!((-a_off) as u32 <= frame.size);
        assert!((-b_off) as u32 <= frame.size);
    }

    #[test]
    fn finalize_rounds_the_total_frame_size_up_to_sixteen_bytes() {
        let mut frame = FrameInfo::new();
        frame.alloc_object(1, 1);
        frame.finalize();
        assert_eq!(frame.size % 16, 0);
    }

    #[test]
    #[should_panic]
    fn alloc_object_after_finalize_is_rejected() {
        let mut frame = FrameInfo::new();
        frame.finalize();
        frame.alloc_object(8, 8);
    }

    #[test]
    fn new_vreg_hands_out_increasing_ids_starting_at_the_first_virtual_register() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let a = func.new_vreg(MirType::I64);
        let b = func.new_vreg(MirType::I32);
        assert_eq!(a.0, FIRST_VIRTUAL_REGISTER);
        assert_eq!(b.0, FIRST_VIRTUAL_REGISTER + 1);
        assert_eq!(func.vreg_type(a), MirType::I64);
        assert_eq!(func.vreg_type(b), MirType::I32);
    }

    #[test]
    fn fallthrough_of_is_none_for_the_last_block() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let b0 = func.append_block();
        let b1 = func.append_block();
        assert_eq!(func.fallthrough_of(b0), Some(b1));
        assert_eq!(func.fallthrough_of(b1), None);
    }
}
