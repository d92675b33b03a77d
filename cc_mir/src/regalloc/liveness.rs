//! Dataflow liveness: `in[B] = use[B] ∪ (out[B] − def[B])`,
//! `out[B] = ⋃ in[S]` over successors `S`, iterated to a fixed point.
//!
//! The backward per-instruction walk that follows fixpoint convergence
//! also produces the per-instruction live-out sets `build` needs to wire
//! up interference edges, and collects every `mov reg, reg` as a move
//! site -- removing its destination from the live set before recording
//! that instruction's live-out, so the move's source and destination
//! never interfere over the move itself.

use hashbrown::{HashMap, HashSet};

use crate::entities::{BlockId, InstId};
use crate::function::MirFunction;
use crate::reg::RegId;

use super::cfg::successors;
use super::defuse::def_use;

pub struct MoveSite {
    pub inst: InstId,
    pub dst: RegId,
    pub src: RegId,
}

pub struct Liveness {
    pub instr_live_out: HashMap<InstId, HashSet<RegId>>,
    pub moves: Vec<MoveSite>,
}

fn block_use_def(func: &MirFunction, block: BlockId) -> (HashSet<RegId>, HashSet<RegId>) {
    let mut use_set = HashSet::new();
    let mut def_set = HashSet::new();
    for &inst_id in &func.block_arena[block].insts {
        let du = def_use(&func.insts[inst_id]);
        for u in &du.uses {
            if !def_set.contains(u) {
                use_set.insert(*u);
            }
        }
        for d in &du.defs {
            def_set.insert(*d);
        }
    }
    (use_set, def_set)
}

pub fn analyze(func: &MirFunction) -> Liveness {
    let blocks = &func.blocks;
    let mut use_of = HashMap::new();
    let mut def_of = HashMap::new();
    for &b in blocks {
        let (u, d) = block_use_def(func, b);
        use_of.insert(b, u);
        def_of.insert(b, d);
    }

    let mut live_in: HashMap<BlockId, HashSet<RegId>> =
        blocks.iter().map(|&b| (b, HashSet::new())).collect();
    let mut live_out: HashMap<BlockId, HashSet<RegId>> =
        blocks.iter().map(|&b| (b, HashSet::new())).collect();

    loop {
        let mut changed = false;
        for &b in blocks.iter().rev() {
            let mut out_b = HashSet::new();
            for s in successors(func, b) {
                out_b.extend(live_in[&s].iter().copied());
            }
            let mut in_b = use_of[&b].clone();
            for r in out_b.iter() {
                if !def_of[&b].contains(r) {
                    in_b.insert(*r);
                }
            }
            if in_b != live_in[&b] || out_b != live_out[&b] {
                changed = true;
            }
            live_in.insert(b, in_b);
            live_out.insert(b, out_b);
        }
        if !changed {
            break;
        }
    }

    let mut instr_live_out = HashMap::new();
    let mut moves = Vec::new();
    for &b in blocks {
        let mut live = live_out[&b].clone();
        for &inst_id in func.block_arena[b].insts.iter().rev() {
            let inst = &func.insts[inst_id];
            let du = def_use(inst);
            let is_move = inst.is_move();
            if is_move {
                for u in &du.uses {
                    live.remove(u);
                }
            }
            instr_live_out.insert(inst_id, live.clone());
            if is_move {
                if let (Some(&dst), Some(&src)) = (du.defs.first(), du.uses.first()) {
                    moves.push(MoveSite { inst: inst_id, dst, src });
                }
            }
            for d in &du.defs {
                live.remove(d);
            }
            for u in &du.uses {
                live.insert(*u);
            }
        }
    }

    Liveness { instr_live_out, moves }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::operand::MirOperand;
    use crate::reg::HwReg;
    use crate::types::MirType;

    /// `mov %vr1, rcx; add %vr1, 1; ret %vr1` -- a single straight-line
    /// block, so liveness here is just a backward scan: `%vr1` lives from
    /// its definition through the `ret` that reads it.
    #[test]
    fn straight_line_function_live_out_shrinks_after_the_last_use() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        let mov = b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
        let add = b.build_add(MirOperand::reg(vr1), MirOperand::int(1));
        let ret = b.build_ret(Some(MirOperand::reg(vr1)));

        let liveness = analyze(&func);

        assert!(liveness.instr_live_out[&mov].contains(&vr1));
        assert!(liveness.instr_live_out[&add].contains(&vr1));
        assert!(!liveness.instr_live_out[&ret].contains(&vr1));
    }

    #[test]
    fn move_destination_does_not_interfere_with_its_own_source() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        let mov = b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
        b.build_ret(Some(MirOperand::reg(vr1)));

        let liveness = analyze(&func);

        // The move's own live-out must not still show its source live,
        // since that is exactly the edge IRC relies on not existing to
        // coalesce the move away.
        assert!(!liveness.instr_live_out[&mov].contains(&HwReg::C.id()));
        assert_eq!(liveness.moves.len(), 1);
        assert_eq!(liveness.moves[0].dst, vr1);
        assert_eq!(liveness.moves[0].src, HwReg::C.id());
    }

    /// A value live across a conditional join (diamond shape) must be live
    /// at the head of both arms even though only one of them uses it.
    #[test]
    fn liveness_flows_across_a_diamond() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let then_b = func.append_block();
        let else_b = func.append_block();
        let join = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);

        let entry_mov = {
            let mut b = MirBuilder::new(&mut func, entry);
            let mov = b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
            b.build_jcc(crate::instruction::ConditionCode::E, then_b);
            mov
        };
        MirBuilder::new(&mut func, entry).build_jmp(else_b);
        MirBuilder::new(&mut func, then_b).build_jmp(join);
        MirBuilder::new(&mut func, else_b).build_jmp(join);
        MirBuilder::new(&mut func, join).build_ret(Some(MirOperand::reg(vr1)));

        let liveness = analyze(&func);

        assert!(liveness.instr_live_out[&entry_mov].contains(&vr1));
    }
}
