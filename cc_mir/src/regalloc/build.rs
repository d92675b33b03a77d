//! Interference-graph construction: for every instruction, for every
//! register it defines, an edge to every register live out of it.

use super::defuse::def_use;
use super::graph::{Graph, Move, MoveState, NodeState, K};
use super::liveness::Liveness;
use crate::function::MirFunction;

pub fn build(func: &MirFunction, liveness: &Liveness, graph: &mut Graph) {
    for &block in &func.blocks {
        for &inst_id in &func.block_arena[block].insts {
            let du = def_use(&func.insts[inst_id]);
            let Some(live_out) = liveness.instr_live_out.get(&inst_id) else { continue };
            for &d in &du.defs {
                for &l in live_out {
                    graph.add_edge(d, l);
                }
            }
        }
    }

    for site in &liveness.moves {
        let idx = graph.moves.len();
        graph.moves.push(Move { dst: site.dst, src: site.src, state: MoveState::Worklist });
        graph.nodes.get_mut(&site.dst).unwrap().moves.push(idx);
        graph.nodes.get_mut(&site.src).unwrap().moves.push(idx);
    }
}

/// Partitions every non-precolored node into simplify/freeze/spill based
/// on its degree and move-relatedness, the state the main loop starts
/// iterating from.
pub fn make_worklist(graph: &mut Graph) {
    let initial: Vec<_> = graph
        .nodes
        .values()
        .filter(|n| n.state == NodeState::Initial)
        .map(|n| n.reg)
        .collect();

    for r in initial {
        let degree = graph.nodes[&r].degree;
        if degree >= K {
            graph.spill_worklist.insert(r);
            graph.nodes.get_mut(&r).unwrap().state = NodeState::Spill;
        } else if graph.move_related(r) {
            graph.freeze_worklist.insert(r);
            graph.nodes.get_mut(&r).unwrap().state = NodeState::Freeze;
        } else {
            graph.simplify_worklist.insert(r);
            graph.nodes.get_mut(&r).unwrap().state = NodeState::Simplify;
        }
    }

    graph.worklist_moves = (0..graph.moves.len()).filter(|&i| graph.moves[i].state == MoveState::Worklist).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::operand::MirOperand;
    use crate::reg::{HwReg, RegId};
    use crate::regalloc::liveness;
    use crate::types::MirType;

    #[test]
    fn build_connects_a_definition_to_everything_live_out_of_it() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);
        let vr2 = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
        b.build_mov(MirOperand::reg(vr2), MirOperand::reg(HwReg::D.id()));
        b.build_add(MirOperand::reg(vr1), MirOperand::reg(vr2));
        b.build_ret(Some(MirOperand::reg(vr1)));

        let liveness = liveness::analyze(&func);
        let mut graph = Graph::new([vr1, vr2]);
        build(&func, &liveness, &mut graph);

        // vr2 is live across vr1's definition, so they must interfere.
        assert!(graph.are_adjacent(vr1, vr2));
    }

    #[test]
    fn build_records_every_move_site_as_a_worklist_move() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
        b.build_ret(Some(MirOperand::reg(vr1)));

        let liveness = liveness::analyze(&func);
        let mut graph = Graph::new([vr1]);
        build(&func, &liveness, &mut graph);

        assert_eq!(graph.moves.len(), 1);
        assert_eq!(graph.moves[0].dst, vr1);
        assert_eq!(graph.moves[0].src, HwReg::C.id());
        assert!(graph.node_moves(vr1).contains(&0));
    }

    #[test]
    fn make_worklist_spills_a_node_with_degree_at_least_k() {
        let center = RegId(1000);
        let neighbors: Vec<_> = (0..K as u32).map(|i| RegId(1001 + i)).collect();
        let mut all = vec![center];
        all.extend(neighbors.iter().copied());
        let mut graph = Graph::new(all);
        for &n in &neighbors {
            graph.add_edge(center, n);
        }

        make_worklist(&mut graph);

        assert!(graph.spill_worklist.contains(&center));
    }

    #[test]
    fn make_worklist_puts_a_low_degree_move_related_node_on_the_freeze_worklist() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry).build_mov(MirOperand::reg(a), MirOperand::reg(HwReg::C.id()));
        MirBuilder::new(&mut func, entry).build_ret(Some(MirOperand::reg(a)));
        let liveness = liveness::analyze(&func);
        let mut graph = Graph::new([a, b]);
        build(&func, &liveness, &mut graph);

        make_worklist(&mut graph);

        assert!(graph.freeze_worklist.contains(&a));
    }

    #[test]
    fn make_worklist_puts_a_low_degree_non_move_node_on_the_simplify_worklist() {
        let a = RegId(1000);
        let mut graph = Graph::new([a]);
        make_worklist(&mut graph);
        assert!(graph.simplify_worklist.contains(&a));
    }
}
