//! The simplify/coalesce/freeze/select-spill loop: each step pops a node
//! or move off one worklist, updates the graph, and hands nodes off to
//! whichever worklist their updated state belongs on next.

use super::graph::{Graph, MoveState, NodeState, K};
use crate::reg::RegId;

pub fn has_work(graph: &Graph) -> bool {
    !graph.simplify_worklist.is_empty()
        || !graph.worklist_moves.is_empty()
        || !graph.freeze_worklist.is_empty()
        || !graph.spill_worklist.is_empty()
}

pub fn step(graph: &mut Graph) {
    if let Some(&r) = graph.simplify_worklist.iter().next() {
        simplify(graph, r);
    } else if let Some(m) = graph.worklist_moves.pop() {
        coalesce(graph, m);
    } else if let Some(&r) = graph.freeze_worklist.iter().next() {
        freeze(graph, r);
    } else if !graph.spill_worklist.is_empty() {
        select_spill(graph);
    }
}

fn simplify(graph: &mut Graph, r: RegId) {
    graph.simplify_worklist.remove(&r);
    graph.nodes.get_mut(&r).unwrap().state = NodeState::Select;
    graph.select_stack.push(r);
    for t in graph.live_adjacent(r) {
        decrement_degree(graph, t);
    }
}

fn decrement_degree(graph: &mut Graph, r: RegId) {
    if graph.is_precolored(r) {
        return;
    }
    let d = graph.nodes[&r].degree;
    graph.nodes.get_mut(&r).unwrap().degree = d - 1;
    if d == K {
        enable_moves(graph, r);
        for t in graph.live_adjacent(r) {
            enable_moves(graph, t);
        }
        graph.spill_worklist.remove(&r);
        if graph.move_related(r) {
            graph.freeze_worklist.insert(r);
            graph.nodes.get_mut(&r).unwrap().state = NodeState::Freeze;
        } else {
            graph.simplify_worklist.insert(r);
            graph.nodes.get_mut(&r).unwrap().state = NodeState::Simplify;
        }
    }
}

fn enable_moves(graph: &mut Graph, r: RegId) {
    for m in graph.node_moves(r) {
        if graph.moves[m].state == MoveState::Active {
            graph.moves[m].state = MoveState::Worklist;
            graph.worklist_moves.push(m);
        }
    }
}

fn add_worklist(graph: &mut Graph, r: RegId) {
    if !graph.is_precolored(r) && !graph.move_related(r) && graph.nodes[&r].degree < K {
        graph.freeze_worklist.remove(&r);
        graph.simplify_worklist.insert(r);
        graph.nodes.get_mut(&r).unwrap().state = NodeState::Simplify;
    }
}

fn ok(graph: &Graph, t: RegId, r: RegId) -> bool {
    graph.nodes[&t].degree < K || graph.is_precolored(t) || graph.are_adjacent(t, r)
}

/// George's test: safe to coalesce `v` into precolored `u` if every
/// neighbor of `v` is already adjacent to `u`, low-degree, or precolored.
fn george(graph: &Graph, u: RegId, v: RegId) -> bool {
    graph.live_adjacent(v).into_iter().all(|t| ok(graph, t, u))
}

/// Briggs' test: safe to coalesce two non-precolored nodes if the
/// combined node would have fewer than `K` neighbors of degree `>= K`.
fn briggs(graph: &Graph, u: RegId, v: RegId) -> bool {
    let mut k = 0;
    for t in graph.live_adjacent(u) {
        if graph.nodes[&t].degree >= K {
            k += 1;
        }
    }
    for t in graph.live_adjacent(v) {
        if graph.nodes[&t].degree >= K && !graph.are_adjacent(u, t) {
            k += 1;
        }
    }
    k < K
}

fn coalesce(graph: &mut Graph, m: usize) {
    let (dst, src) = (graph.moves[m].dst, graph.moves[m].src);
    let mut u = graph.alias(dst);
    let mut v = graph.alias(src);
    if graph.is_precolored(v) {
        std::mem::swap(&mut u, &mut v);
    }

    if u == v {
        graph.moves[m].state = MoveState::Coalesced;
        add_worklist(graph, u);
    } else if graph.is_precolored(v) || graph.are_adjacent(u, v) {
        graph.moves[m].state = MoveState::Constrained;
        add_worklist(graph, u);
        add_worklist(graph, v);
    } else if (graph.is_precolored(u) && george(graph, u, v)) || (!graph.is_precolored(u) && briggs(graph, u, v)) {
        graph.moves[m].state = MoveState::Coalesced;
        combine(graph, u, v);
        add_worklist(graph, u);
    } else {
        graph.moves[m].state = MoveState::Active;
    }
}

fn combine(graph: &mut Graph, u: RegId, v: RegId) {
    if graph.nodes[&v].state == NodeState::Freeze {
        graph.freeze_worklist.remove(&v);
    } else {
        graph.spill_worklist.remove(&v);
    }
    graph.nodes.get_mut(&v).unwrap().state = NodeState::Coalesced;
    graph.nodes.get_mut(&v).unwrap().alias = Some(u);

    let v_moves = graph.nodes[&v].moves.clone();
    for mv in v_moves {
        if !graph.nodes[&u].moves.contains(&mv) {
            graph.nodes.get_mut(&u).unwrap().moves.push(mv);
        }
    }

    for t in graph.live_adjacent(v) {
        let before = graph.nodes[&t].degree;
        graph.add_edge(t, u);
        if before < K && graph.nodes[&t].degree >= K {
            graph.freeze_worklist.remove(&t);
            graph.simplify_worklist.remove(&t);
            graph.spill_worklist.insert(t);
            graph.nodes.get_mut(&t).unwrap().state = NodeState::Spill;
        }
        decrement_degree(graph, t);
    }

    if graph.nodes[&u].degree >= K && graph.nodes[&u].state == NodeState::Freeze {
        graph.freeze_worklist.remove(&u);
        graph.spill_worklist.insert(u);
        graph.nodes.get_mut(&u).unwrap().state = NodeState::Spill;
    }
}

fn freeze(graph: &mut Graph, r: RegId) {
    graph.freeze_worklist.remove(&r);
    graph.simplify_worklist.insert(r);
    graph.nodes.get_mut(&r).unwrap().state = NodeState::Simplify;
    freeze_moves(graph, r);
}

fn freeze_moves(graph: &mut Graph, u: RegId) {
    for m in graph.node_moves(u) {
        let (x, y) = (graph.moves[m].dst, graph.moves[m].src);
        let y_alias = graph.alias(y);
        let u_alias = graph.alias(u);
        let v = if y_alias == u_alias { graph.alias(x) } else { y_alias };

        graph.moves[m].state = MoveState::Frozen;

        if !graph.move_related(v) && graph.nodes[&v].degree < K && graph.nodes[&v].state == NodeState::Freeze {
            graph.freeze_worklist.remove(&v);
            graph.simplify_worklist.insert(v);
            graph.nodes.get_mut(&v).unwrap().state = NodeState::Simplify;
        }
    }
}

/// Picks the node with the highest degree to spill speculatively: the
/// heuristic assumes it carries the most interference pressure and so is
/// most likely to need an actual stack slot regardless of ordering.
fn select_spill(graph: &mut Graph) {
    let r = *graph
        .spill_worklist
        .iter()
        .max_by_key(|&&r| graph.nodes[&r].degree)
        .expect("select_spill called on an empty worklist");
    graph.spill_worklist.remove(&r);
    graph.simplify_worklist.insert(r);
    graph.nodes.get_mut(&r).unwrap().state = NodeState::Simplify;
    freeze_moves(graph, r);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::HwReg;
    use crate::regalloc::graph::Move;

    fn push_move(graph: &mut Graph, dst: RegId, src: RegId) -> usize {
        let idx = graph.moves.len();
        graph.moves.push(Move { dst, src, state: MoveState::Worklist });
        graph.nodes.get_mut(&dst).unwrap().moves.push(idx);
        graph.nodes.get_mut(&src).unwrap().moves.push(idx);
        graph.worklist_moves.push(idx);
        idx
    }

    #[test]
    fn step_simplifies_a_low_degree_non_move_node_onto_the_select_stack() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        graph.add_edge(a, b);
        graph.simplify_worklist.insert(a);

        step(&mut graph);

        assert_eq!(graph.select_stack, vec![a]);
        assert_eq!(graph.nodes[&a].state, NodeState::Select);
        assert_eq!(graph.nodes[&b].degree, 0);
    }

    #[test]
    fn coalesce_combines_two_non_adjacent_low_degree_nodes() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        let m = push_move(&mut graph, a, b);

        coalesce(&mut graph, m);

        assert_eq!(graph.moves[m].state, MoveState::Coalesced);
        assert_eq!(graph.alias(b), a);
    }

    #[test]
    fn coalesce_marks_adjacent_endpoints_constrained() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        graph.add_edge(a, b);
        let m = push_move(&mut graph, a, b);

        coalesce(&mut graph, m);

        assert_eq!(graph.moves[m].state, MoveState::Constrained);
    }

    #[test]
    fn coalesce_into_a_precolored_register_uses_georges_test() {
        let v = RegId(1000);
        let hw = HwReg::C.id();
        let mut graph = Graph::new([v]);
        let m = push_move(&mut graph, hw, v);

        coalesce(&mut graph, m);

        assert_eq!(graph.moves[m].state, MoveState::Coalesced);
        assert_eq!(graph.alias(v), hw);
    }

    #[test]
    fn freeze_moves_a_node_from_freeze_to_simplify_and_freezes_its_moves() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        let m = push_move(&mut graph, a, b);
        graph.moves[m].state = MoveState::Active;
        graph.freeze_worklist.insert(a);
        graph.nodes.get_mut(&a).unwrap().state = NodeState::Freeze;

        freeze(&mut graph, a);

        assert!(!graph.freeze_worklist.contains(&a));
        assert!(graph.simplify_worklist.contains(&a));
        assert_eq!(graph.moves[m].state, MoveState::Frozen);
    }

    #[test]
    fn select_spill_picks_the_highest_degree_node_on_the_spill_worklist() {
        let low = RegId(1000);
        let high = RegId(1001);
        let mut graph = Graph::new([low, high]);
        graph.nodes.get_mut(&low).unwrap().degree = 5;
        graph.nodes.get_mut(&high).unwrap().degree = 20;
        graph.spill_worklist.insert(low);
        graph.spill_worklist.insert(high);

        select_spill(&mut graph);

        assert!(!graph.spill_worklist.contains(&high));
        assert!(graph.simplify_worklist.contains(&high));
    }
}
