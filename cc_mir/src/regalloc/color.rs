//! Popping the select stack and assigning each node the lowest color none
//! of its already-colored (or precolored) neighbors hold.

use hashbrown::HashSet;

use super::graph::{Graph, NodeState};
use crate::reg::{HwReg, RegId};

/// Returns `true` if every popped node got a color (no further spill
/// iteration needed).
pub fn assign_colors(graph: &mut Graph) -> bool {
    let allocatable: Vec<u32> = HwReg::allocatable().map(|r| r.id().0).collect();
    let mut all_colored = true;

    while let Some(n) = graph.select_stack.pop() {
        let mut available: HashSet<u32> = allocatable.iter().copied().collect();
        for t in graph.nodes[&n].adjacent.clone() {
            let alias = graph.alias(t);
            let state = graph.nodes[&alias].state;
            if matches!(state, NodeState::Colored | NodeState::Precolored) {
                if let Some(c) = graph.nodes[&alias].color {
                    available.remove(&c);
                }
            }
        }

        if let Some(&color) = available.iter().min() {
            let node = graph.nodes.get_mut(&n).unwrap();
            node.state = NodeState::Colored;
            node.color = Some(color);
        } else {
            graph.nodes.get_mut(&n).unwrap().state = NodeState::Spilled;
            all_colored = false;
        }
    }

    let coalesced: Vec<RegId> =
        graph.nodes.values().filter(|n| n.state == NodeState::Coalesced).map(|n| n.reg).collect();
    for n in coalesced {
        let alias = graph.alias(n);
        let color = graph.nodes[&alias].color;
        graph.nodes.get_mut(&n).unwrap().color = color;
    }

    all_colored
}

pub fn spilled_registers(graph: &Graph) -> Vec<RegId> {
    graph.nodes.values().filter(|n| n.state == NodeState::Spilled).map(|n| n.reg).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::any;
    use proptest::{prop_assert_ne, proptest};

    #[test]
    fn assigns_the_lowest_color_not_taken_by_a_colored_neighbor() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        graph.add_edge(a, b);
        graph.nodes.get_mut(&b).unwrap().state = NodeState::Colored;
        graph.nodes.get_mut(&b).unwrap().color = Some(HwReg::A.id().0);
        graph.select_stack.push(a);

        let ok = assign_colors(&mut graph);

        assert!(ok);
        assert_eq!(graph.nodes[&a].state, NodeState::Colored);
        assert_eq!(graph.nodes[&a].color, Some(HwReg::C.id().0));
    }

    #[test]
    fn spills_a_node_whose_every_color_is_taken() {
        let center = RegId(1000);
        let neighbors: Vec<_> = HwReg::allocatable().map(|r| r.id()).collect();
        let mut all = vec![center];
        all.extend(neighbors.iter().copied());
        let mut graph = Graph::new(all);
        for &n in &neighbors {
            graph.add_edge(center, n);
            graph.nodes.get_mut(&n).unwrap().state = NodeState::Colored;
            graph.nodes.get_mut(&n).unwrap().color = Some(n.0);
        }
        graph.select_stack.push(center);

        let ok = assign_colors(&mut graph);

        assert!(!ok);
        assert_eq!(graph.nodes[&center].state, NodeState::Spilled);
        assert!(spilled_registers(&graph).contains(&center));
    }

    #[test]
    fn a_coalesced_node_inherits_its_aliases_color() {
        let a = RegId(1000);
        let b = RegId(1001);
        let mut graph = Graph::new([a, b]);
        graph.select_stack.push(a);
        graph.nodes.get_mut(&b).unwrap().state = NodeState::Coalesced;
        graph.nodes.get_mut(&b).unwrap().alias = Some(a);

        assign_colors(&mut graph);

        assert_eq!(graph.nodes[&b].color, graph.nodes[&a].color);
    }

    proptest! {
        /// Whatever the interference shape, two nodes joined by an edge
        /// never end up with the same color -- spilling one of them is
        /// always available when no color is free.
        #[test]
        fn adjacent_colored_nodes_never_share_a_color(
            count in 2usize..8,
            edge_bits in proptest::collection::vec(any::<bool>(), 0..56),
        ) {
            let regs: Vec<RegId> = (0..count as u32).map(|i| RegId(2000 + i)).collect();
            let mut graph = Graph::new(regs.clone());

            let mut edges = Vec::new();
            let mut bit_iter = edge_bits.into_iter();
            for i in 0..regs.len() {
                for j in (i + 1)..regs.len() {
                    if bit_iter.next().unwrap_or(false) {
                        graph.add_edge(regs[i], regs[j]);
                        edges.push((regs[i], regs[j]));
                    }
                }
            }

            for &r in regs.iter().rev() {
                graph.select_stack.push(r);
            }
            assign_colors(&mut graph);

            for (u, v) in edges {
                let cu = graph.nodes[&u].color;
                let cv = graph.nodes[&v].color;
                if let (Some(cu), Some(cv)) = (cu, cv) {
                    prop_assert_ne!(cu, cv);
                }
            }
        }
    }
}
