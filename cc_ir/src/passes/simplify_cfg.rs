//! CFG simplification: drop unreachable blocks, and splice a block into its
//! sole predecessor when that predecessor falls straight through to it
//! (single succ / single pred on both ends -- the classic "merge basic
//! blocks" peephole run by every block-structured IR).

use hashbrown::HashSet;

use crate::entities::{BlockRef, FuncRef};
use crate::instruction::Opcode;
use crate::Context;

pub fn run(cx: &mut Context, func: FuncRef) {
    remove_unreachable_blocks(cx, func);
    loop {
        if !merge_one_fallthrough_pair(cx, func) {
            break;
        }
    }
}

fn successors_of(cx: &Context, block: BlockRef) -> Vec<BlockRef> {
    match cx.blocks[block].terminator() {
        Some(term) => cx.insts[term].successors.to_vec(),
        None => Vec::new(),
    }
}

fn remove_unreachable_blocks(cx: &mut Context, func: FuncRef) {
    let Some(entry) = cx.funcs[func].entry() else { return };
    let mut visited = HashSet::new();
    let mut stack = vec![entry];
    visited.insert(entry);
    while let Some(b) = stack.pop() {
        for succ in successors_of(cx, b) {
            if visited.insert(succ) {
                stack.push(succ);
            }
        }
    }

    let dead: Vec<BlockRef> = cx.funcs[func].blocks.iter().copied().filter(|b| !visited.contains(b)).collect();
    for block in dead {
        let insts = cx.blocks[block].insts.clone();
        for inst in insts {
            cx.remove_instruction(inst);
        }
    }
    cx.funcs[func].blocks.retain(|b| visited.contains(b));
}

fn merge_one_fallthrough_pair(cx: &mut Context, func: FuncRef) -> bool {
    let blocks = cx.funcs[func].blocks.clone();
    for &pred in &blocks {
        let Some(term) = cx.blocks[pred].terminator() else { continue };
        if !matches!(cx.insts[term].opcode, Opcode::Br) {
            continue;
        }
        let succ = cx.insts[term].successors[0];
        if succ == pred {
            continue; // self-loop, not a straight fallthrough
        }
        if cx.blocks[succ].preds.len() != 1 || cx.blocks[succ].preds[0] != pred {
            continue; // succ has other predecessors, can't absorb it
        }
        if !cx.blocks[succ].insts.iter().all(|&i| !matches!(cx.insts[i].opcode, Opcode::Phi)) {
            continue; // a phi in succ means it still needs to distinguish predecessors (shouldn't happen with one pred, but be safe)
        }

        cx.remove_instruction(term);
        let succ_insts = cx.blocks[succ].insts.clone();
        for inst in &succ_insts {
            cx.insts[*inst].block = pred;
        }
        cx.blocks[pred].insts.extend(succ_insts);

        if let Some(new_term) = cx.blocks[pred].terminator() {
            for new_succ in cx.insts[new_term].successors.clone() {
                cx.blocks[new_succ].remove_pred(succ);
                cx.blocks[new_succ].add_pred(pred);
            }
        }

        cx.funcs[func].blocks.retain(|&b| b != succ);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::entities::ValueRef;
    use crate::function::Linkage;

    #[test]
    fn drops_a_block_with_no_path_from_entry() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let unreachable_block = cx.new_block(f);

        let five = cx.const_int(i32_ty, 5);
        Builder::new(&mut cx, f, entry).build_ret(Some(ValueRef::Const(five)));
        Builder::new(&mut cx, f, unreachable_block).build_ret(Some(ValueRef::Const(five)));

        run(&mut cx, f);

        assert!(!cx.funcs[f].blocks.contains(&unreachable_block));
    }

    #[test]
    fn merges_a_block_into_its_sole_fallthrough_predecessor() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let next = cx.new_block(f);

        Builder::new(&mut cx, f, entry).build_br(next);
        let five = cx.const_int(i32_ty, 5);
        Builder::new(&mut cx, f, next).build_ret(Some(ValueRef::Const(five)));

        run(&mut cx, f);

        assert!(!cx.funcs[f].blocks.contains(&next));
        assert_eq!(cx.funcs[f].blocks, vec![entry]);
        let term = cx.blocks[entry].terminator().unwrap();
        assert!(matches!(cx.insts[term].opcode, Opcode::Ret));
    }

    #[test]
    fn does_not_merge_a_block_with_more_than_one_predecessor() {
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

        run(&mut cx, f);

        assert!(cx.funcs[f].blocks.contains(&join));
        assert!(cx.funcs[f].blocks.contains(&then_b));
        assert!(cx.funcs[f].blocks.contains(&else_b));
    }
}
