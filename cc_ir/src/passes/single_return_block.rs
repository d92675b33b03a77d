//! Merges every `ret` in a function into a single return block.
//!
//! Later passes (dominator computation in `reorder_blocks`, the inliner's
//! callee splicing) are simpler when a function has exactly one exit: the
//! inliner in particular just rewires that one block's `ret` into a branch
//! back to the call site instead of hunting down every return.

use smallvec::SmallVec;

use crate::builder::Builder;
use crate::entities::{FuncRef, InstRef, ValueRef};
use crate::instruction::Opcode;
use crate::types::TypeKind;
use crate::Context;

pub fn run(cx: &mut Context, func: FuncRef) {
    let rets: Vec<InstRef> = cx.funcs[func]
        .blocks
        .iter()
        .filter_map(|&b| cx.blocks[b].terminator())
        .filter(|&inst| matches!(cx.insts[inst].opcode, Opcode::Ret))
        .collect();

    if rets.len() <= 1 {
        return;
    }

    let ret_ty = match cx.types.kind(cx.funcs[func].ty).clone() {
        TypeKind::Function { ret, .. } => ret,
        _ => unreachable!("function value without a function type"),
    };
    let returns_value = ret_ty != cx.void_ty;

    let exit = cx.new_block(func);
    let mut incoming: SmallVec<[(crate::entities::BlockRef, ValueRef); 4]> = SmallVec::new();
    for &ret in &rets {
        let block = cx.insts[ret].block;
        let value = if returns_value {
            let use_id = cx.insts[ret].operands[0];
            Some(cx.uses.get(use_id).value)
        } else {
            None
        };
        cx.remove_instruction(ret);
        let mut b = Builder::new(cx, func, block);
        b.build_br(exit);
        if let Some(v) = value {
            incoming.push((block, v));
        }
    }

    let mut b = Builder::new(cx, func, exit);
    if returns_value {
        let phi = b.build_phi(ret_ty, &incoming);
        b.build_ret(Some(ValueRef::Inst(phi)));
    } else {
        b.build_ret(None);
    }
}
