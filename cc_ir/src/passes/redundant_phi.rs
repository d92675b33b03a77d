//! Removes phis whose non-self incoming values all agree, iterating to a
//! fixpoint. `ssa` already collapses most of these as it constructs them,
//! but block merging in `simplify_cfg`/`reorder_blocks` and folding in
//! `constant_fold` can make a previously-necessary phi redundant again.

use crate::entities::{FuncRef, InstRef, ValueRef};
use crate::instruction::Opcode;
use crate::Context;

pub fn run(cx: &mut Context, func: FuncRef) {
    loop {
        let phis: Vec<InstRef> = cx.funcs[func]
            .blocks
            .iter()
            .flat_map(|&b| cx.blocks[b].insts.clone())
            .filter(|&i| matches!(cx.insts[i].opcode, Opcode::Phi))
            .collect();

        let mut changed = false;
        for phi in phis {
            if let Some(replacement) = trivial_value(cx, phi) {
                cx.replace_instruction_with_value(phi, replacement);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn trivial_value(cx: &Context, phi: InstRef) -> Option<ValueRef> {
    let mut unique: Option<ValueRef> = None;
    for i in 0..cx.insts[phi].operands.len() {
        let v = cx.uses.get(cx.insts[phi].operands[i]).value;
        if v == ValueRef::Inst(phi) {
            continue;
        }
        match unique {
            None => unique = Some(v),
            Some(u) if u == v => {}
            Some(_) => return None,
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::function::Linkage;

    #[test]
    fn removes_a_phi_whose_incoming_values_all_agree() {
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

        let seven = cx.const_int(i32_ty, 7);
        let mut b = Builder::new(&mut cx, f, join);
        let phi = b.build_phi(i32_ty, &[(then_b, ValueRef::Const(seven)), (else_b, ValueRef::Const(seven))]);
        b.build_ret(Some(ValueRef::Inst(phi)));

        run(&mut cx, f);

        assert!(!cx.blocks[join].insts.contains(&phi));
        let ret = cx.blocks[join].terminator().unwrap();
        assert_eq!(cx.uses.get(cx.insts[ret].operands[0]).value, ValueRef::Const(seven));
    }

    #[test]
    fn keeps_a_phi_whose_incoming_values_disagree() {
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

        let ten = cx.const_int(i32_ty, 10);
        let twenty = cx.const_int(i32_ty, 20);
        let mut b = Builder::new(&mut cx, f, join);
        let phi = b.build_phi(i32_ty, &[(then_b, ValueRef::Const(ten)), (else_b, ValueRef::Const(twenty))]);
        b.build_ret(Some(ValueRef::Inst(phi)));

        run(&mut cx, f);

        assert!(cx.blocks[join].insts.contains(&phi));
    }

    #[test]
    fn treats_a_self_referential_incoming_value_as_trivially_ignorable() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let bool_ty = cx.types.bool();
        let fn_ty = cx.types.function(i32_ty, &[bool_ty], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let loop_b = cx.new_block(f);

        Builder::new(&mut cx, f, entry).build_br(loop_b);

        let five = cx.const_int(i32_ty, 5);
        let mut b = Builder::new(&mut cx, f, loop_b);
        let phi = b.build_phi(i32_ty, &[(entry, ValueRef::Const(five))]);
        // Tie the phi's own result back as a second incoming value: a
        // self-loop that should not block the single-value collapse.
        let operand_idx = cx.insts[phi].operands.len() as u32;
        let new_use = cx.add_use(ValueRef::Inst(phi), crate::entities::UserRef::Inst(phi), operand_idx);
        cx.insts[phi].operands.push(new_use);
        Builder::new(&mut cx, f, loop_b).build_br(loop_b);

        run(&mut cx, f);

        assert!(!cx.blocks[loop_b].insts.contains(&phi));
    }
}
