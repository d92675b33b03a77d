//! Promotes simple stack slots to SSA registers (Braun, Buchwald, Hack,
//! Leissa, Mallon, Zwinkau -- "Simple and Efficient Construction of Static
//! Single Assignment Form"). Every block is already "sealed" by the time
//! this pass runs: `single_return_block` and `simplify_cfg` have already
//! settled the CFG, so there is no need for Braun's incomplete-phi
//! bookkeeping -- every predecessor list is final before we read it.
//!
//! Only allocas whose every use is a direct `load`/`store` through the
//! pointer operand are promoted; an alloca whose address escapes (passed to
//! a call, stored into another pointer, GEP'd into) is left alone.

use hashbrown::HashMap;

use crate::builder::Builder;
use crate::entities::{BlockRef, FuncRef, InstRef, TypeId, UserRef, ValueRef};
use crate::instruction::{Instruction, Opcode};
use crate::Context;

fn is_promotable(cx: &Context, alloca: InstRef) -> bool {
    let head = cx.insts[alloca].use_head;
    for use_id in cx.uses.iter_list(head) {
        let u = cx.uses.get(use_id);
        let UserRef::Inst(user_inst) = u.user else { return false };
        match cx.insts[user_inst].opcode {
            Opcode::Load | Opcode::Store if u.operand_idx == 0 => {}
            _ => return false,
        }
    }
    true
}

pub fn run(cx: &mut Context, func: FuncRef) {
    let allocas: Vec<(InstRef, TypeId)> = cx.funcs[func]
        .blocks
        .iter()
        .flat_map(|&b| cx.blocks[b].insts.clone())
        .filter_map(|inst| match cx.insts[inst].opcode {
            Opcode::Alloca { alloc_ty } if is_promotable(cx, inst) => Some((inst, alloc_ty)),
            _ => None,
        })
        .collect();

    for (alloca, ty) in allocas {
        promote(cx, func, alloca, ty);
    }
}

fn promote(cx: &mut Context, func: FuncRef, alloca: InstRef, ty: TypeId) {
    let mut current_def: HashMap<BlockRef, ValueRef> = HashMap::new();

    for &block in &cx.funcs[func].blocks.clone() {
        for inst in cx.blocks[block].insts.clone() {
            match cx.insts[inst].opcode {
                Opcode::Load => {
                    let ptr_use = cx.insts[inst].operands[0];
                    if cx.uses.get(ptr_use).value != ValueRef::Inst(alloca) {
                        continue;
                    }
                    let value = read_variable(cx, func, ty, &mut current_def, block);
                    cx.replace_instruction_with_value(inst, value);
                    current_def.insert(block, value);
                }
                Opcode::Store => {
                    let ptr_use = cx.insts[inst].operands[0];
                    if cx.uses.get(ptr_use).value != ValueRef::Inst(alloca) {
                        continue;
                    }
                    let value = cx.uses.get(cx.insts[inst].operands[1]).value;
                    cx.remove_instruction(inst);
                    current_def.insert(block, value);
                }
                _ => {}
            }
        }
    }

    cx.remove_instruction(alloca);
}

fn read_variable(
    cx: &mut Context,
    func: FuncRef,
    ty: TypeId,
    current_def: &mut HashMap<BlockRef, ValueRef>,
    block: BlockRef,
) -> ValueRef {
    if let Some(&v) = current_def.get(&block) {
        return v;
    }
    let preds = cx.blocks[block].preds.clone();
    let value = if preds.is_empty() {
        ValueRef::Const(cx.const_undef(ty))
    } else if preds.len() == 1 {
        read_variable(cx, func, ty, current_def, preds[0])
    } else {
        let phi = prepend_phi(cx, block, ty);
        current_def.insert(block, ValueRef::Inst(phi));
        let mut incoming = Vec::with_capacity(preds.len());
        for pred in preds {
            incoming.push((pred, read_variable(cx, func, ty, current_def, pred)));
        }
        for (pred, v) in incoming {
            let mut b = Builder::new(cx, func, block);
            b.add_phi_incoming(phi, pred, v);
        }
        try_remove_trivial_phi(cx, phi)
    };
    current_def.insert(block, value);
    value
}

fn prepend_phi(cx: &mut Context, block: BlockRef, ty: TypeId) -> InstRef {
    let inst_id = InstRef::new(cx.insts.len());
    let inst = Instruction {
        opcode: Opcode::Phi,
        ty,
        block,
        operands: Default::default(),
        successors: Default::default(),
        phi_incoming: Default::default(),
        switch_values: Default::default(),
        use_head: None,
    };
    let pushed = cx.insts.push(inst);
    debug_assert_eq!(pushed, inst_id);
    cx.blocks[block].insts.insert(0, inst_id);
    inst_id
}

/// Braun et al.'s `tryRemoveTrivialPhi`: a phi whose non-self operands are
/// all the same value contributes nothing and is replaced by that value.
fn try_remove_trivial_phi(cx: &mut Context, phi: InstRef) -> ValueRef {
    let operand_values: Vec<ValueRef> =
        (0..cx.insts[phi].operands.len()).map(|i| cx.uses.get(cx.insts[phi].operands[i]).value).collect();

    let mut unique: Option<ValueRef> = None;
    for v in operand_values {
        if v == ValueRef::Inst(phi) {
            continue;
        }
        match unique {
            None => unique = Some(v),
            Some(u) if u == v => {}
            Some(_) => return ValueRef::Inst(phi),
        }
    }

    let replacement = match unique {
        Some(v) => v,
        None => ValueRef::Const(cx.const_undef(cx.insts[phi].ty)),
    };
    cx.replace_instruction_with_value(phi, replacement);
    replacement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Linkage;

    #[test]
    fn promotes_alloca_through_a_diamond() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let bool_ty = cx.types.bool();
        let fn_ty = cx.types.function(i32_ty, &[bool_ty], false);
        let f = cx.declare_function("diamond", fn_ty, Linkage::Internal);

        let entry = cx.new_block(f);
        let then_b = cx.new_block(f);
        let else_b = cx.new_block(f);
        let join = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        let slot = b.build_alloca(i32_ty).unwrap();
        b.build_cond_br(ValueRef::Arg(arg0), then_b, else_b);

        let ten = cx.const_int(i32_ty, 10);
        let mut b = Builder::new(&mut cx, f, then_b);
        b.build_store(ValueRef::Inst(slot), ValueRef::Const(ten));
        b.build_br(join);

        let twenty = cx.const_int(i32_ty, 20);
        let mut b = Builder::new(&mut cx, f, else_b);
        b.build_store(ValueRef::Inst(slot), ValueRef::Const(twenty));
        b.build_br(join);

        let mut b = Builder::new(&mut cx, f, join);
        let loaded = b.build_load(i32_ty, ValueRef::Inst(slot));
        b.build_ret(Some(ValueRef::Inst(loaded)));

        run(&mut cx, f);

        // The alloca and both stores are gone; `join` now starts with a phi.
        assert!(cx.blocks[join].insts.iter().any(|&i| matches!(cx.insts[i].opcode, Opcode::Phi)));
        for &block in &cx.funcs[f].blocks.clone() {
            for inst in cx.blocks[block].insts.clone() {
                assert!(!matches!(cx.insts[inst].opcode, Opcode::Alloca { .. } | Opcode::Store | Opcode::Load));
            }
        }
    }
}
