//! Algebraic identities and strength reductions that don't need full
//! constant folding: `x + 0`, `x * 1`, `x - x`, `x ^ x`, `select true/false,
//! a, b`, `div`/`mul` by a power of two, `and`/`or` with an all-ones mask,
//! the `setne(zext(bool), 0)` / `seteq(x, true)` / `setne(x, false)` bool
//! idioms, trivial GEPs, and the two small-CFG shapes a front end leaves
//! behind for `&&`/`||` short-circuiting and a conditional branch whose arms
//! both land on the same block. Runs after `constant_fold` so these see
//! already-folded constants, and before `canonicalize`/`lvn` so the
//! simplified form is what gets value-numbered.

use smallvec::SmallVec;

use crate::entities::{BlockRef, FuncRef, InstRef, TypeId, UserRef, ValueRef};
use crate::instruction::{ICmpPred, Instruction, Opcode};
use crate::Context;

fn operand_value(cx: &Context, inst: InstRef, idx: usize) -> ValueRef {
    cx.uses.get(cx.insts[inst].operands[idx]).value
}

fn const_i64(cx: &Context, v: ValueRef) -> Option<i64> {
    match v {
        ValueRef::Const(c) => cx.consts.get(c).as_i64(),
        _ => None,
    }
}

fn const_bool_value(cx: &Context, v: ValueRef) -> Option<bool> {
    match v {
        ValueRef::Const(c) => cx.consts.get(c).as_bool(),
        _ => None,
    }
}

fn value_ty(cx: &Context, v: ValueRef) -> Option<TypeId> {
    match v {
        ValueRef::Const(c) => Some(cx.consts.get(c).ty),
        ValueRef::Arg(a) => Some(cx.args[a].ty),
        ValueRef::Inst(i) => Some(cx.insts[i].ty),
        ValueRef::Func(f) => Some(cx.funcs[f].ty),
        ValueRef::Global(g) => Some(cx.globals[g].ty),
        ValueRef::Block(_) => None,
    }
}

fn mask_for(cx: &Context, ty: TypeId) -> u64 {
    let bits = cx.types.size_of(ty) * 8;
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn is_all_ones(cx: &Context, v: ValueRef, ty: TypeId) -> bool {
    match const_i64(cx, v) {
        Some(x) => (x as u64) & mask_for(cx, ty) == mask_for(cx, ty),
        None => false,
    }
}

/// Splices a freshly-built instruction into `before`'s block immediately
/// ahead of it, the same manual arena-and-insert dance `ssa::prepend_phi`
/// uses to thread a phi into a block without going through `Builder`
/// (which only ever appends at its cursor).
fn insert_before(cx: &mut Context, before: InstRef, opcode: Opcode, ty: TypeId, operands: &[ValueRef]) -> InstRef {
    let block = cx.insts[before].block;
    let inst_id = InstRef::new(cx.insts.len());
    let mut use_ids: SmallVec<[crate::entities::UseId; 4]> = SmallVec::new();
    for (idx, &v) in operands.iter().enumerate() {
        use_ids.push(cx.add_use(v, UserRef::Inst(inst_id), idx as u32));
    }
    let inst = Instruction {
        opcode,
        ty,
        block,
        operands: use_ids,
        successors: Default::default(),
        phi_incoming: Default::default(),
        switch_values: Default::default(),
        use_head: None,
    };
    let pushed = cx.insts.push(inst);
    debug_assert_eq!(pushed, inst_id);
    let pos = cx.blocks[block].insts.iter().position(|&i| i == before).unwrap();
    cx.blocks[block].insts.insert(pos, inst_id);
    inst_id
}

pub fn run(cx: &mut Context, func: FuncRef) {
    loop {
        let candidates: Vec<InstRef> =
            cx.funcs[func].blocks.iter().flat_map(|&b| cx.blocks[b].insts.clone()).collect();
        let mut changed = false;
        for inst in candidates {
            if let Some(replacement) = try_simplify(cx, inst) {
                cx.replace_instruction_with_value(inst, replacement);
                changed = true;
            }
        }
        if fold_same_target_cond_br(cx, func) {
            changed = true;
        }
        if fold_short_circuit(cx, func) {
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

fn try_simplify(cx: &mut Context, inst: InstRef) -> Option<ValueRef> {
    let opcode = cx.insts[inst].opcode.clone();
    match opcode {
        Opcode::Add => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(0) {
                return Some(lhs);
            }
            if const_i64(cx, lhs) == Some(0) {
                return Some(rhs);
            }
            None
        }
        Opcode::Xor => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(0) {
                return Some(lhs);
            }
            if lhs == rhs {
                let ty = cx.insts[inst].ty;
                return Some(ValueRef::Const(cx.const_int(ty, 0)));
            }
            None
        }
        Opcode::Or => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(0) {
                return Some(lhs);
            }
            if const_i64(cx, lhs) == Some(0) {
                return Some(rhs);
            }
            let ty = cx.insts[inst].ty;
            if is_all_ones(cx, rhs, ty) {
                return Some(rhs);
            }
            if is_all_ones(cx, lhs, ty) {
                return Some(lhs);
            }
            None
        }
        Opcode::Sub => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(0) {
                return Some(lhs);
            }
            if lhs == rhs {
                let ty = cx.insts[inst].ty;
                return Some(ValueRef::Const(cx.const_int(ty, 0)));
            }
            None
        }
        Opcode::Mul => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(1) {
                return Some(lhs);
            }
            if const_i64(cx, lhs) == Some(1) {
                return Some(rhs);
            }
            if const_i64(cx, rhs) == Some(0) || const_i64(cx, lhs) == Some(0) {
                let ty = cx.insts[inst].ty;
                return Some(ValueRef::Const(cx.const_int(ty, 0)));
            }
            let ty = cx.insts[inst].ty;
            if let Some(shift) = power_of_two_shift(cx, rhs, ty) {
                return Some(ValueRef::Inst(insert_before(cx, inst, Opcode::Shl, ty, &[lhs, shift])));
            }
            if let Some(shift) = power_of_two_shift(cx, lhs, ty) {
                return Some(ValueRef::Inst(insert_before(cx, inst, Opcode::Shl, ty, &[rhs, shift])));
            }
            None
        }
        Opcode::SDiv | Opcode::UDiv => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(1) {
                return Some(lhs);
            }
            if matches!(opcode, Opcode::UDiv) {
                let ty = cx.insts[inst].ty;
                if let Some(shift) = power_of_two_shift(cx, rhs, ty) {
                    return Some(ValueRef::Inst(insert_before(cx, inst, Opcode::LShr, ty, &[lhs, shift])));
                }
            }
            None
        }
        Opcode::And => {
            let lhs = operand_value(cx, inst, 0);
            let rhs = operand_value(cx, inst, 1);
            if const_i64(cx, rhs) == Some(0) || const_i64(cx, lhs) == Some(0) {
                let ty = cx.insts[inst].ty;
                return Some(ValueRef::Const(cx.const_int(ty, 0)));
            }
            if lhs == rhs {
                return Some(lhs);
            }
            let ty = cx.insts[inst].ty;
            if is_all_ones(cx, rhs, ty) {
                return Some(lhs);
            }
            if is_all_ones(cx, lhs, ty) {
                return Some(rhs);
            }
            None
        }
        Opcode::ICmp(pred) => try_simplify_icmp(cx, inst, pred),
        Opcode::Gep { .. } => try_simplify_gep(cx, inst),
        Opcode::Select => {
            let cond = operand_value(cx, inst, 0);
            let if_true = operand_value(cx, inst, 1);
            let if_false = operand_value(cx, inst, 2);
            if if_true == if_false {
                return Some(if_true);
            }
            match cond {
                ValueRef::Const(c) => cx.consts.get(c).as_bool().map(|b| if b { if_true } else { if_false }),
                _ => None,
            }
        }
        _ => None,
    }
}

/// `v`, if a positive power-of-two integer constant, as the shift-amount
/// constant of the same type -- the common setup for `mul`/`udiv` strength
/// reduction.
fn power_of_two_shift(cx: &mut Context, v: ValueRef, ty: TypeId) -> Option<ValueRef> {
    let raw = const_i64(cx, v)?;
    if raw <= 0 || !(raw as u64).is_power_of_two() {
        return None;
    }
    let log2 = (raw as u64).trailing_zeros() as i64;
    Some(ValueRef::Const(cx.const_int(ty, log2)))
}

fn try_simplify_icmp(cx: &mut Context, inst: InstRef, pred: ICmpPred) -> Option<ValueRef> {
    let lhs = operand_value(cx, inst, 0);
    let rhs = operand_value(cx, inst, 1);
    let bool_ty = cx.types.bool();

    if matches!(pred, ICmpPred::Ne) && const_i64(cx, rhs) == Some(0) {
        if let ValueRef::Inst(zi) = lhs {
            if matches!(cx.insts[zi].opcode, Opcode::ZExt) {
                let inner = operand_value(cx, zi, 0);
                if value_ty(cx, inner) == Some(bool_ty) {
                    return Some(inner);
                }
            }
        }
    }
    if matches!(pred, ICmpPred::Eq) {
        if const_bool_value(cx, rhs) == Some(true) && value_ty(cx, lhs) == Some(bool_ty) {
            return Some(lhs);
        }
        if const_bool_value(cx, lhs) == Some(true) && value_ty(cx, rhs) == Some(bool_ty) {
            return Some(rhs);
        }
    }
    if matches!(pred, ICmpPred::Ne) {
        if const_bool_value(cx, rhs) == Some(false) && value_ty(cx, lhs) == Some(bool_ty) {
            return Some(lhs);
        }
        if const_bool_value(cx, lhs) == Some(false) && value_ty(cx, rhs) == Some(bool_ty) {
            return Some(rhs);
        }
    }
    None
}

/// `gep p, 0 -> p`, and a `gep` that undoes the constant offset of the `gep`
/// feeding it collapses to that inner `gep`'s own base pointer.
fn try_simplify_gep(cx: &Context, inst: InstRef) -> Option<ValueRef> {
    if cx.insts[inst].operands.len() != 2 {
        return None;
    }
    let base = operand_value(cx, inst, 0);
    let index = operand_value(cx, inst, 1);
    if const_i64(cx, index) == Some(0) {
        return Some(base);
    }
    let ValueRef::Inst(base_inst) = base else { return None };
    if !matches!(cx.insts[base_inst].opcode, Opcode::Gep { .. }) || cx.insts[base_inst].operands.len() != 2 {
        return None;
    }
    let inner_base = operand_value(cx, base_inst, 0);
    let inner_index = const_i64(cx, operand_value(cx, base_inst, 1))?;
    let outer_index = const_i64(cx, index)?;
    if inner_index + outer_index == 0 {
        Some(inner_base)
    } else {
        None
    }
}

/// A `CondBr` whose two successors are literally the same block (a front
/// end folding both arms of a diamond into one target, or a prior rewrite
/// collapsing the arms to equal values) needs neither the condition nor the
/// second edge; collapses to `Br`. Skipped when the target has a phi, which
/// would need the two now-identical predecessor slots told apart.
fn fold_same_target_cond_br(cx: &mut Context, func: FuncRef) -> bool {
    let blocks = cx.funcs[func].blocks.clone();
    for block in blocks {
        let Some(term) = cx.blocks[block].terminator() else { continue };
        if !matches!(cx.insts[term].opcode, Opcode::CondBr) {
            continue;
        }
        let t = cx.insts[term].successors[0];
        let f = cx.insts[term].successors[1];
        if t != f {
            continue;
        }
        if cx.blocks[t].insts.iter().any(|&i| matches!(cx.insts[i].opcode, Opcode::Phi)) {
            continue;
        }
        cx.remove_instruction(term);
        let mut b = crate::builder::Builder::new(cx, func, block);
        b.build_br(t);
        return true;
    }
    false
}

/// Collapses the two-block diamond a front end emits for `&&`/`||` into a
/// straight-line `and`/`or`: one side flows straight to the join with the
/// short-circuit constant, the other computes the second operand and joins
/// through a two-way phi. Requires the computing side to be side-effect
/// free, since the rewrite makes it run unconditionally.
fn fold_short_circuit(cx: &mut Context, func: FuncRef) -> bool {
    let blocks = cx.funcs[func].blocks.clone();
    for entry in blocks {
        let Some(term) = cx.blocks[entry].terminator() else { continue };
        if !matches!(cx.insts[term].opcode, Opcode::CondBr) {
            continue;
        }
        let t = cx.insts[term].successors[0];
        let f = cx.insts[term].successors[1];

        for &(join, side, is_and) in &[(f, t, true), (t, f, false)] {
            if join == side || !side_only_branches_to(cx, side, join) {
                continue;
            }
            let Some((phi, entry_value)) = single_phi_incoming(cx, join, entry) else { continue };
            let Some((phi2, side_value)) = single_phi_incoming(cx, join, side) else { continue };
            if phi != phi2 || cx.insts[phi].phi_incoming.len() != 2 {
                continue;
            }
            let expected_entry_value = !is_and;
            if const_bool_value(cx, entry_value) != Some(expected_entry_value) {
                continue;
            }

            let cond = operand_value(cx, term, 0);
            let ty = cx.insts[phi].ty;
            let side_term = cx.blocks[side].terminator().unwrap();
            let side_insts: Vec<InstRef> = cx.blocks[side].insts.iter().copied().filter(|&i| i != side_term).collect();
            for &i in &side_insts {
                cx.insts[i].block = entry;
            }
            let pos = cx.blocks[entry].insts.iter().position(|&i| i == term).unwrap();
            cx.blocks[entry].insts.splice(pos..pos, side_insts.iter().copied());

            let combined_opcode = if is_and { Opcode::And } else { Opcode::Or };
            let combined = insert_before(cx, term, combined_opcode, ty, &[cond, side_value]);

            cx.remove_instruction(side_term);
            cx.remove_instruction(term);
            crate::builder::Builder::new(cx, func, entry).build_br(join);

            cx.replace_instruction_with_value(phi, ValueRef::Inst(combined));
            cx.funcs[func].blocks.retain(|&b| b != side);
            return true;
        }
    }
    false
}

fn side_only_branches_to(cx: &Context, side: BlockRef, join: BlockRef) -> bool {
    if cx.blocks[side].preds.len() != 1 {
        return false;
    }
    let Some(term) = cx.blocks[side].terminator() else { return false };
    matches!(cx.insts[term].opcode, Opcode::Br)
        && cx.insts[term].successors.first() == Some(&join)
        && cx.blocks[side]
            .insts
            .iter()
            .all(|&i| cx.insts[i].opcode.is_terminator() || !cx.insts[i].opcode.has_side_effects())
}

fn single_phi_incoming(cx: &Context, join: BlockRef, pred: BlockRef) -> Option<(InstRef, ValueRef)> {
    let phis: Vec<InstRef> =
        cx.blocks[join].insts.iter().copied().take_while(|&i| matches!(cx.insts[i].opcode, Opcode::Phi)).collect();
    if phis.len() != 1 {
        return None;
    }
    let phi = phis[0];
    let idx = cx.insts[phi].phi_incoming.iter().position(|&b| b == pred)?;
    Some((phi, operand_value(cx, phi, idx)))
}
