//! Folds instructions whose operands are all constants into a single
//! interned constant, then replaces every use of the instruction with it.
//! Also rewrites a `CondBr` whose condition is a constant bool into an
//! unconditional `Br`, dropping the edge to the untaken successor. Runs
//! after `ssa` so arithmetic on promoted locals gets a chance to fold, and
//! before `peephole`/`lvn` so those passes see the folded values rather
//! than redundant constant-only computations.

use crate::entities::{ConstId, FuncRef, InstRef, TypeId, ValueRef};
use crate::instruction::{ICmpPred, Opcode};
use crate::types::TypeKind;
use crate::Context;

fn const_operand(cx: &Context, inst: InstRef, idx: usize) -> Option<ConstId> {
    let use_id = cx.insts[inst].operands[idx];
    match cx.uses.get(use_id).value {
        ValueRef::Const(c) => Some(c),
        _ => None,
    }
}

pub fn run(cx: &mut Context, func: FuncRef) {
    loop {
        let candidates: Vec<InstRef> =
            cx.funcs[func].blocks.iter().flat_map(|&b| cx.blocks[b].insts.clone()).collect();
        let mut changed = false;
        for inst in candidates {
            if let Some(folded) = try_fold(cx, inst) {
                cx.replace_instruction_with_value(inst, ValueRef::Const(folded));
                changed = true;
            }
        }
        if fold_const_cond_branch(cx, func) {
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

/// Rewrites the first `CondBr` found whose condition operand is a constant
/// bool into a `Br` to the taken successor, dropping the other edge. One
/// rewrite per call, looped by `run` like `simplify_cfg`'s block merges.
fn fold_const_cond_branch(cx: &mut Context, func: FuncRef) -> bool {
    let blocks = cx.funcs[func].blocks.clone();
    for block in blocks {
        let Some(term) = cx.blocks[block].terminator() else { continue };
        if !matches!(cx.insts[term].opcode, Opcode::CondBr) {
            continue;
        }
        let cond = cx.uses.get(cx.insts[term].operands[0]).value;
        let ValueRef::Const(c) = cond else { continue };
        let Some(taken) = cx.consts.get(c).as_bool() else { continue };
        let if_true = cx.insts[term].successors[0];
        let if_false = cx.insts[term].successors[1];
        let target = if taken { if_true } else { if_false };

        cx.remove_instruction(term);
        let mut b = crate::builder::Builder::new(cx, func, block);
        b.build_br(target);
        return true;
    }
    false
}

fn try_fold(cx: &mut Context, inst: InstRef) -> Option<ConstId> {
    let opcode = cx.insts[inst].opcode.clone();
    let ty = cx.insts[inst].ty;
    let operand_count = cx.insts[inst].operands.len();
    if operand_count == 0 || !cx.insts[inst].successors.is_empty() {
        return None;
    }
    let consts: Vec<_> = (0..operand_count).map(|i| const_operand(cx, inst, i)).collect();
    if consts.iter().any(|c| c.is_none()) {
        return None;
    }
    let consts: Vec<_> = consts.into_iter().flatten().collect();

    match opcode {
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::SDiv | Opcode::UDiv | Opcode::SRem | Opcode::URem
        | Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Shl | Opcode::LShr | Opcode::AShr => {
            fold_int_binop(cx, &opcode, ty, consts[0], consts[1])
        }
        Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv => {
            fold_float_binop(cx, &opcode, ty, consts[0], consts[1])
        }
        Opcode::ICmp(pred) => fold_icmp(cx, pred, consts[0], consts[1]),
        Opcode::Select => {
            let cond = cx.consts.get(consts[0]).as_bool()?;
            Some(if cond { consts[1] } else { consts[2] })
        }
        Opcode::Trunc | Opcode::ZExt | Opcode::SExt | Opcode::Bitcast => {
            let v = cx.consts.get(consts[0]).as_i64()?;
            Some(if cx.types.is_signed(ty) { cx.const_int(ty, v) } else { cx.const_uint(ty, v as u64) })
        }
        Opcode::FpToSi | Opcode::FpToUi => {
            let v = as_f64(cx, consts[0])?;
            Some(if matches!(opcode, Opcode::FpToSi) { cx.const_int(ty, v as i64) } else { cx.const_uint(ty, v as u64) })
        }
        Opcode::SiToFp | Opcode::UiToFp => {
            let v = if matches!(opcode, Opcode::SiToFp) {
                cx.consts.get(consts[0]).as_i64()? as f64
            } else {
                cx.consts.get(consts[0]).as_u64()? as f64
            };
            Some(to_float_const(cx, ty, v))
        }
        Opcode::FpExt | Opcode::FpTrunc => {
            let v = as_f64(cx, consts[0])?;
            Some(to_float_const(cx, ty, v))
        }
        Opcode::PtrToInt => {
            let addr = cx.consts.get(consts[0]).as_ptr_addr()?;
            Some(if cx.types.is_signed(ty) { cx.const_int(ty, addr as i64) } else { cx.const_uint(ty, addr) })
        }
        Opcode::IntToPtr => {
            let v = cx.consts.get(consts[0]).as_u64()?;
            Some(cx.const_ptr_addr(ty, v))
        }
        Opcode::Gep { .. } => fold_gep(cx, ty, &consts),
        _ => None,
    }
}

/// Reads a constant of either float width back out as `f64`, widening an
/// `f32` payload the same way an `fpext` would.
fn as_f64(cx: &Context, c: ConstId) -> Option<f64> {
    if let Some(v) = cx.consts.get(c).as_f64() {
        return Some(v);
    }
    cx.consts.get(c).as_f32().map(|v| v as f64)
}

fn to_float_const(cx: &mut Context, ty: TypeId, v: f64) -> ConstId {
    if matches!(cx.types.kind(ty), TypeKind::F32) {
        cx.const_f32(v as f32)
    } else {
        cx.const_f64(v)
    }
}

fn fold_float_binop(cx: &mut Context, opcode: &Opcode, ty: TypeId, lhs: ConstId, rhs: ConstId) -> Option<ConstId> {
    let a = as_f64(cx, lhs)?;
    let b = as_f64(cx, rhs)?;
    let result = match opcode {
        Opcode::FAdd => a + b,
        Opcode::FSub => a - b,
        Opcode::FMul => a * b,
        Opcode::FDiv => a / b,
        _ => return None,
    };
    Some(to_float_const(cx, ty, result))
}

/// A GEP on a constant base address with constant indices collapses to the
/// constant address it would load from at runtime: `indices[0]` scales by
/// the pointee's size, each later index steps into a struct member or array
/// element of whatever type the walk has reached so far.
fn fold_gep(cx: &mut Context, result_ty: TypeId, consts: &[ConstId]) -> Option<ConstId> {
    if consts.len() < 2 {
        return None;
    }
    let base_addr = cx.consts.get(consts[0]).as_ptr_addr()?;
    let base_ty = cx.consts.get(consts[0]).ty;
    let elem_ty = match cx.types.kind(base_ty) {
        TypeKind::Pointer(inner) => *inner,
        _ => return None,
    };

    let first_index = cx.consts.get(consts[1]).as_i64()?;
    let mut offset = first_index * cx.types.size_of(elem_ty) as i64;
    let mut cur_ty = elem_ty;
    for &idx_const in &consts[2..] {
        let idx = cx.consts.get(idx_const).as_i64()? as usize;
        match cx.types.kind(cur_ty).clone() {
            TypeKind::Struct { .. } => {
                offset += cx.types.struct_member_offset(cur_ty, idx) as i64;
                cur_ty = cx.types.struct_body(cur_ty).members[idx];
            }
            TypeKind::Array { elem, .. } => {
                offset += idx as i64 * cx.types.size_of(elem) as i64;
                cur_ty = elem;
            }
            _ => return None,
        }
    }

    let result_addr = (base_addr as i64 + offset) as u64;
    Some(cx.const_ptr_addr(result_ty, result_addr))
}

fn fold_int_binop(cx: &mut Context, opcode: &Opcode, ty: TypeId, lhs: ConstId, rhs: ConstId) -> Option<ConstId> {
    let a = cx.consts.get(lhs).as_i64()?;
    let b = cx.consts.get(rhs).as_i64()?;
    let result = match opcode {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::SDiv => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        Opcode::UDiv => {
            if b == 0 {
                return None;
            }
            ((a as u64) / (b as u64)) as i64
        }
        Opcode::SRem => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        Opcode::URem => {
            if b == 0 {
                return None;
            }
            ((a as u64) % (b as u64)) as i64
        }
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Shl => a.wrapping_shl(b as u32),
        Opcode::LShr => ((a as u64) >> (b as u64)) as i64,
        Opcode::AShr => a >> b,
        _ => return None,
    };
    Some(if cx.types.is_signed(ty) { cx.const_int(ty, result) } else { cx.const_uint(ty, result as u64) })
}

fn fold_icmp(cx: &mut Context, pred: ICmpPred, lhs: ConstId, rhs: ConstId) -> Option<ConstId> {
    let signed = pred.is_signed() || matches!(pred, ICmpPred::Eq | ICmpPred::Ne);
    let result = if signed {
        let a = cx.consts.get(lhs).as_i64()?;
        let b = cx.consts.get(rhs).as_i64()?;
        match pred {
            ICmpPred::Eq => a == b,
            ICmpPred::Ne => a != b,
            ICmpPred::Slt => a < b,
            ICmpPred::Sle => a <= b,
            ICmpPred::Sgt => a > b,
            ICmpPred::Sge => a >= b,
            _ => unreachable!(),
        }
    } else {
        let a = cx.consts.get(lhs).as_u64()?;
        let b = cx.consts.get(rhs).as_u64()?;
        match pred {
            ICmpPred::Ult => a < b,
            ICmpPred::Ule => a <= b,
            ICmpPred::Ugt => a > b,
            ICmpPred::Uge => a >= b,
            _ => unreachable!(),
        }
    };
    Some(cx.const_bool(result))
}
