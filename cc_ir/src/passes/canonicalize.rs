//! Canonicalizes commutative binary operands so equivalent computations
//! have a single textual/structural shape for `lvn` to key on: a constant
//! operand always goes on the right, and between two non-constants the one
//! with the smaller `InstRef`/`ArgRef` index (the one defined first) goes
//! on the left.

use crate::entities::{FuncRef, InstRef, ValueRef};
use crate::instruction::Opcode;
use crate::Context;

fn is_commutative(opcode: &Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Add | Opcode::Mul | Opcode::And | Opcode::Or | Opcode::Xor | Opcode::FAdd | Opcode::FMul
    )
}

fn rank(v: ValueRef) -> (u8, u32) {
    match v {
        ValueRef::Const(_) => (1, 0),
        ValueRef::Arg(a) => (0, a.index() as u32),
        ValueRef::Inst(i) => (0, i.index() as u32),
        ValueRef::Global(g) => (0, g.index() as u32),
        ValueRef::Func(f) => (0, f.index() as u32),
        ValueRef::Block(b) => (0, b.index() as u32),
    }
}

pub fn run(cx: &mut Context, func: FuncRef) {
    let insts: Vec<InstRef> = cx.funcs[func].blocks.iter().flat_map(|&b| cx.blocks[b].insts.clone()).collect();
    for inst in insts {
        if !is_commutative(&cx.insts[inst].opcode) {
            continue;
        }
        let lhs_use = cx.insts[inst].operands[0];
        let rhs_use = cx.insts[inst].operands[1];
        let lhs = cx.uses.get(lhs_use).value;
        let rhs = cx.uses.get(rhs_use).value;
        if rank(rhs) < rank(lhs) {
            cx.remove_use(lhs, lhs_use);
            cx.remove_use(rhs, rhs_use);
            let user = crate::entities::UserRef::Inst(inst);
            let new_lhs_id = cx.add_use(rhs, user, 0);
            let new_rhs_id = cx.add_use(lhs, user, 1);
            cx.insts[inst].operands[0] = new_lhs_id;
            cx.insts[inst].operands[1] = new_rhs_id;
        }
    }
}
