//! Local value numbering: within a single block, two instructions with the
//! same opcode and the same operand values compute the same result, so the
//! second is replaced by the first. `canonicalize` runs first so
//! commutative operands are already in a fixed order and this is a plain
//! structural-equality lookup.

use hashbrown::HashMap;

use crate::entities::{FuncRef, InstRef, ValueRef};
use crate::instruction::Opcode;
use crate::Context;

type Key = (Opcode, Vec<ValueRef>);

fn key_for(cx: &Context, inst: InstRef) -> Option<Key> {
    let opcode = cx.insts[inst].opcode.clone();
    if opcode.has_side_effects() {
        return None;
    }
    let operands: Vec<ValueRef> =
        (0..cx.insts[inst].operands.len()).map(|i| cx.uses.get(cx.insts[inst].operands[i]).value).collect();
    Some((opcode, operands))
}

pub fn run(cx: &mut Context, func: FuncRef) {
    for &block in &cx.funcs[func].blocks.clone() {
        let mut seen: HashMap<Key, InstRef> = HashMap::new();
        for inst in cx.blocks[block].insts.clone() {
            let Some(key) = key_for(cx, inst) else { continue };
            match seen.get(&key) {
                Some(&earlier) => {
                    cx.replace_instruction_with_value(inst, ValueRef::Inst(earlier));
                }
                None => {
                    seen.insert(key, inst);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::function::Linkage;

    #[test]
    fn replaces_a_repeated_computation_with_the_first_one() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[i32_ty], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);
        let entry = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        let five = cx.const_int(i32_ty, 5);
        let first = b.build_add(i32_ty, ValueRef::Arg(arg0), ValueRef::Const(five));
        let second = b.build_add(i32_ty, ValueRef::Arg(arg0), ValueRef::Const(five));
        b.build_ret(Some(ValueRef::Inst(second)));

        run(&mut cx, f);

        assert_eq!(cx.uses.get(cx.insts[cx.blocks[entry].terminator().unwrap()].operands[0]).value, ValueRef::Inst(first));
    }

    #[test]
    fn never_merges_two_instructions_with_side_effects() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);
        let entry = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let a = b.build_alloca(i32_ty).unwrap();
        let bb = b.build_alloca(i32_ty).unwrap();
        b.build_ret(None);

        run(&mut cx, f);

        assert!(cx.blocks[entry].insts.contains(&a));
        assert!(cx.blocks[entry].insts.contains(&bb));
    }

    #[test]
    fn does_not_merge_computations_with_different_operands() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[i32_ty], false);
        let f = cx.declare_function("f", fn_ty, Linkage::Internal);
        let entry = cx.new_block(f);

        let mut b = Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        let five = cx.const_int(i32_ty, 5);
        let six = cx.const_int(i32_ty, 6);
        let first = b.build_add(i32_ty, ValueRef::Arg(arg0), ValueRef::Const(five));
        let second = b.build_add(i32_ty, ValueRef::Arg(arg0), ValueRef::Const(six));
        b.build_ret(Some(ValueRef::Inst(second)));

        run(&mut cx, f);

        assert!(cx.blocks[entry].insts.contains(&first));
        assert!(cx.blocks[entry].insts.contains(&second));
    }
}
