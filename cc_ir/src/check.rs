//! Well-formedness validation (`func_check` / `instr_check`).
//!
//! CFG and phi-arity violations are bugs in whichever pass produced them,
//! not user-facing errors, so these checks `assert!`/`panic!` rather than
//! return a `Result` -- consistent with the crate's error-handling split
//! (`cc_common::CompileError` is for recoverable construction failures
//! only). Run these after any pass that rewrites the CFG or phi operands;
//! the pipeline runs `func_check` once at the start and end of
//! `run_function_pipeline`.

use crate::entities::{BlockRef, FuncRef, InstRef};
use crate::instruction::Opcode;
use crate::Context;

pub fn instr_check(cx: &Context, inst: InstRef) {
    let data = &cx.insts[inst];
    match &data.opcode {
        Opcode::Br => assert_eq!(data.successors.len(), 1, "{inst}: br must have exactly one successor"),
        Opcode::CondBr => {
            assert_eq!(data.operands.len(), 1, "{inst}: cond_br must have exactly one condition operand");
            assert_eq!(data.successors.len(), 2, "{inst}: cond_br must have exactly two successors");
        }
        Opcode::Switch => {
            assert_eq!(data.operands.len(), 1, "{inst}: switch must have exactly one scrutinee operand");
            assert_eq!(
                data.successors.len(),
                data.switch_values.len() + 1,
                "{inst}: switch successor count must be case count + 1 (default)"
            );
        }
        Opcode::Ret => assert!(data.operands.len() <= 1, "{inst}: ret takes at most one operand"),
        Opcode::Unreachable => assert!(data.operands.is_empty(), "{inst}: unreachable takes no operands"),
        Opcode::Phi => assert_eq!(
            data.operands.len(),
            data.phi_incoming.len(),
            "{inst}: phi operand count must match incoming-block count"
        ),
        Opcode::Gep { .. } => assert!(!data.operands.is_empty(), "{inst}: gep requires a base pointer operand"),
        _ => {}
    }
}

/// Validates one function: phi placement, terminator uniqueness, CFG
/// pred/succ agreement.
pub fn func_check(cx: &Context, func: FuncRef) {
    let f = &cx.funcs[func];
    if f.is_declaration() {
        return;
    }

    for &block in &f.blocks {
        let b = &cx.blocks[block];
        assert!(!b.insts.is_empty(), "{block}: block has no instructions");

        let mut seen_non_phi = false;
        for (i, &inst) in b.insts.iter().enumerate() {
            instr_check(cx, inst);
            let is_last = i + 1 == b.insts.len();
            let is_phi = matches!(cx.insts[inst].opcode, Opcode::Phi);
            if is_phi {
                assert!(!seen_non_phi, "{inst}: phi must precede all non-phi instructions in {block}");
            } else {
                seen_non_phi = true;
            }
            if is_last {
                assert!(cx.insts[inst].is_terminator(), "{block}: last instruction must be a terminator");
            } else {
                assert!(!cx.insts[inst].is_terminator(), "{inst}: terminator found mid-block in {block}");
            }
        }

        check_cfg_edges(cx, block);
    }
}

fn check_cfg_edges(cx: &Context, block: BlockRef) {
    let b = &cx.blocks[block];
    let Some(term) = b.terminator() else { return };
    for &succ in &cx.insts[term].successors {
        assert!(
            cx.blocks[succ].preds.contains(&block),
            "{block}: successor {succ} does not list {block} as a predecessor"
        );
    }
}
