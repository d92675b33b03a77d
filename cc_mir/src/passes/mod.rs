//! The four passes that run on a `MirFunction` between instruction
//! selection and register allocation, in the order `run_all` applies them.

pub mod fix_mem_mem;
pub mod remove_fallthrough;
pub mod remove_redundant_moves;
pub mod simplify_condjumps;

use crate::function::MirFunction;

/// Runs every pre-regalloc pass once, in a fixed order: simplifying
/// conditional jumps can expose a new fallthrough-able `jmp`, and fixing
/// up `mem, mem` operands can introduce fresh `mov r, r` pairs, so
/// `remove_fallthrough` and `remove_redundant_moves` both run last.
pub fn run_all(func: &mut MirFunction) {
    simplify_condjumps::run(func);
    fix_mem_mem::run(func);
    remove_fallthrough::run(func);
    remove_redundant_moves::run(func);
}
