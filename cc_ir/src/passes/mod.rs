//! The 11 passes making up the per-function pipeline plus the module-level
//! inliner, in the order they run (see `crate::pass::run_function_pipeline`).

pub mod canonicalize;
pub mod constant_fold;
pub mod dce;
pub mod inline;
pub mod lvn;
pub mod peephole;
pub mod redundant_phi;
pub mod reorder_blocks;
pub mod simplify_cfg;
pub mod single_return_block;
pub mod ssa;
