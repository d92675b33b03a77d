//! The optimization pipeline run once a function's body is complete
//! (`Builder::finish_function`), and the module-level inliner run once all
//! functions in a module are built.
//!
//! Order matters: `single_return_block` and `simplify_cfg` normalize the
//! CFG before `ssa` promotes memory to registers (mem2reg needs a settled
//! CFG to compute join points correctly); the value-level passes
//! (`constant_fold`, `peephole`, `canonicalize`, `lvn`) run after SSA
//! construction so they see registers, not loads/stores; `reorder_blocks`
//! and `redundant_phi`/`dce` clean up what those passes leave behind.

use crate::check::func_check;
use crate::entities::FuncRef;
use crate::Context;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub enable_inline: bool,
    /// A callee with at most this many instructions is a candidate for
    /// inlining into any caller.
    pub inline_instruction_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { enable_inline: true, inline_instruction_threshold: 40 }
    }
}

/// Runs the 11-stage per-function pipeline. Validates well-formedness
/// before and after: any pass that leaves the CFG malformed panics inside
/// `func_check` at the return boundary, not on the next function to touch
/// it.
pub fn run_function_pipeline(cx: &mut Context, func: FuncRef, _config: &PipelineConfig) {
    if cx.funcs[func].is_declaration() {
        return;
    }
    func_check(cx, func);

    crate::passes::single_return_block::run(cx, func);
    crate::passes::simplify_cfg::run(cx, func);
    crate::passes::ssa::run(cx, func);
    crate::passes::constant_fold::run(cx, func);
    crate::passes::peephole::run(cx, func);
    crate::passes::canonicalize::run(cx, func);
    crate::passes::reorder_blocks::run(cx, func);
    crate::passes::redundant_phi::run(cx, func);
    crate::passes::dce::run(cx, func);
    crate::passes::lvn::run(cx, func);

    func_check(cx, func);
}

/// Runs the module-level inliner over every definition in `cx`. Call once
/// after every function has gone through `run_function_pipeline`.
pub fn run_module_pipeline(cx: &mut Context, config: &PipelineConfig) {
    if config.enable_inline {
        crate::passes::inline::run(cx, config);
    }
}
