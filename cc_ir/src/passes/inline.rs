//! Module-level inliner.
//!
//! Builds a call graph over every function definition, uses Tarjan's
//! strongly-connected-components algorithm to find recursive functions (any
//! SCC with more than one member, or a single function that calls itself),
//! and inlines call sites whose callee is a non-recursive definition at or
//! under `inline_instruction_threshold` instructions. Each caller is
//! processed once per pipeline run; a callee that itself absorbed an inline
//! is not re-inlined into further callers in the same run (no fixpoint
//! iteration), keeping this a single, bounded sweep like the one the
//! per-function pipeline already performs for its own passes.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::builder::Builder;
use crate::entities::{ArgRef, BlockRef, FuncRef, InstRef, ValueRef};
use crate::instruction::Opcode;
use crate::pass::PipelineConfig;
use crate::Context;

fn call_targets(cx: &Context, func: FuncRef) -> Vec<FuncRef> {
    let mut targets = Vec::new();
    for &block in &cx.funcs[func].blocks {
        for &inst in &cx.blocks[block].insts {
            if let Opcode::Call { .. } = cx.insts[inst].opcode {
                let callee_use = cx.insts[inst].operands[0];
                if let ValueRef::Func(target) = cx.uses.get(callee_use).value {
                    targets.push(target);
                }
            }
        }
    }
    targets
}

/// Tarjan SCC over the call graph; returns the SCC id for each function that
/// has a body. Functions in a singleton SCC without a self-edge are safe to
/// inline into; everything else is (mutually or directly) recursive.
fn recursive_functions(cx: &Context, defs: &[FuncRef]) -> hashbrown::HashSet<FuncRef> {
    struct Tarjan<'a> {
        cx: &'a Context,
        index: HashMap<FuncRef, usize>,
        low: HashMap<FuncRef, usize>,
        on_stack: hashbrown::HashSet<FuncRef>,
        stack: Vec<FuncRef>,
        next_index: usize,
        sccs: Vec<Vec<FuncRef>>,
    }

    impl<'a> Tarjan<'a> {
        fn visit(&mut self, v: FuncRef) {
            self.index.insert(v, self.next_index);
            self.low.insert(v, self.next_index);
            self.next_index += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            for w in call_targets(self.cx, v) {
                if self.cx.funcs[w].is_declaration() {
                    continue;
                }
                if !self.index.contains_key(&w) {
                    self.visit(w);
                    let low_w = self.low[&w];
                    let low_v = self.low[&v];
                    self.low.insert(v, low_v.min(low_w));
                } else if self.on_stack.contains(&w) {
                    let idx_w = self.index[&w];
                    let low_v = self.low[&v];
                    self.low.insert(v, low_v.min(idx_w));
                }
            }

            if self.low[&v] == self.index[&v] {
                let mut scc = Vec::new();
                loop {
                    let w = self.stack.pop().unwrap();
                    self.on_stack.remove(&w);
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    let mut tarjan = Tarjan {
        cx,
        index: HashMap::new(),
        low: HashMap::new(),
        on_stack: hashbrown::HashSet::new(),
        stack: Vec::new(),
        next_index: 0,
        sccs: Vec::new(),
    };
    for &f in defs {
        if !tarjan.index.contains_key(&f) {
            tarjan.visit(f);
        }
    }

    let mut recursive = hashbrown::HashSet::new();
    for scc in &tarjan.sccs {
        if scc.len() > 1 {
            recursive.extend(scc.iter().copied());
        } else {
            let only = scc[0];
            if call_targets(cx, only).contains(&only) {
                recursive.insert(only);
            }
        }
    }
    recursive
}

fn instruction_count(cx: &Context, func: FuncRef) -> usize {
    cx.funcs[func].blocks.iter().map(|&b| cx.blocks[b].insts.len()).sum()
}

/// The cloning pass below resolves phi operands as it walks blocks in their
/// existing (already reverse-postorder) sequence, so it can only handle
/// phis whose incoming values are defined strictly earlier in that order.
/// A loop's back edge breaks that assumption, so functions containing one
/// are left un-inlined rather than risk splicing a phi with an unresolved
/// operand.
fn has_back_edge(cx: &Context, func: FuncRef) -> bool {
    let position: HashMap<BlockRef, usize> =
        cx.funcs[func].blocks.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    for (&block, &pos) in &position {
        if let Some(term) = cx.blocks[block].terminator() {
            for &succ in &cx.insts[term].successors {
                if position[&succ] <= pos {
                    return true;
                }
            }
        }
    }
    false
}

pub fn run(cx: &mut Context, config: &PipelineConfig) {
    let defs: Vec<FuncRef> = cx.funcs.keys().filter(|&f| !cx.funcs[f].is_declaration()).collect();
    let recursive = recursive_functions(cx, &defs);

    for &caller in &defs {
        loop {
            let call_sites: Vec<InstRef> = cx.funcs[caller]
                .blocks
                .iter()
                .flat_map(|&b| cx.blocks[b].insts.clone())
                .filter(|&inst| matches!(cx.insts[inst].opcode, Opcode::Call { .. }))
                .collect();

            let mut inlined_any = false;
            for call in call_sites {
                let Some(callee) = callee_of(cx, call) else { continue };
                if callee == caller || recursive.contains(&callee) || cx.funcs[callee].is_declaration() {
                    continue;
                }
                if instruction_count(cx, callee) > config.inline_instruction_threshold {
                    continue;
                }
                if has_back_edge(cx, callee) {
                    continue;
                }
                inline_call(cx, caller, call, callee);
                inlined_any = true;
                break; // block list changed; recompute call sites
            }
            if !inlined_any {
                break;
            }
        }
    }
}

fn callee_of(cx: &Context, call: InstRef) -> Option<FuncRef> {
    let use_id = cx.insts[call].operands[0];
    match cx.uses.get(use_id).value {
        ValueRef::Func(f) => Some(f),
        _ => None,
    }
}

/// Splices `callee`'s body into `caller` at `call`, replacing the call's
/// result with the callee's return value.
fn inline_call(cx: &mut Context, caller: FuncRef, call: InstRef, callee: FuncRef) {
    let call_block = cx.insts[call].block;
    let call_args: Vec<ValueRef> =
        (1..cx.insts[call].operands.len()).map(|i| cx.uses.get(cx.insts[call].operands[i]).value).collect();

    // 1. Split `call_block` right after `call` into a continuation block.
    let continuation = cx.new_block(caller);
    let pos_in_block = cx.blocks[call_block].insts.iter().position(|&i| i == call).unwrap();
    let tail: Vec<InstRef> = cx.blocks[call_block].insts.split_off(pos_in_block + 1);
    cx.remove_instruction(call); // unlinks its operand uses (callee + args)
    for &inst in &tail {
        cx.insts[inst].block = continuation;
    }
    cx.blocks[continuation].insts = tail;
    // Successors of the old terminator (now living in `continuation`) must
    // point their `preds` at `continuation` instead of `call_block`.
    if let Some(term) = cx.blocks[continuation].terminator() {
        for succ in cx.insts[term].successors.clone() {
            cx.blocks[succ].remove_pred(call_block);
            cx.blocks[succ].add_pred(continuation);
        }
    }

    // 2. Map callee arguments to the call's actual argument values.
    let mut arg_map: HashMap<ArgRef, ValueRef> = HashMap::new();
    for (param, &value) in cx.funcs[callee].params.clone().iter().zip(&call_args) {
        arg_map.insert(*param, value);
    }

    // 3. Clone every callee block (structure only), then clone instructions
    // into them, then resolve operands -- three passes so forward and back
    // references both work.
    let callee_blocks = cx.funcs[callee].blocks.clone();
    let mut block_map: HashMap<BlockRef, BlockRef> = HashMap::new();
    for &old_block in &callee_blocks {
        block_map.insert(old_block, cx.new_block(caller));
    }

    let mut inst_map: HashMap<InstRef, ValueRef> = HashMap::new();
    let mut return_value: Option<ValueRef> = None;

    for &old_block in &callee_blocks {
        let new_block = block_map[&old_block];
        for old_inst in cx.blocks[old_block].insts.clone() {
            let opcode = cx.insts[old_inst].opcode.clone();
            let operand_values: Vec<ValueRef> = (0..cx.insts[old_inst].operands.len())
                .map(|i| {
                    let v = cx.uses.get(cx.insts[old_inst].operands[i]).value;
                    remap(cx, &arg_map, &inst_map, v)
                })
                .collect();

            match opcode {
                Opcode::Ret => {
                    return_value = operand_values.first().copied();
                    Builder::new(cx, caller, new_block).build_br(continuation);
                }
                Opcode::Br => {
                    let target = block_map[&cx.insts[old_inst].successors[0]];
                    Builder::new(cx, caller, new_block).build_br(target);
                }
                Opcode::CondBr => {
                    let succs = cx.insts[old_inst].successors.clone();
                    let if_true = block_map[&succs[0]];
                    let if_false = block_map[&succs[1]];
                    Builder::new(cx, caller, new_block).build_cond_br(operand_values[0], if_true, if_false);
                }
                Opcode::Switch => {
                    let succs = cx.insts[old_inst].successors.clone();
                    let values = cx.insts[old_inst].switch_values.clone();
                    let default = block_map[&succs[0]];
                    let cases: Vec<_> =
                        values.iter().zip(&succs[1..]).map(|(&v, &t)| (v, block_map[&t])).collect();
                    Builder::new(cx, caller, new_block).build_switch(operand_values[0], default, &cases);
                }
                Opcode::Unreachable => {
                    Builder::new(cx, caller, new_block).build_unreachable();
                }
                _ => {
                    let new_inst =
                        clone_with_operands(cx, caller, new_block, old_inst, &opcode, &operand_values, &block_map);
                    inst_map.insert(old_inst, ValueRef::Inst(new_inst));
                }
            }
        }
    }

    // 4. Wire the original caller entry into the cloned callee entry, and
    // replace the call's result with the returned value (if any).
    let entry = block_map[&cx.funcs[callee].entry().unwrap()];
    let mut b = Builder::new(cx, caller, call_block);
    b.build_br(entry);

    if let Some(value) = return_value {
        cx.replace_all_uses_with(ValueRef::Inst(call), value);
    }
}

fn remap(
    cx: &Context,
    arg_map: &HashMap<ArgRef, ValueRef>,
    inst_map: &HashMap<InstRef, ValueRef>,
    value: ValueRef,
) -> ValueRef {
    match value {
        ValueRef::Arg(a) => *arg_map.get(&a).unwrap_or(&value),
        ValueRef::Inst(i) => *inst_map.get(&i).unwrap_or(&value),
        other => {
            let _ = cx;
            other
        }
    }
}

fn clone_with_operands(
    cx: &mut Context,
    func: FuncRef,
    block: BlockRef,
    old_inst: InstRef,
    opcode: &Opcode,
    operands: &[ValueRef],
    block_map: &HashMap<BlockRef, BlockRef>,
) -> InstRef {
    let ty = cx.insts[old_inst].ty;
    let mut b = Builder::new(cx, func, block);
    match opcode {
        Opcode::Add => b.build_add(ty, operands[0], operands[1]),
        Opcode::Sub => b.build_sub(ty, operands[0], operands[1]),
        Opcode::Mul => b.build_mul(ty, operands[0], operands[1]),
        Opcode::SDiv => b.build_sdiv(ty, operands[0], operands[1]),
        Opcode::UDiv => b.build_udiv(ty, operands[0], operands[1]),
        Opcode::SRem => b.build_srem(ty, operands[0], operands[1]),
        Opcode::URem => b.build_urem(ty, operands[0], operands[1]),
        Opcode::And => b.build_and(ty, operands[0], operands[1]),
        Opcode::Or => b.build_or(ty, operands[0], operands[1]),
        Opcode::Xor => b.build_xor(ty, operands[0], operands[1]),
        Opcode::Shl => b.build_shl(ty, operands[0], operands[1]),
        Opcode::LShr => b.build_lshr(ty, operands[0], operands[1]),
        Opcode::AShr => b.build_ashr(ty, operands[0], operands[1]),
        Opcode::FAdd => b.build_fadd(ty, operands[0], operands[1]),
        Opcode::FSub => b.build_fsub(ty, operands[0], operands[1]),
        Opcode::FMul => b.build_fmul(ty, operands[0], operands[1]),
        Opcode::FDiv => b.build_fdiv(ty, operands[0], operands[1]),
        Opcode::ICmp(pred) => b.build_icmp(*pred, operands[0], operands[1]),
        Opcode::FCmp(pred) => b.build_fcmp(*pred, operands[0], operands[1]),
        Opcode::Select => b.build_select(ty, operands[0], operands[1], operands[2]),
        Opcode::Trunc => b.build_trunc(ty, operands[0]),
        Opcode::ZExt => b.build_zext(ty, operands[0]),
        Opcode::SExt => b.build_sext(ty, operands[0]),
        Opcode::FpTrunc => b.build_fptrunc(ty, operands[0]),
        Opcode::FpExt => b.build_fpext(ty, operands[0]),
        Opcode::FpToSi => b.build_fptosi(ty, operands[0]),
        Opcode::FpToUi => b.build_fptoui(ty, operands[0]),
        Opcode::SiToFp => b.build_sitofp(ty, operands[0]),
        Opcode::UiToFp => b.build_uitofp(ty, operands[0]),
        Opcode::PtrToInt => b.build_ptrtoint(ty, operands[0]),
        Opcode::IntToPtr => b.build_inttoptr(ty, operands[0]),
        Opcode::Bitcast => b.build_bitcast(ty, operands[0]),
        Opcode::Alloca { alloc_ty } => b.build_alloca(*alloc_ty).expect("inline: re-cloning a valid alloca"),
        Opcode::Load => b.build_load(ty, operands[0]),
        Opcode::Store => b.build_store(operands[0], operands[1]),
        Opcode::Gep { inbounds } => b.build_gep(ty, *inbounds, operands[0], &operands[1..]),
        Opcode::Call { vararg } => b.build_call(ty, operands[0], &operands[1..], *vararg),
        Opcode::Phi => {
            let old_incoming = &cx_insts_phi_incoming(b.cx, old_inst);
            let incoming: SmallVec<[(BlockRef, ValueRef); 4]> = old_incoming
                .iter()
                .zip(operands)
                .map(|(&old_block, &v)| (block_map[&old_block], v))
                .collect();
            b.build_phi(ty, &incoming)
        }
        Opcode::Br | Opcode::CondBr | Opcode::Switch | Opcode::Ret | Opcode::Unreachable => {
            unreachable!("terminators other than ret are handled by the caller, ret is special-cased")
        }
    }
}

fn cx_insts_phi_incoming(cx: &Context, inst: InstRef) -> SmallVec<[BlockRef; 4]> {
    cx.insts[inst].phi_incoming.clone()
}
