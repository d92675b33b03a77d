//! Spill rewrite (load-before-use/store-after-def around a stack slot) and
//! the final pass that rewrites every virtual register operand to its
//! assigned physical color.

use smallvec::smallvec;

use super::defuse::def_use;
use super::graph::Graph;
use crate::function::MirFunction;
use crate::instruction::{MirInstruction, Opcode};
use crate::operand::MirOperand;
use crate::reg::{HwReg, RegId};

fn replace_register(inst: &mut MirInstruction, old: RegId, new: RegId) {
    for op in inst.operands.iter_mut() {
        match op {
            MirOperand::Register(r) if *r == old => *r = new,
            MirOperand::MemoryRef(m) => {
                if m.base == Some(old) {
                    m.base = Some(new);
                }
                if m.index == Some(old) {
                    m.index = Some(new);
                }
            }
            _ => {}
        }
    }
}

/// For every spilled virtual register: allocate a stack slot sized for its
/// type, then walk every instruction referencing it and insert a reload
/// before a use, a spill store after a def, or both, rewriting the
/// instruction to a fresh virtual register in either case. The fresh
/// register is itself unconstrained (no interference recorded for it
/// yet), so the next liveness/build/color iteration treats it like any
/// other candidate -- most will get a physical color immediately since
/// their live range is a single instruction.
pub fn rewrite_spills(func: &mut MirFunction, spilled: &[RegId]) {
    for &vreg in spilled {
        let ty = func.vreg_type(vreg);
        let slot = func.frame.alloc_object(ty.size(), ty.align());

        let blocks = func.blocks.clone();
        for block in blocks {
            let insts = func.block_arena[block].insts.clone();
            let mut new_insts = Vec::with_capacity(insts.len());

            for inst_id in insts {
                let du = def_use(&func.insts[inst_id]);
                let is_def = du.defs.contains(&vreg);
                let is_use = du.uses.contains(&vreg);
                if !is_def && !is_use {
                    new_insts.push(inst_id);
                    continue;
                }

                let fresh = func.new_vreg(ty);
                if is_use {
                    let load = func.insts.push(MirInstruction {
                        opcode: Opcode::Mov,
                        operands: smallvec![MirOperand::Register(fresh), MirOperand::StackObject(slot)],
                        block,
                    });
                    new_insts.push(load);
                }

                replace_register(&mut func.insts[inst_id], vreg, fresh);
                new_insts.push(inst_id);

                if is_def {
                    let store = func.insts.push(MirInstruction {
                        opcode: Opcode::Mov,
                        operands: smallvec![MirOperand::StackObject(slot), MirOperand::Register(fresh)],
                        block,
                    });
                    new_insts.push(store);
                }
            }

            func.block_arena[block].insts = new_insts;
        }
    }
}

/// After a complete coloring, rewrites every register operand in the
/// function from its virtual ID to the physical register `color`
/// assigned it.
pub fn apply_colors(func: &mut MirFunction, graph: &Graph) {
    let blocks = func.blocks.clone();
    for block in blocks {
        let insts = func.block_arena[block].insts.clone();
        for inst_id in insts {
            for op in func.insts[inst_id].operands.iter_mut() {
                match op {
                    MirOperand::Register(r) if r.is_virtual() => {
                        let alias = graph.alias(*r);
                        let color = graph.nodes[&alias].color.expect("colored node without a color");
                        *r = HwReg::ALL[color as usize].id();
                    }
                    MirOperand::MemoryRef(m) => {
                        if let Some(b) = m.base {
                            if b.is_virtual() {
                                let alias = graph.alias(b);
                                let color = graph.nodes[&alias].color.expect("colored node without a color");
                                m.base = Some(HwReg::ALL[color as usize].id());
                            }
                        }
                        if let Some(i) = m.index {
                            if i.is_virtual() {
                                let alias = graph.alias(i);
                                let color = graph.nodes[&alias].color.expect("colored node without a color");
                                m.index = Some(HwReg::ALL[color as usize].id());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
