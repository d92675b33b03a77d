//! Iterated Register Coalescing: George & Appel's register allocator,
//! built on liveness + interference-graph construction, coalescing,
//! spilling, and color assignment. Run once per function, after the
//! pre-regalloc MIR passes and before prologue/epilogue insertion (the
//! spill-rewrite loop below needs to be free to grow the frame).

mod build;
mod cfg;
mod color;
mod defuse;
mod graph;
mod liveness;
mod main_loop;
mod rewrite;

use hashbrown::HashSet;

use crate::function::MirFunction;
use crate::reg::RegId;
use graph::Graph;

/// Spill rewriting can in principle loop forever if the allocator keeps
/// manufacturing new spillable candidates faster than it retires them;
/// this is a hard backstop, not a tuning knob.
const MAX_SPILL_ITERATIONS: usize = 10;

fn virtual_registers(func: &MirFunction) -> HashSet<RegId> {
    let mut regs = HashSet::new();
    for &block in &func.blocks {
        for &inst_id in &func.block_arena[block].insts {
            let du = defuse::def_use(&func.insts[inst_id]);
            for r in du.defs.iter().chain(du.uses.iter()) {
                if r.is_virtual() {
                    regs.insert(*r);
                }
            }
        }
    }
    regs
}

/// Colors every virtual register in `func`, inserting spill code and
/// retrying as needed. Panics if coloring fails to converge within
/// `MAX_SPILL_ITERATIONS` -- a correctly functioning allocator always
/// converges since a fully spilled function (every vreg in its own slot,
/// live one instruction at a time) is always colorable.
pub fn allocate(func: &mut MirFunction) {
    for iteration in 0..MAX_SPILL_ITERATIONS {
        let registers = virtual_registers(func);
        let mut g = Graph::new(registers);

        let liveness = liveness::analyze(func);
        build::build(func, &liveness, &mut g);
        build::make_worklist(&mut g);

        while main_loop::has_work(&g) {
            main_loop::step(&mut g);
        }

        let fully_colored = color::assign_colors(&mut g);
        if fully_colored {
            rewrite::apply_colors(func, &g);
            crate::passes::remove_redundant_moves::run(func);
            return;
        }

        log::debug!(
            "register allocation spill iteration {iteration}: {} register(s) spilled",
            color::spilled_registers(&g).len()
        );
        rewrite::rewrite_spills(func, &color::spilled_registers(&g));
    }

    panic!(
        "register allocation for `{}` did not converge after {MAX_SPILL_ITERATIONS} spill iterations",
        func.name
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::FunctionFlags;
    use crate::operand::MirOperand;
    use crate::reg::HwReg;
    use crate::types::MirType;

    fn all_operands_are_physical(func: &MirFunction) -> bool {
        func.insts.keys().all(|id| {
            func.insts[id].operands.iter().all(|op| match op {
                MirOperand::Register(r) => r.is_physical(),
                MirOperand::MemoryRef(m) => {
                    m.base.map_or(true, |r| r.is_physical()) && m.index.map_or(true, |r| r.is_physical())
                }
                _ => true,
            })
        })
    }

    /// `mov %vr1, rcx; add %vr1, 1; ret %vr1` -- `%vr1` and `rcx` are
    /// related by a move and never interfere, so George's test lets the
    /// allocator coalesce `%vr1` directly onto `rcx`.
    #[test]
    fn coalesces_a_move_related_virtual_register_onto_its_physical_source() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr1 = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_mov(MirOperand::reg(vr1), MirOperand::reg(HwReg::C.id()));
        b.build_add(MirOperand::reg(vr1), MirOperand::int(1));
        b.build_ret(Some(MirOperand::reg(vr1)));

        allocate(&mut func);

        assert!(all_operands_are_physical(&func));
        // The move should have coalesced away entirely, leaving just `add`
        // and `ret` both referencing `rcx`.
        assert_eq!(func.block_arena[entry].insts.len(), 2);
        for &inst_id in &func.block_arena[entry].insts {
            for op in &func.insts[inst_id].operands {
                if let MirOperand::Register(r) = op {
                    assert_eq!(*r, HwReg::C.id());
                }
            }
        }
    }

    /// 20 `i64` values all defined before any of them is consumed are all
    /// simultaneously live going into the read chain; against `K = 14`
    /// allocatable registers that forces at least 6 of them to a stack slot.
    #[test]
    fn spills_when_more_values_are_live_at_once_than_there_are_colors() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        const COUNT: i64 = 20;
        let mut vregs = Vec::new();
        {
            let mut b = MirBuilder::new(&mut func, entry);
            for i in 0..COUNT {
                let vr = b.func.new_vreg(MirType::I64);
                b.build_mov(MirOperand::reg(vr), MirOperand::int(i));
                vregs.push(vr);
            }
            b.build_mov(MirOperand::reg(HwReg::A.id()), MirOperand::int(0));
            for &vr in &vregs {
                b.build_add(MirOperand::reg(HwReg::A.id()), MirOperand::reg(vr));
            }
            b.build_ret(Some(MirOperand::reg(HwReg::A.id())));
        }

        allocate(&mut func);

        assert!(all_operands_are_physical(&func));
        assert!(func.frame.objects.len() >= 6);
    }
}
