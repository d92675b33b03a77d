//! MIR textual printer (diagnostic; not a parseable format): Intel-like
//! syntax with size-suffixed operands and register names printed at
//! whatever width the instruction's memory reference or register size
//! implies.

use std::fmt::Write as _;

use crate::context::MirContext;
use crate::entities::{BlockId, InstId, MirFuncId};
use crate::function::MirFunction;
use crate::instruction::{ConditionCode, Opcode};
use crate::operand::{ConstValue, MirOperand};
use crate::reg::{HwReg, MirSize, RegId};

pub fn print_context(cx: &MirContext) -> String {
    let mut out = String::new();
    let mut ids: Vec<MirFuncId> = cx.funcs.keys().collect();
    ids.sort_by_key(|f| f.index());
    for id in ids {
        print_function(&cx.funcs[id], &mut out);
        out.push('\n');
    }
    out
}

pub fn print_function(func: &MirFunction, out: &mut String) {
    let _ = writeln!(out, "global {}:", func.name);
    if func.is_external() {
        return;
    }
    for &block in &func.blocks {
        print_block(func, block, out);
    }
}

fn print_block(func: &MirFunction, block: BlockId, out: &mut String) {
    let _ = writeln!(out, "bb.{}:", block.index());
    for &inst in &func.block_arena[block].insts {
        out.push_str("  ");
        print_instruction(func, inst, out);
        out.push('\n');
    }
}

fn size_suffix(size: MirSize) -> &'static str {
    match size {
        MirSize::B => "byte ptr",
        MirSize::W => "word ptr",
        MirSize::D => "dword ptr",
        MirSize::Q => "qword ptr",
    }
}

fn reg_str(r: RegId, size: MirSize) -> String {
    match r.as_hw_reg() {
        Some(hw) => format!("${}", hw.name(size)),
        None => format!("%vr{}", r.0 - crate::reg::FIRST_VIRTUAL_REGISTER),
    }
}

fn operand_str(func: &MirFunction, op: &MirOperand, size: MirSize) -> String {
    match op {
        MirOperand::Register(r) => reg_str(*r, size),
        MirOperand::Const(ConstValue::Int(v)) => v.to_string(),
        MirOperand::Const(ConstValue::FloatBits(bits)) => format!("0x{bits:016x}"),
        MirOperand::BasicBlock(b) => format!("bb.{}", b.index()),
        MirOperand::StackObject(s) => format!("[slot.{}]", s.index()),
        MirOperand::MemoryRef(m) => {
            let mut parts = Vec::new();
            if let Some(base) = m.base {
                parts.push(reg_str(base, MirSize::Q));
            }
            if let Some(index) = m.index {
                parts.push(format!("{}*{}", reg_str(index, MirSize::Q), m.scale));
            }
            if m.displacement != 0 || parts.is_empty() {
                parts.push(m.displacement.to_string());
            }
            let _ = func;
            format!("{} [{}]", size_suffix(size), parts.join(" + "))
        }
        MirOperand::ExternalSymbol(name) => format!("@{name}"),
        MirOperand::GlobalVariable(name) => format!("@{name}"),
    }
}

fn cc_mnemonic(cc: ConditionCode) -> &'static str {
    use ConditionCode::*;
    match cc {
        O => "o", No => "no", B => "b", Nb => "nb", E => "e", Ne => "ne", Be => "be", Nbe => "nbe",
        S => "s", Ns => "ns", P => "p", Np => "np", L => "l", Nl => "nl", Le => "le", Nle => "nle",
    }
}

pub fn print_instruction(func: &MirFunction, inst_id: InstId, out: &mut String) {
    let inst = &func.insts[inst_id];
    // The allocator colors every register to a full 64-bit GPR; this
    // printer doesn't yet track sub-register widths (byte/word/dword
    // moves), so everything prints at qword width.
    let size = MirSize::Q;
    let ops: Vec<String> = inst.operands.iter().map(|op| operand_str(func, op, size)).collect();

    let mnemonic = match inst.opcode {
        Opcode::Ret => "ret",
        Opcode::Cmp => "cmp",
        Opcode::Test => "test",
        Opcode::Jmp => "jmp",
        Opcode::Phi => "phi",
        Opcode::Mov => "mov",
        Opcode::MovSx => "movsx",
        Opcode::MovZx => "movzx",
        Opcode::IMul => "imul",
        Opcode::IDiv => "idiv",
        Opcode::Div => "div",
        Opcode::Add => "add",
        Opcode::Sub => "sub",
        Opcode::Lea => "lea",
        Opcode::Xor => "xor",
        Opcode::And => "and",
        Opcode::Or => "or",
        Opcode::Sar => "sar",
        Opcode::Shr => "shr",
        Opcode::Shl => "shl",
        Opcode::Call => "call",
        Opcode::Push => "push",
        Opcode::Pop => "pop",
        Opcode::Cdq => "cdq",
        Opcode::Cqo => "cqo",
        Opcode::SetCc(cc) => return write_mnemonic(out, &format!("set{}", cc_mnemonic(cc)), &ops),
        Opcode::Jcc(cc) => return write_mnemonic(out, &format!("j{}", cc_mnemonic(cc)), &ops),
    };
    write_mnemonic(out, mnemonic, &ops);
}

fn write_mnemonic(out: &mut String, mnemonic: &str, ops: &[String]) {
    if ops.is_empty() {
        out.push_str(mnemonic);
    } else {
        let _ = write!(out, "{} {}", mnemonic, ops.join(", "));
    }
}

pub fn hw_reg_name(hw: HwReg, size: MirSize) -> &'static str {
    hw.name(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MirBuilder;
    use crate::function::{FunctionFlags, MirFunction};
    use crate::operand::mem;
    use crate::types::MirType;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_a_physical_register_move_as_dollar_prefixed_names() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry)
            .build_mov(MirOperand::reg(HwReg::A.id()), MirOperand::reg(HwReg::C.id()));

        let mut out = String::new();
        print_instruction(&func, func.block_arena[entry].insts[0], &mut out);

        assert_eq!(out, "mov $rax, $rcx");
    }

    #[test]
    fn prints_a_virtual_register_as_percent_vr() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let vr = func.new_vreg(MirType::I64);
        MirBuilder::new(&mut func, entry).build_mov(MirOperand::reg(vr), MirOperand::int(1));

        let mut out = String::new();
        print_instruction(&func, func.block_arena[entry].insts[0], &mut out);

        assert_eq!(out, "mov %vr0, 1");
    }

    #[test]
    fn prints_a_memory_operand_with_base_index_scale_and_displacement() {
        let mut func = MirFunction::new("f", MirType::I64, FunctionFlags::empty());
        let entry = func.append_block();
        let base = HwReg::Bp.id();
        let index = HwReg::Si.id();
        let m = mem(Some(base), Some(index), 4, -16);
        MirBuilder::new(&mut func, entry).build_mov(MirOperand::reg(HwReg::A.id()), m);

        let mut out = String::new();
        print_instruction(&func, func.block_arena[entry].insts[0], &mut out);

        assert_eq!(out, "mov $rax, qword ptr [$rbp + $rsi*4 + -16]");
    }

    #[test]
    fn prints_setcc_and_jcc_with_the_condition_mnemonic_fused_in() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        let target = func.append_block();
        let vr = func.new_vreg(MirType::I64);
        let mut b = MirBuilder::new(&mut func, entry);
        b.build_setcc(ConditionCode::L, MirOperand::reg(vr));
        b.build_jcc(ConditionCode::Ne, target);

        let insts = func.block_arena[entry].insts.clone();
        let mut out = String::new();
        print_instruction(&func, insts[0], &mut out);
        assert_eq!(out, "setl %vr0");
        out.clear();
        print_instruction(&func, insts[1], &mut out);
        assert_eq!(out, "jne bb.1");
    }

    #[test]
    fn prints_a_bare_mnemonic_instruction_with_no_operand_list() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::empty());
        let entry = func.append_block();
        MirBuilder::new(&mut func, entry).build_ret(None);

        let mut out = String::new();
        print_instruction(&func, func.block_arena[entry].insts[0], &mut out);

        assert_eq!(out, "ret");
    }

    #[test]
    fn print_function_prints_one_block_header_per_block_and_skips_bodies_for_externals() {
        let mut func = MirFunction::new("f", MirType::Void, FunctionFlags::EXTERNAL);
        func.append_block();

        let mut out = String::new();
        print_function(&func, &mut out);

        assert_eq!(out, "global f:\n");
    }
}
