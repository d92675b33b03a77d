//! Textual IR printer (format in section 6.2): one function per
//! `define`/`declare`, one block label per basic block, one line per
//! instruction. Intended for debug dumps and golden-file tests, not a
//! parser round-trip -- there is no reader for this format.

use std::fmt::Write as _;

use crate::entities::{BlockRef, ConstId, InstRef};
use crate::instruction::{FCmpPred, ICmpPred, Opcode};
use crate::types::TypeKind;
use crate::Context;

pub fn print_module(cx: &Context) -> String {
    let mut out = String::new();
    let mut func_ids: Vec<_> = cx.funcs.keys().collect();
    func_ids.sort_by_key(|f| f.index());
    for func in func_ids {
        print_function(cx, func, &mut out);
        out.push('\n');
    }
    out
}

pub fn print_function(cx: &Context, func: crate::entities::FuncRef, out: &mut String) {
    let f = &cx.funcs[func];
    if f.is_declaration() {
        let _ = writeln!(out, "declare {} @{}()", type_name(cx, f.ty), f.name);
        return;
    }
    let _ = writeln!(out, "define {} @{}() {{", type_name(cx, f.ty), f.name);
    for &block in &f.blocks {
        print_block(cx, block, out);
    }
    out.push_str("}\n");
}

fn print_block(cx: &Context, block: BlockRef, out: &mut String) {
    let _ = writeln!(out, "{}:", block);
    for &inst in &cx.blocks[block].insts {
        out.push_str("  ");
        print_instruction(cx, inst, out);
        out.push('\n');
    }
}

fn operand_str(cx: &Context, inst: InstRef, idx: usize) -> String {
    let use_id = cx.insts[inst].operands[idx];
    let value = cx.uses.get(use_id).value;
    format!("{value:?}")
}

pub fn print_instruction(cx: &Context, inst: InstRef, out: &mut String) {
    let data = &cx.insts[inst];
    let ty = type_name(cx, data.ty);
    let has_result = data.ty != cx.void_ty;
    if has_result {
        let _ = write!(out, "{} = ", inst);
    }
    match &data.opcode {
        Opcode::Add => binop(cx, inst, "add", &ty, out),
        Opcode::Sub => binop(cx, inst, "sub", &ty, out),
        Opcode::Mul => binop(cx, inst, "mul", &ty, out),
        Opcode::SDiv => binop(cx, inst, "sdiv", &ty, out),
        Opcode::UDiv => binop(cx, inst, "udiv", &ty, out),
        Opcode::SRem => binop(cx, inst, "srem", &ty, out),
        Opcode::URem => binop(cx, inst, "urem", &ty, out),
        Opcode::And => binop(cx, inst, "and", &ty, out),
        Opcode::Or => binop(cx, inst, "or", &ty, out),
        Opcode::Xor => binop(cx, inst, "xor", &ty, out),
        Opcode::Shl => binop(cx, inst, "shl", &ty, out),
        Opcode::LShr => binop(cx, inst, "lshr", &ty, out),
        Opcode::AShr => binop(cx, inst, "ashr", &ty, out),
        Opcode::FAdd => binop(cx, inst, "fadd", &ty, out),
        Opcode::FSub => binop(cx, inst, "fsub", &ty, out),
        Opcode::FMul => binop(cx, inst, "fmul", &ty, out),
        Opcode::FDiv => binop(cx, inst, "fdiv", &ty, out),
        Opcode::ICmp(pred) => {
            let _ = write!(out, "icmp {} {}, {}", icmp_name(*pred), operand_str(cx, inst, 0), operand_str(cx, inst, 1));
        }
        Opcode::FCmp(pred) => {
            let _ = write!(out, "fcmp {} {}, {}", fcmp_name(*pred), operand_str(cx, inst, 0), operand_str(cx, inst, 1));
        }
        Opcode::Select => {
            let _ = write!(
                out,
                "select {}, {}, {}",
                operand_str(cx, inst, 0),
                operand_str(cx, inst, 1),
                operand_str(cx, inst, 2)
            );
        }
        Opcode::Trunc => cast(cx, inst, "trunc", &ty, out),
        Opcode::ZExt => cast(cx, inst, "zext", &ty, out),
        Opcode::SExt => cast(cx, inst, "sext", &ty, out),
        Opcode::FpTrunc => cast(cx, inst, "fptrunc", &ty, out),
        Opcode::FpExt => cast(cx, inst, "fpext", &ty, out),
        Opcode::FpToSi => cast(cx, inst, "fptosi", &ty, out),
        Opcode::FpToUi => cast(cx, inst, "fptoui", &ty, out),
        Opcode::SiToFp => cast(cx, inst, "sitofp", &ty, out),
        Opcode::UiToFp => cast(cx, inst, "uitofp", &ty, out),
        Opcode::PtrToInt => cast(cx, inst, "ptrtoint", &ty, out),
        Opcode::IntToPtr => cast(cx, inst, "inttoptr", &ty, out),
        Opcode::Bitcast => cast(cx, inst, "bitcast", &ty, out),
        Opcode::Alloca { alloc_ty } => {
            let _ = write!(out, "alloca {}", type_name(cx, *alloc_ty));
        }
        Opcode::Load => {
            let _ = write!(out, "load {}, {}", ty, operand_str(cx, inst, 0));
        }
        Opcode::Store => {
            let _ = write!(out, "store {}, {}", operand_str(cx, inst, 1), operand_str(cx, inst, 0));
        }
        Opcode::Gep { inbounds } => {
            let prefix = if *inbounds { "getelementptr inbounds" } else { "getelementptr" };
            let _ = write!(out, "{} {}", prefix, operand_str(cx, inst, 0));
            for i in 1..data.operands.len() {
                let _ = write!(out, ", {}", operand_str(cx, inst, i));
            }
        }
        Opcode::Br => {
            let _ = write!(out, "br {}", data.successors[0]);
        }
        Opcode::CondBr => {
            let _ = write!(
                out,
                "br {}, {}, {}",
                operand_str(cx, inst, 0),
                data.successors[0],
                data.successors[1]
            );
        }
        Opcode::Switch => {
            let _ = write!(out, "switch {}, default {}", operand_str(cx, inst, 0), data.successors[0]);
            for (i, &case) in data.switch_values.iter().enumerate() {
                let _ = write!(out, ", [{} -> {}]", const_str(cx, case), data.successors[i + 1]);
            }
        }
        Opcode::Ret => {
            if data.operands.is_empty() {
                out.push_str("ret void");
            } else {
                let _ = write!(out, "ret {}", operand_str(cx, inst, 0));
            }
        }
        Opcode::Unreachable => out.push_str("unreachable"),
        Opcode::Phi => {
            let _ = write!(out, "phi {}", ty);
            for (i, &block) in data.phi_incoming.iter().enumerate() {
                let _ = write!(out, ", [{}, {}]", operand_str(cx, inst, i), block);
            }
        }
        Opcode::Call { .. } => {
            let _ = write!(out, "call {} {}(", ty, operand_str(cx, inst, 0));
            for i in 1..data.operands.len() {
                if i > 1 {
                    out.push_str(", ");
                }
                out.push_str(&operand_str(cx, inst, i));
            }
            out.push(')');
        }
    }
}

fn binop(cx: &Context, inst: InstRef, name: &str, ty: &str, out: &mut String) {
    let _ = write!(out, "{} {} {}, {}", name, ty, operand_str(cx, inst, 0), operand_str(cx, inst, 1));
}

fn cast(cx: &Context, inst: InstRef, name: &str, ty: &str, out: &mut String) {
    let _ = write!(out, "{} {} to {}", name, operand_str(cx, inst, 0), ty);
}

fn const_str(cx: &Context, id: ConstId) -> String {
    let data = cx.consts.get(id);
    if let Some(v) = data.as_i64() {
        v.to_string()
    } else if let Some(v) = data.as_f64() {
        v.to_string()
    } else if let Some(b) = data.as_bool() {
        b.to_string()
    } else {
        format!("{id}")
    }
}

fn icmp_name(pred: ICmpPred) -> &'static str {
    match pred {
        ICmpPred::Eq => "eq",
        ICmpPred::Ne => "ne",
        ICmpPred::Slt => "slt",
        ICmpPred::Sle => "sle",
        ICmpPred::Sgt => "sgt",
        ICmpPred::Sge => "sge",
        ICmpPred::Ult => "ult",
        ICmpPred::Ule => "ule",
        ICmpPred::Ugt => "ugt",
        ICmpPred::Uge => "uge",
    }
}

fn fcmp_name(pred: FCmpPred) -> &'static str {
    match pred {
        FCmpPred::Oeq => "oeq",
        FCmpPred::One => "one",
        FCmpPred::Olt => "olt",
        FCmpPred::Ole => "ole",
        FCmpPred::Ogt => "ogt",
        FCmpPred::Oge => "oge",
    }
}

pub fn type_name(cx: &Context, ty: crate::entities::TypeId) -> String {
    match cx.types.kind(ty) {
        TypeKind::Void => "void".to_string(),
        TypeKind::Bool => "i1".to_string(),
        TypeKind::I8 => "i8".to_string(),
        TypeKind::I16 => "i16".to_string(),
        TypeKind::I32 => "i32".to_string(),
        TypeKind::I64 => "i64".to_string(),
        TypeKind::U8 => "u8".to_string(),
        TypeKind::U16 => "u16".to_string(),
        TypeKind::U32 => "u32".to_string(),
        TypeKind::U64 => "u64".to_string(),
        TypeKind::F32 => "f32".to_string(),
        TypeKind::F64 => "f64".to_string(),
        TypeKind::Label => "label".to_string(),
        TypeKind::Type => "type".to_string(),
        TypeKind::Function { ret, args, vararg } => {
            let ret_name = type_name(cx, *ret);
            let mut parts: Vec<String> = args.iter().map(|&a| type_name(cx, a)).collect();
            if *vararg {
                parts.push("...".to_string());
            }
            format!("{}({})", ret_name, parts.join(", "))
        }
        TypeKind::Pointer(base) => format!("{}*", type_name(cx, *base)),
        TypeKind::Array { elem, len } => format!("[{} x {}]", len, type_name(cx, *elem)),
        TypeKind::Struct { id } => format!("%struct.{id}"),
    }
}
