//! Tree-walking interpreter.
//!
//! Not on the lowering critical path -- its job is to give the pass test
//! suite an oracle: interpret a function before and after a pass runs and
//! compare results, to catch a transform that is well-formed (passes
//! `func_check`) but not semantics-preserving. Traps (load from an
//! unallocated address, division by zero, missing phi predecessor entry)
//! are programmer errors in the IR under test and panic rather than
//! returning a `Result`, matching the error-handling split used throughout
//! this crate.

use hashbrown::HashMap;

use crate::entities::{BlockRef, ConstId, FuncRef, InstRef, ValueRef};
use crate::instruction::{FCmpPred, ICmpPred, Opcode};
use crate::Context;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Ptr(u64),
    Undef,
}

impl InterpValue {
    fn as_i64(self) -> i64 {
        match self {
            InterpValue::Int(v) => v,
            InterpValue::UInt(v) => v as i64,
            InterpValue::Bool(b) => b as i64,
            InterpValue::Ptr(p) => p as i64,
            _ => panic!("interp: expected integer value, got {self:?}"),
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            InterpValue::Int(v) => v as u64,
            InterpValue::UInt(v) => v,
            InterpValue::Bool(b) => b as u64,
            InterpValue::Ptr(p) => p,
            _ => panic!("interp: expected integer value, got {self:?}"),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            InterpValue::F32(v) => v as f64,
            InterpValue::F64(v) => v,
            _ => panic!("interp: expected float value, got {self:?}"),
        }
    }

    fn as_bool(self) -> bool {
        match self {
            InterpValue::Bool(b) => b,
            _ => panic!("interp: expected bool value, got {self:?}"),
        }
    }
}

/// A flat byte-addressable memory space backing every `alloca` in the
/// function under interpretation. Addresses are offsets into `bytes`,
/// biased by `BASE` so that the null pointer (address 0) is never valid.
pub struct Memory {
    bytes: Vec<u8>,
}

const BASE: u64 = 0x1000;

impl Memory {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn alloc(&mut self, size: u64) -> u64 {
        let addr = BASE + self.bytes.len() as u64;
        self.bytes.resize(self.bytes.len() + size.max(1) as usize, 0);
        addr
    }

    fn slice_mut(&mut self, addr: u64, len: usize) -> &mut [u8] {
        let offset = (addr - BASE) as usize;
        &mut self.bytes[offset..offset + len]
    }

    fn slice(&self, addr: u64, len: usize) -> &[u8] {
        let offset = (addr - BASE) as usize;
        &self.bytes[offset..offset + len]
    }
}

pub struct Interpreter<'a> {
    cx: &'a Context,
    memory: Memory,
    consts: HashMap<ConstId, InterpValue>,
}

impl<'a> Interpreter<'a> {
    pub fn new(cx: &'a Context) -> Self {
        Self { cx, memory: Memory::new(), consts: HashMap::new() }
    }

    fn eval_const(&mut self, id: ConstId) -> InterpValue {
        if let Some(&v) = self.consts.get(&id) {
            return v;
        }
        let data = self.cx.consts.get(id);
        let v = if self.cx.types.is_float(data.ty) {
            if self.cx.types.size_of(data.ty) == 4 {
                InterpValue::F32(data.as_f32().unwrap_or(0.0))
            } else {
                InterpValue::F64(data.as_f64().unwrap_or(0.0))
            }
        } else if matches!(self.cx.types.kind(data.ty), crate::types::TypeKind::Bool) {
            InterpValue::Bool(data.as_bool().unwrap_or(false))
        } else if self.cx.types.is_pointer(data.ty) {
            InterpValue::Ptr(data.as_ptr_addr().unwrap_or(0))
        } else if data.is_undef() {
            InterpValue::Undef
        } else if self.cx.types.is_signed(data.ty) {
            InterpValue::Int(data.as_i64().unwrap_or(0))
        } else {
            InterpValue::UInt(data.as_u64().unwrap_or(0))
        };
        self.consts.insert(id, v);
        v
    }

    /// Runs `func` to completion starting at its entry block and returns the
    /// value passed to `ret`, if any.
    pub fn run(&mut self, func: FuncRef, args: &[InterpValue]) -> Option<InterpValue> {
        let f = &self.cx.funcs[func];
        assert!(!f.is_declaration(), "interp: cannot run a declaration");
        let mut env: HashMap<ValueRef, InterpValue> = HashMap::new();
        for (&param, &value) in f.params.iter().zip(args) {
            env.insert(ValueRef::Arg(param), value);
        }

        let mut block = f.entry().expect("interp: definition without entry block");
        let mut prev_block: Option<BlockRef> = None;

        loop {
            let insts = self.cx.blocks[block].insts.clone();
            let mut phi_updates = Vec::new();
            for &inst in &insts {
                if matches!(self.cx.insts[inst].opcode, Opcode::Phi) {
                    let data = &self.cx.insts[inst];
                    let incoming_block = prev_block.expect("interp: phi reached without a predecessor");
                    let slot = data
                        .phi_incoming
                        .iter()
                        .position(|&b| b == incoming_block)
                        .expect("interp: phi has no entry for the taken predecessor");
                    let operand = self.operand_value(inst, slot, &env);
                    phi_updates.push((inst, operand));
                }
            }
            for (inst, v) in phi_updates {
                env.insert(ValueRef::Inst(inst), v);
            }

            for &inst in &insts {
                if matches!(self.cx.insts[inst].opcode, Opcode::Phi) {
                    continue;
                }
                match self.step(inst, &mut env) {
                    StepResult::Continue => {}
                    StepResult::Jump(next) => {
                        prev_block = Some(block);
                        block = next;
                        break;
                    }
                    StepResult::Return(v) => return v,
                }
            }
        }
    }

    fn operand_value(&mut self, inst: InstRef, idx: usize, env: &HashMap<ValueRef, InterpValue>) -> InterpValue {
        let use_id = self.cx.insts[inst].operands[idx];
        let value_ref = self.cx.uses.get(use_id).value;
        self.resolve(value_ref, env)
    }

    fn resolve(&mut self, value: ValueRef, env: &HashMap<ValueRef, InterpValue>) -> InterpValue {
        match value {
            ValueRef::Const(id) => self.eval_const(id),
            other => *env.get(&other).unwrap_or_else(|| panic!("interp: {other:?} has no value yet")),
        }
    }

    fn step(&mut self, inst: InstRef, env: &mut HashMap<ValueRef, InterpValue>) -> StepResult {
        let opcode = self.cx.insts[inst].opcode.clone();
        let operand_count = self.cx.insts[inst].operands.len();
        let operands: Vec<InterpValue> = (0..operand_count).map(|i| self.operand_value(inst, i, env)).collect();

        let result = match &opcode {
            Opcode::Add => Some(int_result(self.cx, inst, operands[0].as_i64().wrapping_add(operands[1].as_i64()))),
            Opcode::Sub => Some(int_result(self.cx, inst, operands[0].as_i64().wrapping_sub(operands[1].as_i64()))),
            Opcode::Mul => Some(int_result(self.cx, inst, operands[0].as_i64().wrapping_mul(operands[1].as_i64()))),
            Opcode::SDiv => Some(int_result(self.cx, inst, operands[0].as_i64() / operands[1].as_i64())),
            Opcode::UDiv => Some(InterpValue::UInt(operands[0].as_u64() / operands[1].as_u64())),
            Opcode::SRem => Some(int_result(self.cx, inst, operands[0].as_i64() % operands[1].as_i64())),
            Opcode::URem => Some(InterpValue::UInt(operands[0].as_u64() % operands[1].as_u64())),
            Opcode::And => Some(int_result(self.cx, inst, operands[0].as_i64() & operands[1].as_i64())),
            Opcode::Or => Some(int_result(self.cx, inst, operands[0].as_i64() | operands[1].as_i64())),
            Opcode::Xor => Some(int_result(self.cx, inst, operands[0].as_i64() ^ operands[1].as_i64())),
            Opcode::Shl => Some(int_result(self.cx, inst, operands[0].as_i64().wrapping_shl(operands[1].as_u64() as u32))),
            Opcode::LShr => Some(InterpValue::UInt(operands[0].as_u64() >> operands[1].as_u64())),
            Opcode::AShr => Some(int_result(self.cx, inst, operands[0].as_i64() >> operands[1].as_u64())),
            Opcode::FAdd => Some(InterpValue::F64(operands[0].as_f64() + operands[1].as_f64())),
            Opcode::FSub => Some(InterpValue::F64(operands[0].as_f64() - operands[1].as_f64())),
            Opcode::FMul => Some(InterpValue::F64(operands[0].as_f64() * operands[1].as_f64())),
            Opcode::FDiv => Some(InterpValue::F64(operands[0].as_f64() / operands[1].as_f64())),
            Opcode::ICmp(pred) => Some(InterpValue::Bool(eval_icmp(*pred, operands[0], operands[1]))),
            Opcode::FCmp(pred) => Some(InterpValue::Bool(eval_fcmp(*pred, operands[0].as_f64(), operands[1].as_f64()))),
            Opcode::Select => Some(if operands[0].as_bool() { operands[1] } else { operands[2] }),
            Opcode::Trunc | Opcode::ZExt | Opcode::SExt | Opcode::Bitcast | Opcode::PtrToInt | Opcode::IntToPtr => {
                Some(operands[0])
            }
            Opcode::SiToFp | Opcode::UiToFp => Some(InterpValue::F64(operands[0].as_i64() as f64)),
            Opcode::FpToSi | Opcode::FpToUi => Some(int_result(self.cx, inst, operands[0].as_f64() as i64)),
            Opcode::FpTrunc | Opcode::FpExt => Some(InterpValue::F64(operands[0].as_f64())),
            Opcode::Alloca { alloc_ty } => {
                let size = self.cx.types.size_of(*alloc_ty).max(1);
                Some(InterpValue::Ptr(self.memory.alloc(size)))
            }
            Opcode::Load => {
                let ty = self.cx.insts[inst].ty;
                let size = self.cx.types.size_of(ty) as usize;
                let addr = operands[0].as_u64();
                Some(load_from_bytes(self.memory.slice(addr, size.max(1)), ty, self.cx))
            }
            Opcode::Store => {
                let addr = operands[0].as_u64();
                store_to_bytes(self.memory.slice_mut(addr, 8), operands[1]);
                None
            }
            Opcode::Gep { .. } => {
                // Address arithmetic only; callers validate index legality via `check`.
                let base = operands[0].as_u64();
                let offset: u64 = operands[1..].iter().map(|v| v.as_u64()).sum();
                Some(InterpValue::Ptr(base + offset))
            }
            Opcode::Call { .. } => panic!("interp: call requires a recursive function table, not supported standalone"),
            Opcode::Phi => unreachable!("phis are resolved before step()"),
            Opcode::Br => {
                let target = self.cx.insts[inst].successors[0];
                return StepResult::Jump(target);
            }
            Opcode::CondBr => {
                let successors = &self.cx.insts[inst].successors;
                let target = if operands[0].as_bool() { successors[0] } else { successors[1] };
                return StepResult::Jump(target);
            }
            Opcode::Switch => {
                let scrut = operands[0].as_i64();
                let data = &self.cx.insts[inst];
                let mut target = data.successors[0];
                for (i, &case) in data.switch_values.iter().enumerate() {
                    if self.cx.consts.get(case).as_i64() == Some(scrut) {
                        target = data.successors[i + 1];
                        break;
                    }
                }
                return StepResult::Jump(target);
            }
            Opcode::Ret => {
                return StepResult::Return(operands.first().copied());
            }
            Opcode::Unreachable => panic!("interp: reached an `unreachable` instruction"),
        };

        if let Some(v) = result {
            env.insert(ValueRef::Inst(inst), v);
        }
        StepResult::Continue
    }
}

enum StepResult {
    Continue,
    Jump(BlockRef),
    Return(Option<InterpValue>),
}

fn int_result(cx: &Context, inst: InstRef, v: i64) -> InterpValue {
    let ty = cx.insts[inst].ty;
    if cx.types.is_signed(ty) {
        InterpValue::Int(v)
    } else {
        InterpValue::UInt(v as u64)
    }
}

fn eval_icmp(pred: ICmpPred, a: InterpValue, b: InterpValue) -> bool {
    if pred.is_signed() || matches!(pred, ICmpPred::Eq | ICmpPred::Ne) {
        let (a, b) = (a.as_i64(), b.as_i64());
        match pred {
            ICmpPred::Eq => a == b,
            ICmpPred::Ne => a != b,
            ICmpPred::Slt => a < b,
            ICmpPred::Sle => a <= b,
            ICmpPred::Sgt => a > b,
            ICmpPred::Sge => a >= b,
            _ => unreachable!(),
        }
    } else {
        let (a, b) = (a.as_u64(), b.as_u64());
        match pred {
            ICmpPred::Ult => a < b,
            ICmpPred::Ule => a <= b,
            ICmpPred::Ugt => a > b,
            ICmpPred::Uge => a >= b,
            _ => unreachable!(),
        }
    }
}

fn eval_fcmp(pred: FCmpPred, a: f64, b: f64) -> bool {
    match pred {
        FCmpPred::Oeq => a == b,
        FCmpPred::One => a != b,
        FCmpPred::Olt => a < b,
        FCmpPred::Ole => a <= b,
        FCmpPred::Ogt => a > b,
        FCmpPred::Oge => a >= b,
    }
}

fn load_from_bytes(bytes: &[u8], ty: crate::entities::TypeId, cx: &Context) -> InterpValue {
    let mut buf = [0u8; 8];
    buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    let raw = u64::from_le_bytes(buf);
    if cx.types.is_float(ty) {
        if cx.types.size_of(ty) == 4 {
            InterpValue::F32(f32::from_bits(raw as u32))
        } else {
            InterpValue::F64(f64::from_bits(raw))
        }
    } else if cx.types.is_pointer(ty) {
        InterpValue::Ptr(raw)
    } else if cx.types.is_signed(ty) {
        InterpValue::Int(raw as i64)
    } else {
        InterpValue::UInt(raw)
    }
}

fn store_to_bytes(bytes: &mut [u8], value: InterpValue) {
    let raw = match value {
        InterpValue::Int(v) => v as u64,
        InterpValue::UInt(v) => v,
        InterpValue::Bool(b) => b as u64,
        InterpValue::Ptr(p) => p,
        InterpValue::F32(f) => f.to_bits() as u64,
        InterpValue::F64(f) => f.to_bits(),
        InterpValue::Undef => 0,
    };
    let le = raw.to_le_bytes();
    let n = bytes.len().min(8);
    bytes[..n].copy_from_slice(&le[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Linkage;

    #[test]
    fn interprets_straight_line_arithmetic() {
        let mut cx = Context::new();
        let i32_ty = cx.types.i32();
        let fn_ty = cx.types.function(i32_ty, &[i32_ty], false);
        let f = cx.declare_function("add_one", fn_ty, Linkage::Internal);
        let entry = cx.new_block(f);
        let mut b = crate::builder::Builder::new(&mut cx, f, entry);
        let arg0 = b.arg(0);
        let one = b.cx.const_int(i32_ty, 1);
        let sum = b.build_add(i32_ty, ValueRef::Arg(arg0), ValueRef::Const(one));
        b.build_ret(Some(ValueRef::Inst(sum)));

        let mut interp = Interpreter::new(&cx);
        let result = interp.run(f, &[InterpValue::Int(41)]);
        assert_eq!(result, Some(InterpValue::Int(42)));
    }
}
