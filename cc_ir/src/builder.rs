//! Instruction-level IR builder.
//!
//! Mirrors an `IRBuilder`/`FunctionBuilder` from the usual compiler-backend
//! shape: holds an insertion point (current function + block) into a
//! `Context` and exposes one `build_*` method per opcode. Every method wires
//! up the `Use` edges for its operands and, for terminators, the CFG
//! successor/predecessor links. `finish_function` runs the optimization
//! pipeline (`pass::run_function_pipeline`) once the function body is
//! complete, matching the "run at funcEnd" timing from the pipeline design.

use cc_common::{CompileError, CompileResult};
use smallvec::SmallVec;

use crate::entities::{ArgRef, BlockRef, ConstId, FuncRef, InstRef, TypeId, UserRef, ValueRef};
use crate::instruction::{FCmpPred, ICmpPred, Instruction, Opcode};
use crate::pass::PipelineConfig;
use crate::Context;

pub struct Builder<'a> {
    pub cx: &'a mut Context,
    func: FuncRef,
    block: BlockRef,
}

impl<'a> Builder<'a> {
    pub fn new(cx: &'a mut Context, func: FuncRef, block: BlockRef) -> Self {
        Self { cx, func, block }
    }

    pub fn position_at_end(&mut self, block: BlockRef) {
        self.block = block;
    }

    pub fn current_block(&self) -> BlockRef {
        self.block
    }

    pub fn arg(&self, index: usize) -> ArgRef {
        self.cx.funcs[self.func].params[index]
    }

    fn push_operand(&mut self, operands: &mut SmallVec<[crate::entities::UseId; 4]>, value: ValueRef, user: UserRef, idx: u32) {
        let use_id = self.cx.add_use(value, user, idx);
        operands.push(use_id);
    }

    /// Allocates the instruction slot, then back-patches the `user` field of
    /// each already-created use edge -- operands must be wired before the
    /// `InstRef` exists, so we thread them through as raw `ValueRef`s and
    /// let this helper do the two-step dance once.
    fn emit(&mut self, opcode: Opcode, ty: TypeId, operand_values: &[ValueRef]) -> InstRef {
        let inst_id = InstRef::new(self.cx.insts.len());
        let mut operands = SmallVec::new();
        for (idx, &v) in operand_values.iter().enumerate() {
            self.push_operand(&mut operands, v, UserRef::Inst(inst_id), idx as u32);
        }
        let inst = Instruction {
            opcode,
            ty,
            block: self.block,
            operands,
            successors: SmallVec::new(),
            phi_incoming: SmallVec::new(),
            switch_values: SmallVec::new(),
            use_head: None,
        };
        let pushed = self.cx.insts.push(inst);
        debug_assert_eq!(pushed, inst_id);
        self.cx.blocks[self.block].insts.push(inst_id);
        inst_id
    }

    fn add_edge(&mut self, to: BlockRef) {
        let from = self.block;
        self.cx.blocks[to].add_pred(from);
    }

    // ---- arithmetic / bitwise -------------------------------------------

    fn binop(&mut self, opcode: Opcode, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.emit(opcode, ty, &[lhs, rhs])
    }

    pub fn build_add(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Add, ty, lhs, rhs)
    }
    pub fn build_sub(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Sub, ty, lhs, rhs)
    }
    pub fn build_mul(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Mul, ty, lhs, rhs)
    }
    pub fn build_sdiv(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::SDiv, ty, lhs, rhs)
    }
    pub fn build_udiv(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::UDiv, ty, lhs, rhs)
    }
    pub fn build_srem(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::SRem, ty, lhs, rhs)
    }
    pub fn build_urem(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::URem, ty, lhs, rhs)
    }
    pub fn build_and(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::And, ty, lhs, rhs)
    }
    pub fn build_or(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Or, ty, lhs, rhs)
    }
    pub fn build_xor(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Xor, ty, lhs, rhs)
    }
    pub fn build_shl(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::Shl, ty, lhs, rhs)
    }
    pub fn build_lshr(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::LShr, ty, lhs, rhs)
    }
    pub fn build_ashr(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::AShr, ty, lhs, rhs)
    }
    pub fn build_fadd(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::FAdd, ty, lhs, rhs)
    }
    pub fn build_fsub(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::FSub, ty, lhs, rhs)
    }
    pub fn build_fmul(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::FMul, ty, lhs, rhs)
    }
    pub fn build_fdiv(&mut self, ty: TypeId, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        self.binop(Opcode::FDiv, ty, lhs, rhs)
    }

    pub fn build_icmp(&mut self, pred: ICmpPred, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        let bool_ty = self.cx.types.bool();
        self.emit(Opcode::ICmp(pred), bool_ty, &[lhs, rhs])
    }

    pub fn build_fcmp(&mut self, pred: FCmpPred, lhs: ValueRef, rhs: ValueRef) -> InstRef {
        let bool_ty = self.cx.types.bool();
        self.emit(Opcode::FCmp(pred), bool_ty, &[lhs, rhs])
    }

    pub fn build_select(&mut self, ty: TypeId, cond: ValueRef, if_true: ValueRef, if_false: ValueRef) -> InstRef {
        self.emit(Opcode::Select, ty, &[cond, if_true, if_false])
    }

    // ---- casts -----------------------------------------------------------

    fn cast(&mut self, opcode: Opcode, ty: TypeId, v: ValueRef) -> InstRef {
        self.emit(opcode, ty, &[v])
    }

    pub fn build_trunc(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::Trunc, ty, v)
    }
    pub fn build_zext(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::ZExt, ty, v)
    }
    pub fn build_sext(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::SExt, ty, v)
    }
    pub fn build_fptrunc(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::FpTrunc, ty, v)
    }
    pub fn build_fpext(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::FpExt, ty, v)
    }
    pub fn build_fptosi(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::FpToSi, ty, v)
    }
    pub fn build_fptoui(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::FpToUi, ty, v)
    }
    pub fn build_sitofp(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::SiToFp, ty, v)
    }
    pub fn build_uitofp(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::UiToFp, ty, v)
    }
    pub fn build_ptrtoint(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::PtrToInt, ty, v)
    }
    pub fn build_inttoptr(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::IntToPtr, ty, v)
    }
    pub fn build_bitcast(&mut self, ty: TypeId, v: ValueRef) -> InstRef {
        self.cast(Opcode::Bitcast, ty, v)
    }

    // ---- memory ------------------------------------------------------

    pub fn build_alloca(&mut self, alloc_ty: TypeId) -> CompileResult<InstRef> {
        if !self.cx.types.is_first_class(alloc_ty) {
            return Err(CompileError::NonFirstClassAlloca(format!("{:?}", self.cx.types.kind(alloc_ty))));
        }
        let ptr_ty = self.cx.types.pointer(alloc_ty);
        Ok(self.emit(Opcode::Alloca { alloc_ty }, ptr_ty, &[]))
    }

    pub fn build_load(&mut self, ty: TypeId, ptr: ValueRef) -> InstRef {
        self.emit(Opcode::Load, ty, &[ptr])
    }

    pub fn build_store(&mut self, ptr: ValueRef, value: ValueRef) -> InstRef {
        let void_ty = self.cx.void_ty;
        self.emit(Opcode::Store, void_ty, &[ptr, value])
    }

    /// `indices[0]` steps through pointers/arrays (scaled by element size);
    /// subsequent indices must be constant when stepping into a struct.
    pub fn build_gep(&mut self, result_ty: TypeId, inbounds: bool, base: ValueRef, indices: &[ValueRef]) -> InstRef {
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(base);
        operands.extend_from_slice(indices);
        self.emit(Opcode::Gep { inbounds }, result_ty, &operands)
    }

    // ---- control flow --------------------------------------------------

    pub fn build_br(&mut self, target: BlockRef) -> InstRef {
        let void_ty = self.cx.void_ty;
        let id = self.emit(Opcode::Br, void_ty, &[]);
        self.cx.insts[id].successors.push(target);
        self.add_edge(target);
        id
    }

    pub fn build_cond_br(&mut self, cond: ValueRef, if_true: BlockRef, if_false: BlockRef) -> InstRef {
        let void_ty = self.cx.void_ty;
        let id = self.emit(Opcode::CondBr, void_ty, &[cond]);
        self.cx.insts[id].successors.push(if_true);
        self.cx.insts[id].successors.push(if_false);
        self.add_edge(if_true);
        self.add_edge(if_false);
        id
    }

    pub fn build_switch(&mut self, scrutinee: ValueRef, default: BlockRef, cases: &[(ConstId, BlockRef)]) -> InstRef {
        let void_ty = self.cx.void_ty;
        let id = self.emit(Opcode::Switch, void_ty, &[scrutinee]);
        self.cx.insts[id].successors.push(default);
        self.add_edge(default);
        for &(value, target) in cases {
            self.cx.insts[id].successors.push(target);
            self.cx.insts[id].switch_values.push(value);
            self.add_edge(target);
        }
        id
    }

    pub fn build_ret(&mut self, value: Option<ValueRef>) -> InstRef {
        let void_ty = self.cx.void_ty;
        match value {
            Some(v) => self.emit(Opcode::Ret, void_ty, &[v]),
            None => self.emit(Opcode::Ret, void_ty, &[]),
        }
    }

    pub fn build_unreachable(&mut self) -> InstRef {
        let void_ty = self.cx.void_ty;
        self.emit(Opcode::Unreachable, void_ty, &[])
    }

    /// Phis must be the first instructions in a block (arity invariant);
    /// callers build them before any non-phi instruction in the same block.
    pub fn build_phi(&mut self, ty: TypeId, incoming: &[(BlockRef, ValueRef)]) -> InstRef {
        let values: Vec<ValueRef> = incoming.iter().map(|&(_, v)| v).collect();
        let id = self.emit(Opcode::Phi, ty, &values);
        self.cx.insts[id].phi_incoming = incoming.iter().map(|&(b, _)| b).collect();
        id
    }

    pub fn add_phi_incoming(&mut self, phi: InstRef, block: BlockRef, value: ValueRef) {
        let idx = self.cx.insts[phi].operands.len() as u32;
        let mut operands = std::mem::take(&mut self.cx.insts[phi].operands);
        let use_id = self.cx.add_use(value, UserRef::Inst(phi), idx);
        operands.push(use_id);
        self.cx.insts[phi].operands = operands;
        self.cx.insts[phi].phi_incoming.push(block);
    }

    pub fn build_call(&mut self, ty: TypeId, callee: ValueRef, args: &[ValueRef], vararg: bool) -> InstRef {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.emit(Opcode::Call { vararg }, ty, &operands)
    }

    /// Runs the 11-pass optimization pipeline over `func`'s current body.
    pub fn finish_function(&mut self, config: &PipelineConfig) {
        crate::pass::run_function_pipeline(self.cx, self.func, config);
    }
}
