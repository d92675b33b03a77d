//! `Context` owns every arena in a compilation unit: types, constants,
//! uses, instructions, blocks, arguments, functions and globals. Nothing
//! outlives it, and every entity handle only makes sense paired with the
//! `Context` that minted it (the same discipline `cranelift`'s `Module` /
//! `FunctionBuilderContext` split encourages, collapsed here into one
//! object since this crate has no separate per-function builder state to
//! keep alive across functions).

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::basic_block::BasicBlock;
use crate::constant::{ConstData, ConstInterner, ConstKey};
use crate::entities::{
    ArgRef, BlockRef, ConstId, FuncRef, GlobalRef, InstRef, TypeId, UseId, UserRef, ValueRef,
};
use crate::function::{ArgData, Function, Linkage};
use crate::instruction::Instruction;
use crate::module::GlobalData;
use crate::types::TypeInterner;
use crate::uses::UsePool;

pub struct Context {
    pub types: TypeInterner,
    pub consts: ConstInterner,
    pub uses: UsePool,
    pub insts: crate::entities::Arena<InstRef, Instruction>,
    pub blocks: crate::entities::Arena<BlockRef, BasicBlock>,
    pub args: crate::entities::Arena<ArgRef, ArgData>,
    pub funcs: crate::entities::Arena<FuncRef, Function>,
    pub globals: crate::entities::Arena<GlobalRef, GlobalData>,
    pub func_names: HashMap<String, FuncRef>,
    pub global_names: HashMap<String, GlobalRef>,
    pub void_ty: TypeId,
}

impl Default for Context {
    fn default() -> Self {
        let mut types = TypeInterner::new();
        let void_ty = types.void();
        Self {
            types,
            consts: ConstInterner::new(),
            uses: UsePool::new(),
            insts: crate::entities::Arena::new(),
            blocks: crate::entities::Arena::new(),
            args: crate::entities::Arena::new(),
            funcs: crate::entities::Arena::new(),
            globals: crate::entities::Arena::new(),
            func_names: HashMap::new(),
            global_names: HashMap::new(),
            void_ty,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- use-list plumbing -------------------------------------------------

    fn use_head_mut(&mut self, value: ValueRef) -> &mut Option<UseId> {
        match value {
            ValueRef::Const(id) => &mut self.consts.get_mut(id).use_head,
            ValueRef::Arg(id) => &mut self.args[id].use_head,
            ValueRef::Inst(id) => &mut self.insts[id].use_head,
            ValueRef::Func(id) => &mut self.funcs[id].use_head,
            ValueRef::Global(id) => &mut self.globals[id].use_head,
            ValueRef::Block(_) => panic!("basic blocks do not carry a use-list; CFG edges are tracked directly"),
        }
    }

    /// Records `user`'s operand `operand_idx` as a use of `value`, returning
    /// the new use id. The caller is responsible for pushing that id into
    /// the user's own `operands` list.
    pub fn add_use(&mut self, value: ValueRef, user: UserRef, operand_idx: u32) -> UseId {
        let mut head = std::mem::take(self.use_head_mut(value));
        let id = self.uses.insert(&mut head, value, user, operand_idx);
        *self.use_head_mut(value) = head;
        id
    }

    pub fn remove_use(&mut self, value: ValueRef, use_id: UseId) {
        let mut head = std::mem::take(self.use_head_mut(value));
        self.uses.remove(&mut head, use_id);
        *self.use_head_mut(value) = head;
    }

    /// Redirects every use of `old` to point at `new`. Operand lists on
    /// users are untouched; only the use-list membership changes.
    pub fn replace_all_uses_with(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let mut old_head = std::mem::take(self.use_head_mut(old));
        let mut new_head = std::mem::take(self.use_head_mut(new));
        self.uses.transplant(&mut old_head, &mut new_head, new);
        *self.use_head_mut(old) = old_head;
        *self.use_head_mut(new) = new_head;
    }

    pub fn use_count(&self, value: ValueRef) -> usize {
        let head = match value {
            ValueRef::Const(id) => self.consts.get(id).use_head,
            ValueRef::Arg(id) => self.args[id].use_head,
            ValueRef::Inst(id) => self.insts[id].use_head,
            ValueRef::Func(id) => self.funcs[id].use_head,
            ValueRef::Global(id) => self.globals[id].use_head,
            ValueRef::Block(_) => return 0,
        };
        self.uses.count(head)
    }

    pub fn is_unused(&self, value: ValueRef) -> bool {
        self.use_count(value) == 0
    }

    // ---- constants ----------------------------------------------------

    fn intern_const(&mut self, ty: TypeId, key: ConstKey) -> ConstId {
        if let Some(id) = self.consts.lookup(ty, &key) {
            return id;
        }
        self.consts.insert(ty, key, SmallVec::new())
    }

    pub fn const_bool(&mut self, v: bool) -> ConstId {
        let ty = self.types.bool();
        self.intern_const(ty, ConstKey::Bool(v))
    }

    pub fn const_int(&mut self, ty: TypeId, v: i64) -> ConstId {
        self.intern_const(ty, ConstKey::Int(v))
    }

    pub fn const_uint(&mut self, ty: TypeId, v: u64) -> ConstId {
        self.intern_const(ty, ConstKey::UInt(v))
    }

    pub fn const_f32(&mut self, v: f32) -> ConstId {
        let ty = self.types.f32();
        self.intern_const(ty, ConstKey::F32Bits(v.to_bits()))
    }

    pub fn const_f64(&mut self, v: f64) -> ConstId {
        let ty = self.types.f64();
        self.intern_const(ty, ConstKey::F64Bits(v.to_bits()))
    }

    pub fn const_ptr_addr(&mut self, ty: TypeId, addr: u64) -> ConstId {
        self.intern_const(ty, ConstKey::PtrAddr(addr))
    }

    pub fn const_ptr_global(&mut self, ty: TypeId, global: GlobalRef) -> ConstId {
        self.intern_const(ty, ConstKey::PtrGlobal(global))
    }

    pub fn const_undef(&mut self, ty: TypeId) -> ConstId {
        self.intern_const(ty, ConstKey::Undef)
    }

    /// Builds (or fetches the interned) aggregate constant whose members are
    /// `members`, wiring up a `Use` edge from the new constant to each
    /// member so RAUW and use-count queries also see through aggregates.
    pub fn const_aggregate(&mut self, ty: TypeId, members: &[ConstId]) -> ConstId {
        let key = ConstKey::Aggregate(SmallVec::from_slice(members));
        if let Some(id) = self.consts.lookup(ty, &key) {
            return id;
        }
        let id = self.consts.insert(ty, key, SmallVec::new());
        let mut operands = SmallVec::new();
        for (idx, &member) in members.iter().enumerate() {
            let use_id = self.add_use(ValueRef::Const(member), UserRef::Const(id), idx as u32);
            operands.push(use_id);
        }
        self.consts.get_mut(id).operands = operands;
        id
    }

    // ---- functions and globals -----------------------------------------

    pub fn declare_function(&mut self, name: &str, ty: TypeId, linkage: Linkage) -> FuncRef {
        if let Some(&id) = self.func_names.get(name) {
            return id;
        }
        let arg_tys: SmallVec<[TypeId; 4]> = match self.types.kind(ty).clone() {
            crate::types::TypeKind::Function { args, .. } => args,
            _ => panic!("declare_function: ty is not a function type"),
        };
        let func_id = FuncRef::new(self.funcs.len());
        let mut params = SmallVec::new();
        for (index, &arg_ty) in arg_tys.iter().enumerate() {
            let arg_id = self.args.push(ArgData {
                func: func_id,
                ty: arg_ty,
                index: index as u32,
                use_head: None,
            });
            params.push(arg_id);
        }
        let pushed = self.funcs.push(Function {
            name: name.to_string(),
            ty,
            linkage,
            params,
            blocks: Vec::new(),
            use_head: None,
        });
        debug_assert_eq!(pushed, func_id);
        self.func_names.insert(name.to_string(), func_id);
        func_id
    }

    pub fn new_global(&mut self, name: &str, value_ty: TypeId, linkage: Linkage) -> GlobalRef {
        let ptr_ty = self.types.pointer(value_ty);
        let id = self.globals.push(GlobalData {
            name: name.to_string(),
            ty: ptr_ty,
            value_ty,
            linkage,
            initializer: None,
            use_head: None,
        });
        self.global_names.insert(name.to_string(), id);
        id
    }

    pub fn set_initializer(&mut self, global: GlobalRef, init: ConstId) {
        self.globals[global].initializer = Some(init);
    }

    /// Appends a fresh, empty block to `func` and returns its handle. The
    /// first block ever appended becomes the entry block.
    pub fn new_block(&mut self, func: FuncRef) -> BlockRef {
        let id = self.blocks.push(BasicBlock::new(func));
        self.funcs[func].blocks.push(id);
        id
    }

    /// Unlinks every operand use `inst` owns (but does not touch uses *of*
    /// `inst`'s result -- callers that remove a still-used instruction are
    /// responsible for RAUW-ing it first) and drops it from its block.
    pub fn remove_instruction(&mut self, inst: InstRef) {
        let operands = std::mem::take(&mut self.insts[inst].operands);
        for use_id in operands {
            let value = self.uses.get(use_id).value;
            self.remove_use(value, use_id);
        }
        if self.insts[inst].is_terminator() {
            let block = self.insts[inst].block;
            for succ in self.insts[inst].successors.clone() {
                self.blocks[succ].remove_pred(block);
            }
        }
        let block = self.insts[inst].block;
        self.blocks[block].insts.retain(|&i| i != inst);
    }

    /// Replaces every use of `inst`'s result with `value` and deletes it.
    /// `inst` must not be a terminator (terminators have no result to
    /// replace).
    pub fn replace_instruction_with_value(&mut self, inst: InstRef, value: ValueRef) {
        debug_assert!(!self.insts[inst].is_terminator());
        self.replace_all_uses_with(ValueRef::Inst(inst), value);
        self.remove_instruction(inst);
    }
}
