//! Hash-consed constants (data model 3.1, interning rule in 4.2).
//!
//! A constant's payload is a tagged union keyed by its type. Floats are
//! stored as bit patterns so the interning key can derive `Eq`/`Hash`
//! without running into `NaN` weirdness. Aggregate constants (arrays,
//! structs) store their member constants as a plain id list here; the
//! matching `Use` edges (so RAUW and use-list consistency hold for child
//! constants too) are created by [`crate::context::Context`], which is the
//! only place that owns both the const arena and the use pool.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::entities::{ConstId, FuncRef, GlobalRef, TypeId, UseId};

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ConstKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32Bits(u32),
    F64Bits(u64),
    PtrAddr(u64),
    /// Pointer constant that names a global value; printers emit the
    /// symbol name rather than a raw address (spec 3.1).
    PtrGlobal(GlobalRef),
    PtrFunc(FuncRef),
    Aggregate(SmallVec<[ConstId; 8]>),
    Undef,
}

pub struct ConstData {
    pub ty: TypeId,
    pub key: ConstKey,
    /// Use edges into child constants, populated only for `Aggregate`.
    pub operands: SmallVec<[UseId; 4]>,
    pub use_head: Option<UseId>,
}

#[derive(Default)]
pub struct ConstInterner {
    data: Vec<ConstData>,
    by_content: HashMap<(TypeId, ConstKey), ConstId>,
}

impl ConstInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for `(ty, key)`, or `None` if this constant
    /// has not been built yet -- the caller is responsible for allocating
    /// the `ConstData` (it may need to wire up `operands` first).
    pub fn lookup(&self, ty: TypeId, key: &ConstKey) -> Option<ConstId> {
        self.by_content.get(&(ty, key.clone())).copied()
    }

    pub fn insert(&mut self, ty: TypeId, key: ConstKey, operands: SmallVec<[UseId; 4]>) -> ConstId {
        let id = ConstId::new(self.data.len());
        self.by_content.insert((ty, key.clone()), id);
        self.data.push(ConstData { ty, key, operands, use_head: None });
        id
    }

    pub fn get(&self, id: ConstId) -> &ConstData {
        &self.data[id.index()]
    }

    pub fn get_mut(&mut self, id: ConstId) -> &mut ConstData {
        &mut self.data[id.index()]
    }
}

impl ConstData {
    pub fn as_bool(&self) -> Option<bool> {
        match self.key {
            ConstKey::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Integer value, sign- or zero-extended to `i64` per the operand's
    /// signedness, matching the spec's "i64 sign-extended" / "u64
    /// unsigned" payload split.
    pub fn as_i64(&self) -> Option<i64> {
        match self.key {
            ConstKey::Int(v) => Some(v),
            ConstKey::UInt(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.key {
            ConstKey::Int(v) => Some(v as u64),
            ConstKey::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.key {
            ConstKey::F32Bits(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.key {
            ConstKey::F64Bits(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    pub fn as_ptr_addr(&self) -> Option<u64> {
        match self.key {
            ConstKey::PtrAddr(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.key, ConstKey::Aggregate(_))
    }

    pub fn is_undef(&self) -> bool {
        matches!(self.key, ConstKey::Undef)
    }

    pub fn aggregate_members(&self) -> &[ConstId] {
        match &self.key {
            ConstKey::Aggregate(members) => members,
            _ => &[],
        }
    }
}
