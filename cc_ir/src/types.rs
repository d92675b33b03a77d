//! Interned type system (data model section 3.1/3.2, layout rules in 6.1).
//!
//! Types are hash-consed on structural content: two constructions with
//! identical contents return the same [`TypeId`]. Struct types are the one
//! exception -- they are nominal, keyed only on a caller-supplied 64-bit id,
//! which lets the front-end forward-declare a struct (`begin`), then fill in
//! members later (`set_members`/`end`) to support mutually recursive types.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::entities::TypeId;

bitflags::bitflags! {
    /// Struct-level flags. `PACKED` is a reserved bit per the spec: parsed
    /// and stored, but not yet consulted by the layout algorithm.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StructFlags: u8 {
        const PACKED = 0b0000_0001;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Basic-block label type; the type of a `BlockRef` used as a branch
    /// target operand.
    Label,
    /// The type of a `Type` value itself (`type`, see data model 3.1).
    Type,
    Function {
        ret: TypeId,
        args: SmallVec<[TypeId; 4]>,
        vararg: bool,
    },
    Pointer(TypeId),
    Array {
        elem: TypeId,
        len: u64,
    },
    /// Nominal: two struct types are equal iff their `id`s are equal, even
    /// if their members happen to coincide structurally.
    Struct {
        id: u64,
    },
}

/// Out-of-line payload for struct types, looked up by [`TypeId`] rather than
/// packed into `TypeKind` so that `begin`/`set_members`/`end` can mutate a
/// struct's members without disturbing its interned identity.
#[derive(Debug, Clone, Default)]
pub struct StructBody {
    pub unique_id: u64,
    pub members: SmallVec<[TypeId; 8]>,
    pub flags: StructFlags,
    pub complete: bool,
}

#[derive(Default)]
pub struct TypeInterner {
    kinds: Vec<TypeKind>,
    by_content: HashMap<TypeKind, TypeId>,
    struct_bodies: HashMap<u64, TypeId>,
    struct_data: HashMap<TypeId, StructBody>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.by_content.get(&kind) {
            return id;
        }
        let id = TypeId::new(self.kinds.len());
        self.by_content.insert(kind.clone(), id);
        self.kinds.push(kind);
        id
    }

    pub fn void(&mut self) -> TypeId {
        self.intern(TypeKind::Void)
    }
    pub fn bool(&mut self) -> TypeId {
        self.intern(TypeKind::Bool)
    }
    pub fn i8(&mut self) -> TypeId {
        self.intern(TypeKind::I8)
    }
    pub fn i16(&mut self) -> TypeId {
        self.intern(TypeKind::I16)
    }
    pub fn i32(&mut self) -> TypeId {
        self.intern(TypeKind::I32)
    }
    pub fn i64(&mut self) -> TypeId {
        self.intern(TypeKind::I64)
    }
    pub fn u8(&mut self) -> TypeId {
        self.intern(TypeKind::U8)
    }
    pub fn u16(&mut self) -> TypeId {
        self.intern(TypeKind::U16)
    }
    pub fn u32(&mut self) -> TypeId {
        self.intern(TypeKind::U32)
    }
    pub fn u64_ty(&mut self) -> TypeId {
        self.intern(TypeKind::U64)
    }
    pub fn f32(&mut self) -> TypeId {
        self.intern(TypeKind::F32)
    }
    pub fn f64(&mut self) -> TypeId {
        self.intern(TypeKind::F64)
    }
    pub fn label(&mut self) -> TypeId {
        self.intern(TypeKind::Label)
    }
    pub fn type_type(&mut self) -> TypeId {
        self.intern(TypeKind::Type)
    }

    pub fn function(&mut self, ret: TypeId, args: &[TypeId], vararg: bool) -> TypeId {
        self.intern(TypeKind::Function {
            ret,
            args: SmallVec::from_slice(args),
            vararg,
        })
    }

    pub fn pointer(&mut self, base: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(base))
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::Array { elem, len })
    }

    /// Begin a forward-declared struct type: returns an incomplete handle
    /// that can already be referenced from other types (e.g. a pointer to
    /// itself), before its members are known.
    pub fn begin_struct(&mut self, unique_id: u64) -> TypeId {
        if let Some(&id) = self.struct_bodies.get(&unique_id) {
            return id;
        }
        let id = self.intern(TypeKind::Struct { id: unique_id });
        self.struct_bodies.insert(unique_id, id);
        self.struct_data.entry(id).or_insert_with(|| StructBody {
            unique_id,
            members: SmallVec::new(),
            flags: StructFlags::empty(),
            complete: false,
        });
        id
    }

    pub fn set_members(&mut self, id: TypeId, members: &[TypeId], flags: StructFlags) {
        let body = self
            .struct_data
            .get_mut(&id)
            .expect("set_members on a non-struct TypeId");
        body.members = SmallVec::from_slice(members);
        body.flags = flags;
    }

    pub fn end_struct(&mut self, id: TypeId) {
        let body = self
            .struct_data
            .get_mut(&id)
            .expect("end_struct on a non-struct TypeId");
        body.complete = true;
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    pub fn struct_body(&self, id: TypeId) -> &StructBody {
        self.struct_data
            .get(&id)
            .expect("struct_body on a non-struct TypeId")
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::I8
                | TypeKind::I16
                | TypeKind::I32
                | TypeKind::I64
                | TypeKind::U8
                | TypeKind::U16
                | TypeKind::U32
                | TypeKind::U64
        )
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::I8 | TypeKind::I16 | TypeKind::I32 | TypeKind::I64)
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::F32 | TypeKind::F64)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_))
    }

    pub fn is_first_class(&self, id: TypeId) -> bool {
        !matches!(self.kind(id), TypeKind::Void | TypeKind::Label | TypeKind::Function { .. } | TypeKind::Type)
    }

    /// Layout rules, section 6.1: standard C x86-64 sizes/alignments, struct
    /// members laid out in declaration order with natural alignment padding.
    pub fn size_of(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Void => 0,
            TypeKind::Bool | TypeKind::I8 | TypeKind::U8 => 1,
            TypeKind::I16 | TypeKind::U16 => 2,
            TypeKind::I32 | TypeKind::U32 | TypeKind::F32 => 4,
            TypeKind::I64 | TypeKind::U64 | TypeKind::F64 => 8,
            TypeKind::Pointer(_) => 8,
            TypeKind::Label | TypeKind::Type | TypeKind::Function { .. } => {
                panic!("size_of: not a first-class type")
            }
            TypeKind::Array { elem, len } => self.size_of(*elem) * *len,
            TypeKind::Struct { .. } => {
                let body = self.struct_body(id);
                let mut offset = 0u64;
                for &m in &body.members {
                    let align = self.align_of(m);
                    offset = align_up(offset, align);
                    offset += self.size_of(m);
                }
                align_up(offset, self.align_of(id))
            }
        }
    }

    pub fn align_of(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Void => 1,
            TypeKind::Bool | TypeKind::I8 | TypeKind::U8 => 1,
            TypeKind::I16 | TypeKind::U16 => 2,
            TypeKind::I32 | TypeKind::U32 | TypeKind::F32 => 4,
            TypeKind::I64 | TypeKind::U64 | TypeKind::F64 | TypeKind::Pointer(_) => 8,
            TypeKind::Label | TypeKind::Type | TypeKind::Function { .. } => 1,
            TypeKind::Array { elem, .. } => self.align_of(*elem),
            TypeKind::Struct { .. } => {
                let body = self.struct_body(id);
                body.members.iter().map(|&m| self.align_of(m)).max().unwrap_or(1)
            }
        }
    }

    /// Byte offset of struct member `idx`, used by constant-folding GEP.
    pub fn struct_member_offset(&self, id: TypeId, idx: usize) -> u64 {
        let body = self.struct_body(id);
        let mut offset = 0u64;
        for &m in &body.members[..idx] {
            offset = align_up(offset, self.align_of(m));
            offset += self.size_of(m);
        }
        align_up(offset, self.align_of(body.members[idx]))
    }
}

pub fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) & !(align - 1)
}
