//! Dense entity handles for every arena-allocated IR object.
//!
//! Cross-references in the source material are raw, cyclic pointers
//! (value <-> use <-> user). Per the design notes we replace that with
//! stable arena storage addressed by small `Copy` handles: no entity
//! outlives its owning `Context`, and there is no unsafe aliasing because
//! nothing holds a raw pointer into an arena, only an index. This is the
//! same shape as `cranelift-entity`'s `EntityRef`/`PrimaryMap` (see the
//! `Inst`/`Block` handles in miden-ir's instruction module) and
//! `index_vec`'s `IndexVec` (as used by the Hash compiler's IR crate);
//! implemented locally here so the arena plumbing has no external surface.

use std::fmt;

macro_rules! entity_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                assert!(index < u32::MAX as usize, "entity index overflow");
                $name(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

entity_id!(TypeId, "ty");
entity_id!(ConstId, "const");
entity_id!(ArgRef, "arg");
entity_id!(InstRef, "inst");
entity_id!(BlockRef, "bb");
entity_id!(FuncRef, "fn");
entity_id!(GlobalRef, "gv");
entity_id!(UseId, "use");

/// Anything that can appear as the target of a `Use` edge, i.e. anything
/// that carries a use-list. `Type` is deliberately excluded: types are
/// values per the data model, but never participate as SSA operands, so
/// giving them a use-list would be dead weight.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueRef {
    Const(ConstId),
    Arg(ArgRef),
    Inst(InstRef),
    Block(BlockRef),
    Func(FuncRef),
    Global(GlobalRef),
}

impl From<ConstId> for ValueRef {
    fn from(v: ConstId) -> Self {
        ValueRef::Const(v)
    }
}
impl From<ArgRef> for ValueRef {
    fn from(v: ArgRef) -> Self {
        ValueRef::Arg(v)
    }
}
impl From<InstRef> for ValueRef {
    fn from(v: InstRef) -> Self {
        ValueRef::Inst(v)
    }
}
impl From<BlockRef> for ValueRef {
    fn from(v: BlockRef) -> Self {
        ValueRef::Block(v)
    }
}
impl From<FuncRef> for ValueRef {
    fn from(v: FuncRef) -> Self {
        ValueRef::Func(v)
    }
}
impl From<GlobalRef> for ValueRef {
    fn from(v: GlobalRef) -> Self {
        ValueRef::Global(v)
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Const(c) => write!(f, "{c}"),
            ValueRef::Arg(a) => write!(f, "{a}"),
            ValueRef::Inst(i) => write!(f, "{i}"),
            ValueRef::Block(b) => write!(f, "{b}"),
            ValueRef::Func(fun) => write!(f, "{fun}"),
            ValueRef::Global(g) => write!(f, "{g}"),
        }
    }
}

/// Anything that can own operands, i.e. anything that appears as the
/// `user` half of a `Use` edge.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UserRef {
    Inst(InstRef),
    Const(ConstId),
    Global(GlobalRef),
}

/// A minimal dense arena: `Vec<T>` addressed by an entity id. Mirrors
/// `cranelift_entity::PrimaryMap` / `index_vec::IndexVec`.
#[derive(Debug, Clone)]
pub struct Arena<K, V> {
    data: Vec<V>,
    _marker: std::marker::PhantomData<K>,
}

impl<K, V> Default for Arena<K, V> {
    fn default() -> Self {
        Self { data: Vec::new(), _marker: std::marker::PhantomData }
    }
}

impl<K, V> Arena<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.data.iter()
    }
}

macro_rules! impl_arena_index {
    ($key:ty) => {
        impl<V> Arena<$key, V> {
            pub fn push(&mut self, value: V) -> $key {
                let id = <$key>::new(self.data.len());
                self.data.push(value);
                id
            }

            pub fn keys(&self) -> impl Iterator<Item = $key> + '_ {
                (0..self.data.len()).map(<$key>::new)
            }
        }

        impl<V> std::ops::Index<$key> for Arena<$key, V> {
            type Output = V;
            fn index(&self, id: $key) -> &V {
                &self.data[id.index()]
            }
        }

        impl<V> std::ops::IndexMut<$key> for Arena<$key, V> {
            fn index_mut(&mut self, id: $key) -> &mut V {
                &mut self.data[id.index()]
            }
        }
    };
}

impl_arena_index!(TypeId);
impl_arena_index!(ConstId);
impl_arena_index!(ArgRef);
impl_arena_index!(InstRef);
impl_arena_index!(BlockRef);
impl_arena_index!(FuncRef);
impl_arena_index!(GlobalRef);
impl_arena_index!(UseId);
