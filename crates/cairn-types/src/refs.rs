//! Entity references into the type arena and scope tree.
//!
//! Each ref type is a thin `u32` wrapper providing type-safe indexing
//! into `PrimaryMap` storage.

use cranelift_entity::entity_impl;

/// Reference to a type node in the [`TypeArena`](crate::TypeArena).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);
entity_impl!(TypeId, "t");

/// Reference to a type pack node in the [`TypeArena`](crate::TypeArena).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePackId(u32);
entity_impl!(TypePackId, "tp");

/// Reference to a lexical scope in the [`ScopeTree`](crate::ScopeTree).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);
entity_impl!(ScopeId, "scope");

/// Either kind of arena handle.
///
/// Used wherever a type and a type pack are interchangeable, such as the
/// free variables mentioned by a type or the handles bound by unification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Handle {
    Type(TypeId),
    Pack(TypePackId),
}

impl From<TypeId> for Handle {
    fn from(ty: TypeId) -> Self {
        Handle::Type(ty)
    }
}

impl From<TypePackId> for Handle {
    fn from(pack: TypePackId) -> Self {
        Handle::Pack(pack)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handle::Type(ty) => write!(f, "{ty}"),
            Handle::Pack(pack) => write!(f, "{pack}"),
        }
    }
}
