//! Arena storage for type and type pack nodes.
//!
//! The arena owns every node allocated during one checking pass. Nodes are
//! addressed by [`TypeId`] / [`TypePackId`] and mutated in place: a free
//! variable becomes a `Bound` forwarding link when unification resolves it,
//! and becomes `Generic` when a closing scope quantifies it. Both transitions
//! are one-way.

use cranelift_entity::PrimaryMap;
use derive_more::{Display, Error};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use cairn_core::Symbol;

use crate::refs::{Handle, ScopeId, TypeId, TypePackId};

// ============================================================================
// Node data
// ============================================================================

/// Builtin scalar types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Primitive {
    #[display("nil")]
    Nil,
    #[display("boolean")]
    Boolean,
    #[display("number")]
    Number,
    #[display("string")]
    String,
}

/// A function type. Non-empty `generics` or `generic_packs` make it a
/// polymorphic scheme that must be instantiated before use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub generics: Vec<TypeId>,
    pub generic_packs: Vec<TypePackId>,
    pub params: TypePackId,
    pub returns: TypePackId,
}

/// Data for a single type node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeData {
    /// Unresolved type variable owned by `scope`.
    Free { scope: ScopeId },
    /// Forwarding link installed by unification.
    Bound(TypeId),
    /// Placeholder for a type that a constraint has yet to produce.
    Blocked,
    /// Quantified variable of a polymorphic scheme.
    Generic { scope: ScopeId, index: u32 },
    Primitive(Primitive),
    Function(FunctionType),
    /// Record of named properties, in declaration order.
    Table { props: IndexMap<Symbol, TypeId> },
    /// Recovery type, compatible with everything.
    Error,
}

/// Data for a single type pack node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypePackData {
    /// A fixed prefix of types followed by an optional tail pack.
    List {
        head: SmallVec<[TypeId; 4]>,
        tail: Option<TypePackId>,
    },
    /// Zero or more values of one type.
    Variadic(TypeId),
    Free {
        scope: ScopeId,
    },
    Bound(TypePackId),
    Generic {
        scope: ScopeId,
        index: u32,
    },
}

/// Violation of an arena invariant. These indicate engine bugs, never
/// problems in the checked program.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ArenaError {
    #[display("{ty} is neither free nor blocked and cannot be bound")]
    AlreadyBound { ty: TypeId },
    #[display("{pack} is not a free type pack and cannot be bound")]
    PackAlreadyBound { pack: TypePackId },
    #[display("{handle} is not a free variable")]
    NotFree { handle: Handle },
    #[display("{ty} is not a function type")]
    NotFunction { ty: TypeId },
}

// ============================================================================
// TypeArena
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct Builtins {
    nil: TypeId,
    boolean: TypeId,
    number: TypeId,
    string: TypeId,
    error: TypeId,
}

/// Owner of all type and type pack nodes for one checking pass.
#[derive(Clone, Debug)]
pub struct TypeArena {
    types: PrimaryMap<TypeId, TypeData>,
    packs: PrimaryMap<TypePackId, TypePackData>,
    builtins: Builtins,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        let mut types = PrimaryMap::new();
        let builtins = Builtins {
            nil: types.push(TypeData::Primitive(Primitive::Nil)),
            boolean: types.push(TypeData::Primitive(Primitive::Boolean)),
            number: types.push(TypeData::Primitive(Primitive::Number)),
            string: types.push(TypeData::Primitive(Primitive::String)),
            error: types.push(TypeData::Error),
        };
        Self {
            types,
            packs: PrimaryMap::new(),
            builtins,
        }
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    pub fn primitive(&self, primitive: Primitive) -> TypeId {
        match primitive {
            Primitive::Nil => self.builtins.nil,
            Primitive::Boolean => self.builtins.boolean,
            Primitive::Number => self.builtins.number,
            Primitive::String => self.builtins.string,
        }
    }

    pub fn nil_type(&self) -> TypeId {
        self.builtins.nil
    }

    pub fn boolean_type(&self) -> TypeId {
        self.builtins.boolean
    }

    pub fn number_type(&self) -> TypeId {
        self.builtins.number
    }

    pub fn string_type(&self) -> TypeId {
        self.builtins.string
    }

    pub fn error_type(&self) -> TypeId {
        self.builtins.error
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    pub fn add_type(&mut self, data: TypeData) -> TypeId {
        self.types.push(data)
    }

    pub fn add_pack(&mut self, data: TypePackData) -> TypePackId {
        self.packs.push(data)
    }

    /// Allocate a fresh type variable owned by `scope`.
    pub fn fresh_type(&mut self, scope: ScopeId) -> TypeId {
        self.add_type(TypeData::Free { scope })
    }

    /// Allocate a fresh type pack variable owned by `scope`.
    pub fn fresh_pack(&mut self, scope: ScopeId) -> TypePackId {
        self.add_pack(TypePackData::Free { scope })
    }

    /// Allocate a placeholder for a type that some constraint will produce.
    pub fn blocked_type(&mut self) -> TypeId {
        self.add_type(TypeData::Blocked)
    }

    pub fn list_pack(
        &mut self,
        head: impl IntoIterator<Item = TypeId>,
        tail: Option<TypePackId>,
    ) -> TypePackId {
        self.add_pack(TypePackData::List {
            head: head.into_iter().collect(),
            tail,
        })
    }

    /// Build a monomorphic function type from closed parameter and return lists.
    pub fn function_type(
        &mut self,
        params: impl IntoIterator<Item = TypeId>,
        returns: impl IntoIterator<Item = TypeId>,
    ) -> TypeId {
        let params = self.list_pack(params, None);
        let returns = self.list_pack(returns, None);
        self.add_type(TypeData::Function(FunctionType {
            generics: Vec::new(),
            generic_packs: Vec::new(),
            params,
            returns,
        }))
    }

    pub fn table_type(&mut self, props: impl IntoIterator<Item = (Symbol, TypeId)>) -> TypeId {
        self.add_type(TypeData::Table {
            props: props.into_iter().collect(),
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, ty: TypeId) -> &TypeData {
        &self.types[ty]
    }

    pub fn get_pack(&self, pack: TypePackId) -> &TypePackData {
        &self.packs[pack]
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Chase `Bound` links to the representative node.
    pub fn follow(&self, mut ty: TypeId) -> TypeId {
        while let TypeData::Bound(next) = self.types[ty] {
            ty = next;
        }
        ty
    }

    /// Chase `Bound` links to the representative pack.
    pub fn follow_pack(&self, mut pack: TypePackId) -> TypePackId {
        while let TypePackData::Bound(next) = self.packs[pack] {
            pack = next;
        }
        pack
    }

    /// Whether `ty` still resolves to a blocked placeholder.
    pub fn is_blocked(&self, ty: TypeId) -> bool {
        matches!(self.types[self.follow(ty)], TypeData::Blocked)
    }

    /// Whether `ty` still resolves to an unbound type variable.
    pub fn is_free(&self, ty: TypeId) -> bool {
        matches!(self.types[self.follow(ty)], TypeData::Free { .. })
    }

    /// Scope owning a free variable, or `None` if the handle is not free.
    pub fn owner(&self, handle: Handle) -> Option<ScopeId> {
        match handle {
            Handle::Type(ty) => match self.types[ty] {
                TypeData::Free { scope } => Some(scope),
                _ => None,
            },
            Handle::Pack(pack) => match self.packs[pack] {
                TypePackData::Free { scope } => Some(scope),
                _ => None,
            },
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Bind a free or blocked type to `to`. Bound types are never rebound.
    pub fn bind(&mut self, var: TypeId, to: TypeId) -> Result<(), ArenaError> {
        match self.types[var] {
            TypeData::Free { .. } | TypeData::Blocked => {
                self.types[var] = TypeData::Bound(to);
                Ok(())
            }
            _ => Err(ArenaError::AlreadyBound { ty: var }),
        }
    }

    /// Bind a free type pack to `to`.
    pub fn bind_pack(&mut self, var: TypePackId, to: TypePackId) -> Result<(), ArenaError> {
        match self.packs[var] {
            TypePackData::Free { .. } => {
                self.packs[var] = TypePackData::Bound(to);
                Ok(())
            }
            _ => Err(ArenaError::PackAlreadyBound { pack: var }),
        }
    }

    /// Move a free variable to a different owning scope.
    pub fn set_owner(&mut self, handle: Handle, scope: ScopeId) -> Result<(), ArenaError> {
        match handle {
            Handle::Type(ty) => match &mut self.types[ty] {
                TypeData::Free { scope: owner } => *owner = scope,
                _ => return Err(ArenaError::NotFree { handle }),
            },
            Handle::Pack(pack) => match &mut self.packs[pack] {
                TypePackData::Free { scope: owner } => *owner = scope,
                _ => return Err(ArenaError::NotFree { handle }),
            },
        }
        Ok(())
    }

    /// Turn a free variable into the `index`th generic of its scope.
    pub fn make_generic(&mut self, handle: Handle, index: u32) -> Result<(), ArenaError> {
        let scope = self.owner(handle).ok_or(ArenaError::NotFree { handle })?;
        match handle {
            Handle::Type(ty) => self.types[ty] = TypeData::Generic { scope, index },
            Handle::Pack(pack) => self.packs[pack] = TypePackData::Generic { scope, index },
        }
        Ok(())
    }

    /// Append quantified variables to a function type.
    pub fn add_generics(
        &mut self,
        func: TypeId,
        generics: impl IntoIterator<Item = TypeId>,
        generic_packs: impl IntoIterator<Item = TypePackId>,
    ) -> Result<(), ArenaError> {
        match &mut self.types[func] {
            TypeData::Function(f) => {
                f.generics.extend(generics);
                f.generic_packs.extend(generic_packs);
                Ok(())
            }
            _ => Err(ArenaError::NotFunction { ty: func }),
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Visit every node reachable from `root` once, after following bindings.
    pub fn walk(&self, root: Handle, visit: &mut impl FnMut(Handle, &Self)) {
        let mut seen = IndexSet::new();
        self.walk_inner(root, &mut seen, visit);
    }

    fn walk_inner(
        &self,
        handle: Handle,
        seen: &mut IndexSet<Handle>,
        visit: &mut impl FnMut(Handle, &Self),
    ) {
        let handle = match handle {
            Handle::Type(ty) => Handle::Type(self.follow(ty)),
            Handle::Pack(pack) => Handle::Pack(self.follow_pack(pack)),
        };
        if !seen.insert(handle) {
            return;
        }
        visit(handle, self);
        match handle {
            Handle::Type(ty) => match &self.types[ty] {
                TypeData::Function(f) => {
                    self.walk_inner(Handle::Pack(f.params), seen, visit);
                    self.walk_inner(Handle::Pack(f.returns), seen, visit);
                }
                TypeData::Table { props } => {
                    for &prop in props.values() {
                        self.walk_inner(Handle::Type(prop), seen, visit);
                    }
                }
                _ => {}
            },
            Handle::Pack(pack) => match &self.packs[pack] {
                TypePackData::List { head, tail } => {
                    for &ty in head {
                        self.walk_inner(Handle::Type(ty), seen, visit);
                    }
                    if let Some(tail) = tail {
                        self.walk_inner(Handle::Pack(*tail), seen, visit);
                    }
                }
                TypePackData::Variadic(ty) => self.walk_inner(Handle::Type(*ty), seen, visit),
                _ => {}
            },
        }
    }

    /// Free variables reachable from `root`, in appearance order.
    pub fn free_vars(&self, root: Handle) -> IndexSet<Handle> {
        let mut out = IndexSet::new();
        self.walk(root, &mut |handle, arena| {
            if arena.owner(handle).is_some() {
                out.insert(handle);
            }
        });
        out
    }

    /// Whether `var` (after following) is reachable from `root`.
    pub fn mentions(&self, root: Handle, var: Handle) -> bool {
        let var = match var {
            Handle::Type(ty) => Handle::Type(self.follow(ty)),
            Handle::Pack(pack) => Handle::Pack(self.follow_pack(pack)),
        };
        let mut found = false;
        self.walk(root, &mut |handle, _| found |= handle == var);
        found
    }
}
