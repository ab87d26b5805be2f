//! Quantification and instantiation of polymorphic function types.
//!
//! Quantification rewrites free variables owned by a closing scope into
//! `Generic` nodes and records them on the function type. Instantiation
//! copies a scheme, substituting fresh free variables for its generics.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::arena::{ArenaError, FunctionType, TypeArena, TypeData, TypePackData};
use crate::refs::{Handle, ScopeId, TypeId, TypePackId};
use crate::scope::ScopeTree;

/// Variables turned into generics by [`quantify`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Quantified {
    pub generics: Vec<TypeId>,
    pub generic_packs: Vec<TypePackId>,
}

impl Quantified {
    pub fn is_empty(&self) -> bool {
        self.generics.is_empty() && self.generic_packs.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.generics
            .iter()
            .map(|&ty| Handle::Type(ty))
            .chain(self.generic_packs.iter().map(|&pack| Handle::Pack(pack)))
    }
}

/// Free variables of `ty` that a generalization closing `scope` would
/// quantify, in appearance order.
///
/// Only function types are generalized; every other type yields nothing.
pub fn quantifiable(
    arena: &TypeArena,
    scopes: &ScopeTree,
    ty: TypeId,
    scope: ScopeId,
) -> Vec<Handle> {
    let ty = arena.follow(ty);
    if !matches!(arena.get(ty), TypeData::Function(_)) {
        return Vec::new();
    }
    arena
        .free_vars(Handle::Type(ty))
        .into_iter()
        .filter(|&var| {
            arena
                .owner(var)
                .is_some_and(|owner| scopes.is_descendant_of(owner, scope))
        })
        .collect()
}

/// Generalize the function type `ty` at the close of `scope`.
pub fn quantify(
    arena: &mut TypeArena,
    scopes: &ScopeTree,
    ty: TypeId,
    scope: ScopeId,
) -> Result<Quantified, ArenaError> {
    let ty = arena.follow(ty);
    let (type_base, pack_base) = match arena.get(ty) {
        TypeData::Function(f) => (f.generics.len(), f.generic_packs.len()),
        _ => return Ok(Quantified::default()),
    };

    let mut quantified = Quantified::default();
    for var in quantifiable(arena, scopes, ty, scope) {
        match var {
            Handle::Type(var_ty) => {
                let index = (type_base + quantified.generics.len()) as u32;
                arena.make_generic(var, index)?;
                quantified.generics.push(var_ty);
            }
            Handle::Pack(var_pack) => {
                let index = (pack_base + quantified.generic_packs.len()) as u32;
                arena.make_generic(var, index)?;
                quantified.generic_packs.push(var_pack);
            }
        }
    }

    if !quantified.is_empty() {
        arena.add_generics(
            ty,
            quantified.generics.iter().copied(),
            quantified.generic_packs.iter().copied(),
        )?;
    }
    Ok(quantified)
}

/// Produce a monomorphic copy of `scheme` whose generics are replaced by
/// fresh variables owned by `scope`.
///
/// Types that are not polymorphic schemes instantiate to themselves.
pub fn instantiate(arena: &mut TypeArena, scheme: TypeId, scope: ScopeId) -> TypeId {
    let scheme = arena.follow(scheme);
    let TypeData::Function(f) = arena.get(scheme).clone() else {
        return scheme;
    };
    if f.generics.is_empty() && f.generic_packs.is_empty() {
        return scheme;
    }

    let mut inst = Instantiation {
        arena,
        types: HashMap::new(),
        packs: HashMap::new(),
    };
    for &generic in &f.generics {
        let fresh = inst.arena.fresh_type(scope);
        inst.types.insert(generic, fresh);
    }
    for &generic in &f.generic_packs {
        let fresh = inst.arena.fresh_pack(scope);
        inst.packs.insert(generic, fresh);
    }

    let params = inst.pack(f.params);
    let returns = inst.pack(f.returns);
    inst.arena.add_type(TypeData::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        params,
        returns,
    }))
}

struct Instantiation<'a> {
    arena: &'a mut TypeArena,
    types: HashMap<TypeId, TypeId>,
    packs: HashMap<TypePackId, TypePackId>,
}

impl Instantiation<'_> {
    fn ty(&mut self, ty: TypeId) -> TypeId {
        let ty = self.arena.follow(ty);
        if let Some(&done) = self.types.get(&ty) {
            return done;
        }
        let result = match self.arena.get(ty).clone() {
            TypeData::Function(f) => {
                let params = self.pack(f.params);
                let returns = self.pack(f.returns);
                if params == f.params && returns == f.returns {
                    ty
                } else {
                    self.arena.add_type(TypeData::Function(FunctionType {
                        params,
                        returns,
                        ..f
                    }))
                }
            }
            TypeData::Table { props } => {
                let substituted: IndexMap<_, _> = props
                    .iter()
                    .map(|(&name, &prop)| (name, self.ty(prop)))
                    .collect();
                if substituted == props {
                    ty
                } else {
                    self.arena.add_type(TypeData::Table { props: substituted })
                }
            }
            _ => ty,
        };
        self.types.insert(ty, result);
        result
    }

    fn pack(&mut self, pack: TypePackId) -> TypePackId {
        let pack = self.arena.follow_pack(pack);
        if let Some(&done) = self.packs.get(&pack) {
            return done;
        }
        let result = match self.arena.get_pack(pack).clone() {
            TypePackData::List { head, tail } => {
                let new_head: Vec<_> = head.iter().map(|&ty| self.ty(ty)).collect();
                let new_tail = tail.map(|tail| self.pack(tail));
                if new_head.as_slice() == head.as_slice() && new_tail == tail {
                    pack
                } else {
                    self.arena.list_pack(new_head, new_tail)
                }
            }
            TypePackData::Variadic(elem) => {
                let new_elem = self.ty(elem);
                if new_elem == elem {
                    pack
                } else {
                    self.arena.add_pack(TypePackData::Variadic(new_elem))
                }
            }
            _ => pack,
        };
        self.packs.insert(pack, result);
        result
    }
}
