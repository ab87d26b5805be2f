//! Unification of types and type packs.
//!
//! A [`Unifier`] makes a sub type compatible with a super type by binding
//! free variables in the arena. Every call is best-effort: a mismatch is
//! recorded and the call returns, but bindings made before the mismatch
//! stay in place. Only arena invariant violations escape as `Err`.

use derive_more::Display;
use smallvec::SmallVec;
use tracing::trace;

use cairn_core::Symbol;

use crate::arena::{ArenaError, TypeArena, TypeData, TypePackData};
use crate::refs::{Handle, ScopeId, TypeId, TypePackId};
use crate::scope::ScopeTree;

/// A violation found while unifying two types or packs.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum UnifyError {
    #[display("type {found} could not be converted into {expected}")]
    Mismatch { found: TypeId, expected: TypeId },
    #[display("type pack {found} could not be converted into {expected}")]
    PackMismatch {
        found: TypePackId,
        expected: TypePackId,
    },
    #[display("occurs check failed: {var} occurs in {ty}")]
    OccursCheck { var: TypeId, ty: TypeId },
    #[display("occurs check failed: {var} occurs in {pack}")]
    PackOccursCheck { var: TypePackId, pack: TypePackId },
    #[display("expected {expected} values, found {found}")]
    PackArity { expected: usize, found: usize },
    #[display("{ty} is missing property {name}")]
    MissingProperty { name: Symbol, ty: TypeId },
}

enum Failure {
    Mismatch(UnifyError),
    Internal(ArenaError),
}

impl From<UnifyError> for Failure {
    fn from(error: UnifyError) -> Self {
        Failure::Mismatch(error)
    }
}

impl From<ArenaError> for Failure {
    fn from(error: ArenaError) -> Self {
        Failure::Internal(error)
    }
}

/// Outcome of a unifier's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Unification {
    pub errors: Vec<UnifyError>,
    /// Handles whose binding or ownership changed, in mutation order.
    pub changed: Vec<Handle>,
}

/// Performs unification against a borrowed arena.
pub struct Unifier<'a> {
    arena: &'a mut TypeArena,
    scopes: &'a ScopeTree,
    errors: Vec<UnifyError>,
    changed: Vec<Handle>,
}

impl<'a> Unifier<'a> {
    pub fn new(arena: &'a mut TypeArena, scopes: &'a ScopeTree) -> Self {
        Self {
            arena,
            scopes,
            errors: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Make `sub` compatible with `sup`.
    pub fn unify(&mut self, sub: TypeId, sup: TypeId) -> Result<(), ArenaError> {
        let result = self.unify_types(sub, sup);
        self.record(result)
    }

    /// Make the pack `sub` compatible with the pack `sup`.
    pub fn unify_packs(&mut self, sub: TypePackId, sup: TypePackId) -> Result<(), ArenaError> {
        let result = self.unify_pack_inner(sub, sup);
        self.record(result)
    }

    pub fn finish(self) -> Unification {
        Unification {
            errors: self.errors,
            changed: self.changed,
        }
    }

    fn record(&mut self, result: Result<(), Failure>) -> Result<(), ArenaError> {
        match result {
            Ok(()) => Ok(()),
            Err(Failure::Mismatch(error)) => {
                trace!(%error, "unification failed");
                self.errors.push(error);
                Ok(())
            }
            Err(Failure::Internal(error)) => Err(error),
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn unify_types(&mut self, sub: TypeId, sup: TypeId) -> Result<(), Failure> {
        let sub = self.arena.follow(sub);
        let sup = self.arena.follow(sup);
        if sub == sup {
            return Ok(());
        }

        let sub_data = self.arena.get(sub).clone();
        let sup_data = self.arena.get(sup).clone();
        match (&sub_data, &sup_data) {
            (TypeData::Error, _) | (_, TypeData::Error) => Ok(()),

            // Placeholders are filled before ordinary variables so a blocked
            // target never ends up forwarding to a plain free variable.
            (_, TypeData::Blocked) => self.bind_type(sup, sub),
            (TypeData::Blocked, _) => self.bind_type(sub, sup),
            (TypeData::Free { .. }, _) => self.bind_type(sub, sup),
            (_, TypeData::Free { .. }) => self.bind_type(sup, sub),

            (TypeData::Primitive(a), TypeData::Primitive(b)) if a == b => Ok(()),

            (TypeData::Function(f), TypeData::Function(g)) => {
                // Parameters are contravariant
                self.unify_pack_inner(g.params, f.params)?;
                self.unify_pack_inner(f.returns, g.returns)
            }

            (TypeData::Table { props: found }, TypeData::Table { props: expected }) => {
                for (name, &expected_ty) in expected {
                    let Some(&found_ty) = found.get(name) else {
                        return Err(UnifyError::MissingProperty {
                            name: *name,
                            ty: sub,
                        }
                        .into());
                    };
                    self.unify_types(found_ty, expected_ty)?;
                }
                Ok(())
            }

            _ => Err(UnifyError::Mismatch {
                found: sub,
                expected: sup,
            }
            .into()),
        }
    }

    fn bind_type(&mut self, var: TypeId, ty: TypeId) -> Result<(), Failure> {
        if self.arena.mentions(Handle::Type(ty), Handle::Type(var)) {
            return Err(UnifyError::OccursCheck { var, ty }.into());
        }
        if let Some(scope) = self.arena.owner(Handle::Type(var)) {
            self.promote(Handle::Type(ty), scope)?;
        }
        self.arena.bind(var, ty)?;
        trace!(%var, %ty, "bound type variable");
        self.changed.push(Handle::Type(var));
        Ok(())
    }

    /// Lift free variables inside `root` so none is owned by a scope deeper
    /// than `scope`.
    fn promote(&mut self, root: Handle, scope: ScopeId) -> Result<(), ArenaError> {
        for var in self.arena.free_vars(root) {
            let Some(owner) = self.arena.owner(var) else {
                continue;
            };
            let target = self.scopes.common_ancestor(owner, scope);
            if target != owner {
                self.arena.set_owner(var, target)?;
                self.changed.push(var);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Packs
    // =========================================================================

    fn unify_pack_inner(&mut self, sub: TypePackId, sup: TypePackId) -> Result<(), Failure> {
        let sub = self.arena.follow_pack(sub);
        let sup = self.arena.follow_pack(sup);
        if sub == sup {
            return Ok(());
        }

        match (self.arena.get_pack(sub), self.arena.get_pack(sup)) {
            (TypePackData::Free { .. }, _) => return self.bind_pack(sub, sup),
            (_, TypePackData::Free { .. }) => return self.bind_pack(sup, sub),
            _ => {}
        }

        let (sub_head, sub_tail) = self.flatten(sub);
        let (sup_head, sup_tail) = self.flatten(sup);
        let shared = sub_head.len().min(sup_head.len());
        for (&found, &expected) in sub_head.iter().zip(sup_head.iter()) {
            self.unify_types(found, expected)?;
        }

        let arity = UnifyError::PackArity {
            expected: sup_head.len(),
            found: sub_head.len(),
        };
        let mismatch = UnifyError::PackMismatch {
            found: sub,
            expected: sup,
        };

        if sub_head.len() > shared {
            // Extra values on the sub side must be absorbed by the super tail.
            let extra = &sub_head[shared..];
            let Some(tail) = sup_tail else {
                return Err(arity.into());
            };
            match self.arena.get_pack(tail).clone() {
                TypePackData::Variadic(elem) => {
                    for &ty in extra {
                        self.unify_types(ty, elem)?;
                    }
                    self.unify_tails(sub_tail, sup_tail, mismatch)
                }
                TypePackData::Free { .. } => {
                    let rest = self.arena.list_pack(extra.iter().copied(), sub_tail);
                    self.bind_pack(tail, rest)
                }
                _ => Err(mismatch.into()),
            }
        } else if sup_head.len() > shared {
            // Values the super side expects must come out of the sub tail.
            let missing = &sup_head[shared..];
            let Some(tail) = sub_tail else {
                return Err(arity.into());
            };
            match self.arena.get_pack(tail).clone() {
                TypePackData::Variadic(elem) => {
                    for &ty in missing {
                        self.unify_types(elem, ty)?;
                    }
                    self.unify_tails(sub_tail, sup_tail, mismatch)
                }
                TypePackData::Free { .. } => {
                    let rest = self.arena.list_pack(missing.iter().copied(), sup_tail);
                    self.bind_pack(tail, rest)
                }
                _ => Err(mismatch.into()),
            }
        } else {
            self.unify_tails(sub_tail, sup_tail, mismatch)
        }
    }

    fn unify_tails(
        &mut self,
        sub: Option<TypePackId>,
        sup: Option<TypePackId>,
        mismatch: UnifyError,
    ) -> Result<(), Failure> {
        match (sub, sup) {
            (None, None) => Ok(()),
            (Some(tail), None) | (None, Some(tail)) => match self.arena.get_pack(tail) {
                TypePackData::Variadic(_) => Ok(()),
                TypePackData::Free { .. } => {
                    let empty = self.arena.list_pack([], None);
                    self.bind_pack(tail, empty)
                }
                _ => Err(mismatch.into()),
            },
            (Some(a), Some(b)) if a == b => Ok(()),
            (Some(a), Some(b)) => match (self.arena.get_pack(a), self.arena.get_pack(b)) {
                (&TypePackData::Variadic(x), &TypePackData::Variadic(y)) => {
                    self.unify_types(x, y)
                }
                (TypePackData::Free { .. }, _) => self.bind_pack(a, b),
                (_, TypePackData::Free { .. }) => self.bind_pack(b, a),
                _ => Err(mismatch.into()),
            },
        }
    }

    /// Split a pack into its concrete prefix and its followed, non-list tail.
    fn flatten(&self, pack: TypePackId) -> (SmallVec<[TypeId; 4]>, Option<TypePackId>) {
        let mut head = SmallVec::new();
        let mut current = Some(self.arena.follow_pack(pack));
        while let Some(pack) = current {
            match self.arena.get_pack(pack) {
                TypePackData::List { head: items, tail } => {
                    head.extend(items.iter().copied());
                    current = tail.map(|tail| self.arena.follow_pack(tail));
                }
                _ => return (head, Some(pack)),
            }
        }
        (head, None)
    }

    fn bind_pack(&mut self, var: TypePackId, pack: TypePackId) -> Result<(), Failure> {
        if self.arena.mentions(Handle::Pack(pack), Handle::Pack(var)) {
            return Err(UnifyError::PackOccursCheck { var, pack }.into());
        }
        if let Some(scope) = self.arena.owner(Handle::Pack(var)) {
            self.promote(Handle::Pack(pack), scope)?;
        }
        self.arena.bind_pack(var, pack)?;
        trace!(%var, %pack, "bound type pack variable");
        self.changed.push(Handle::Pack(var));
        Ok(())
    }
}
