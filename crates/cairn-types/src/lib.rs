//! Type representation for the cairn checker.
//!
//! Types and type packs live in a mutable [`TypeArena`] and are addressed
//! by cheap copyable refs. Free variables are owned by scopes of a
//! [`ScopeTree`]; the [`Unifier`] binds them and [`quantify`] turns the
//! ones owned by a closing scope into generics.

pub mod arena;
pub mod printer;
pub mod refs;
pub mod scope;
pub mod subst;
pub mod unify;

pub use arena::{ArenaError, FunctionType, Primitive, TypeArena, TypeData, TypePackData};
pub use printer::{TypePrinter, dump_scopes, print_type};
pub use refs::{Handle, ScopeId, TypeId, TypePackId};
pub use scope::{Scope, ScopeTree};
pub use subst::{Quantified, instantiate, quantifiable, quantify};
pub use unify::{Unification, Unifier, UnifyError};
