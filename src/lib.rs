//! Constraint-resolution engine for a static type checker.
//!
//! The pieces live in member crates and are re-exported here:
//!
//! - [`cairn_core`]: symbols, spans and diagnostics
//! - [`cairn_types`]: the type arena, scope tree, unifier and printer
//! - [`cairn_solver`]: the constraint store and the fixpoint engine

pub use cairn_core::{Diagnostic, Severity, Span, Symbol};
pub use cairn_solver::{
    BlockedOn, BlockingRegistry, Constraint, ConstraintGraph, ConstraintId, ConstraintKind,
    ConstraintSolver, InternalError, SolverConfig, TypeError, TypeErrorKind, solve,
};
pub use cairn_types::{
    ArenaError, FunctionType, Handle, Primitive, Quantified, Scope, ScopeId, ScopeTree, TypeArena,
    TypeData, TypeId, TypePackData, TypePackId, TypePrinter, Unification, Unifier, UnifyError,
    dump_scopes, instantiate, print_type, quantifiable, quantify,
};
