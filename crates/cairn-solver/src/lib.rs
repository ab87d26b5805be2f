//! Constraint solver for the cairn type checker.
//!
//! A [`ConstraintSolver`] consumes a [`ConstraintGraph`] produced by the
//! graph-building pass and binds the free variables of a shared
//! [`TypeArena`](cairn_types::TypeArena) until every constraint is solved
//! or no further progress is possible.

pub mod blocking;
pub mod config;
pub mod constraint;
pub mod error;
pub mod solver;

pub use blocking::{BlockedOn, BlockingRegistry};
pub use config::SolverConfig;
pub use constraint::{Constraint, ConstraintGraph, ConstraintId, ConstraintKind};
pub use error::{InternalError, TypeError, TypeErrorKind};
pub use solver::{ConstraintSolver, solve};
