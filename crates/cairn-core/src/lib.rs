//! Shared primitives for the cairn type checker.
pub mod diagnostic;
pub mod location;
pub mod symbol;

pub use diagnostic::{Diagnostic, Severity};
pub use location::Span;
pub use symbol::Symbol;
