//! Solver errors.
//!
//! [`TypeError`]s describe problems in the checked program and are
//! collected as data. [`InternalError`]s are engine bugs and abort the pass.

use derive_more::{Display, Error, From};

use cairn_core::{Diagnostic, Span};
use cairn_types::{ArenaError, Handle, TypePrinter, UnifyError};

use crate::blocking::BlockedOn;
use crate::constraint::ConstraintId;

/// A user-facing type error, attributed to the constraint that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{constraint}: {kind}")]
pub struct TypeError {
    pub span: Span,
    pub constraint: ConstraintId,
    pub kind: TypeErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Display, From)]
pub enum TypeErrorKind {
    #[display("{_0}")]
    Unify(UnifyError),
    /// Still unsolved when the solver reached its fixpoint.
    #[display("{constraint} could not be solved")]
    #[from(ignore)]
    Stuck {
        constraint: ConstraintId,
        waiting_on: Vec<BlockedOn>,
    },
}

impl TypeError {
    pub fn is_stuck(&self) -> bool {
        matches!(self.kind, TypeErrorKind::Stuck { .. })
    }

    /// Render with types printed through `printer`.
    pub fn to_diagnostic(&self, printer: &mut TypePrinter<'_>) -> Diagnostic {
        let message = match &self.kind {
            TypeErrorKind::Unify(error) => match *error {
                UnifyError::Mismatch { found, expected } => format!(
                    "Type '{}' could not be converted into '{}'",
                    printer.type_to_string(found),
                    printer.type_to_string(expected)
                ),
                UnifyError::PackMismatch { found, expected } => format!(
                    "Type pack '{}' could not be converted into '{}'",
                    printer.pack_to_string(found),
                    printer.pack_to_string(expected)
                ),
                UnifyError::OccursCheck { var, ty } => format!(
                    "Type '{}' occurs within '{}' and would be infinite",
                    printer.type_to_string(var),
                    printer.type_to_string(ty)
                ),
                UnifyError::PackOccursCheck { var, pack } => format!(
                    "Type pack '{}' occurs within '{}' and would be infinite",
                    printer.pack_to_string(var),
                    printer.pack_to_string(pack)
                ),
                UnifyError::PackArity { expected, found } => {
                    format!("Expected {expected} values, but {found} are specified")
                }
                UnifyError::MissingProperty { name, ty } => format!(
                    "Table type '{}' is missing property '{name}'",
                    printer.type_to_string(ty)
                ),
            },
            TypeErrorKind::Stuck {
                constraint,
                waiting_on,
            } => {
                if waiting_on.is_empty() {
                    format!("Constraint {constraint} could not be solved")
                } else {
                    let keys: Vec<_> = waiting_on
                        .iter()
                        .map(|key| match *key {
                            BlockedOn::Type(ty) => printer.handle_to_string(Handle::Type(ty)),
                            BlockedOn::Pack(pack) => printer.handle_to_string(Handle::Pack(pack)),
                            BlockedOn::Constraint(other) => format!("constraint {other}"),
                        })
                        .collect();
                    format!(
                        "Constraint {constraint} could not be solved; waiting on {}",
                        keys.join(", ")
                    )
                }
            }
        };
        Diagnostic::error(message, self.span)
    }
}

/// Engine invariant violation. Halts the pass.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error, From)]
pub enum InternalError {
    #[display("blocking registry out of sync: {constraint} is not registered against {key}")]
    #[from(ignore)]
    RegistryDesync {
        key: BlockedOn,
        constraint: ConstraintId,
    },
    #[display("{constraint} was dispatched after it was solved")]
    #[from(ignore)]
    AlreadySolved { constraint: ConstraintId },
    #[display("{constraint} stayed pending without registering a block")]
    #[from(ignore)]
    NotBlocked { constraint: ConstraintId },
    #[display("arena invariant violated: {_0}")]
    Arena(ArenaError),
}
