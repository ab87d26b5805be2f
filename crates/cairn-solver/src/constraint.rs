//! Constraint store.
//!
//! The graph-building pass pushes constraints into a [`ConstraintGraph`]
//! and hands it to the solver by shared reference. The solver only ever
//! holds [`ConstraintId`]s into it.

use std::fmt;

use cranelift_entity::{PrimaryMap, entity_impl};

use cairn_core::Span;
use cairn_types::{ScopeId, TypeId, TypePackId};

/// Reference to a constraint in a [`ConstraintGraph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u32);
entity_impl!(ConstraintId, "c");

/// The relation a constraint establishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `sub <: sup`
    Subtype { sub: TypeId, sup: TypeId },
    /// `sub <: sup` over type packs.
    PackSubtype { sub: TypePackId, sup: TypePackId },
    /// Generalize `source` at the close of the constraint's scope and
    /// publish the resulting scheme through `target`.
    Generalization { source: TypeId, target: TypeId },
    /// Bind `target` to a fresh instance of the scheme `scheme`.
    Instantiation { scheme: TypeId, target: TypeId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    /// Scope the constraint was generated in.
    pub scope: ScopeId,
    pub span: Span,
    /// Constraints that must be solved before this one is attempted.
    pub dependencies: Vec<ConstraintId>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, scope: ScopeId) -> Self {
        Self {
            kind,
            scope,
            span: Span::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Subtype { sub, sup } => write!(f, "{sub} <: {sup}"),
            ConstraintKind::PackSubtype { sub, sup } => write!(f, "{sub} <: {sup}"),
            ConstraintKind::Generalization { source, target } => {
                write!(f, "{target} ~ gen {source}")
            }
            ConstraintKind::Instantiation { scheme, target } => {
                write!(f, "{target} ~ inst {scheme}")
            }
        }
    }
}

/// Flat, append-only collection of constraints for one checking pass.
#[derive(Clone, Debug, Default)]
pub struct ConstraintGraph {
    constraints: PrimaryMap<ConstraintId, Constraint>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) -> ConstraintId {
        self.constraints.push(constraint)
    }

    pub fn subtype(&mut self, scope: ScopeId, sub: TypeId, sup: TypeId) -> ConstraintId {
        self.push(Constraint::new(ConstraintKind::Subtype { sub, sup }, scope))
    }

    pub fn pack_subtype(
        &mut self,
        scope: ScopeId,
        sub: TypePackId,
        sup: TypePackId,
    ) -> ConstraintId {
        self.push(Constraint::new(ConstraintKind::PackSubtype { sub, sup }, scope))
    }

    pub fn generalization(
        &mut self,
        scope: ScopeId,
        source: TypeId,
        target: TypeId,
    ) -> ConstraintId {
        self.push(Constraint::new(
            ConstraintKind::Generalization { source, target },
            scope,
        ))
    }

    pub fn instantiation(
        &mut self,
        scope: ScopeId,
        scheme: TypeId,
        target: TypeId,
    ) -> ConstraintId {
        self.push(Constraint::new(
            ConstraintKind::Instantiation { scheme, target },
            scope,
        ))
    }

    /// Require `dependency` to be solved before `constraint` is attempted.
    pub fn add_dependency(&mut self, constraint: ConstraintId, dependency: ConstraintId) {
        let deps = &mut self.constraints[constraint].dependencies;
        if !deps.contains(&dependency) {
            deps.push(dependency);
        }
    }

    pub fn get(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id]
    }

    /// Constraint ids in input order.
    pub fn ids(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.constraints.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::{ScopeTree, TypeArena};

    #[test]
    fn ids_follow_input_order() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(scopes.root());
        let mut graph = ConstraintGraph::new();
        let first = graph.subtype(scopes.root(), a, arena.number_type());
        let second = graph.instantiation(scopes.root(), a, a);

        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(graph.len(), 2);
        assert_eq!(first.to_string(), "c0");
    }

    #[test]
    fn dependencies_are_deduplicated() {
        let scopes = ScopeTree::new();
        let arena = TypeArena::new();
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        let a = graph.subtype(scopes.root(), number, number);
        let b = graph.subtype(scopes.root(), number, number);
        graph.add_dependency(b, a);
        graph.add_dependency(b, a);

        assert_eq!(graph.get(b).dependencies, vec![a]);
        assert!(graph.get(a).dependencies.is_empty());
    }

    #[test]
    fn kinds_display_operands() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let scheme = arena.fresh_type(scopes.root());
        let target = arena.blocked_type();
        let kind = ConstraintKind::Generalization {
            source: scheme,
            target,
        };

        assert_eq!(kind.to_string(), format!("{target} ~ gen {scheme}"));
    }
}
