//! Shared fixture for solver integration tests.

use cairn::{ConstraintGraph, ConstraintSolver, ScopeId, ScopeTree, TypeArena, TypeError};

/// Everything one checking pass owns.
pub struct Fixture {
    pub arena: TypeArena,
    pub scopes: ScopeTree,
    pub graph: ConstraintGraph,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            arena: TypeArena::new(),
            scopes: ScopeTree::new(),
            graph: ConstraintGraph::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        self.scopes.root()
    }

    /// Run the solver to its fixpoint and return the collected errors.
    pub fn solve(&mut self) -> Vec<TypeError> {
        let mut solver = ConstraintSolver::new(&mut self.arena, &self.scopes, &self.graph);
        solver.run().expect("solver bookkeeping is consistent");
        solver.into_errors()
    }

    /// Run the solver and render its errors one per line.
    pub fn solve_to_diagnostics(&mut self) -> String {
        let mut solver = ConstraintSolver::new(&mut self.arena, &self.scopes, &self.graph);
        solver.run().expect("solver bookkeeping is consistent");
        solver
            .diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
