//! The fixpoint engine.
//!
//! [`ConstraintSolver::run`] scans the unsolved set in input order and
//! attempts every constraint that is not parked in the blocking registry.
//! A handler either solves its constraint in full or leaves the arena
//! untouched and registers the keys it needs; there is no partial progress.
//! Solving a constraint unblocks its own id and every handle it touched,
//! and the constraints woken that way are retried immediately, before the
//! scan moves on. The loop stops at the first scan that solves nothing.

use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use cairn_core::{Diagnostic, Span};
use cairn_types::{
    ArenaError, Handle, ScopeId, ScopeTree, TypeArena, TypeId, TypePrinter, Unification, Unifier,
    dump_scopes, instantiate, quantifiable, quantify,
};

use crate::blocking::{BlockedOn, BlockingRegistry};
use crate::config::SolverConfig;
use crate::constraint::{Constraint, ConstraintGraph, ConstraintId, ConstraintKind};
use crate::error::{InternalError, TypeError, TypeErrorKind};

enum Dispatch {
    /// Carries every handle whose state the handler changed.
    Solved(Vec<Handle>),
    Pending,
}

/// Solves one [`ConstraintGraph`] against a shared arena.
pub struct ConstraintSolver<'a> {
    arena: &'a mut TypeArena,
    scopes: &'a ScopeTree,
    graph: &'a ConstraintGraph,
    config: SolverConfig,
    unsolved: IndexSet<ConstraintId>,
    registry: BlockingRegistry,
    errors: Vec<TypeError>,
    reported_stuck: IndexSet<ConstraintId>,
    woken: VecDeque<ConstraintId>,
    scans: usize,
}

impl<'a> ConstraintSolver<'a> {
    pub fn new(
        arena: &'a mut TypeArena,
        scopes: &'a ScopeTree,
        graph: &'a ConstraintGraph,
    ) -> Self {
        Self::with_config(arena, scopes, graph, SolverConfig::default())
    }

    pub fn with_config(
        arena: &'a mut TypeArena,
        scopes: &'a ScopeTree,
        graph: &'a ConstraintGraph,
        config: SolverConfig,
    ) -> Self {
        let mut registry = BlockingRegistry::new();
        for (id, constraint) in graph.iter() {
            for &dependency in &constraint.dependencies {
                registry.block(BlockedOn::Constraint(dependency), id);
            }
        }
        Self {
            arena,
            scopes,
            graph,
            config,
            unsolved: graph.ids().collect(),
            registry,
            errors: Vec::new(),
            reported_stuck: IndexSet::new(),
            woken: VecDeque::new(),
            scans: 0,
        }
    }

    /// Drive the unsolved set to empty or to a fixpoint.
    ///
    /// Type errors are collected and never abort the pass. An `Err` means
    /// the engine's own bookkeeping is broken.
    #[tracing::instrument(skip_all)]
    pub fn run(&mut self) -> Result<(), InternalError> {
        let limit = self.config.max_iterations.max(1);
        let mut scans = 0;
        while !self.done() {
            if scans == limit {
                warn!(limit, unsolved = self.unsolved.len(), "iteration limit reached");
                break;
            }
            scans += 1;
            self.scans += 1;
            if !self.scan()? {
                break;
            }
        }
        debug!(
            scans,
            unsolved = self.unsolved.len(),
            errors = self.errors.len(),
            "solver finished"
        );
        if self.config.report_stuck {
            self.report_stuck();
        }
        Ok(())
    }

    /// Attempt `id` right away, then resume whatever it wakes.
    ///
    /// Returns whether `id` is solved. A constraint parked in the registry
    /// is left alone.
    pub fn dispatch(&mut self, id: ConstraintId) -> Result<bool, InternalError> {
        if self.registry.is_blocked(id) {
            return Ok(false);
        }
        let solved = self.attempt(id)?;
        self.drain_woken()?;
        Ok(solved)
    }

    pub fn done(&self) -> bool {
        self.unsolved.is_empty()
    }

    /// Errors in the order they were produced.
    pub fn errors(&self) -> &[TypeError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<TypeError> {
        self.errors
    }

    /// Errors rendered with one shared variable naming.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut printer = TypePrinter::new(self.arena());
        self.errors
            .iter()
            .map(|error| error.to_diagnostic(&mut printer))
            .collect()
    }

    /// Scans performed across every call to [`run`](Self::run).
    pub fn scans(&self) -> usize {
        self.scans
    }

    pub fn unsolved(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.unsolved.iter().copied()
    }

    pub fn is_blocked(&self, id: ConstraintId) -> bool {
        self.registry.is_blocked(id)
    }

    pub fn block_count(&self, id: ConstraintId) -> usize {
        self.registry.block_count(id)
    }

    pub fn waiting_on(&self, id: ConstraintId) -> impl Iterator<Item = BlockedOn> + '_ {
        self.registry.waiting_on(id)
    }

    pub fn arena(&self) -> &TypeArena {
        &*self.arena
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Render the scope tree with the current type of every binding.
    pub fn dump(&self) -> String {
        dump_scopes(self.scopes, self.arena())
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    fn scan(&mut self) -> Result<bool, InternalError> {
        let mut progressed = false;
        let snapshot: Vec<_> = self.unsolved.iter().copied().collect();
        for id in snapshot {
            if !self.unsolved.contains(&id) || self.registry.is_blocked(id) {
                continue;
            }
            progressed |= self.attempt(id)?;
            progressed |= self.drain_woken()?;
        }
        Ok(progressed)
    }

    fn drain_woken(&mut self) -> Result<bool, InternalError> {
        let mut progressed = false;
        while let Some(id) = self.woken.pop_front() {
            if self.unsolved.contains(&id) && !self.registry.is_blocked(id) {
                progressed |= self.attempt(id)?;
            }
        }
        Ok(progressed)
    }

    fn attempt(&mut self, id: ConstraintId) -> Result<bool, InternalError> {
        if !self.unsolved.contains(&id) {
            return Err(InternalError::AlreadySolved { constraint: id });
        }
        let graph = self.graph;
        let constraint = graph.get(id);
        trace!(%id, kind = %constraint.kind, "attempting constraint");

        let operands = operands(&constraint.kind);
        let touched: IndexSet<Handle> = operands
            .iter()
            .flat_map(|&operand| self.arena.free_vars(operand))
            .collect();

        let dispatch = match constraint.kind {
            ConstraintKind::Subtype { sub, sup } => {
                Dispatch::Solved(self.unify(id, constraint.span, |u| u.unify(sub, sup))?)
            }
            ConstraintKind::PackSubtype { sub, sup } => {
                Dispatch::Solved(self.unify(id, constraint.span, |u| u.unify_packs(sub, sup))?)
            }
            ConstraintKind::Generalization { source, target } => {
                self.dispatch_generalization(id, constraint, source, target)?
            }
            ConstraintKind::Instantiation { scheme, target } => {
                self.dispatch_instantiation(id, constraint, scheme, target)?
            }
        };

        match dispatch {
            Dispatch::Pending => {
                if !self.registry.is_blocked(id) {
                    return Err(InternalError::NotBlocked { constraint: id });
                }
                Ok(false)
            }
            Dispatch::Solved(changed) => {
                self.unsolved.shift_remove(&id);
                debug!(%id, "solved constraint");
                self.unblock(BlockedOn::Constraint(id))?;
                for handle in operands.into_iter().chain(touched).chain(changed) {
                    self.unblock(handle.into())?;
                }
                Ok(true)
            }
        }
    }

    fn block(&mut self, key: BlockedOn, id: ConstraintId) {
        if self.registry.block(key, id) {
            trace!(%id, %key, "blocked constraint");
        }
    }

    fn unblock(&mut self, key: BlockedOn) -> Result<(), InternalError> {
        for id in self.registry.unblock(key)? {
            trace!(%id, %key, "woke constraint");
            self.woken.push_back(id);
        }
        Ok(())
    }

    fn report_stuck(&mut self) {
        for &id in &self.unsolved {
            if !self.reported_stuck.insert(id) {
                continue;
            }
            let waiting_on: Vec<_> = self.registry.waiting_on(id).collect();
            debug!(%id, waiting = waiting_on.len(), "constraint is stuck");
            self.errors.push(TypeError {
                span: self.graph.get(id).span,
                constraint: id,
                kind: TypeErrorKind::Stuck {
                    constraint: id,
                    waiting_on,
                },
            });
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    fn unify(
        &mut self,
        id: ConstraintId,
        span: Span,
        run: impl FnOnce(&mut Unifier<'_>) -> Result<(), ArenaError>,
    ) -> Result<Vec<Handle>, InternalError> {
        let mut unifier = Unifier::new(self.arena, self.scopes);
        run(&mut unifier)?;
        let Unification { errors, changed } = unifier.finish();
        for error in errors {
            self.errors.push(TypeError {
                span,
                constraint: id,
                kind: error.into(),
            });
        }
        Ok(changed)
    }

    fn dispatch_generalization(
        &mut self,
        id: ConstraintId,
        constraint: &Constraint,
        source: TypeId,
        target: TypeId,
    ) -> Result<Dispatch, InternalError> {
        let source = self.arena.follow(source);
        if self.arena.is_blocked(source) {
            self.block(source.into(), id);
            return Ok(Dispatch::Pending);
        }

        let candidates = quantifiable(self.arena(), self.scopes, source, constraint.scope);
        let pending = self.pending_mutations(id, constraint.scope, &candidates);
        if !pending.is_empty() {
            for var in pending {
                self.block(var.into(), id);
            }
            return Ok(Dispatch::Pending);
        }

        let quantified = quantify(self.arena, self.scopes, source, constraint.scope)?;
        if !quantified.is_empty() {
            debug!(
                %id,
                generics = quantified.generics.len(),
                generic_packs = quantified.generic_packs.len(),
                "generalized"
            );
        }
        let mut changed: Vec<Handle> = quantified.handles().collect();
        changed.extend(self.unify(id, constraint.span, |u| u.unify(source, target))?);
        Ok(Dispatch::Solved(changed))
    }

    /// Candidates that another unsolved constraint may still bind.
    ///
    /// Generalizations are only counted when they close a strictly deeper
    /// scope; an enclosing or sibling generalization waits on this one
    /// instead.
    fn pending_mutations(
        &self,
        id: ConstraintId,
        scope: ScopeId,
        candidates: &[Handle],
    ) -> Vec<Handle> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let mut mentioned = IndexSet::new();
        for &other in &self.unsolved {
            if other == id {
                continue;
            }
            let constraint = self.graph.get(other);
            if matches!(constraint.kind, ConstraintKind::Generalization { .. })
                && (constraint.scope == scope
                    || !self.scopes.is_descendant_of(constraint.scope, scope))
            {
                continue;
            }
            for operand in operands(&constraint.kind) {
                let vars = self.arena.free_vars(operand);
                mentioned.extend(candidates.iter().filter(|var| vars.contains(*var)).copied());
            }
        }
        mentioned.into_iter().collect()
    }

    fn dispatch_instantiation(
        &mut self,
        id: ConstraintId,
        constraint: &Constraint,
        scheme: TypeId,
        target: TypeId,
    ) -> Result<Dispatch, InternalError> {
        let scheme = self.arena.follow(scheme);
        if self.arena.is_blocked(scheme) {
            self.block(scheme.into(), id);
            return Ok(Dispatch::Pending);
        }
        // A placeholder can be forwarded to another variable before its
        // generalization runs; the scheme is only complete once that ran.
        if let Some(generalization) = self.pending_generalization(scheme) {
            self.block(BlockedOn::Constraint(generalization), id);
            return Ok(Dispatch::Pending);
        }

        let instance = instantiate(self.arena, scheme, constraint.scope);
        trace!(%id, %scheme, %instance, "instantiated scheme");
        let changed = self.unify(id, constraint.span, |u| u.unify(instance, target))?;
        Ok(Dispatch::Solved(changed))
    }

    /// An unsolved generalization whose target currently follows to `scheme`.
    fn pending_generalization(&self, scheme: TypeId) -> Option<ConstraintId> {
        self.unsolved.iter().copied().find(|&other| match self.graph.get(other).kind {
            ConstraintKind::Generalization { target, .. } => self.arena.follow(target) == scheme,
            _ => false,
        })
    }
}

fn operands(kind: &ConstraintKind) -> Vec<Handle> {
    match *kind {
        ConstraintKind::Subtype { sub, sup } => vec![sub.into(), sup.into()],
        ConstraintKind::PackSubtype { sub, sup } => vec![sub.into(), sup.into()],
        ConstraintKind::Generalization { source, target } => vec![source.into(), target.into()],
        ConstraintKind::Instantiation { scheme, target } => vec![scheme.into(), target.into()],
    }
}

/// Solve `graph` with the default configuration and return its errors.
pub fn solve(
    arena: &mut TypeArena,
    scopes: &ScopeTree,
    graph: &ConstraintGraph,
) -> Result<Vec<TypeError>, InternalError> {
    let mut solver = ConstraintSolver::new(arena, scopes, graph);
    solver.run()?;
    Ok(solver.into_errors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::{TypePackData, print_type};

    #[test]
    fn subtype_binds_free_variable() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(scopes.root());
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        graph.subtype(scopes.root(), a, number);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        solver.run().unwrap();

        assert!(solver.done());
        assert!(solver.errors().is_empty());
        assert_eq!(arena.follow(a), number);
    }

    #[test]
    fn dependency_parks_constraint_until_solved() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(scopes.root());
        let b = arena.fresh_type(scopes.root());
        let (number, string) = (arena.number_type(), arena.string_type());
        let mut graph = ConstraintGraph::new();
        let later = graph.subtype(scopes.root(), a, string);
        let first = graph.subtype(scopes.root(), b, number);
        graph.add_dependency(later, first);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        assert!(solver.is_blocked(later));
        assert_eq!(
            solver.waiting_on(later).collect::<Vec<_>>(),
            vec![BlockedOn::Constraint(first)]
        );
        assert!(!solver.dispatch(later).unwrap());

        assert!(solver.dispatch(first).unwrap());
        assert!(solver.done());
    }

    #[test]
    fn generalization_waits_for_pending_subtype() {
        let mut scopes = ScopeTree::new();
        let body = scopes.push_child(scopes.root());
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(body);
        let func = arena.function_type([a], [a]);
        let scheme = arena.blocked_type();
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        let generalize = graph.generalization(body, func, scheme);
        graph.subtype(body, a, number);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        assert!(!solver.dispatch(generalize).unwrap());
        assert_eq!(
            solver.waiting_on(generalize).collect::<Vec<_>>(),
            vec![BlockedOn::Type(a)]
        );
        solver.run().unwrap();

        assert!(solver.done());
        assert!(solver.errors().is_empty());
        assert_eq!(print_type(&arena, scheme), "(number) -> number");
    }

    #[test]
    fn instantiation_waits_for_scheme() {
        let mut scopes = ScopeTree::new();
        let root = scopes.root();
        let body = scopes.push_child(root);
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(body);
        let func = arena.function_type([a], [a]);
        let scheme = arena.blocked_type();
        let use_site = arena.fresh_type(root);
        let mut graph = ConstraintGraph::new();
        let inst = graph.instantiation(root, scheme, use_site);
        graph.generalization(body, func, scheme);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        assert!(!solver.dispatch(inst).unwrap());
        assert_eq!(
            solver.waiting_on(inst).collect::<Vec<_>>(),
            vec![BlockedOn::Type(scheme)]
        );
        solver.run().unwrap();

        assert!(solver.done());
        assert_eq!(print_type(&arena, scheme), "<a>(a) -> a");
        assert_eq!(print_type(&arena, use_site), "('a) -> 'a");
    }

    #[test]
    fn pack_subtype_binds_free_tail() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let (number, string) = (arena.number_type(), arena.string_type());
        let tail = arena.fresh_pack(scopes.root());
        let sub = arena.list_pack([number, string], None);
        let sup = arena.list_pack([number], Some(tail));
        let mut graph = ConstraintGraph::new();
        graph.pack_subtype(scopes.root(), sub, sup);

        let errors = solve(&mut arena, &scopes, &graph).unwrap();

        assert!(errors.is_empty());
        let TypePackData::List { head, tail: None } = arena.get_pack(arena.follow_pack(tail)) else {
            panic!("expected closed list pack");
        };
        assert_eq!(head.as_slice(), &[string]);
    }

    #[test]
    fn dispatching_solved_constraint_is_fatal() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        let c = graph.subtype(scopes.root(), number, number);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        solver.run().unwrap();

        assert_eq!(
            solver.dispatch(c),
            Err(InternalError::AlreadySolved { constraint: c })
        );
    }

    #[test]
    fn stuck_reporting_can_be_disabled() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        let c = graph.subtype(scopes.root(), number, number);
        graph.add_dependency(c, c);

        let config = SolverConfig {
            report_stuck: false,
            ..SolverConfig::default()
        };
        let mut solver = ConstraintSolver::with_config(&mut arena, &scopes, &graph, config);
        solver.run().unwrap();

        assert!(!solver.done());
        assert!(solver.errors().is_empty());
        assert_eq!(solver.unsolved().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn iteration_cap_stops_early_and_reports_stuck() {
        fn setup(scopes: &ScopeTree) -> (TypeArena, ConstraintGraph, ConstraintId) {
            let mut arena = TypeArena::new();
            let a = arena.fresh_type(scopes.root());
            let number = arena.number_type();
            let mut graph = ConstraintGraph::new();
            graph.subtype(scopes.root(), a, number);
            let stuck = graph.subtype(scopes.root(), number, number);
            graph.add_dependency(stuck, stuck);
            (arena, graph, stuck)
        }
        let scopes = ScopeTree::new();

        let (mut arena, graph, stuck) = setup(&scopes);
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        let mut capped = ConstraintSolver::with_config(&mut arena, &scopes, &graph, config);
        capped.run().unwrap();

        assert_eq!(capped.scans(), 1);
        assert_eq!(capped.unsolved().collect::<Vec<_>>(), vec![stuck]);
        assert_eq!(capped.errors().len(), 1);
        assert!(capped.errors()[0].is_stuck());
        assert_eq!(capped.errors()[0].constraint, stuck);

        let (mut arena, graph, _) = setup(&scopes);
        let mut uncapped = ConstraintSolver::new(&mut arena, &scopes, &graph);
        uncapped.run().unwrap();

        assert_eq!(uncapped.scans(), 2);
        assert_eq!(uncapped.errors().len(), 1);
    }

    #[test]
    fn zero_iteration_cap_still_scans_once() {
        let scopes = ScopeTree::new();
        let mut arena = TypeArena::new();
        let a = arena.fresh_type(scopes.root());
        let number = arena.number_type();
        let mut graph = ConstraintGraph::new();
        graph.subtype(scopes.root(), a, number);

        let config = SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        };
        let mut solver = ConstraintSolver::with_config(&mut arena, &scopes, &graph, config);
        solver.run().unwrap();

        assert_eq!(solver.scans(), 1);
        assert!(solver.done());
        assert_eq!(arena.follow(a), number);
    }

    #[test]
    fn instantiation_waits_for_generalization_of_forwarded_scheme() {
        let mut scopes = ScopeTree::new();
        let root = scopes.root();
        let body = scopes.push_child(root);
        let mut arena = TypeArena::new();
        let p = arena.fresh_type(body);
        let func = arena.function_type([p], [p]);
        let scheme = arena.blocked_type();
        let alias = arena.fresh_type(root);
        let use_site = arena.fresh_type(root);
        let mut graph = ConstraintGraph::new();
        let forward = graph.subtype(root, scheme, alias);
        let inst = graph.instantiation(root, alias, use_site);
        let generalize = graph.generalization(body, func, scheme);

        let mut solver = ConstraintSolver::new(&mut arena, &scopes, &graph);
        assert!(solver.dispatch(forward).unwrap());
        assert!(!solver.dispatch(inst).unwrap());
        assert_eq!(
            solver.waiting_on(inst).collect::<Vec<_>>(),
            vec![BlockedOn::Constraint(generalize)]
        );
        solver.run().unwrap();

        assert!(solver.done());
        assert!(solver.errors().is_empty());
        assert_eq!(print_type(&arena, alias), "<a>(a) -> a");
        assert_eq!(print_type(&arena, use_site), "('a) -> 'a");
    }
}
