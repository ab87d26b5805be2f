//! Scheduling properties of the fixpoint engine.

mod common;

use cairn::{BlockedOn, ConstraintSolver, SolverConfig};
use common::Fixture;

#[test]
fn rerunning_solved_graph_changes_nothing() {
    let mut fx = Fixture::new();
    let a = fx.arena.fresh_type(fx.root());
    let (number, string) = (fx.arena.number_type(), fx.arena.string_type());
    fx.graph.subtype(fx.root(), a, number);
    fx.graph.subtype(fx.root(), a, string);

    let mut solver = ConstraintSolver::new(&mut fx.arena, &fx.scopes, &fx.graph);
    solver.run().unwrap();
    let errors = solver.errors().to_vec();
    let types = solver.arena().type_count();

    solver.run().unwrap();

    assert!(solver.done());
    assert_eq!(solver.errors(), errors.as_slice());
    assert_eq!(solver.arena().type_count(), types);
}

#[test]
fn rerunning_stuck_graph_reports_once() {
    let mut fx = Fixture::new();
    let number = fx.arena.number_type();
    let c = fx.graph.subtype(fx.root(), number, number);
    fx.graph.add_dependency(c, c);

    let mut solver = ConstraintSolver::new(&mut fx.arena, &fx.scopes, &fx.graph);
    solver.run().unwrap();
    solver.run().unwrap();

    assert_eq!(solver.errors().len(), 1);
    assert!(solver.errors()[0].is_stuck());
}

#[test]
fn bindings_are_monotonic() {
    let mut fx = Fixture::new();
    let root = fx.root();
    let a = fx.arena.fresh_type(root);
    let b = fx.arena.fresh_type(root);
    let (number, string, boolean) = (
        fx.arena.number_type(),
        fx.arena.string_type(),
        fx.arena.boolean_type(),
    );
    fx.graph.subtype(root, a, number);
    fx.graph.subtype(root, a, b);
    fx.graph.subtype(root, b, string);
    fx.graph.subtype(root, boolean, a);

    let errors = fx.solve();

    assert_eq!(errors.len(), 2);
    assert_eq!(fx.arena.follow(a), number);
    assert_eq!(fx.arena.follow(b), number);
}

#[test]
fn dependency_chain_in_reverse_order_completes() {
    let mut fx = Fixture::new();
    let root = fx.root();
    let number = fx.arena.number_type();
    let vars: Vec<_> = (0..5).map(|_| fx.arena.fresh_type(root)).collect();
    // Each constraint depends on the one listed after it.
    let ids: Vec<_> = vars
        .iter()
        .map(|&var| fx.graph.subtype(root, var, number))
        .collect();
    for pair in ids.windows(2) {
        fx.graph.add_dependency(pair[0], pair[1]);
    }

    let mut solver = ConstraintSolver::new(&mut fx.arena, &fx.scopes, &fx.graph);
    solver.run().unwrap();

    assert!(solver.done());
    assert!(solver.errors().is_empty());
}

#[test]
fn unrelated_progress_does_not_wake_blocked_constraint() {
    let mut fx = Fixture::new();
    let root = fx.root();
    let a = fx.arena.fresh_type(root);
    let b = fx.arena.fresh_type(root);
    let number = fx.arena.number_type();
    let unrelated = fx.graph.subtype(root, a, number);
    let stuck = fx.graph.subtype(root, b, number);
    fx.graph.add_dependency(stuck, stuck);
    let waiter = fx.graph.subtype(root, number, number);
    fx.graph.add_dependency(waiter, stuck);

    let config = SolverConfig {
        report_stuck: false,
        ..SolverConfig::default()
    };
    let mut solver = ConstraintSolver::with_config(&mut fx.arena, &fx.scopes, &fx.graph, config);
    solver.run().unwrap();

    assert!(!solver.unsolved().any(|c| c == unrelated));
    assert!(solver.is_blocked(waiter));
    assert_eq!(solver.block_count(waiter), 1);
    assert_eq!(
        solver.waiting_on(waiter).collect::<Vec<_>>(),
        vec![BlockedOn::Constraint(stuck)]
    );
    assert!(fx.arena.is_free(b));
}

#[test]
fn solving_is_deterministic() {
    fn diagnostics() -> String {
        let mut fx = Fixture::new();
        let root = fx.root();
        let vars: Vec<_> = (0..4).map(|_| fx.arena.fresh_type(root)).collect();
        let (number, string) = (fx.arena.number_type(), fx.arena.string_type());
        for (i, &var) in vars.iter().enumerate() {
            let ty = if i % 2 == 0 { number } else { string };
            fx.graph.subtype(root, var, ty);
            fx.graph.subtype(root, vars[0], var);
        }
        fx.solve_to_diagnostics()
    }

    let first = diagnostics();
    assert!(!first.is_empty());
    assert_eq!(first, diagnostics());
}
