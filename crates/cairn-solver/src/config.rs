use serde::Deserialize;

/// Configuration for [`ConstraintSolver`](crate::ConstraintSolver).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum full scans over the unsolved set before giving up. Default: 1000.
    pub max_iterations: usize,
    /// Whether constraints left unsolved at the fixpoint are reported as
    /// type errors. Default: true.
    pub report_stuck: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            report_stuck: true,
        }
    }
}
