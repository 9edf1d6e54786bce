//! Solver capability contract
//!
//! Every backend binds a problem, solves it, and exposes the solution as
//! ordered sequences. Backends are substitutable at the call site: the
//! constrained and unconstrained variants satisfy the identical contract and
//! differ only in which problem shapes they accept.

use std::sync::Arc;

use slq_core::{Matrix, Vector};

use crate::error::SolverError;
use crate::lqoc::LqocProblem;

/// Contract shared by all LQ subproblem backends.
pub trait LqocSolver {
    /// Bind a problem instance for the next [`solve`](LqocSolver::solve).
    fn set_problem(&mut self, problem: Arc<LqocProblem>);

    /// Solve the bound problem. A failing solve leaves any previously
    /// computed solution untouched.
    fn solve(&mut self) -> Result<(), SolverError>;

    /// State sequence of the last successful solve, length N+1.
    fn solution_state(&self) -> &[Vector];

    /// Control sequence of the last successful solve, length N.
    fn solution_control(&self) -> &[Vector];

    /// Feedback-gain sequence of the last successful solve, length N.
    fn feedback(&self) -> &[Matrix];
}
