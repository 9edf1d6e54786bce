//! Unconstrained Riccati-recursion backend
//!
//! Standard discrete-time LQ dynamic programming: a backward sweep builds
//! the value-function quadratic `½ xᵀS x + sᵀx` stage by stage together with
//! the feedback gains, then a forward sweep rolls the closed loop out from
//! `x0`. Valid only for unconstrained problems without trailing-control
//! coupling; both shapes are rejected up front with a [`CapabilityError`]
//! instead of being silently ignored.

use std::sync::Arc;

use slq_core::{Matrix, Vector};

use crate::error::{CapabilityError, NumericalError, SolverError};
use crate::lqoc::LqocProblem;
use crate::solver::LqocSolver;

/// Backward/forward Riccati sweep over a problem.
///
/// Returns `(states, controls, gains)` of lengths N+1, N, N.
pub(crate) fn riccati_sweep(
    p: &LqocProblem,
) -> Result<(Vec<Vector>, Vec<Vector>, Vec<Matrix>), SolverError> {
    let n = p.num_stages();
    let nx = p.state_dim();
    let nu = p.control_dim();

    // Backward sweep
    let mut s_mat = p.terminal.q.clone();
    let mut s_vec = p.terminal.qv.clone();
    let mut gains = vec![Matrix::zeros(nu, nx); n];
    let mut feedforward = vec![Vector::zeros(nu); n];

    for i in (0..n).rev() {
        let stage = &p.stages[i];
        let h = &stage.r + stage.b.transpose() * &s_mat * &stage.b;
        let g_mat = stage.b.transpose() * &s_mat * &stage.a;
        let g_vec = &stage.rv + stage.b.transpose() * &s_vec;

        if h.amax() == 0.0 && g_mat.amax() == 0.0 && g_vec.amax() == 0.0 {
            // All-zero-cost stage: any control is optimal, take zero.
            s_mat = &stage.q + stage.a.transpose() * &s_mat * &stage.a;
            s_vec = &stage.qv + stage.a.transpose() * &s_vec;
            s_mat = (&s_mat + s_mat.transpose()) * 0.5;
            continue;
        }

        let chol = h
            .clone()
            .cholesky()
            .ok_or(NumericalError::NotPositiveDefinite { stage: i })?;
        let k = -chol.solve(&g_mat);
        let l = -chol.solve(&g_vec);

        s_mat = &stage.q + stage.a.transpose() * &s_mat * &stage.a + g_mat.transpose() * &k;
        s_vec = &stage.qv + stage.a.transpose() * &s_vec + g_mat.transpose() * &l;
        s_mat = (&s_mat + s_mat.transpose()) * 0.5;

        gains[i] = k;
        feedforward[i] = l;
    }

    // Forward sweep
    let mut states = Vec::with_capacity(n + 1);
    let mut controls = Vec::with_capacity(n);
    states.push(p.x0.clone());
    for i in 0..n {
        let stage = &p.stages[i];
        let u = &gains[i] * &states[i] + &feedforward[i];
        let x_next = &stage.a * &states[i] + &stage.b * &u;
        controls.push(u);
        states.push(x_next);
    }

    Ok((states, controls, gains))
}

/// The unconstrained backend.
#[derive(Default)]
pub struct RiccatiSolver {
    problem: Option<Arc<LqocProblem>>,
    states: Vec<Vector>,
    controls: Vec<Vector>,
    gains: Vec<Matrix>,
}

impl RiccatiSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LqocSolver for RiccatiSolver {
    fn set_problem(&mut self, problem: Arc<LqocProblem>) {
        self.problem = Some(problem);
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        let problem = self.problem.as_ref().ok_or(SolverError::NoProblem)?;

        if problem.is_constrained() {
            return Err(CapabilityError {
                backend: "riccati",
                shape: "box-constrained problems",
            }
            .into());
        }
        if problem.stages.iter().any(|s| s.b_next.is_some()) {
            return Err(CapabilityError {
                backend: "riccati",
                shape: "trailing-control coupling",
            }
            .into());
        }

        let (states, controls, gains) = riccati_sweep(problem)?;
        self.states = states;
        self.controls = controls;
        self.gains = gains;
        Ok(())
    }

    fn solution_state(&self) -> &[Vector] {
        &self.states
    }

    fn solution_control(&self) -> &[Vector] {
        &self.controls
    }

    fn feedback(&self) -> &[Matrix] {
        &self.gains
    }
}
