//! Linear-quadratic optimal control subproblem
//!
//! Time-indexed container of linearized dynamics, quadratic cost blocks, and
//! optional box constraints, assembled once per outer iteration either from
//! the shots' cached sensitivities or analytically for a time-invariant test
//! problem. Solvers consume it read-only through [`crate::solver::LqocSolver`].

use slq_core::cost::CostFunction;
use slq_core::{Matrix, Vector};

use crate::decision::DecisionVector;
use crate::error::{ConfigurationError, ConstraintError};
use crate::shot::ShotIntegrator;

/// One stage of the LQ subproblem: `x_{i+1} = A x_i + B u_i (+ B' u_{i+1})`
/// with cost `½ xᵀQx + qᵀx + ½ uᵀRu + rᵀu`.
#[derive(Debug, Clone)]
pub struct LqocStage {
    /// State-transition matrix
    pub a: Matrix,
    /// Control-influence matrix of the stage's own control
    pub b: Matrix,
    /// Control-influence of the next stage's control; present only when the
    /// control parameterization couples adjacent knots (piecewise-linear)
    pub b_next: Option<Matrix>,
    /// State cost Hessian
    pub q: Matrix,
    /// State cost gradient
    pub qv: Vector,
    /// Control cost Hessian
    pub r: Matrix,
    /// Control cost gradient
    pub rv: Vector,
    /// Scalar cost accumulated over the stage, for merit bookkeeping
    pub cost_offset: f64,
}

impl LqocStage {
    fn zeros(nx: usize, nu: usize) -> Self {
        Self {
            a: Matrix::zeros(nx, nx),
            b: Matrix::zeros(nx, nu),
            b_next: None,
            q: Matrix::zeros(nx, nx),
            qv: Vector::zeros(nx),
            r: Matrix::zeros(nu, nu),
            rv: Vector::zeros(nu),
            cost_offset: 0.0,
        }
    }
}

/// Terminal value-function seed: `½ xᵀQx + qᵀx` at the final node.
#[derive(Debug, Clone)]
pub struct TerminalStage {
    pub q: Matrix,
    pub qv: Vector,
}

/// Assembled LQ subproblem over N stages plus the terminal node.
#[derive(Debug, Clone)]
pub struct LqocProblem {
    pub x0: Vector,
    pub stages: Vec<LqocStage>,
    pub terminal: TerminalStage,
    state_bounds: Option<(Vector, Vector)>,
    control_bounds: Option<(Vector, Vector)>,
}

impl LqocProblem {
    /// Zero-initialized problem with `num_stages` stages.
    pub fn new(num_stages: usize, state_dim: usize, control_dim: usize) -> Self {
        Self {
            x0: Vector::zeros(state_dim),
            stages: vec![LqocStage::zeros(state_dim, control_dim); num_stages],
            terminal: TerminalStage {
                q: Matrix::zeros(state_dim, state_dim),
                qv: Vector::zeros(state_dim),
            },
            state_bounds: None,
            control_bounds: None,
        }
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn state_dim(&self) -> usize {
        self.x0.len()
    }

    pub fn control_dim(&self) -> usize {
        self.stages.first().map_or(0, |s| s.rv.len())
    }

    /// Clear all stage data and constraint flags, keeping the stage count.
    /// Required before reassembly when the constraint configuration changes
    /// between runs on the same object.
    pub fn set_zero(&mut self) {
        self.x0.fill(0.0);
        for stage in &mut self.stages {
            stage.a.fill(0.0);
            stage.b.fill(0.0);
            stage.b_next = None;
            stage.q.fill(0.0);
            stage.qv.fill(0.0);
            stage.r.fill(0.0);
            stage.rv.fill(0.0);
            stage.cost_offset = 0.0;
        }
        self.terminal.q.fill(0.0);
        self.terminal.qv.fill(0.0);
        self.state_bounds = None;
        self.control_bounds = None;
    }

    fn validate_bounds(lower: &Vector, upper: &Vector) -> Result<(), ConstraintError> {
        for i in 0..lower.len() {
            if lower[i] > upper[i] {
                return Err(ConstraintError {
                    component: i,
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }
        Ok(())
    }

    /// Install per-stage box bounds on the state. On a malformed pair the
    /// problem keeps its previous constraint state.
    pub fn set_state_box_constraints(
        &mut self,
        lower: Vector,
        upper: Vector,
    ) -> Result<(), ConstraintError> {
        Self::validate_bounds(&lower, &upper)?;
        self.state_bounds = Some((lower, upper));
        Ok(())
    }

    /// Install per-stage box bounds on the control. On a malformed pair the
    /// problem keeps its previous constraint state.
    pub fn set_control_box_constraints(
        &mut self,
        lower: Vector,
        upper: Vector,
    ) -> Result<(), ConstraintError> {
        Self::validate_bounds(&lower, &upper)?;
        self.control_bounds = Some((lower, upper));
        Ok(())
    }

    pub fn is_state_box_constrained(&self) -> bool {
        self.state_bounds.is_some()
    }

    pub fn is_control_box_constrained(&self) -> bool {
        self.control_bounds.is_some()
    }

    /// Whether any box constraint is active. Both kinds are independent and
    /// may be active at once.
    pub fn is_constrained(&self) -> bool {
        self.is_state_box_constrained() || self.is_control_box_constrained()
    }

    pub fn state_bounds(&self) -> Option<(&Vector, &Vector)> {
        self.state_bounds.as_ref().map(|(l, u)| (l, u))
    }

    pub fn control_bounds(&self) -> Option<(&Vector, &Vector)> {
        self.control_bounds.as_ref().map(|(l, u)| (l, u))
    }

    /// Fill the problem analytically from a time-invariant discrete-time
    /// linear system and quadratic cost, linearized around `(x_nom, u_nom)`
    /// in absolute coordinates with initial state `x0`.
    pub fn set_from_time_invariant_problem(
        &mut self,
        x0: Vector,
        x_nom: &Vector,
        u_nom: &Vector,
        a: &Matrix,
        b: &Matrix,
        cost: &dyn CostFunction,
        dt: f64,
    ) {
        self.x0 = x0;
        let q = cost.stage_state_hessian(x_nom, u_nom, 0.0) * dt;
        let r = cost.stage_control_hessian(x_nom, u_nom, 0.0) * dt;
        // Folding the expansion point into the gradient keeps the stage cost
        // exact in absolute coordinates for a quadratic cost.
        let qv = cost.stage_state_gradient(x_nom, u_nom, 0.0) * dt - &q * x_nom;
        let rv = cost.stage_control_gradient(x_nom, u_nom, 0.0) * dt - &r * u_nom;

        for stage in &mut self.stages {
            stage.a = a.clone();
            stage.b = b.clone();
            stage.b_next = None;
            stage.q = q.clone();
            stage.qv = qv.clone();
            stage.r = r.clone();
            stage.rv = rv.clone();
            stage.cost_offset = 0.0;
        }
        self.terminal.q = cost.terminal_hessian(x_nom);
        self.terminal.qv = cost.terminal_gradient(x_nom) - &self.terminal.q * x_nom;
    }

    /// Assemble the problem from the shots' cached sensitivities and cost
    /// gradients, in delta coordinates around the current decision vector
    /// (so `x0 = 0` and the solution is a correction step).
    ///
    /// Drives each shot's integrations as needed; stale caches recompute,
    /// current ones are reused.
    pub fn set_from_shots(
        &mut self,
        shots: &mut [ShotIntegrator],
        w: &DecisionVector,
        cost: &dyn CostFunction,
    ) -> Result<(), ConfigurationError> {
        if shots.len() != self.stages.len() {
            return Err(ConfigurationError::StageCountMismatch {
                stages: self.stages.len(),
                shots: shots.len(),
            });
        }

        self.x0.fill(0.0);

        for shot in shots.iter_mut() {
            shot.integrate_cost(w);
            shot.integrate_cost_sensitivities(w);
        }

        let n = shots.len();
        for i in 0..n {
            let shot = &shots[i];
            let h = shot.duration();
            let t_i = shot.start_time();
            let s_i = w.state(i);
            let q_i = w.control(i);

            let stage = &mut self.stages[i];
            stage.a = shot.state_sensitivity().clone();
            stage.b = shot.leading_control_sensitivity().clone();
            stage.b_next = shot.trailing_control_sensitivity().cloned();

            stage.q = cost.stage_state_hessian(s_i, q_i, t_i) * h;
            stage.qv = shot.cost_gradient_state().clone();
            stage.r = cost.stage_control_hessian(s_i, q_i, t_i) * h;
            stage.rv = shot.cost_gradient_leading_control().clone();
            // A knot shared between two shots collects the trailing gradient
            // of the shot it closes as well.
            if i > 0 {
                if let Some(trailing) = shots[i - 1].cost_gradient_trailing_control() {
                    self.stages[i].rv += trailing;
                }
            }
            self.stages[i].cost_offset = shots[i].cost_integrated();
        }

        // Knot q_N closes the final shot but has no stage to receive its
        // trailing gradient; both backends reject trailing coupling before
        // a solve would consume the problem in that shape.
        let s_final = w.state(n);
        self.terminal.q = cost.terminal_hessian(s_final);
        // The final shot chains the terminal gradient into its own cost
        // sensitivities, so the terminal stage carries curvature only;
        // seeding the gradient here as well would count it twice.
        self.terminal.qv.fill(0.0);

        Ok(())
    }
}
