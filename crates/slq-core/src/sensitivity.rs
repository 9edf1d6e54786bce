//! Fixed-step state, cost, and sensitivity integration
//!
//! [`SensitivityIntegrator`] propagates a controlled system over one shooting
//! interval and, alongside the state, integrates the variational equations
//!
//! ```text
//! Ẋ = A(t) X                     (sensitivity w.r.t. the shot's initial state)
//! Ẏ = A(t) Y + B(t) w(t)         (sensitivity w.r.t. a control knot,
//!                                 w(t) = basis weight of that knot)
//! ```
//!
//! and the corresponding cost-gradient quadratures. State and sensitivity
//! trajectories are cached internally between calls; the owning shot decides
//! when a cache is stale. The control signal enters through the
//! [`ControlSchedule`] capability so the integrator never touches decision
//! variables directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cost::CostFunction;
use crate::dynamics::{ControlledSystem, LinearSystem};
use crate::{Matrix, Vector};

/// Integration scheme selector.
///
/// `Rkf45` is listed for completeness but rejected at construction: shot
/// integration requires a fixed step so that state, sensitivity, and cost
/// quadratures share one time discretization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationScheme {
    Euler,
    Rk4,
    Rkf45,
}

/// Returned when an adaptive scheme is selected for shot integration.
#[derive(Debug, Error)]
#[error("integration scheme {scheme:?} is adaptive and not supported for shot integration")]
pub struct UnsupportedSchemeError {
    pub scheme: IntegrationScheme,
}

/// Fixed-step schemes the integrator actually runs.
#[derive(Debug, Clone, Copy)]
enum FixedStepScheme {
    Euler,
    Rk4,
}

/// Control signal over one shot, as seen by the integrator: the value and
/// the basis weights tying it to the leading/trailing parameter knots.
pub trait ControlSchedule {
    /// `u(t)`
    fn control(&self, t: f64) -> Vector;

    /// `∂u(t)/∂q_i`
    fn leading_weight(&self, t: f64) -> f64;

    /// `∂u(t)/∂q_{i+1}`; identically zero for a zero-order hold
    fn trailing_weight(&self, t: f64) -> f64;
}

/// Sensitivity-capable fixed-step integrator for one shot.
///
/// Owned exclusively by one shot; holds the cached state trajectory,
/// node-wise linearization, and sensitivity trajectories between calls.
pub struct SensitivityIntegrator {
    scheme: FixedStepScheme,
    system: Arc<dyn ControlledSystem>,
    linear: Arc<dyn LinearSystem>,
    cost: Option<Arc<dyn CostFunction>>,

    // Cached trajectory at the step nodes
    x_nodes: Vec<Vector>,
    u_nodes: Vec<Vector>,
    t_nodes: Vec<f64>,

    // Node-wise linearization (filled by `linearize`)
    a_nodes: Vec<Matrix>,
    b_nodes: Vec<Matrix>,

    // Sensitivity trajectories (filled by the sensitivity integrations)
    dx_dx0: Vec<Matrix>,
    dx_du0: Vec<Matrix>,
    dx_duf: Vec<Matrix>,
}

impl SensitivityIntegrator {
    /// Create an integrator for the given system and scheme.
    ///
    /// Adaptive schemes are rejected with a typed error at construction.
    pub fn new(
        system: Arc<dyn ControlledSystem>,
        linear: Arc<dyn LinearSystem>,
        scheme: IntegrationScheme,
    ) -> Result<Self, UnsupportedSchemeError> {
        let scheme = match scheme {
            IntegrationScheme::Euler => FixedStepScheme::Euler,
            IntegrationScheme::Rk4 => FixedStepScheme::Rk4,
            IntegrationScheme::Rkf45 => return Err(UnsupportedSchemeError { scheme }),
        };
        Ok(Self {
            scheme,
            system,
            linear,
            cost: None,
            x_nodes: Vec::new(),
            u_nodes: Vec::new(),
            t_nodes: Vec::new(),
            a_nodes: Vec::new(),
            b_nodes: Vec::new(),
            dx_dx0: Vec::new(),
            dx_du0: Vec::new(),
            dx_duf: Vec::new(),
        })
    }

    /// Attach a cost function; without one the cost integrations are no-ops.
    pub fn set_cost_function(&mut self, cost: Arc<dyn CostFunction>) {
        self.cost = Some(cost);
    }

    /// Integrate the state over `[t_start, t_start + n_steps·dt]`.
    ///
    /// Replaces all internal caches and writes the node trajectory into
    /// `x_history` / `t_history`.
    pub fn integrate(
        &mut self,
        x0: &Vector,
        t_start: f64,
        n_steps: usize,
        dt: f64,
        schedule: &dyn ControlSchedule,
        x_history: &mut Vec<Vector>,
        t_history: &mut Vec<f64>,
    ) {
        self.clear_states();
        self.clear_sensitivities();
        self.clear_linearization();

        let mut x = x0.clone();
        let mut t = t_start;
        self.x_nodes.push(x.clone());
        self.t_nodes.push(t);
        self.u_nodes.push(schedule.control(t));

        for _ in 0..n_steps {
            x = self.step(&x, t, dt, schedule);
            t += dt;
            self.x_nodes.push(x.clone());
            self.t_nodes.push(t);
            self.u_nodes.push(schedule.control(t));
        }

        x_history.clear();
        x_history.extend(self.x_nodes.iter().cloned());
        t_history.clear();
        t_history.extend_from_slice(&self.t_nodes);
    }

    fn step(&self, x: &Vector, t: f64, dt: f64, schedule: &dyn ControlSchedule) -> Vector {
        match self.scheme {
            FixedStepScheme::Euler => {
                let u = schedule.control(t);
                x + self.system.dynamics(x, &u, t) * dt
            }
            FixedStepScheme::Rk4 => {
                let u0 = schedule.control(t);
                let uh = schedule.control(t + 0.5 * dt);
                let u1 = schedule.control(t + dt);
                let k1 = self.system.dynamics(x, &u0, t);
                let k2 = self
                    .system
                    .dynamics(&(x + &k1 * (0.5 * dt)), &uh, t + 0.5 * dt);
                let k3 = self
                    .system
                    .dynamics(&(x + &k2 * (0.5 * dt)), &uh, t + 0.5 * dt);
                let k4 = self.system.dynamics(&(x + &k3 * dt), &u1, t + dt);
                x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
            }
        }
    }

    /// Accumulate the running cost over the cached trajectory into `cost`
    /// (trapezoidal quadrature at the step nodes).
    pub fn integrate_cost(&self, cost: &mut f64, dt: f64) {
        let Some(cost_fct) = &self.cost else {
            return;
        };
        if self.x_nodes.len() < 2 {
            return;
        }
        let values: Vec<f64> = (0..self.x_nodes.len())
            .map(|k| cost_fct.stage_cost(&self.x_nodes[k], &self.u_nodes[k], self.t_nodes[k]))
            .collect();
        for w in values.windows(2) {
            *cost += 0.5 * dt * (w[0] + w[1]);
        }
    }

    /// Evaluate the dynamics Jacobians at every cached node.
    ///
    /// Precondition for the sensitivity integrations below.
    pub fn linearize(&mut self) {
        self.a_nodes.clear();
        self.b_nodes.clear();
        for k in 0..self.x_nodes.len() {
            self.a_nodes.push(self.linear.state_jacobian(
                &self.x_nodes[k],
                &self.u_nodes[k],
                self.t_nodes[k],
            ));
            self.b_nodes.push(self.linear.control_jacobian(
                &self.x_nodes[k],
                &self.u_nodes[k],
                self.t_nodes[k],
            ));
        }
    }

    /// Integrate `Ẋ = A(t)X` from the initial value in `out`; `out` receives
    /// the terminal sensitivity, the full trajectory is cached for the cost
    /// gradient quadrature.
    pub fn integrate_sensitivity_dx0(&mut self, out: &mut Matrix, dt: f64) {
        let traj = self.propagate(out, dt, None);
        if let Some(last) = traj.last() {
            *out = last.clone();
        }
        self.dx_dx0 = traj;
    }

    /// Integrate `Ẏ = A(t)Y + B(t)·w_lead(t)` from the initial value in `out`.
    pub fn integrate_sensitivity_du0(
        &mut self,
        out: &mut Matrix,
        dt: f64,
        schedule: &dyn ControlSchedule,
    ) {
        let weight = |t: f64| schedule.leading_weight(t);
        let traj = self.propagate(out, dt, Some(&weight));
        if let Some(last) = traj.last() {
            *out = last.clone();
        }
        self.dx_du0 = traj;
    }

    /// Integrate `Ż = A(t)Z + B(t)·w_trail(t)` from the initial value in `out`.
    pub fn integrate_sensitivity_duf(
        &mut self,
        out: &mut Matrix,
        dt: f64,
        schedule: &dyn ControlSchedule,
    ) {
        let weight = |t: f64| schedule.trailing_weight(t);
        let traj = self.propagate(out, dt, Some(&weight));
        if let Some(last) = traj.last() {
            *out = last.clone();
        }
        self.dx_duf = traj;
    }

    /// Propagate a sensitivity matrix along the cached trajectory.
    ///
    /// `forcing` is the basis weight multiplying `B(t)`; `None` propagates the
    /// homogeneous equation. Jacobians are interpolated linearly between nodes
    /// for the RK4 substeps.
    fn propagate(
        &self,
        init: &Matrix,
        dt: f64,
        forcing: Option<&dyn Fn(f64) -> f64>,
    ) -> Vec<Matrix> {
        let n_nodes = self.a_nodes.len();
        let mut traj = Vec::with_capacity(n_nodes.max(1));
        let mut w = init.clone();
        traj.push(w.clone());
        if n_nodes < 2 {
            return traj;
        }

        let rhs = |a: &Matrix, b: &Matrix, w: &Matrix, t: f64| -> Matrix {
            let mut dw = a * w;
            if let Some(weight) = forcing {
                dw += b * weight(t);
            }
            dw
        };

        for k in 0..n_nodes - 1 {
            let t = self.t_nodes[k];
            let a0 = &self.a_nodes[k];
            let a1 = &self.a_nodes[k + 1];
            let b0 = &self.b_nodes[k];
            let b1 = &self.b_nodes[k + 1];

            w = match self.scheme {
                FixedStepScheme::Euler => &w + rhs(a0, b0, &w, t) * dt,
                FixedStepScheme::Rk4 => {
                    let ah = (a0 + a1) * 0.5;
                    let bh = (b0 + b1) * 0.5;
                    let th = t + 0.5 * dt;
                    let k1 = rhs(a0, b0, &w, t);
                    let k2 = rhs(&ah, &bh, &(&w + &k1 * (0.5 * dt)), th);
                    let k3 = rhs(&ah, &bh, &(&w + &k2 * (0.5 * dt)), th);
                    let k4 = rhs(a1, b1, &(&w + &k3 * dt), t + dt);
                    &w + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
                }
            };
            traj.push(w.clone());
        }
        traj
    }

    /// Accumulate `∫ Xᵀ l_x dt` over the shot into `out`.
    pub fn integrate_cost_sensitivity_dx0(&self, out: &mut Vector, dt: f64) {
        self.accumulate_cost_gradient(out, dt, &self.dx_dx0, None);
    }

    /// Accumulate `∫ (Yᵀ l_x + w_lead l_u) dt` over the shot into `out`.
    pub fn integrate_cost_sensitivity_du0(
        &self,
        out: &mut Vector,
        dt: f64,
        schedule: &dyn ControlSchedule,
    ) {
        let weight = |t: f64| schedule.leading_weight(t);
        self.accumulate_cost_gradient(out, dt, &self.dx_du0, Some(&weight));
    }

    /// Accumulate `∫ (Zᵀ l_x + w_trail l_u) dt` over the shot into `out`.
    pub fn integrate_cost_sensitivity_duf(
        &self,
        out: &mut Vector,
        dt: f64,
        schedule: &dyn ControlSchedule,
    ) {
        let weight = |t: f64| schedule.trailing_weight(t);
        self.accumulate_cost_gradient(out, dt, &self.dx_duf, Some(&weight));
    }

    fn accumulate_cost_gradient(
        &self,
        out: &mut Vector,
        dt: f64,
        sensitivities: &[Matrix],
        control_weight: Option<&dyn Fn(f64) -> f64>,
    ) {
        let Some(cost_fct) = &self.cost else {
            return;
        };
        let n_nodes = self.x_nodes.len().min(sensitivities.len());
        if n_nodes < 2 {
            return;
        }
        let terms: Vec<Vector> = (0..n_nodes)
            .map(|k| {
                let x = &self.x_nodes[k];
                let u = &self.u_nodes[k];
                let t = self.t_nodes[k];
                let mut term =
                    sensitivities[k].transpose() * cost_fct.stage_state_gradient(x, u, t);
                if let Some(weight) = control_weight {
                    term += cost_fct.stage_control_gradient(x, u, t) * weight(t);
                }
                term
            })
            .collect();
        for w in terms.windows(2) {
            *out += (&w[0] + &w[1]) * (0.5 * dt);
        }
    }

    /// Terminal value of the cached initial-state sensitivity, if any.
    pub fn terminal_sensitivity_dx0(&self) -> Option<&Matrix> {
        self.dx_dx0.last()
    }

    /// Terminal value of the cached leading-knot sensitivity, if any.
    pub fn terminal_sensitivity_du0(&self) -> Option<&Matrix> {
        self.dx_du0.last()
    }

    /// Terminal value of the cached trailing-knot sensitivity, if any.
    pub fn terminal_sensitivity_duf(&self) -> Option<&Matrix> {
        self.dx_duf.last()
    }

    pub fn clear_states(&mut self) {
        self.x_nodes.clear();
        self.u_nodes.clear();
        self.t_nodes.clear();
    }

    pub fn clear_sensitivities(&mut self) {
        self.dx_dx0.clear();
        self.dx_du0.clear();
        self.dx_duf.clear();
    }

    pub fn clear_linearization(&mut self) {
        self.a_nodes.clear();
        self.b_nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::QuadraticCost;
    use approx::assert_relative_eq;

    /// First-order lag ẋ = -x + u.
    struct ScalarLag;

    impl ControlledSystem for ScalarLag {
        fn state_dim(&self) -> usize {
            1
        }
        fn control_dim(&self) -> usize {
            1
        }
        fn dynamics(&self, x: &Vector, u: &Vector, _t: f64) -> Vector {
            Vector::from_vec(vec![-x[0] + u[0]])
        }
    }

    impl LinearSystem for ScalarLag {
        fn state_jacobian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
            Matrix::from_row_slice(1, 1, &[-1.0])
        }
        fn control_jacobian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
            Matrix::from_row_slice(1, 1, &[1.0])
        }
    }

    struct ConstSchedule {
        u: Vector,
    }

    impl ControlSchedule for ConstSchedule {
        fn control(&self, _t: f64) -> Vector {
            self.u.clone()
        }
        fn leading_weight(&self, _t: f64) -> f64 {
            1.0
        }
        fn trailing_weight(&self, _t: f64) -> f64 {
            0.0
        }
    }

    fn lag_integrator(scheme: IntegrationScheme) -> SensitivityIntegrator {
        let sys = Arc::new(ScalarLag);
        SensitivityIntegrator::new(sys.clone(), sys, scheme).unwrap()
    }

    #[test]
    fn test_adaptive_scheme_rejected() {
        let sys = Arc::new(ScalarLag);
        let result = SensitivityIntegrator::new(sys.clone(), sys, IntegrationScheme::Rkf45);
        assert!(result.is_err());
    }

    #[test]
    fn test_rk4_matches_exponential_decay() {
        let mut integrator = lag_integrator(IntegrationScheme::Rk4);
        let schedule = ConstSchedule {
            u: Vector::zeros(1),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![1.0]);
        integrator.integrate(&x0, 0.0, 100, 0.01, &schedule, &mut x_hist, &mut t_hist);

        assert_eq!(x_hist.len(), 101);
        assert_relative_eq!(t_hist[100], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x_hist[100][0], (-1.0_f64).exp(), epsilon = 1e-8);
    }

    #[test]
    fn test_forced_response() {
        // ẋ = -x + 1 from x(0) = 0 gives x(t) = 1 - e^{-t}.
        let mut integrator = lag_integrator(IntegrationScheme::Rk4);
        let schedule = ConstSchedule {
            u: Vector::from_vec(vec![1.0]),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::zeros(1);
        integrator.integrate(&x0, 0.0, 100, 0.01, &schedule, &mut x_hist, &mut t_hist);

        assert_relative_eq!(x_hist[100][0], 1.0 - (-1.0_f64).exp(), epsilon = 1e-8);
    }

    #[test]
    fn test_state_sensitivity_matches_analytic() {
        // For ẋ = -x, dx(T)/dx(0) = e^{-T}.
        let mut integrator = lag_integrator(IntegrationScheme::Rk4);
        let schedule = ConstSchedule {
            u: Vector::zeros(1),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![2.0]);
        integrator.integrate(&x0, 0.0, 100, 0.01, &schedule, &mut x_hist, &mut t_hist);
        integrator.linearize();

        let mut dx_dx0 = Matrix::identity(1, 1);
        integrator.integrate_sensitivity_dx0(&mut dx_dx0, 0.01);
        assert_relative_eq!(dx_dx0[(0, 0)], (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_control_sensitivity_matches_analytic() {
        // For ẋ = -x + u with u held at a constant knot value,
        // dx(T)/dq = ∫₀ᵀ e^{-(T-s)} ds = 1 - e^{-T}.
        let mut integrator = lag_integrator(IntegrationScheme::Rk4);
        let schedule = ConstSchedule {
            u: Vector::from_vec(vec![0.3]),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![1.0]);
        integrator.integrate(&x0, 0.0, 100, 0.01, &schedule, &mut x_hist, &mut t_hist);
        integrator.linearize();

        let mut dx_du0 = Matrix::zeros(1, 1);
        integrator.integrate_sensitivity_du0(&mut dx_du0, 0.01, &schedule);
        assert_relative_eq!(dx_du0[(0, 0)], 1.0 - (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_cost_integration_matches_analytic() {
        // ∫₀¹ x(t)² dt for x(t) = e^{-t} is (1 - e^{-2})/2; stage cost
        // ½·2·x² = x² with Q = 2, R = 0.
        let mut integrator = lag_integrator(IntegrationScheme::Rk4);
        integrator.set_cost_function(Arc::new(QuadraticCost::regulator(
            Matrix::identity(1, 1) * 2.0,
            Matrix::zeros(1, 1),
            Matrix::zeros(1, 1),
        )));
        let schedule = ConstSchedule {
            u: Vector::zeros(1),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![1.0]);
        integrator.integrate(&x0, 0.0, 1000, 0.001, &schedule, &mut x_hist, &mut t_hist);

        let mut cost = 0.0;
        integrator.integrate_cost(&mut cost, 0.001);
        let exact = (1.0 - (-2.0_f64).exp()) / 2.0;
        assert_relative_eq!(cost, exact, epsilon = 1e-5);
    }

    #[test]
    fn test_cost_integration_without_cost_function_is_noop() {
        let mut integrator = lag_integrator(IntegrationScheme::Euler);
        let schedule = ConstSchedule {
            u: Vector::zeros(1),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![1.0]);
        integrator.integrate(&x0, 0.0, 10, 0.01, &schedule, &mut x_hist, &mut t_hist);

        let mut cost = 0.0;
        integrator.integrate_cost(&mut cost, 0.01);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_clear_discards_caches() {
        let mut integrator = lag_integrator(IntegrationScheme::Euler);
        let schedule = ConstSchedule {
            u: Vector::zeros(1),
        };
        let mut x_hist = Vec::new();
        let mut t_hist = Vec::new();
        let x0 = Vector::from_vec(vec![1.0]);
        integrator.integrate(&x0, 0.0, 10, 0.01, &schedule, &mut x_hist, &mut t_hist);
        integrator.linearize();
        let mut dx_dx0 = Matrix::identity(1, 1);
        integrator.integrate_sensitivity_dx0(&mut dx_dx0, 0.01);

        integrator.clear_sensitivities();
        assert!(integrator.terminal_sensitivity_dx0().is_none());
        integrator.clear_states();
        integrator.clear_linearization();

        let mut cost = 0.0;
        integrator.integrate_cost(&mut cost, 0.01);
        assert_eq!(cost, 0.0);
    }
}
