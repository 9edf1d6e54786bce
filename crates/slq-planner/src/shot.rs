//! Per-shot integration engine
//!
//! A [`ShotIntegrator`] owns one sensitivity-capable stepper and produces,
//! lazily, the state trajectory, terminal sensitivities, and cost quantities
//! for its shooting interval. Each cached quantity carries a token mirroring
//! the decision vector's update counter; a quantity is recomputed only when
//! its token is stale. The recompute chain follows the dependency order
//! state → sensitivities → cost-sensitivities, with cost depending on the
//! state only.
//!
//! The decision vector is passed by shared reference into every integrate
//! call and is never stored or mutated here.

use std::sync::Arc;

use slq_core::cost::CostFunction;
use slq_core::dynamics::{ControlledSystem, LinearSystem};
use slq_core::grid::TimeGrid;
use slq_core::sensitivity::{ControlSchedule, SensitivityIntegrator};
use slq_core::spline::{ControlSpline, SplineKind};
use slq_core::{Matrix, Vector};

use crate::config::{CostEvaluation, ShootingConfig};
use crate::decision::DecisionVector;
use crate::error::ConfigurationError;

/// View of the control signal over one shot: binds the spline to the
/// decision vector's leading and trailing knots for that shot.
struct SplineSchedule<'a> {
    spline: ControlSpline,
    w: &'a DecisionVector,
    shot: usize,
    t_start: f64,
    t_end: f64,
}

impl ControlSchedule for SplineSchedule<'_> {
    fn control(&self, t: f64) -> Vector {
        self.spline.eval(
            self.w.control(self.shot),
            self.w.control(self.shot + 1),
            self.t_start,
            self.t_end,
            t,
        )
    }

    fn leading_weight(&self, t: f64) -> f64 {
        self.spline.leading_weight(self.t_start, self.t_end, t)
    }

    fn trailing_weight(&self, t: f64) -> f64 {
        self.spline.trailing_weight(self.t_start, self.t_end, t)
    }
}

/// State, sensitivity, and cost integration over one shooting interval.
pub struct ShotIntegrator {
    index: usize,
    t_start: f64,
    t_end: f64,
    n_steps: usize,
    config: ShootingConfig,
    spline: ControlSpline,
    cost_fct: Arc<dyn CostFunction>,
    stepper: SensitivityIntegrator,

    // Cache tokens, one per quantity; valid iff equal to the decision
    // vector's current update counter. Start at 0, counters start at 1.
    integration_count: u64,
    cost_count: u64,
    sensitivity_count: u64,
    cost_sensitivity_count: u64,

    // Cached trajectory
    x_history: Vec<Vector>,
    t_history: Vec<f64>,

    // Cached terminal sensitivities
    dx_dsi: Matrix,
    dx_dqi: Matrix,
    dx_dqnext: Option<Matrix>,

    // Cached cost and cost gradients
    cost: f64,
    dl_dsi: Vector,
    dl_dqi: Vector,
    dl_dqnext: Option<Vector>,
}

impl ShotIntegrator {
    /// Build the integrator for shot `index`.
    ///
    /// Fails if the index is at or beyond the configured shot count, or if
    /// the configured integration scheme is adaptive.
    pub fn new(
        system: Arc<dyn ControlledSystem>,
        linear: Arc<dyn LinearSystem>,
        cost_fct: Arc<dyn CostFunction>,
        grid: &TimeGrid,
        index: usize,
        config: ShootingConfig,
    ) -> Result<Self, ConfigurationError> {
        if index >= config.num_shots {
            return Err(ConfigurationError::ShotIndexOutOfRange {
                index,
                count: config.num_shots,
            });
        }

        let nx = system.state_dim();
        let nu = system.control_dim();

        let mut stepper = SensitivityIntegrator::new(system, linear, config.scheme)?;
        if config.cost_evaluation == CostEvaluation::Full {
            stepper.set_cost_function(cost_fct.clone());
        }

        let t_start = grid.shot_start_time(index);
        let t_end = grid.shot_end_time(index);
        // +0.5 guards against float-to-integer truncation of an exact ratio
        let n_steps = ((t_end - t_start) / config.dt_sim + 0.5) as usize;

        let trailing = config.spline == SplineKind::PiecewiseLinear;
        let spline = ControlSpline::new(config.spline);

        Ok(Self {
            index,
            t_start,
            t_end,
            n_steps,
            config,
            spline,
            cost_fct,
            stepper,
            integration_count: 0,
            cost_count: 0,
            sensitivity_count: 0,
            cost_sensitivity_count: 0,
            x_history: Vec::new(),
            t_history: Vec::new(),
            dx_dsi: Matrix::zeros(nx, nx),
            dx_dqi: Matrix::zeros(nx, nu),
            dx_dqnext: trailing.then(|| Matrix::zeros(nx, nu)),
            cost: 0.0,
            dl_dsi: Vector::zeros(nx),
            dl_dqi: Vector::zeros(nu),
            dl_dqnext: trailing.then(|| Vector::zeros(nu)),
        })
    }

    fn schedule<'a>(&self, w: &'a DecisionVector) -> SplineSchedule<'a> {
        SplineSchedule {
            spline: self.spline,
            w,
            shot: self.index,
            t_start: self.t_start,
            t_end: self.t_end,
        }
    }

    fn is_final_shot(&self) -> bool {
        self.index + 1 == self.config.num_shots
    }

    /// Integrate the state trajectory over the shot.
    ///
    /// No-op while the cached trajectory matches the decision vector's
    /// current update counter.
    pub fn integrate_state(&mut self, w: &DecisionVector) {
        if w.update_count() != self.integration_count {
            self.integration_count = w.update_count();
            let x0 = w.state(self.index).clone();
            let schedule = self.schedule(w);
            self.stepper.integrate(
                &x0,
                self.t_start,
                self.n_steps,
                self.config.dt_sim,
                &schedule,
                &mut self.x_history,
                &mut self.t_history,
            );
        }
    }

    /// Integrate the running cost over the shot, plus the terminal cost on
    /// the final shot. Requires nothing beyond a current state trajectory.
    pub fn integrate_cost(&mut self, w: &DecisionVector) {
        if w.update_count() != self.cost_count {
            self.cost_count = w.update_count();
            self.integrate_state(w);
            self.cost = 0.0;
            self.stepper.integrate_cost(&mut self.cost, self.config.dt_sim);
            if self.config.cost_evaluation == CostEvaluation::Full && self.is_final_shot() {
                if let Some(x_final) = self.x_history.last() {
                    self.cost += self.cost_fct.terminal_cost(x_final);
                }
            }
        }
    }

    /// Integrate the terminal-state sensitivities with respect to the shot's
    /// initial state and leading control knot, and — only under a
    /// piecewise-linear parameterization — the trailing control knot.
    pub fn integrate_sensitivities(&mut self, w: &DecisionVector) {
        if w.update_count() != self.sensitivity_count {
            self.sensitivity_count = w.update_count();
            self.integrate_state(w);

            self.dx_dsi.fill(0.0);
            self.dx_dsi.fill_diagonal(1.0);
            self.dx_dqi.fill(0.0);

            let schedule = self.schedule(w);
            self.stepper.linearize();
            self.stepper
                .integrate_sensitivity_dx0(&mut self.dx_dsi, self.config.dt_sim);
            self.stepper
                .integrate_sensitivity_du0(&mut self.dx_dqi, self.config.dt_sim, &schedule);

            if let Some(dx_dqnext) = self.dx_dqnext.as_mut() {
                dx_dqnext.fill(0.0);
                self.stepper
                    .integrate_sensitivity_duf(dx_dqnext, self.config.dt_sim, &schedule);
            }
        }
    }

    /// Integrate the cost gradients with respect to the shot's initial state
    /// and both control knots (trailing knot conditional on piecewise-linear).
    pub fn integrate_cost_sensitivities(&mut self, w: &DecisionVector) {
        if w.update_count() != self.cost_sensitivity_count {
            self.cost_sensitivity_count = w.update_count();
            self.integrate_sensitivities(w);

            self.dl_dsi.fill(0.0);
            self.dl_dqi.fill(0.0);

            let schedule = self.schedule(w);
            self.stepper
                .integrate_cost_sensitivity_dx0(&mut self.dl_dsi, self.config.dt_sim);
            self.stepper.integrate_cost_sensitivity_du0(
                &mut self.dl_dqi,
                self.config.dt_sim,
                &schedule,
            );
            if let Some(dl_dqnext) = self.dl_dqnext.as_mut() {
                dl_dqnext.fill(0.0);
                self.stepper.integrate_cost_sensitivity_duf(
                    dl_dqnext,
                    self.config.dt_sim,
                    &schedule,
                );
            }

            // Terminal-cost contribution on the final shot, chained through
            // the terminal sensitivities.
            if self.config.cost_evaluation == CostEvaluation::Full && self.is_final_shot() {
                if let Some(x_final) = self.x_history.last() {
                    let phi_x = self.cost_fct.terminal_gradient(x_final);
                    self.dl_dsi += self.dx_dsi.transpose() * &phi_x;
                    self.dl_dqi += self.dx_dqi.transpose() * &phi_x;
                    if let (Some(dl_dqnext), Some(dx_dqnext)) =
                        (self.dl_dqnext.as_mut(), self.dx_dqnext.as_ref())
                    {
                        *dl_dqnext += dx_dqnext.transpose() * &phi_x;
                    }
                }
            }
        }
    }

    /// Discard all cached trajectory, sensitivity, and linearization state.
    ///
    /// Cache tokens are left as they are: staleness is detected by token
    /// mismatch against the decision vector's counter, never by sentinel.
    pub fn reset(&mut self) {
        self.stepper.clear_states();
        self.stepper.clear_sensitivities();
        self.stepper.clear_linearization();
        self.x_history.clear();
        self.t_history.clear();
    }

    // --- accessors (pure reads of cached state) ---

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start_time(&self) -> f64 {
        self.t_start
    }

    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }

    pub fn num_steps(&self) -> usize {
        self.n_steps
    }

    /// Terminal state of the integrated trajectory.
    pub fn state_integrated(&self) -> Option<&Vector> {
        self.x_history.last()
    }

    /// End time of the integrated trajectory.
    pub fn integration_time_final(&self) -> Option<f64> {
        self.t_history.last().copied()
    }

    /// Full integrated state trajectory.
    pub fn x_history(&self) -> &[Vector] {
        &self.x_history
    }

    /// Time stamps of the integrated trajectory.
    pub fn t_history(&self) -> &[f64] {
        &self.t_history
    }

    /// Control trajectory used during the state integration, reconstructed
    /// through the spline at the cached time stamps.
    pub fn control_history(&self, w: &DecisionVector) -> Vec<Vector> {
        let schedule = self.schedule(w);
        self.t_history.iter().map(|&t| schedule.control(t)).collect()
    }

    /// Integrated cost over the shot.
    pub fn cost_integrated(&self) -> f64 {
        self.cost
    }

    /// Terminal-state sensitivity w.r.t. the shot-start state `s_i`.
    pub fn state_sensitivity(&self) -> &Matrix {
        &self.dx_dsi
    }

    /// Terminal-state sensitivity w.r.t. the leading control knot `q_i`.
    pub fn leading_control_sensitivity(&self) -> &Matrix {
        &self.dx_dqi
    }

    /// Terminal-state sensitivity w.r.t. the trailing control knot `q_{i+1}`;
    /// present only under a piecewise-linear parameterization.
    pub fn trailing_control_sensitivity(&self) -> Option<&Matrix> {
        self.dx_dqnext.as_ref()
    }

    /// Cost gradient w.r.t. `s_i`.
    pub fn cost_gradient_state(&self) -> &Vector {
        &self.dl_dsi
    }

    /// Cost gradient w.r.t. `q_i`.
    pub fn cost_gradient_leading_control(&self) -> &Vector {
        &self.dl_dqi
    }

    /// Cost gradient w.r.t. `q_{i+1}`; present only under piecewise-linear.
    pub fn cost_gradient_trailing_control(&self) -> Option<&Vector> {
        self.dl_dqnext.as_ref()
    }
}
