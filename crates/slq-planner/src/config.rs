//! Shooting configuration
//!
//! Static options for one solve session: discretization, integration scheme,
//! cost-evaluation granularity, and control parameterization. All options are
//! fixed at construction time; invalid combinations are rejected with a
//! [`crate::error::ConfigurationError`] when the shots are built.

use serde::{Deserialize, Serialize};

use slq_core::sensitivity::IntegrationScheme;
use slq_core::spline::SplineKind;

/// Whether cost quantities are integrated along each shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostEvaluation {
    /// Integrate cost and cost gradients over the shot
    Full,
    /// Skip all cost integration (dynamics-only shooting)
    None,
}

/// Configuration for a multiple-shooting solve session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShootingConfig {
    /// Number of shooting intervals N
    pub num_shots: usize,
    /// Fixed-step integration scheme used inside each shot
    pub scheme: IntegrationScheme,
    /// Simulation step size inside a shot [s]
    pub dt_sim: f64,
    /// Cost evaluation granularity
    pub cost_evaluation: CostEvaluation,
    /// Control parameterization between shot boundaries
    pub spline: SplineKind,
}

impl Default for ShootingConfig {
    fn default() -> Self {
        Self {
            num_shots: 20,
            scheme: IntegrationScheme::Rk4,
            dt_sim: 0.01,
            cost_evaluation: CostEvaluation::Full,
            spline: SplineKind::PiecewiseLinear,
        }
    }
}
