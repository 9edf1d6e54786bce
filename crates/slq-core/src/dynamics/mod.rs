//! System dynamics traits
//!
//! A controlled system provides the nonlinear vector field `ẋ = f(x, u, t)`;
//! its linearization provides the Jacobians `A = ∂f/∂x` and `B = ∂f/∂u`
//! evaluated along a trajectory. Both are consumed by the sensitivity
//! integrator in [`crate::sensitivity`].

mod oscillator;

pub use oscillator::LinearOscillator;

use crate::{Matrix, Vector};

/// Continuous-time controlled system `ẋ = f(x, u, t)`.
pub trait ControlledSystem {
    /// State dimension
    fn state_dim(&self) -> usize;

    /// Control dimension
    fn control_dim(&self) -> usize;

    /// Evaluate the vector field at (x, u, t)
    fn dynamics(&self, x: &Vector, u: &Vector, t: f64) -> Vector;
}

/// First-order linearization of a controlled system.
pub trait LinearSystem {
    /// State Jacobian `A = ∂f/∂x` at (x, u, t)
    fn state_jacobian(&self, x: &Vector, u: &Vector, t: f64) -> Matrix;

    /// Control Jacobian `B = ∂f/∂u` at (x, u, t)
    fn control_jacobian(&self, x: &Vector, u: &Vector, t: f64) -> Matrix;
}
