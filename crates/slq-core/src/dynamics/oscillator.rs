//! Damped linear oscillator
//!
//! Second-order test system used throughout the solver tests:
//!
//! ```text
//! ẋ₁ = x₂
//! ẋ₂ = -ω² x₁ - 2ζω x₂ + u
//! ```
//!
//! Being linear, its Jacobians are state-independent, which makes it a
//! convenient reference problem: the shot sensitivities must reproduce the
//! matrix exponential of `A·h`.

use crate::{Matrix, Vector};

use super::{ControlledSystem, LinearSystem};

/// Damped harmonic oscillator with force input on the velocity state.
#[derive(Debug, Clone, Copy)]
pub struct LinearOscillator {
    /// Natural frequency ω [rad/s]
    pub natural_frequency: f64,
    /// Damping ratio ζ
    pub damping: f64,
}

impl Default for LinearOscillator {
    fn default() -> Self {
        Self {
            natural_frequency: 0.5,
            damping: 0.05,
        }
    }
}

impl LinearOscillator {
    pub fn new(natural_frequency: f64, damping: f64) -> Self {
        Self {
            natural_frequency,
            damping,
        }
    }

    /// Continuous-time system matrix
    pub fn a_continuous(&self) -> Matrix {
        let w = self.natural_frequency;
        Matrix::from_row_slice(2, 2, &[0.0, 1.0, -w * w, -2.0 * self.damping * w])
    }

    /// Continuous-time input matrix
    pub fn b_continuous(&self) -> Matrix {
        Matrix::from_row_slice(2, 1, &[0.0, 1.0])
    }
}

impl ControlledSystem for LinearOscillator {
    fn state_dim(&self) -> usize {
        2
    }

    fn control_dim(&self) -> usize {
        1
    }

    fn dynamics(&self, x: &Vector, u: &Vector, _t: f64) -> Vector {
        let w = self.natural_frequency;
        Vector::from_vec(vec![
            x[1],
            -w * w * x[0] - 2.0 * self.damping * w * x[1] + u[0],
        ])
    }
}

impl LinearSystem for LinearOscillator {
    fn state_jacobian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
        self.a_continuous()
    }

    fn control_jacobian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
        self.b_continuous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_jacobians_match_finite_differences() {
        let sys = LinearOscillator::default();
        let x = Vector::from_vec(vec![0.7, -0.3]);
        let u = Vector::from_vec(vec![0.2]);
        let eps = 1e-7;

        let a = sys.state_jacobian(&x, &u, 0.0);
        let b = sys.control_jacobian(&x, &u, 0.0);

        for j in 0..2 {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += eps;
            xm[j] -= eps;
            let col = (sys.dynamics(&xp, &u, 0.0) - sys.dynamics(&xm, &u, 0.0)) / (2.0 * eps);
            for i in 0..2 {
                assert_relative_eq!(a[(i, j)], col[i], epsilon = 1e-6);
            }
        }

        let mut up = u.clone();
        let mut um = u.clone();
        up[0] += eps;
        um[0] -= eps;
        let col = (sys.dynamics(&x, &up, 0.0) - sys.dynamics(&x, &um, 0.0)) / (2.0 * eps);
        for i in 0..2 {
            assert_relative_eq!(b[(i, 0)], col[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_undamped_oscillation() {
        // With ζ = 0 and u = 0, energy ω²x₁² + x₂² is conserved by the flow.
        let sys = LinearOscillator::new(1.0, 0.0);
        let x = Vector::from_vec(vec![1.0, 0.0]);
        let u = Vector::zeros(1);
        let xdot = sys.dynamics(&x, &u, 0.0);
        assert_relative_eq!(xdot[0], 0.0);
        assert_relative_eq!(xdot[1], -1.0);
    }
}
