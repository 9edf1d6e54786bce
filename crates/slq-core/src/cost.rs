//! Cost-function models
//!
//! The shooting layer integrates a running cost `l(x, u, t)` over each shot
//! and evaluates a terminal cost `Φ(x)` at the horizon end. The LQ assembly
//! additionally needs first and second derivatives of both, so the trait
//! exposes the full set.

use crate::{Matrix, Vector};

/// Twice-differentiable cost model for trajectory optimization.
pub trait CostFunction {
    /// Running cost `l(x, u, t)`
    fn stage_cost(&self, x: &Vector, u: &Vector, t: f64) -> f64;

    /// `∂l/∂x`
    fn stage_state_gradient(&self, x: &Vector, u: &Vector, t: f64) -> Vector;

    /// `∂l/∂u`
    fn stage_control_gradient(&self, x: &Vector, u: &Vector, t: f64) -> Vector;

    /// `∂²l/∂x²`
    fn stage_state_hessian(&self, x: &Vector, u: &Vector, t: f64) -> Matrix;

    /// `∂²l/∂u²`
    fn stage_control_hessian(&self, x: &Vector, u: &Vector, t: f64) -> Matrix;

    /// Terminal cost `Φ(x)`
    fn terminal_cost(&self, x: &Vector) -> f64;

    /// `∂Φ/∂x`
    fn terminal_gradient(&self, x: &Vector) -> Vector;

    /// `∂²Φ/∂x²`
    fn terminal_hessian(&self, x: &Vector) -> Matrix;
}

/// Quadratic tracking cost
///
/// ```text
/// l(x, u)  = ½(x - x_ref)ᵀ Q (x - x_ref) + ½(u - u_ref)ᵀ R (u - u_ref)
/// Φ(x)     = ½(x - x_ref)ᵀ Q_f (x - x_ref)
/// ```
#[derive(Debug, Clone)]
pub struct QuadraticCost {
    pub q: Matrix,
    pub r: Matrix,
    pub q_final: Matrix,
    pub x_ref: Vector,
    pub u_ref: Vector,
}

impl QuadraticCost {
    pub fn new(q: Matrix, r: Matrix, q_final: Matrix, x_ref: Vector, u_ref: Vector) -> Self {
        Self {
            q,
            r,
            q_final,
            x_ref,
            u_ref,
        }
    }

    /// Regulator cost toward the origin.
    pub fn regulator(q: Matrix, r: Matrix, q_final: Matrix) -> Self {
        let nx = q.nrows();
        let nu = r.nrows();
        Self::new(q, r, q_final, Vector::zeros(nx), Vector::zeros(nu))
    }
}

impl CostFunction for QuadraticCost {
    fn stage_cost(&self, x: &Vector, u: &Vector, _t: f64) -> f64 {
        let dx = x - &self.x_ref;
        let du = u - &self.u_ref;
        0.5 * (dx.dot(&(&self.q * &dx)) + du.dot(&(&self.r * &du)))
    }

    fn stage_state_gradient(&self, x: &Vector, _u: &Vector, _t: f64) -> Vector {
        &self.q * (x - &self.x_ref)
    }

    fn stage_control_gradient(&self, _x: &Vector, u: &Vector, _t: f64) -> Vector {
        &self.r * (u - &self.u_ref)
    }

    fn stage_state_hessian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
        self.q.clone()
    }

    fn stage_control_hessian(&self, _x: &Vector, _u: &Vector, _t: f64) -> Matrix {
        self.r.clone()
    }

    fn terminal_cost(&self, x: &Vector) -> f64 {
        let dx = x - &self.x_ref;
        0.5 * dx.dot(&(&self.q_final * &dx))
    }

    fn terminal_gradient(&self, x: &Vector) -> Vector {
        &self.q_final * (x - &self.x_ref)
    }

    fn terminal_hessian(&self, _x: &Vector) -> Matrix {
        self.q_final.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn example_cost() -> QuadraticCost {
        QuadraticCost::new(
            Matrix::identity(2, 2) * 2.0,
            Matrix::identity(1, 1) * 8.0,
            Matrix::identity(2, 2) * 2.0,
            Vector::from_vec(vec![1.0, 0.0]),
            Vector::zeros(1),
        )
    }

    #[test]
    fn test_stage_cost_at_reference_is_zero() {
        let cost = example_cost();
        let x = Vector::from_vec(vec![1.0, 0.0]);
        let u = Vector::zeros(1);
        assert_relative_eq!(cost.stage_cost(&x, &u, 0.0), 0.0);
        assert_relative_eq!(cost.terminal_cost(&x), 0.0);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let cost = example_cost();
        let x = Vector::from_vec(vec![0.3, -0.8]);
        let u = Vector::from_vec(vec![0.4]);
        let eps = 1e-7;

        let gx = cost.stage_state_gradient(&x, &u, 0.0);
        for j in 0..2 {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += eps;
            xm[j] -= eps;
            let fd = (cost.stage_cost(&xp, &u, 0.0) - cost.stage_cost(&xm, &u, 0.0)) / (2.0 * eps);
            assert_relative_eq!(gx[j], fd, epsilon = 1e-6);
        }

        let gu = cost.stage_control_gradient(&x, &u, 0.0);
        let mut up = u.clone();
        let mut um = u.clone();
        up[0] += eps;
        um[0] -= eps;
        let fd = (cost.stage_cost(&x, &up, 0.0) - cost.stage_cost(&x, &um, 0.0)) / (2.0 * eps);
        assert_relative_eq!(gu[0], fd, epsilon = 1e-6);
    }
}
