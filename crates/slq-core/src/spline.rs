//! Control parameterizations
//!
//! Reconstructs the continuous control signal over one shot from the
//! decision-variable knots `q_i` (leading) and `q_{i+1}` (trailing). Besides
//! the value itself, the sensitivity integration needs the basis weights
//! `∂u(t)/∂q_i` and `∂u(t)/∂q_{i+1}`, which are scalar functions of time for
//! both supported parameterizations.

use serde::{Deserialize, Serialize};

use crate::Vector;

/// Control parameterization over a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplineKind {
    /// Zero-order hold: `u(t) = q_i`
    PiecewiseConstant,
    /// Linear blend: `u(t) = (1-τ) q_i + τ q_{i+1}` with `τ = (t-t_i)/(t_{i+1}-t_i)`
    PiecewiseLinear,
}

/// Stateless spline evaluator for one control segment.
#[derive(Debug, Clone, Copy)]
pub struct ControlSpline {
    kind: SplineKind,
}

impl ControlSpline {
    pub fn new(kind: SplineKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SplineKind {
        self.kind
    }

    fn tau(t_start: f64, t_end: f64, t: f64) -> f64 {
        let span = t_end - t_start;
        if span <= 0.0 {
            return 0.0;
        }
        ((t - t_start) / span).clamp(0.0, 1.0)
    }

    /// Control value at time `t` within `[t_start, t_end]`.
    pub fn eval(&self, q_i: &Vector, q_next: &Vector, t_start: f64, t_end: f64, t: f64) -> Vector {
        match self.kind {
            SplineKind::PiecewiseConstant => q_i.clone(),
            SplineKind::PiecewiseLinear => {
                let tau = Self::tau(t_start, t_end, t);
                q_i * (1.0 - tau) + q_next * tau
            }
        }
    }

    /// `∂u(t)/∂q_i`
    pub fn leading_weight(&self, t_start: f64, t_end: f64, t: f64) -> f64 {
        match self.kind {
            SplineKind::PiecewiseConstant => 1.0,
            SplineKind::PiecewiseLinear => 1.0 - Self::tau(t_start, t_end, t),
        }
    }

    /// `∂u(t)/∂q_{i+1}`; identically zero under zero-order hold
    pub fn trailing_weight(&self, t_start: f64, t_end: f64, t: f64) -> f64 {
        match self.kind {
            SplineKind::PiecewiseConstant => 0.0,
            SplineKind::PiecewiseLinear => Self::tau(t_start, t_end, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_piecewise_constant_holds_leading_knot() {
        let spline = ControlSpline::new(SplineKind::PiecewiseConstant);
        let q_i = Vector::from_vec(vec![2.0]);
        let q_next = Vector::from_vec(vec![-5.0]);

        let u = spline.eval(&q_i, &q_next, 0.0, 1.0, 0.7);
        assert_relative_eq!(u[0], 2.0);
        assert_relative_eq!(spline.leading_weight(0.0, 1.0, 0.7), 1.0);
        assert_relative_eq!(spline.trailing_weight(0.0, 1.0, 0.7), 0.0);
    }

    #[test]
    fn test_piecewise_linear_blend() {
        let spline = ControlSpline::new(SplineKind::PiecewiseLinear);
        let q_i = Vector::from_vec(vec![1.0]);
        let q_next = Vector::from_vec(vec![3.0]);

        let u = spline.eval(&q_i, &q_next, 1.0, 2.0, 1.25);
        assert_relative_eq!(u[0], 1.5);
        assert_relative_eq!(spline.leading_weight(1.0, 2.0, 1.25), 0.75);
        assert_relative_eq!(spline.trailing_weight(1.0, 2.0, 1.25), 0.25);
    }

    #[test]
    fn test_weights_partition_unity_for_linear() {
        let spline = ControlSpline::new(SplineKind::PiecewiseLinear);
        for k in 0..=10 {
            let t = k as f64 / 10.0;
            let sum = spline.leading_weight(0.0, 1.0, t) + spline.trailing_weight(0.0, 1.0, t);
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_evaluation_clamps_outside_segment() {
        let spline = ControlSpline::new(SplineKind::PiecewiseLinear);
        let q_i = Vector::from_vec(vec![0.0]);
        let q_next = Vector::from_vec(vec![1.0]);
        let u = spline.eval(&q_i, &q_next, 0.0, 1.0, 1.5);
        assert_relative_eq!(u[0], 1.0);
    }
}
