//! # SLQ Core
//!
//! Sequential-LQ trajectory optimization - core primitives
//!
//! This library provides the building blocks consumed by the shooting
//! layer in `slq-planner`:
//!
//! - [`dynamics`]: controlled-system and linearization traits, example systems
//! - [`cost`]: cost-function trait and quadratic cost models
//! - [`sensitivity`]: fixed-step state/sensitivity/cost integration over one shot
//! - [`grid`]: shooting time grid
//! - [`spline`]: control parameterizations (piecewise-constant, piecewise-linear)

pub mod cost;
pub mod dynamics;
pub mod grid;
pub mod sensitivity;
pub mod spline;

/// Runtime-dimensioned state/control vector type.
pub type Vector = nalgebra::DVector<f64>;

/// Runtime-dimensioned matrix type.
pub type Matrix = nalgebra::DMatrix<f64>;
