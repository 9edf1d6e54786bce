//! Sequential-LQ Shooting Planner
//!
//! Direct multiple-shooting layer of a sequential linear-quadratic
//! trajectory optimizer: per-shot integration of nonlinear dynamics,
//! sensitivities, and cost with lazy version-stamped caching, plus the
//! assembly and solution of the resulting linear-quadratic subproblem.
//!
//! # Architecture
//!
//! Each outer iteration flows one way:
//!
//! ```text
//! DecisionVector (s_i, q_i, counter)
//!       │ lazy, per shot
//!       ▼
//! ShotIntegrator ──► trajectory, ∂x_f/∂(s_i,q_i,q_{i+1}), cost gradients
//!       │ assembled once per iteration
//!       ▼
//! LqocProblem ──► LqocSolver (Riccati or ADMM) ──► δx, δu, feedback gains
//! ```
//!
//! # Components
//!
//! - [`decision`]: versioned decision variables shared by all shots
//! - [`shot`]: per-shot integration engine with dependency-aware caches
//! - [`lqoc`]: the LQ subproblem container and its assembly paths
//! - [`solver`]: the backend contract all solvers satisfy
//! - [`riccati`]: unconstrained backward/forward Riccati recursion
//! - [`admm`]: box-constrained splitting backend over the same recursion
//! - [`config`]: shooting settings
//! - [`error`]: the error taxonomy shared across the crate

pub mod admm;
pub mod config;
pub mod decision;
pub mod error;
pub mod lqoc;
pub mod riccati;
pub mod shot;
pub mod solver;

// Re-exports
pub use admm::{AdmmSettings, AdmmSolver};
pub use config::{CostEvaluation, ShootingConfig};
pub use decision::DecisionVector;
pub use error::{
    CapabilityError, ConfigurationError, ConstraintError, NumericalError, SolverError,
};
pub use lqoc::{LqocProblem, LqocStage, TerminalStage};
pub use riccati::RiccatiSolver;
pub use shot::ShotIntegrator;
pub use solver::LqocSolver;
