//! Error taxonomy
//!
//! Four kinds, each surfaced to the immediate caller and never swallowed:
//! configuration errors at construction, constraint errors at bound
//! installation, capability errors when a backend is handed a problem shape
//! it structurally cannot solve, and numerical errors during a solve.

use thiserror::Error;

use slq_core::sensitivity::UnsupportedSchemeError;

/// Invalid static setup; fatal to the constructing call.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("shot index {index} is out of range: configured shot count is {count}")]
    ShotIndexOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    UnsupportedScheme(#[from] UnsupportedSchemeError),

    #[error("stage count mismatch: problem has {stages} stages but {shots} shots were supplied")]
    StageCountMismatch { stages: usize, shots: usize },
}

/// Malformed box bounds; the problem object is left unmodified.
#[derive(Debug, Error)]
#[error("invalid box constraint at component {component}: lower {lower} exceeds upper {upper}")]
pub struct ConstraintError {
    pub component: usize,
    pub lower: f64,
    pub upper: f64,
}

/// A solver backend was handed a problem shape it structurally cannot solve.
#[derive(Debug, Error)]
#[error("the {backend} backend cannot handle {shape}")]
pub struct CapabilityError {
    pub backend: &'static str,
    pub shape: &'static str,
}

/// Ill-conditioned stage quantities during a solve.
#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("control-cost Hessian is not positive definite at stage {stage}")]
    NotPositiveDefinite { stage: usize },
}

/// Umbrella error for the solve path.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("no problem bound to the solver")]
    NoProblem,

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error("constrained solve did not converge within {max_iterations} iterations (residual {residual:.3e})")]
    NotConverged {
        max_iterations: usize,
        residual: f64,
    },
}

impl SolverError {
    /// Whether this failure is the capability kind (backend/problem mismatch).
    pub fn is_capability(&self) -> bool {
        matches!(self, SolverError::Capability(_))
    }

    /// Whether this failure is the numerical kind.
    pub fn is_numerical(&self) -> bool {
        matches!(self, SolverError::Numerical(_))
    }
}
