use expinv_algebra::AlgebraError;
use miette::Diagnostic;
use thiserror::Error;

use crate::expr::ExprError;
use crate::normalize::NormalizeError;
use crate::services::ServiceError;

/// Failures that abandon a synthesis attempt.
///
/// Negative outcomes of a completed attempt (no invariant, unknown,
/// exhausted rounds) are verdicts in the report, not errors.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(expinv::config))]
    InvalidConfiguration(String),

    #[error("Sample space has {found} feasible points but {required} are needed")]
    #[diagnostic(
        code(expinv::sample_space),
        help("widen the sampling bounds or lower the degree")
    )]
    InsufficientSampleSpace { found: usize, required: usize },

    #[error("No nonsingular interpolation basis after {probes} draws")]
    #[diagnostic(code(expinv::basis_search))]
    BasisSearchTimeout { probes: usize },

    #[error("{context}: time budget exhausted")]
    #[diagnostic(code(expinv::timeout))]
    Timeout { context: String },

    #[error("{service} failed: {message}")]
    #[diagnostic(code(expinv::solver))]
    Solver { service: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expr(#[from] ExprError),

    #[error("Normalization failed: {0}")]
    #[diagnostic(code(expinv::normalize))]
    Normalize(NormalizeError),

    #[error(transparent)]
    #[diagnostic(code(expinv::algebra))]
    Algebra(#[from] AlgebraError),
}

impl EngineError {
    /// Whether a fresh attempt may succeed where this one did not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout { .. } | EngineError::BasisSearchTimeout { .. }
        )
    }
}

impl From<ServiceError> for EngineError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Timeout { context } => EngineError::Timeout { context },
            ServiceError::Failed { service, message } => EngineError::Solver { service, message },
        }
    }
}

impl From<NormalizeError> for EngineError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Evaluator(inner) => inner.into(),
            NormalizeError::Expr(inner) => EngineError::Expr(inner),
            other => EngineError::Normalize(other),
        }
    }
}
