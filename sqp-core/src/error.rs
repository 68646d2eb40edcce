//! Error types for the SQP driver.

use thiserror::Error;

/// Errors that can occur while setting up or running the SQP driver.
///
/// QP solver failures are not errors: they surface as
/// [`crate::qp::QpStatus`] and become an exit status of the run.
#[derive(Error, Debug)]
pub enum SqpError {
    /// The oracle reported inconsistent sizes or bounds
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// An oracle evaluation failed
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// A subproblem rebuild was requested with no component marked dirty.
    ///
    /// This always indicates a bug in the iteration logic.
    #[error("QP subproblem rebuild requested but nothing changed")]
    QpUnchanged,

    /// Sparse structure misuse (set twice, wrong length, index out of range)
    #[error("Sparse structure error: {0}")]
    Structure(String),

    /// The QP backend could not be constructed
    #[error("QP backend error: {0}")]
    QpBackend(String),

    /// Failure writing or reading a subproblem dump
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure encoding or decoding a subproblem dump
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for SQP operations.
pub type SqpResult<T> = Result<T, SqpError>;
