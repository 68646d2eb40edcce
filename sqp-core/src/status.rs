//! Exit status of an SQP run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::qp::QpStatus;

/// Terminal (or not yet terminal) state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Not terminated yet
    #[default]
    Unknown,

    /// First-order optimality conditions satisfied
    Optimal,

    /// Iteration budget exhausted
    ExceedMaxIter,

    /// Wall-clock budget exhausted
    ExceedTimeLimits,

    /// Trust-region radius fell below its minimum
    TrustRegionTooSmall,

    /// The NLP oracle reported an error or inconsistent data
    InvalidNlp,

    /// QP/LP subproblem could not be solved to optimality
    QpNotOptimal,

    /// QP/LP subproblem is infeasible
    QpInfeasible,

    /// QP/LP subproblem is unbounded
    QpUnbounded,

    /// QP/LP solver hit its iteration limit
    QpExceedMaxIter,

    /// QP/LP solver was asked to optimize before being set up
    QpNotInitialized,

    /// QP/LP solver failed internally
    QpInternalError,

    /// Driver bug (for example, rebuilding an unchanged subproblem)
    InternalError,
}

impl ExitStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExitStatus::Unknown)
    }
}

impl From<QpStatus> for ExitStatus {
    fn from(status: QpStatus) -> Self {
        match status {
            QpStatus::Optimal | QpStatus::NotOptimal | QpStatus::Unknown => {
                ExitStatus::QpNotOptimal
            }
            QpStatus::Infeasible => ExitStatus::QpInfeasible,
            QpStatus::Unbounded => ExitStatus::QpUnbounded,
            QpStatus::ExceedMaxIter => ExitStatus::QpExceedMaxIter,
            QpStatus::NotInitialized => ExitStatus::QpNotInitialized,
            QpStatus::InternalError => ExitStatus::QpInternalError,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Unknown => write!(f, "UNKNOWN"),
            ExitStatus::Optimal => write!(f, "OPTIMAL"),
            ExitStatus::ExceedMaxIter => write!(f, "EXCEED_MAX_ITER"),
            ExitStatus::ExceedTimeLimits => write!(f, "EXCEED_TIME_LIMITS"),
            ExitStatus::TrustRegionTooSmall => write!(f, "TRUST_REGION_TOO_SMALL"),
            ExitStatus::InvalidNlp => write!(f, "INVALID_NLP"),
            ExitStatus::QpNotOptimal => write!(f, "QP_NOT_OPTIMAL"),
            ExitStatus::QpInfeasible => write!(f, "QP_INFEASIBLE"),
            ExitStatus::QpUnbounded => write!(f, "QP_UNBOUNDED"),
            ExitStatus::QpExceedMaxIter => write!(f, "QP_EXCEED_MAX_ITER"),
            ExitStatus::QpNotInitialized => write!(f, "QP_NOT_INITIALIZED"),
            ExitStatus::QpInternalError => write!(f, "QP_INTERNAL_ERROR"),
            ExitStatus::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_is_not_terminal() {
        assert!(!ExitStatus::Unknown.is_terminal());
        assert!(ExitStatus::Optimal.is_terminal());
        assert!(ExitStatus::QpInfeasible.is_terminal());
    }

    #[test]
    fn test_qp_failures_pass_through() {
        assert_eq!(ExitStatus::from(QpStatus::Infeasible), ExitStatus::QpInfeasible);
        assert_eq!(ExitStatus::from(QpStatus::Unbounded), ExitStatus::QpUnbounded);
        assert_eq!(ExitStatus::from(QpStatus::ExceedMaxIter), ExitStatus::QpExceedMaxIter);
        assert_eq!(ExitStatus::from(QpStatus::NotOptimal), ExitStatus::QpNotOptimal);
        assert_eq!(ExitStatus::QpInfeasible.to_string(), "QP_INFEASIBLE");
        assert_eq!(ExitStatus::default().to_string(), "UNKNOWN");
    }
}
