//! Trust-region SQP driver for smooth constrained nonlinear programs.
//!
//! Solves
//!
//! ```text
//! minimize    f(x)
//! subject to  c_l <= c(x) <= c_u
//!             x_l <=  x   <= x_u
//! ```
//!
//! given only an oracle for values, gradients, the sparse constraint Jacobian
//! and the sparse Lagrangian Hessian (see [`NlpProblem`]).
//!
//! # Algorithm
//!
//! Each iteration solves an l1-penalized QP inside an infinity-norm trust
//! region:
//!
//! - **Elastic subproblem**: every linearized constraint gets a slack pair,
//!   so the QP is always feasible
//! - **Penalty steering**: an LP measures the achievable infeasibility
//!   reduction and the penalty grows until the step captures enough of it
//! - **l1 merit ratio test** with a radius update driven by model agreement
//! - **Second-order correction** of rejected steps against the Maratos effect
//!
//! Subproblems go through the [`qp::QpSolverInterface`] trait; the bundled
//! backend uses Clarabel.
//!
//! # Example
//!
//! ```ignore
//! use sqp_core::{solve, SqpOptions};
//!
//! let outcome = solve(my_problem, &SqpOptions::default())?;
//! println!("Status: {}", outcome.status);
//! println!("Objective: {}", outcome.objective);
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod algorithm;
pub mod classify;
pub mod error;
pub mod linalg;
pub mod nlp;
pub mod options;
pub mod qp;
pub mod stats;
pub mod status;

pub use algorithm::{Algorithm, IterationRecord, Phase};
pub use classify::{ActivityStatus, ConstraintKind, INFINITE_BOUND};
pub use error::{SqpError, SqpResult};
pub use nlp::{FinalSolution, NlpProblem, NlpSizes};
pub use opt_test::OptimalityStatus;
pub use options::{Formulation, QpSolverChoice, SqpOptions};
pub use stats::Statistics;
pub use status::ExitStatus;

use serde::{Deserialize, Serialize};

/// Result of [`solve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub status: ExitStatus,
    pub x: Vec<f64>,
    pub objective: f64,
    pub constraint_values: Vec<f64>,
    pub infeasibility: f64,
    pub bound_multipliers: Vec<f64>,
    pub constraint_multipliers: Vec<f64>,
    pub bound_activity: Vec<ActivityStatus>,
    pub constraint_activity: Vec<ActivityStatus>,
    pub optimality: OptimalityStatus,
    pub rho: f64,
    pub delta: f64,
    pub stats: Statistics,
    pub history: Vec<IterationRecord>,
}

impl<N: NlpProblem> From<&Algorithm<N>> for SolveOutcome {
    fn from(alg: &Algorithm<N>) -> Self {
        Self {
            status: alg.exit_status(),
            x: alg.x().values().to_vec(),
            objective: alg.objective(),
            constraint_values: alg.constraint_values().values().to_vec(),
            infeasibility: alg.infeasibility(),
            bound_multipliers: alg.bound_multipliers().values().to_vec(),
            constraint_multipliers: alg.constraint_multipliers().values().to_vec(),
            bound_activity: alg.bound_activity().to_vec(),
            constraint_activity: alg.constraint_activity().to_vec(),
            optimality: *alg.optimality_status(),
            rho: alg.rho(),
            delta: alg.delta(),
            stats: alg.stats().clone(),
            history: alg.history().to_vec(),
        }
    }
}

/// Solve `nlp` with `options`.
///
/// Subproblem failures and iteration limits are reported through
/// [`SolveOutcome::status`]. An `Err` means the problem could not be set up
/// or an oracle call failed mid-run; in the latter case the last committed
/// iterate has already been passed to [`NlpProblem::finalize_solution`].
pub fn solve<N: NlpProblem>(nlp: N, options: &SqpOptions) -> SqpResult<SolveOutcome> {
    let mut alg = Algorithm::new(nlp, options.clone())?;
    alg.optimize()?;
    Ok(SolveOutcome::from(&alg))
}
