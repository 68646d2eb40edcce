//! QP/LP subproblems: solver contract, backends and the subproblem builder.

pub mod backend;
pub mod clarabel_backend;
pub mod dump;
pub mod handler;
pub mod layout;
pub mod shadow;

pub use backend::{ProblemType, QpData, QpSolution, QpSolverInterface, QpStatus};
pub use clarabel_backend::{ClarabelBackend, ClarabelSettings};
pub use dump::QpDump;
pub use handler::{DirtyFlags, Linearization, QpHandler};
pub use layout::SubproblemLayout;
pub use shadow::ShadowComparison;

use crate::error::SqpResult;
use crate::options::{QpSolverChoice, SqpOptions};

/// Relative objective tolerance for shadow comparisons.
const SHADOW_OBJECTIVE_TOL: f64 = 1e-6;

/// Instantiate the backend for `choice`, sized for `layout`.
pub fn make_backend(
    choice: QpSolverChoice,
    problem_type: ProblemType,
    layout: &SubproblemLayout,
    options: &SqpOptions,
) -> Box<dyn QpSolverInterface> {
    match choice {
        QpSolverChoice::Clarabel => Box::new(ClarabelBackend::new(
            problem_type,
            layout.num_qp_variables(),
            layout.num_qp_constraints(),
            ClarabelSettings::from_options(options),
        )),
    }
}

/// Subproblem handler with the backends selected in `options`.
pub fn make_handler(
    problem_type: ProblemType,
    layout: SubproblemLayout,
    options: &SqpOptions,
) -> SqpResult<QpHandler> {
    let backend = make_backend(options.qp_solver_choice, problem_type, &layout, options);
    let shadow = options.shadow_qp_solver.map(|choice| {
        ShadowComparison::new(
            make_backend(choice, problem_type, &layout, options),
            SHADOW_OBJECTIVE_TOL,
        )
    });
    Ok(QpHandler::new(layout, problem_type, backend, shadow, options.qp_kkt_tol)?
        .with_active_set_tol(options.active_set_tol))
}
