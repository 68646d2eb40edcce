//! Configuration for the SQP driver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// QP/LP backend used for the subproblems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QpSolverChoice {
    /// Clarabel interior-point solver.
    #[default]
    Clarabel,
}

impl QpSolverChoice {
    fn from_env_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "clarabel" => Some(QpSolverChoice::Clarabel),
            _ => None,
        }
    }
}

/// Shape of the QP subproblem.
///
/// Chosen once per run; both the step QP and the penalty LP use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Formulation {
    /// Variables `[p, u, v]`, constraints `c_l - c_k <= J p + u - v <= c_u - c_k`,
    /// variable bounds folded into the step bounds.
    #[default]
    Compact,

    /// Variable bounds become extra rows with their own slack pair, so the
    /// step is only bounded by the trust region.
    SlackRange,
}

/// SQP driver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqpOptions {
    // === Trust region ===
    /// Shrink the radius when ared < eta_c * pred.
    pub eta_c: f64,

    /// Accept the trial point when ared >= eta_s * pred.
    pub eta_s: f64,

    /// Grow the radius when ared > eta_e * pred and the step hits the boundary.
    pub eta_e: f64,

    /// Radius scale-down factor.
    pub gamma_c: f64,

    /// Radius scale-up factor.
    pub gamma_e: f64,

    /// Initial radius.
    pub delta_0: f64,

    /// Radius below which the run stops with TRUST_REGION_TOO_SMALL.
    pub delta_min: f64,

    /// Radius ceiling.
    pub delta_max: f64,

    // === Penalty ===
    /// Initial penalty weight.
    pub rho_0: f64,

    /// Penalty ceiling.
    pub rho_max: f64,

    /// Geometric growth factor for the penalty.
    pub increase_parm: f64,

    /// Required fraction of the achievable infeasibility reduction.
    pub eps1: f64,

    /// Rate at which eps1 moves toward 1 after an accepted increase.
    pub eps1_change_parm: f64,

    /// Required predicted reduction, as a fraction of rho times the
    /// infeasibility improvement.
    pub eps2: f64,

    /// Penalty trials per outer iteration.
    pub penalty_iter_max: usize,

    /// Penalty trials over the whole run.
    pub penalty_iter_max_total: usize,

    /// Enable the penalty update.
    pub penalty_update: bool,

    /// Model infeasibility that triggers a penalty update.
    pub penalty_update_tol: f64,

    // === Termination ===
    /// General comparison tolerance (ratio test noise floor, boundary test).
    pub tol: f64,

    /// Stationarity tolerance.
    pub opt_tol: f64,

    /// Primal feasibility tolerance.
    pub opt_prim_fea_tol: f64,

    /// Dual sign tolerance.
    pub opt_dual_fea_tol: f64,

    /// Complementarity tolerance.
    pub opt_compl_tol: f64,

    /// Distance to a bound at which it counts as active.
    pub active_set_tol: f64,

    /// Outer iteration limit.
    pub iter_max: usize,

    /// Wall-clock limit in seconds.
    pub time_max: f64,

    // === Subproblem ===
    /// Run a second-order correction on rejected steps.
    pub second_order_correction: bool,

    /// QP/LP backend.
    pub qp_solver_choice: QpSolverChoice,

    /// Subproblem shape.
    pub formulation: Formulation,

    /// Iteration limit handed to the QP/LP backend.
    pub qp_iter_max: usize,

    /// Tolerance of the KKT re-check applied to every subproblem solution.
    pub qp_kkt_tol: f64,

    /// Optional second backend solved alongside the primary one for comparison.
    pub shadow_qp_solver: Option<QpSolverChoice>,

    /// Directory for subproblem dumps written on fatal QP failures.
    pub dump_dir: Option<PathBuf>,

    // === Output ===
    /// 0 = silent, 1 = summary, 2+ = iteration table on stdout.
    pub print_level: u8,
}

impl Default for SqpOptions {
    fn default() -> Self {
        let iter_max = std::env::var("SQP_ITER_MAX")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(100);
        let print_level = std::env::var("SQP_PRINT_LEVEL")
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(0);
        let qp_solver_choice = std::env::var("SQP_QP_SOLVER")
            .ok()
            .and_then(|s| QpSolverChoice::from_env_name(&s))
            .unwrap_or_default();

        Self {
            // Trust region
            eta_c: 0.25,
            eta_s: 1e-8,
            eta_e: 0.75,
            gamma_c: 0.5,
            gamma_e: 2.0,
            delta_0: 1.0,
            delta_min: 1e-12,
            delta_max: 1e8,

            // Penalty
            rho_0: 1.0,
            rho_max: 1e6,
            increase_parm: 10.0,
            eps1: 0.3,
            eps1_change_parm: 0.1,
            eps2: 1e-6,
            penalty_iter_max: 10,
            penalty_iter_max_total: 100,
            penalty_update: true,
            penalty_update_tol: 1e-8,

            // Termination
            tol: 1e-8,
            opt_tol: 1e-5,
            opt_prim_fea_tol: 1e-5,
            opt_dual_fea_tol: 1e-6,
            opt_compl_tol: 1e-6,
            active_set_tol: 1e-5,
            iter_max,
            time_max: 1e10,

            // Subproblem
            second_order_correction: true,
            qp_solver_choice,
            formulation: Formulation::default(),
            qp_iter_max: 100,
            qp_kkt_tol: 1e-6,
            shadow_qp_solver: None,
            dump_dir: None,

            // Output
            print_level,
        }
    }
}

impl SqpOptions {
    /// Options with the iteration table enabled.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.print_level = 2;
        s
    }

    pub fn with_iter_max(mut self, iter_max: usize) -> Self {
        self.iter_max = iter_max;
        self
    }

    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_max = seconds;
        self
    }

    pub fn with_formulation(mut self, formulation: Formulation) -> Self {
        self.formulation = formulation;
        self
    }

    pub fn with_second_order_correction(mut self, enabled: bool) -> Self {
        self.second_order_correction = enabled;
        self
    }

    pub fn with_shadow_solver(mut self, choice: QpSolverChoice) -> Self {
        self.shadow_qp_solver = Some(choice);
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }
}
