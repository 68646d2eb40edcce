//! QP/LP backend on top of the Clarabel interior-point solver.
//!
//! Clarabel solves
//!
//! ```text
//! minimize    1/2 x^T P x + q^T x
//! subject to  A x + s = b,  s in K
//! ```
//!
//! Two-sided rows and variable bounds are split into conic rows:
//! - `lb == ub`: zero-cone row `a x = ub`
//! - finite `ub`: nonnegative row `a x <= ub`
//! - finite `lb`: nonnegative row `-a x <= -lb`
//!
//! Equality rows come first. Multipliers are folded back to one value per
//! bound pair: `lambda = z_lower - z_upper`, and `lambda = -z` for equalities.

use clarabel::algebra::CscMatrix;
use clarabel::solver::SupportedConeT::{self, NonnegativeConeT, ZeroConeT};
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus};
use sprs::TriMat;

use crate::classify::INFINITE_BOUND;
use crate::linalg::{SparseCsc, Vector};
use crate::options::SqpOptions;
use crate::stats::Statistics;

use super::backend::{ProblemType, QpData, QpSolution, QpSolverInterface, QpStatus};

/// Which conic row a bound produced.
#[derive(Debug, Clone, Copy)]
enum Side {
    Equal,
    Upper,
    Lower,
}

/// Source of a conic row: variable bound or linear constraint.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Variable(usize),
    Constraint(usize),
}

/// Clarabel settings relevant to subproblem solves.
#[derive(Debug, Clone)]
pub struct ClarabelSettings {
    pub max_iter: u32,
    pub tol_feas: f64,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    pub verbose: bool,
}

impl Default for ClarabelSettings {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol_feas: 1e-9,
            tol_gap_abs: 1e-9,
            tol_gap_rel: 1e-9,
            verbose: false,
        }
    }
}

impl ClarabelSettings {
    pub fn from_options(options: &SqpOptions) -> Self {
        Self {
            max_iter: u32::try_from(options.qp_iter_max).unwrap_or(u32::MAX),
            verbose: options.print_level >= 4,
            ..Self::default()
        }
    }
}

pub struct ClarabelBackend {
    data: QpData,
    settings: ClarabelSettings,
    status: QpStatus,
    solution: Option<QpSolution>,
}

impl ClarabelBackend {
    pub fn new(
        problem_type: ProblemType,
        num_variables: usize,
        num_constraints: usize,
        settings: ClarabelSettings,
    ) -> Self {
        Self {
            data: QpData::new(problem_type, num_variables, num_constraints),
            settings,
            status: QpStatus::Unknown,
            solution: None,
        }
    }

    /// Rebuild a backend around previously captured subproblem storage.
    pub fn from_data(data: QpData, settings: ClarabelSettings) -> Self {
        Self {
            data,
            settings,
            status: QpStatus::Unknown,
            solution: None,
        }
    }

    fn solve_once(&mut self, stats: &mut Statistics) -> QpStatus {
        if !self.data.is_ready() {
            return QpStatus::NotInitialized;
        }
        let n = self.data.num_variables;
        let m = self.data.num_constraints;

        let rows = conic_rows(&self.data);
        let num_eq = rows.iter().filter(|r| matches!(r.1, Side::Equal)).count();
        let num_rows = rows.len();

        // Row i of the linear constraints, gathered once per solve.
        let mut constraint_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); m];
        if let Some(a) = &self.data.jacobian {
            let (col_ptr, row_idx, vals) = (a.col_ptr(), a.row_indices(), a.values());
            for j in 0..a.num_cols() {
                for k in col_ptr[j]..col_ptr[j + 1] {
                    constraint_rows[row_idx[k]].push((j, vals[k]));
                }
            }
        }

        let mut tri = TriMat::new((num_rows, n));
        let mut b = Vec::with_capacity(num_rows);
        for (r, &(origin, side)) in rows.iter().enumerate() {
            let (sign, rhs) = match (origin, side) {
                (Origin::Variable(j), Side::Lower) => (-1.0, -self.data.lb[j]),
                (Origin::Variable(j), _) => (1.0, self.data.ub[j]),
                (Origin::Constraint(i), Side::Lower) => (-1.0, -self.data.lb_a[i]),
                (Origin::Constraint(i), _) => (1.0, self.data.ub_a[i]),
            };
            match origin {
                Origin::Variable(j) => tri.add_triplet(r, j, sign),
                Origin::Constraint(i) => {
                    for &(j, v) in &constraint_rows[i] {
                        tri.add_triplet(r, j, sign * v);
                    }
                }
            }
            b.push(rhs);
        }
        let a_csc = to_clarabel(&tri.to_csc());
        let p_csc = match &self.data.hessian {
            Some(h) => to_clarabel(&h.to_csc()),
            None => CscMatrix::zeros((n, n)),
        };

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if num_eq > 0 {
            cones.push(ZeroConeT(num_eq));
        }
        if num_rows > num_eq {
            cones.push(NonnegativeConeT(num_rows - num_eq));
        }

        let settings = match DefaultSettingsBuilder::default()
            .max_iter(self.settings.max_iter)
            .verbose(self.settings.verbose)
            .tol_feas(self.settings.tol_feas)
            .tol_gap_abs(self.settings.tol_gap_abs)
            .tol_gap_rel(self.settings.tol_gap_rel)
            .build()
        {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Invalid Clarabel settings: {:?}", e);
                return QpStatus::InternalError;
            }
        };

        let mut solver = DefaultSolver::new(&p_csc, self.data.g.values(), &a_csc, &b, &cones, settings);
        solver.solve();

        let iterations = solver.info.iterations as usize;
        stats.qp_iter_add(iterations);

        let status = map_status(solver.solution.status);
        if status != QpStatus::Optimal {
            log::debug!(
                "Clarabel stopped with {:?} after {} iterations",
                solver.solution.status,
                iterations
            );
            return status;
        }

        let z = &solver.solution.z;
        let mut bound_multipliers = Vector::new(n);
        let mut constraint_multipliers = Vector::new(m);
        for (r, &(origin, side)) in rows.iter().enumerate() {
            let value = match side {
                Side::Lower => z[r],
                Side::Upper | Side::Equal => -z[r],
            };
            match origin {
                Origin::Variable(j) => bound_multipliers[j] += value,
                Origin::Constraint(i) => constraint_multipliers[i] += value,
            }
        }

        let x = Vector::from_slice(&solver.solution.x);
        let objective = self.data.objective(x.values());
        self.solution = Some(QpSolution {
            x,
            bound_multipliers,
            constraint_multipliers,
            objective,
            iterations,
        });
        QpStatus::Optimal
    }
}

impl QpSolverInterface for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn data(&self) -> &QpData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut QpData {
        &mut self.data
    }

    fn optimize(&mut self, stats: &mut Statistics) -> QpStatus {
        self.status = self.solve_once(stats);
        self.status
    }

    fn status(&self) -> QpStatus {
        self.status
    }

    fn solution(&self) -> Option<&QpSolution> {
        match self.status {
            QpStatus::Optimal => self.solution.as_ref(),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.status = QpStatus::Unknown;
        self.solution = None;
    }
}

fn is_finite(bound: f64) -> bool {
    bound.abs() < INFINITE_BOUND
}

/// Conic rows in solver order: equalities first, then inequalities.
fn conic_rows(data: &QpData) -> Vec<(Origin, Side)> {
    let mut equalities = Vec::new();
    let mut inequalities = Vec::new();
    let pairs = data
        .lb
        .iter()
        .zip(data.ub.iter())
        .enumerate()
        .map(|(j, (&l, &u))| (Origin::Variable(j), l, u))
        .chain(
            data.lb_a
                .iter()
                .zip(data.ub_a.iter())
                .enumerate()
                .map(|(i, (&l, &u))| (Origin::Constraint(i), l, u)),
        );
    for (origin, lower, upper) in pairs {
        if is_finite(lower) && is_finite(upper) && lower == upper {
            equalities.push((origin, Side::Equal));
            continue;
        }
        if is_finite(upper) {
            inequalities.push((origin, Side::Upper));
        }
        if is_finite(lower) {
            inequalities.push((origin, Side::Lower));
        }
    }
    equalities.extend(inequalities);
    equalities
}

fn map_status(status: SolverStatus) -> QpStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => QpStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            QpStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => QpStatus::Unbounded,
        SolverStatus::MaxIterations => QpStatus::ExceedMaxIter,
        SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
            QpStatus::InternalError
        }
        _ => QpStatus::NotOptimal,
    }
}

/// sprs CSC to Clarabel CSC.
fn to_clarabel(mat: &SparseCsc) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(mat.cols() + 1);
    let mut rowval = Vec::with_capacity(mat.nnz());
    let mut nzval = Vec::with_capacity(mat.nnz());
    colptr.push(0);
    for col in mat.outer_iterator() {
        for (row, &value) in col.iter() {
            rowval.push(row);
            nzval.push(value);
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(mat.rows(), mat.cols(), colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{IdentityBlock, SparseTriplet};

    fn backend(problem_type: ProblemType, n: usize, m: usize) -> ClarabelBackend {
        ClarabelBackend::new(problem_type, n, m, ClarabelSettings::default())
    }

    #[test]
    fn test_bounded_quadratic() {
        // min (x - 2)^2 = x^2 - 4x s.t. -1 <= x <= 1  ->  x = 1, mu = -2
        let mut qp = backend(ProblemType::Qp, 1, 0);
        let h = SparseTriplet::from_entries(1, 1, true, vec![(0, 0, 2.0)]).unwrap();
        qp.set_objective_hessian(&h).unwrap();
        qp.set_linear_objective_coefficient(0, -4.0);
        qp.set_lower_variable_bound(0, -1.0);
        qp.set_upper_variable_bound(0, 1.0);

        let mut stats = Statistics::new();
        assert_eq!(qp.optimize(&mut stats), QpStatus::Optimal);
        assert!((qp.primal_solution()[0] - 1.0).abs() < 1e-6);
        // H x + g = mu at the upper bound
        assert!((qp.bound_multipliers()[0] + 2.0).abs() < 1e-5);
        assert!((qp.objective_value() + 3.0).abs() < 1e-6);
        assert_eq!(stats.qp_solves, 1);
        assert!(qp.kkt_error().worst() < 1e-6);
    }

    #[test]
    fn test_equality_row_multiplier_sign() {
        // min 1/2 (x0^2 + x1^2) s.t. x0 + x1 = 2  ->  x = (1, 1), lambda = 1
        let mut qp = backend(ProblemType::Qp, 2, 1);
        let h = SparseTriplet::from_entries(2, 2, true, vec![(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
        let a = SparseTriplet::from_entries(1, 2, false, vec![(0, 0, 1.0), (0, 1, 1.0)]).unwrap();
        qp.set_objective_hessian(&h).unwrap();
        qp.set_constraint_jacobian(&a, &[]).unwrap();
        qp.set_lower_constraint_bound(0, 2.0);
        qp.set_upper_constraint_bound(0, 2.0);

        let mut stats = Statistics::new();
        assert_eq!(qp.optimize(&mut stats), QpStatus::Optimal);
        let x = qp.primal_solution();
        assert!((x[0] - 1.0).abs() < 1e-6 && (x[1] - 1.0).abs() < 1e-6);
        assert!((qp.constraint_multipliers()[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_penalty_lp_with_identity_blocks() {
        // min p + 10 (u + v) s.t. p + u - v >= 1, -0.5 <= p <= 0.5, u, v >= 0
        // -> p = 0.5, u = 0.5
        let mut lp = backend(ProblemType::Lp, 3, 1);
        let a = SparseTriplet::from_entries(1, 1, false, vec![(0, 0, 1.0)]).unwrap();
        lp.set_constraint_jacobian(
            &a,
            &[
                IdentityBlock::new(0, 1, 1, 1.0),
                IdentityBlock::new(0, 2, 1, -1.0),
            ],
        )
        .unwrap();
        for (j, g) in [1.0, 10.0, 10.0].into_iter().enumerate() {
            lp.set_linear_objective_coefficient(j, g);
        }
        lp.set_lower_variable_bound(0, -0.5);
        lp.set_upper_variable_bound(0, 0.5);
        lp.set_lower_variable_bound(1, 0.0);
        lp.set_lower_variable_bound(2, 0.0);
        lp.set_lower_constraint_bound(0, 1.0);

        let mut stats = Statistics::new();
        assert_eq!(lp.optimize(&mut stats), QpStatus::Optimal);
        let x = lp.primal_solution();
        assert!((x[0] - 0.5).abs() < 1e-6);
        assert!((x[1] - 0.5).abs() < 1e-6);
        assert!(x[2].abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_rows() {
        // x >= 1 and x <= -1 through two constraint rows
        let mut lp = backend(ProblemType::Lp, 1, 2);
        let a = SparseTriplet::from_entries(2, 1, false, vec![(0, 0, 1.0), (1, 0, 1.0)]).unwrap();
        lp.set_constraint_jacobian(&a, &[]).unwrap();
        lp.set_lower_constraint_bound(0, 1.0);
        lp.set_upper_constraint_bound(1, -1.0);

        let mut stats = Statistics::new();
        assert_eq!(lp.optimize(&mut stats), QpStatus::Infeasible);
        assert!(lp.solution().is_none());
        assert!(lp.primal_solution().is_empty());
    }

    #[test]
    fn test_missing_hessian_is_not_initialized() {
        let mut qp = backend(ProblemType::Qp, 1, 0);
        let mut stats = Statistics::new();
        assert_eq!(qp.optimize(&mut stats), QpStatus::NotInitialized);
        assert_eq!(stats.qp_solves, 0);
    }
}
