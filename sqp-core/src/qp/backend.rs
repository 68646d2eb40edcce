//! QP/LP solver contract and the subproblem storage shared by backends.

use serde::{Deserialize, Serialize};

use crate::error::{SqpError, SqpResult};
use crate::linalg::{CompressedColumn, IdentityBlock, SparseTriplet, Vector};
use crate::opt_test::{qp_kkt_error, QpKktError};
use crate::stats::Statistics;

use super::dump::QpDump;

/// Status of a QP/LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QpStatus {
    /// Solved; solution and multipliers available.
    Optimal,

    /// The solver stopped without a trustworthy solution.
    NotOptimal,

    /// The subproblem is infeasible.
    Infeasible,

    /// The subproblem is unbounded.
    Unbounded,

    /// Iteration limit reached.
    ExceedMaxIter,

    /// Asked to optimize before the matrices were installed.
    NotInitialized,

    /// Internal failure of the solver.
    InternalError,

    /// Not solved yet.
    #[default]
    Unknown,
}

/// Whether the subproblem carries a Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    Qp,
    Lp,
}

/// Subproblem data
///
/// ```text
/// minimize    1/2 x^T H x + g^T x
/// subject to  lb_a <= A x <= ub_a
///             lb   <=  x  <= ub
/// ```
///
/// Infinite bounds are stored as `±f64::INFINITY`.
#[derive(Debug, Clone)]
pub struct QpData {
    pub problem_type: ProblemType,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub lb: Vector,
    pub ub: Vector,
    pub lb_a: Vector,
    pub ub_a: Vector,
    pub g: Vector,
    /// Upper-triangular storage; `None` for LPs and before the first install.
    pub hessian: Option<CompressedColumn>,
    pub jacobian: Option<CompressedColumn>,
}

impl QpData {
    pub fn new(problem_type: ProblemType, num_variables: usize, num_constraints: usize) -> Self {
        Self {
            problem_type,
            num_variables,
            num_constraints,
            lb: Vector::filled(num_variables, f64::NEG_INFINITY),
            ub: Vector::filled(num_variables, f64::INFINITY),
            lb_a: Vector::filled(num_constraints, f64::NEG_INFINITY),
            ub_a: Vector::filled(num_constraints, f64::INFINITY),
            g: Vector::new(num_variables),
            hessian: None,
            jacobian: None,
        }
    }

    /// Install the Hessian in the top-left block. Structure on the first
    /// call, values afterwards.
    pub fn set_hessian(&mut self, hessian: &SparseTriplet) -> SqpResult<()> {
        if self.problem_type == ProblemType::Lp {
            return Err(SqpError::Structure("an LP has no Hessian".to_string()));
        }
        match self.hessian.as_mut() {
            Some(h) => h.update_values(hessian),
            None => {
                self.hessian = Some(CompressedColumn::from_triplet_embedded(
                    hessian,
                    self.num_variables,
                    self.num_variables,
                    &[],
                )?);
                Ok(())
            }
        }
    }

    /// Install `[jacobian | identity blocks]`. Structure on the first call,
    /// values afterwards.
    pub fn set_jacobian(
        &mut self,
        jacobian: &SparseTriplet,
        identities: &[IdentityBlock],
    ) -> SqpResult<()> {
        match self.jacobian.as_mut() {
            Some(a) => a.update_values(jacobian),
            None => {
                self.jacobian = Some(CompressedColumn::from_triplet_embedded(
                    jacobian,
                    self.num_constraints,
                    self.num_variables,
                    identities,
                )?);
                Ok(())
            }
        }
    }

    /// Whether the matrices needed for a solve are installed.
    pub fn is_ready(&self) -> bool {
        let jacobian_ready = self.jacobian.is_some() || self.num_constraints == 0;
        let hessian_ready = self.problem_type == ProblemType::Lp || self.hessian.is_some();
        jacobian_ready && hessian_ready
    }

    /// A x
    pub fn constraint_values(&self, x: &[f64]) -> Vector {
        match &self.jacobian {
            Some(a) => a.times(x),
            None => Vector::new(self.num_constraints),
        }
    }

    /// H x (zero for LPs)
    pub fn hessian_times(&self, x: &[f64]) -> Vector {
        match &self.hessian {
            Some(h) => h.times(x),
            None => Vector::new(self.num_variables),
        }
    }

    /// 1/2 x^T H x + g^T x
    pub fn objective(&self, x: &[f64]) -> f64 {
        let hx = self.hessian_times(x);
        0.5 * hx.dot(x) + self.g.dot(x)
    }
}

/// Primal/dual solution of the last successful solve.
///
/// Multipliers follow the convention `H x + g = A^T lambda + mu`, with
/// lower-bound multipliers nonnegative and upper-bound multipliers
/// nonpositive.
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub x: Vector,
    pub bound_multipliers: Vector,
    pub constraint_multipliers: Vector,
    pub objective: f64,
    pub iterations: usize,
}

/// Numeric QP/LP engine as consumed by the subproblem builder.
///
/// Implementors own a [`QpData`] and expose it through [`data`](Self::data)
/// and [`data_mut`](Self::data_mut). The provided methods implement the
/// setters and getters on top of it, so a backend only has to supply
/// [`optimize`](Self::optimize).
pub trait QpSolverInterface {
    fn name(&self) -> &'static str;

    fn data(&self) -> &QpData;

    fn data_mut(&mut self) -> &mut QpData;

    /// Solve the current subproblem.
    fn optimize(&mut self, stats: &mut Statistics) -> QpStatus;

    /// Status of the last solve.
    fn status(&self) -> QpStatus;

    /// Solution of the last successful solve.
    fn solution(&self) -> Option<&QpSolution>;

    /// Drop incremental state so the next solve starts from scratch.
    fn reset(&mut self) {}

    fn set_lower_variable_bound(&mut self, index: usize, value: f64) {
        self.data_mut().lb[index] = value;
    }

    fn set_upper_variable_bound(&mut self, index: usize, value: f64) {
        self.data_mut().ub[index] = value;
    }

    fn set_lower_constraint_bound(&mut self, index: usize, value: f64) {
        self.data_mut().lb_a[index] = value;
    }

    fn set_upper_constraint_bound(&mut self, index: usize, value: f64) {
        self.data_mut().ub_a[index] = value;
    }

    fn set_linear_objective_coefficient(&mut self, index: usize, value: f64) {
        self.data_mut().g[index] = value;
    }

    fn set_objective_hessian(&mut self, hessian: &SparseTriplet) -> SqpResult<()> {
        self.data_mut().set_hessian(hessian)
    }

    fn set_constraint_jacobian(
        &mut self,
        jacobian: &SparseTriplet,
        identities: &[IdentityBlock],
    ) -> SqpResult<()> {
        self.data_mut().set_jacobian(jacobian, identities)
    }

    fn primal_solution(&self) -> &[f64] {
        self.solution().map(|s| s.x.values()).unwrap_or(&[])
    }

    fn bound_multipliers(&self) -> &[f64] {
        self.solution()
            .map(|s| s.bound_multipliers.values())
            .unwrap_or(&[])
    }

    fn constraint_multipliers(&self) -> &[f64] {
        self.solution()
            .map(|s| s.constraint_multipliers.values())
            .unwrap_or(&[])
    }

    fn objective_value(&self) -> f64 {
        self.solution().map(|s| s.objective).unwrap_or(f64::INFINITY)
    }

    /// KKT residuals of the last solution against the stored subproblem.
    fn kkt_error(&self) -> QpKktError {
        match self.solution() {
            Some(sol) => qp_kkt_error(self.data(), sol),
            None => QpKktError::infinite(),
        }
    }

    /// Snapshot of the current subproblem.
    fn dump(&self) -> SqpResult<QpDump> {
        QpDump::from_data(self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_defaults_are_unbounded() {
        let data = QpData::new(ProblemType::Lp, 2, 1);
        assert_eq!(data.lb[0], f64::NEG_INFINITY);
        assert_eq!(data.ub_a[0], f64::INFINITY);
        assert!(!data.is_ready());
    }

    #[test]
    fn test_lp_rejects_hessian() {
        let mut data = QpData::new(ProblemType::Lp, 1, 0);
        let h = SparseTriplet::from_entries(1, 1, true, vec![(0, 0, 1.0)]).unwrap();
        assert!(data.set_hessian(&h).is_err());
        assert!(data.is_ready());
    }

    #[test]
    fn test_objective_uses_embedded_hessian() {
        // H = [[2]] embedded in a 2-variable QP, g = [1, 3]
        let mut data = QpData::new(ProblemType::Qp, 2, 0);
        let h = SparseTriplet::from_entries(1, 1, true, vec![(0, 0, 2.0)]).unwrap();
        data.set_hessian(&h).unwrap();
        data.g.copy_from(&[1.0, 3.0]);
        // 1/2 * 2 * 1^2 + 1 + 3 * 2
        assert!((data.objective(&[1.0, 2.0]) - 8.0).abs() < 1e-12);
    }
}
