//! NLP oracle contract.
//!
//! The driver never computes derivatives itself. Everything it knows about
//! the problem
//!
//! ```text
//! minimize    f(x)
//! subject to  c_l <= c(x) <= c_u
//!             x_l <=  x   <= x_u
//! ```
//!
//! comes through [`NlpProblem`]. Bounds at or beyond ±1e20 are infinite.
//!
//! # Multiplier convention
//!
//! At a KKT point the driver's multipliers satisfy
//! `grad f = J^T lambda + mu`, with multipliers of active lower bounds
//! nonnegative and of active upper bounds nonpositive. The Hessian callback
//! follows the usual oracle convention
//! `obj_factor * hess f + sum_i lambda_i * hess c_i`, so the driver passes
//! `-lambda` to obtain the Hessian of `f - lambda^T c`.

use crate::classify::ActivityStatus;
use crate::error::SqpResult;
use crate::stats::Statistics;
use crate::status::ExitStatus;

/// Problem dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NlpSizes {
    pub num_variables: usize,
    pub num_constraints: usize,
    pub nnz_jacobian: usize,
    /// Nonzeros of one triangle of the Lagrangian Hessian.
    pub nnz_hessian: usize,
    /// Used to name dump files.
    pub name: String,
}

/// Everything reported back to the oracle at the end of a run.
#[derive(Debug, Clone, Copy)]
pub struct FinalSolution<'a> {
    pub status: ExitStatus,
    pub x: &'a [f64],
    pub bound_multipliers: &'a [f64],
    pub bound_activity: &'a [ActivityStatus],
    pub constraint_values: &'a [f64],
    pub constraint_multipliers: &'a [f64],
    pub constraint_activity: &'a [ActivityStatus],
    pub objective_value: f64,
    pub stats: &'a Statistics,
}

/// A nonlinear program as seen by the SQP driver.
///
/// Structure callbacks are called once, at initialization. Value callbacks
/// are called repeatedly and must write exactly as many entries as the
/// corresponding structure.
pub trait NlpProblem {
    fn sizes(&self) -> SqpResult<NlpSizes>;

    /// Fill variable and constraint bounds.
    fn bounds(
        &self,
        x_l: &mut [f64],
        x_u: &mut [f64],
        c_l: &mut [f64],
        c_u: &mut [f64],
    ) -> SqpResult<()>;

    /// Fill the starting point and initial constraint multipliers.
    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()>;

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64>;

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()>;

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()>;

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()>;

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()>;

    /// One triangle of the Lagrangian Hessian; never both entries of an
    /// off-diagonal pair.
    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()>;

    /// `obj_factor * hess f(x) + sum_i lambda_i * hess c_i(x)`.
    fn eval_hessian(
        &self,
        x: &[f64],
        obj_factor: f64,
        lambda: &[f64],
        values: &mut [f64],
    ) -> SqpResult<()>;

    /// Receive the final iterate. Default does nothing.
    fn finalize_solution(&mut self, _solution: &FinalSolution<'_>) {}
}

impl<P: NlpProblem + ?Sized> NlpProblem for &mut P {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        (**self).sizes()
    }

    fn bounds(
        &self,
        x_l: &mut [f64],
        x_u: &mut [f64],
        c_l: &mut [f64],
        c_u: &mut [f64],
    ) -> SqpResult<()> {
        (**self).bounds(x_l, x_u, c_l, c_u)
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        (**self).starting_point(x, lambda)
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        (**self).eval_objective(x)
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        (**self).eval_gradient(x, grad)
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        (**self).eval_constraints(x, c)
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        (**self).jacobian_structure(rows, cols)
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        (**self).eval_jacobian(x, values)
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        (**self).hessian_structure(rows, cols)
    }

    fn eval_hessian(
        &self,
        x: &[f64],
        obj_factor: f64,
        lambda: &[f64],
        values: &mut [f64],
    ) -> SqpResult<()> {
        (**self).eval_hessian(x, obj_factor, lambda, values)
    }

    fn finalize_solution(&mut self, solution: &FinalSolution<'_>) {
        (**self).finalize_solution(solution)
    }
}
