//! Small NLPs with known solutions.

#![allow(dead_code)]

use sqp_core::{ExitStatus, FinalSolution, NlpProblem, NlpSizes, SqpError, SqpResult};

/// Forwards to `inner` and keeps what `finalize_solution` reported.
pub struct Recording<P> {
    pub inner: P,
    pub final_status: Option<ExitStatus>,
    pub final_x: Vec<f64>,
}

impl<P: NlpProblem> Recording<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            final_status: None,
            final_x: Vec::new(),
        }
    }
}

impl<P: NlpProblem> NlpProblem for Recording<P> {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        self.inner.sizes()
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        self.inner.bounds(x_l, x_u, c_l, c_u)
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        self.inner.starting_point(x, lambda)
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        self.inner.eval_objective(x)
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        self.inner.eval_gradient(x, grad)
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        self.inner.eval_constraints(x, c)
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        self.inner.jacobian_structure(rows, cols)
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        self.inner.eval_jacobian(x, values)
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        self.inner.hessian_structure(rows, cols)
    }

    fn eval_hessian(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        self.inner.eval_hessian(x, obj_factor, lambda, values)
    }

    fn finalize_solution(&mut self, solution: &FinalSolution<'_>) {
        self.final_status = Some(solution.status);
        self.final_x = solution.x.to_vec();
    }
}

fn sizes(name: &str, n: usize, m: usize, nnz_jacobian: usize, nnz_hessian: usize) -> NlpSizes {
    NlpSizes {
        num_variables: n,
        num_constraints: m,
        nnz_jacobian,
        nnz_hessian,
        name: name.to_string(),
    }
}

/// min (x0 - 1)^2 + (x1 - 2)^2  s.t.  x0 + x1 = 1, from (0, 0).
///
/// Solution (0, 1), lambda = -2, f = 2.
pub struct EqualityQp;

impl NlpProblem for EqualityQp {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(sizes("equality_qp", 2, 1, 2, 2))
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-1e20);
        x_u.fill(1e20);
        c_l[0] = 1.0;
        c_u[0] = 1.0;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x.fill(0.0);
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok((x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2))
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = 2.0 * (x[0] - 1.0);
        grad[1] = 2.0 * (x[1] - 2.0);
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x[0] + x[1];
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.copy_from_slice(&[0, 0]);
        cols.copy_from_slice(&[0, 1]);
        Ok(())
    }

    fn eval_jacobian(&self, _x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values.fill(1.0);
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.copy_from_slice(&[0, 1]);
        cols.copy_from_slice(&[0, 1]);
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], obj_factor: f64, _lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values.fill(2.0 * obj_factor);
        Ok(())
    }
}

/// min (x - 2)^2  s.t.  -1 <= x <= 0.5, from 0.
///
/// Solution 0.5 with bound multiplier -3.
pub struct BoxedQuadratic;

impl NlpProblem for BoxedQuadratic {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(sizes("boxed_quadratic", 1, 0, 0, 1))
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], _c_l: &mut [f64], _c_u: &mut [f64]) -> SqpResult<()> {
        x_l[0] = -1.0;
        x_u[0] = 0.5;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], _lambda: &mut [f64]) -> SqpResult<()> {
        x[0] = 0.0;
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok((x[0] - 2.0).powi(2))
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = 2.0 * (x[0] - 2.0);
        Ok(())
    }

    fn eval_constraints(&self, _x: &[f64], _c: &mut [f64]) -> SqpResult<()> {
        Ok(())
    }

    fn jacobian_structure(&self, _rows: &mut [usize], _cols: &mut [usize]) -> SqpResult<()> {
        Ok(())
    }

    fn eval_jacobian(&self, _x: &[f64], _values: &mut [f64]) -> SqpResult<()> {
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows[0] = 0;
        cols[0] = 0;
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], obj_factor: f64, _lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = 2.0 * obj_factor;
        Ok(())
    }
}

/// min -x0 x1  s.t.  x0 + x1 = 2, from (0, 2).
///
/// Indefinite Hessian; solution (1, 1), lambda = -1.
pub struct Bilinear;

impl NlpProblem for Bilinear {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(sizes("bilinear", 2, 1, 2, 1))
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-1e20);
        x_u.fill(1e20);
        c_l[0] = 2.0;
        c_u[0] = 2.0;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x.copy_from_slice(&[0.0, 2.0]);
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok(-x[0] * x[1])
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = -x[1];
        grad[1] = -x[0];
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x[0] + x[1];
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.copy_from_slice(&[0, 0]);
        cols.copy_from_slice(&[0, 1]);
        Ok(())
    }

    fn eval_jacobian(&self, _x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values.fill(1.0);
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows[0] = 1;
        cols[0] = 0;
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], obj_factor: f64, _lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = -obj_factor;
        Ok(())
    }
}

/// min 2 (x0^2 + x1^2 - 1) - x0  s.t.  x0^2 + x1^2 = 1.
///
/// Full SQP steps along the circle increase the l1 merit near the solution
/// (1, 0), lambda = 1.5.
pub struct PowellCircle {
    pub theta: f64,
}

impl NlpProblem for PowellCircle {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(sizes("powell_circle", 2, 1, 2, 2))
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-1e20);
        x_u.fill(1e20);
        c_l[0] = 1.0;
        c_u[0] = 1.0;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x[0] = self.theta.cos();
        x[1] = self.theta.sin();
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok(2.0 * (x[0] * x[0] + x[1] * x[1] - 1.0) - x[0])
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = 4.0 * x[0] - 1.0;
        grad[1] = 4.0 * x[1];
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x[0] * x[0] + x[1] * x[1];
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.copy_from_slice(&[0, 0]);
        cols.copy_from_slice(&[0, 1]);
        Ok(())
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = 2.0 * x[0];
        values[1] = 2.0 * x[1];
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.copy_from_slice(&[0, 1]);
        cols.copy_from_slice(&[0, 1]);
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values.fill(4.0 * obj_factor + 2.0 * lambda[0]);
        Ok(())
    }
}

/// [`Bilinear`] whose objective fails once `x0` passes 0.25.
pub struct FailingObjective;

impl NlpProblem for FailingObjective {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Bilinear.sizes()
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        Bilinear.bounds(x_l, x_u, c_l, c_u)
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        Bilinear.starting_point(x, lambda)
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        if x[0] > 0.25 {
            return Err(SqpError::Evaluation(format!("objective undefined at x0 = {}", x[0])));
        }
        Bilinear.eval_objective(x)
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        Bilinear.eval_gradient(x, grad)
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        Bilinear.eval_constraints(x, c)
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        Bilinear.jacobian_structure(rows, cols)
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        Bilinear.eval_jacobian(x, values)
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        Bilinear.hessian_structure(rows, cols)
    }

    fn eval_hessian(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        Bilinear.eval_hessian(x, obj_factor, lambda, values)
    }
}

/// Bounds with `x_l > x_u`.
pub struct CrossedBounds;

impl NlpProblem for CrossedBounds {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        BoxedQuadratic.sizes()
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], _c_l: &mut [f64], _c_u: &mut [f64]) -> SqpResult<()> {
        x_l[0] = 1.0;
        x_u[0] = 0.0;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        BoxedQuadratic.starting_point(x, lambda)
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        BoxedQuadratic.eval_objective(x)
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        BoxedQuadratic.eval_gradient(x, grad)
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        BoxedQuadratic.eval_constraints(x, c)
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        BoxedQuadratic.jacobian_structure(rows, cols)
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        BoxedQuadratic.eval_jacobian(x, values)
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        BoxedQuadratic.hessian_structure(rows, cols)
    }

    fn eval_hessian(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        BoxedQuadratic.eval_hessian(x, obj_factor, lambda, values)
    }
}

/// min x^2 / 2  s.t.  x >= 1.01, from 0.
///
/// A unit radius leaves the linearized constraint violated by 0.01 at best.
pub struct FarHalfspace;

impl NlpProblem for FarHalfspace {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(sizes("far_halfspace", 1, 1, 1, 1))
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l[0] = -1e20;
        x_u[0] = 1e20;
        c_l[0] = 1.01;
        c_u[0] = 1e20;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x[0] = 0.0;
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok(0.5 * x[0] * x[0])
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = x[0];
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x[0];
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows[0] = 0;
        cols[0] = 0;
        Ok(())
    }

    fn eval_jacobian(&self, _x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = 1.0;
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows[0] = 0;
        cols[0] = 0;
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], obj_factor: f64, _lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = obj_factor;
        Ok(())
    }
}
