//! Benchmark problems.

use clap::ValueEnum;
use sqp_core::{NlpProblem, NlpSizes, SqpResult};

const INF: f64 = 1e20;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemChoice {
    All,
    Hs071,
    Powell,
    RosenbrockDisk,
    Sphere,
}

/// A benchmark problem with an optional known optimal objective.
pub struct BenchProblem {
    pub nlp: Box<dyn NlpProblem>,
    pub reference_objective: Option<f64>,
}

/// Problems selected by `choice`; `size` scales the sphere problem.
pub fn select(choice: ProblemChoice, size: usize) -> Vec<BenchProblem> {
    let all = [
        ProblemChoice::Hs071,
        ProblemChoice::Powell,
        ProblemChoice::RosenbrockDisk,
        ProblemChoice::Sphere,
    ];
    let chosen: Vec<ProblemChoice> = match choice {
        ProblemChoice::All => all.to_vec(),
        single => vec![single],
    };
    chosen
        .into_iter()
        .map(|c| match c {
            ProblemChoice::Hs071 => BenchProblem {
                nlp: Box::new(Hs071),
                reference_objective: Some(17.014_017_3),
            },
            ProblemChoice::Powell => BenchProblem {
                nlp: Box::new(PowellCircle { theta: 0.8 }),
                reference_objective: Some(-1.0),
            },
            ProblemChoice::RosenbrockDisk => BenchProblem {
                nlp: Box::new(RosenbrockDisk),
                reference_objective: None,
            },
            ProblemChoice::Sphere | ProblemChoice::All => BenchProblem {
                nlp: Box::new(Sphere { n: size.max(1) }),
                reference_objective: Some(-(size.max(1) as f64)),
            },
        })
        .collect()
}

/// Hock-Schittkowski problem 71.
///
/// ```text
/// min  x0 x3 (x0 + x1 + x2) + x2
/// s.t. x0 x1 x2 x3 >= 25
///      x0^2 + x1^2 + x2^2 + x3^2 = 40
///      1 <= x <= 5
/// ```
pub struct Hs071;

impl NlpProblem for Hs071 {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(NlpSizes {
            num_variables: 4,
            num_constraints: 2,
            nnz_jacobian: 8,
            nnz_hessian: 10,
            name: "hs071".to_string(),
        })
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(1.0);
        x_u.fill(5.0);
        c_l.copy_from_slice(&[25.0, 40.0]);
        c_u.copy_from_slice(&[INF, 40.0]);
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x.copy_from_slice(&[1.0, 5.0, 5.0, 1.0]);
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok(x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2])
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad[0] = x[3] * (2.0 * x[0] + x[1] + x[2]);
        grad[1] = x[0] * x[3];
        grad[2] = x[0] * x[3] + 1.0;
        grad[3] = x[0] * (x[0] + x[1] + x[2]);
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x[0] * x[1] * x[2] * x[3];
        c[1] = x.iter().map(|v| v * v).sum();
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        for k in 0..8 {
            rows[k] = k / 4;
            cols[k] = k % 4;
        }
        Ok(())
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = x[1] * x[2] * x[3];
        values[1] = x[0] * x[2] * x[3];
        values[2] = x[0] * x[1] * x[3];
        values[3] = x[0] * x[1] * x[2];
        for j in 0..4 {
            values[4 + j] = 2.0 * x[j];
        }
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        let mut k = 0;
        for i in 0..4 {
            for j in 0..=i {
                rows[k] = i;
                cols[k] = j;
                k += 1;
            }
        }
        Ok(())
    }

    fn eval_hessian(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        // lower triangle, row by row
        values[0] = obj_factor * 2.0 * x[3];
        values[1] = obj_factor * x[3] + lambda[0] * x[2] * x[3];
        values[2] = 0.0;
        values[3] = obj_factor * x[3] + lambda[0] * x[1] * x[3];
        values[4] = lambda[0] * x[0] * x[3];
        values[5] = 0.0;
        values[6] = obj_factor * (2.0 * x[0] + x[1] + x[2]) + lambda[0] * x[1] * x[2];
        values[7] = obj_factor * x[0] + lambda[0] * x[0] * x[2];
        values[8] = obj_factor * x[0] + lambda[0] * x[0] * x[1];
        values[9] = 0.0;
        for k in [0, 2, 5, 9] {
            values[k] += 2.0 * lambda[1];
        }
        Ok(())
    }
}

/// `min 2 (|x|^2 - 1) - x0` on the unit circle, started at angle `theta`.
pub struct PowellCircle {
    pub theta: f64,
}

impl NlpProblem for PowellCircle {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(NlpSizes {
            num_variables: 2,
            num_constraints: 1,
            nnz_jacobian: 2,
            nnz_hessian: 2,
            name: "powell_circle".to_string(),
        })
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-INF);
        x_u.fill(INF);
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

/// Rosenbrock function restricted to the disk `|x|^2 <= 1.5`.
pub struct RosenbrockDisk;

impl NlpProblem for RosenbrockDisk {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(NlpSizes {
            num_variables: 2,
            num_constraints: 1,
            nnz_jacobian: 2,
            nnz_hessian: 3,
            name: "rosenbrock_disk".to_string(),
        })
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-INF);
        x_u.fill(INF);
        c_l[0] = -INF;
        c_u[0] = 1.5;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        x.copy_from_slice(&[-1.2, 1.0]);
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
    }

    fn eval_gradient(&self, x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        let r = x[1] - x[0] * x[0];
        grad[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * r;
        grad[1] = 200.0 * r;
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
        rows.copy_from_slice(&[0, 1, 1]);
        cols.copy_from_slice(&[0, 0, 1]);
        Ok(())
    }

    fn eval_hessian(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values[0] = obj_factor * (2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0]) + 2.0 * lambda[0];
        values[1] = obj_factor * (-400.0 * x[0]);
        values[2] = obj_factor * 200.0 + 2.0 * lambda[0];
        Ok(())
    }
}

/// `min sum x_i` on the sphere `|x|^2 = n`; optimum `x = -1`.
pub struct Sphere {
    pub n: usize,
}

impl NlpProblem for Sphere {
    fn sizes(&self) -> SqpResult<NlpSizes> {
        Ok(NlpSizes {
            num_variables: self.n,
            num_constraints: 1,
            nnz_jacobian: self.n,
            nnz_hessian: self.n,
            name: format!("sphere_{}", self.n),
        })
    }

    fn bounds(&self, x_l: &mut [f64], x_u: &mut [f64], c_l: &mut [f64], c_u: &mut [f64]) -> SqpResult<()> {
        x_l.fill(-INF);
        x_u.fill(INF);
        c_l[0] = self.n as f64;
        c_u[0] = self.n as f64;
        Ok(())
    }

    fn starting_point(&self, x: &mut [f64], lambda: &mut [f64]) -> SqpResult<()> {
        for (i, v) in x.iter_mut().enumerate() {
            *v = if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        lambda.fill(0.0);
        Ok(())
    }

    fn eval_objective(&self, x: &[f64]) -> SqpResult<f64> {
        Ok(x.iter().sum())
    }

    fn eval_gradient(&self, _x: &[f64], grad: &mut [f64]) -> SqpResult<()> {
        grad.fill(1.0);
        Ok(())
    }

    fn eval_constraints(&self, x: &[f64], c: &mut [f64]) -> SqpResult<()> {
        c[0] = x.iter().map(|v| v * v).sum();
        Ok(())
    }

    fn jacobian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        rows.fill(0);
        for (j, col) in cols.iter_mut().enumerate() {
            *col = j;
        }
        Ok(())
    }

    fn eval_jacobian(&self, x: &[f64], values: &mut [f64]) -> SqpResult<()> {
        for (v, xi) in values.iter_mut().zip(x) {
            *v = 2.0 * xi;
        }
        Ok(())
    }

    fn hessian_structure(&self, rows: &mut [usize], cols: &mut [usize]) -> SqpResult<()> {
        for j in 0..self.n {
            rows[j] = j;
            cols[j] = j;
        }
        Ok(())
    }

    fn eval_hessian(&self, _x: &[f64], _obj_factor: f64, lambda: &[f64], values: &mut [f64]) -> SqpResult<()> {
        values.fill(2.0 * lambda[0]);
        Ok(())
    }
}
