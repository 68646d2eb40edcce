//! Solve every subproblem with a second backend and report disagreements.

use crate::stats::Statistics;

use super::backend::{QpSolverInterface, QpStatus};

pub struct ShadowComparison {
    backend: Box<dyn QpSolverInterface>,
    /// Relative objective tolerance. Steps are compared at its square root.
    tol: f64,
}

impl ShadowComparison {
    pub fn new(backend: Box<dyn QpSolverInterface>, tol: f64) -> Self {
        Self { backend, tol }
    }

    pub fn backend(&self) -> &dyn QpSolverInterface {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn QpSolverInterface {
        self.backend.as_mut()
    }

    /// Solve the shadow copy and compare it with `primary`'s last solve.
    ///
    /// Shadow iterations are not counted in `stats`; only mismatches are.
    pub fn compare(&mut self, primary: &dyn QpSolverInterface, stats: &mut Statistics) -> bool {
        let mut scratch = Statistics::new();
        let shadow_status = self.backend.optimize(&mut scratch);
        let primary_status = primary.status();

        let step_gap = step_difference(primary, self.backend.as_ref());
        let agree = if shadow_status != primary_status {
            false
        } else if primary_status == QpStatus::Optimal {
            let (a, b) = (primary.objective_value(), self.backend.objective_value());
            (a - b).abs() <= self.tol * (1.0 + a.abs().max(b.abs()))
                && step_gap <= self.tol.sqrt()
        } else {
            true
        };

        if !agree {
            stats.shadow_mismatches += 1;
            log::warn!(
                "Shadow solver {} disagrees with {}: {:?} (obj {:.6e}) vs {:?} (obj {:.6e}), step gap {:.3e}",
                self.backend.name(),
                primary.name(),
                shadow_status,
                self.backend.objective_value(),
                primary_status,
                primary.objective_value(),
                step_gap
            );
        }
        agree
    }
}

/// Inf-norm distance between the two primal solutions, relative to their size.
fn step_difference(a: &dyn QpSolverInterface, b: &dyn QpSolverInterface) -> f64 {
    match (a.solution(), b.solution()) {
        (Some(sa), Some(sb)) if sa.x.len() == sb.x.len() => {
            let scale = 1.0 + sa.x.inf_norm().max(sb.x.inf_norm());
            sa.x.iter()
                .zip(sb.x.iter())
                .map(|(u, v)| (u - v).abs())
                .fold(0.0, f64::max)
                / scale
        }
        (Some(_), Some(_)) => f64::INFINITY,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Vector;
    use crate::qp::backend::{ProblemType, QpData, QpSolution};

    struct Fixed {
        data: QpData,
        solution: QpSolution,
    }

    impl Fixed {
        fn new(x: &[f64], objective: f64) -> Self {
            Self {
                data: QpData::new(ProblemType::Qp, x.len(), 0),
                solution: QpSolution {
                    x: Vector::from_slice(x),
                    bound_multipliers: Vector::new(x.len()),
                    constraint_multipliers: Vector::new(0),
                    objective,
                    iterations: 1,
                },
            }
        }
    }

    impl QpSolverInterface for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn data(&self) -> &QpData {
            &self.data
        }
        fn data_mut(&mut self) -> &mut QpData {
            &mut self.data
        }
        fn optimize(&mut self, _stats: &mut Statistics) -> QpStatus {
            QpStatus::Optimal
        }
        fn status(&self) -> QpStatus {
            QpStatus::Optimal
        }
        fn solution(&self) -> Option<&QpSolution> {
            Some(&self.solution)
        }
    }

    #[test]
    fn test_matching_solutions_agree() {
        let primary = Fixed::new(&[1.0, 2.0], 3.0);
        let mut shadow = ShadowComparison::new(Box::new(Fixed::new(&[1.0, 2.0 + 1e-9], 3.0)), 1e-6);
        let mut stats = Statistics::new();
        assert!(shadow.compare(&primary, &mut stats));
        assert_eq!(stats.shadow_mismatches, 0);
    }

    #[test]
    fn test_same_objective_different_step_is_a_mismatch() {
        // degenerate subproblem: equal objectives, different minimizers
        let primary = Fixed::new(&[1.0, 0.0], 1.0);
        let mut shadow = ShadowComparison::new(Box::new(Fixed::new(&[0.0, 1.0], 1.0)), 1e-6);
        let mut stats = Statistics::new();
        assert!(!shadow.compare(&primary, &mut stats));
        assert_eq!(stats.shadow_mismatches, 1);
    }
}
