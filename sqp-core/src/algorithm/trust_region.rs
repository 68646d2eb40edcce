//! Merit function, ratio test and radius update.
//!
//! The merit function is the l1 penalty `phi(x) = f(x) + rho * infea(x)`.
//! The predicted reduction of a step is `rho * infea(x_k) - q(p)` where
//! `q(p)` is the subproblem objective at the step.

/// l1 merit value.
pub fn merit(objective: f64, rho: f64, infeasibility: f64) -> f64 {
    objective + rho * infeasibility
}

/// Predicted reduction of the merit function.
pub fn predicted_reduction(rho: f64, infeasibility: f64, qp_objective: f64) -> f64 {
    rho * infeasibility - qp_objective
}

/// Reductions measured for one trial point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioTest {
    pub actual_reduction: f64,
    pub predicted_reduction: f64,
    pub accepted: bool,
}

impl RatioTest {
    /// Compare the merit at the iterate and at the trial point.
    ///
    /// The trial point is accepted when the actual reduction is at least
    /// `eta_s` times the predicted one and not below `-tol`.
    pub fn evaluate(
        current: (f64, f64),
        trial: (f64, f64),
        rho: f64,
        predicted_reduction: f64,
        eta_s: f64,
        tol: f64,
    ) -> Self {
        let (obj, infea) = current;
        let (obj_trial, infea_trial) = trial;
        let actual_reduction = merit(obj, rho, infea) - merit(obj_trial, rho, infea_trial);
        Self {
            actual_reduction,
            predicted_reduction,
            accepted: actual_reduction >= eta_s * predicted_reduction && actual_reduction >= -tol,
        }
    }
}

/// What the radius update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusChange {
    Shrunk,
    Expanded,
    Unchanged,
}

/// Radius update parameters.
#[derive(Debug, Clone, Copy)]
pub struct RadiusRule {
    pub eta_c: f64,
    pub eta_e: f64,
    pub gamma_c: f64,
    pub gamma_e: f64,
    pub delta_max: f64,
    pub tol: f64,
}

impl RadiusRule {
    /// New radius after a step of infinity-norm `step_norm`.
    ///
    /// Shrink on poor agreement. Grow only on very good agreement when the
    /// step reached the trust-region boundary.
    pub fn apply(&self, delta: f64, ratio: &RatioTest, step_norm: f64) -> (f64, RadiusChange) {
        let (ared, pred) = (ratio.actual_reduction, ratio.predicted_reduction);
        if ared < self.eta_c * pred {
            (self.gamma_c * delta, RadiusChange::Shrunk)
        } else if ared > self.eta_e * pred && (delta - step_norm).abs() < self.tol {
            let grown = (self.gamma_e * delta).min(self.delta_max);
            if grown != delta {
                (grown, RadiusChange::Expanded)
            } else {
                (delta, RadiusChange::Unchanged)
            }
        } else {
            (delta, RadiusChange::Unchanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> RadiusRule {
        RadiusRule {
            eta_c: 0.25,
            eta_e: 0.75,
            gamma_c: 0.5,
            gamma_e: 2.0,
            delta_max: 10.0,
            tol: 1e-8,
        }
    }

    #[test]
    fn test_accepts_good_trial_point() {
        // f 2.0 -> 1.2, infeasibility 0.05 -> 0 with rho = 10
        let r = RatioTest::evaluate((2.0, 0.05), (1.2, 0.0), 10.0, 0.3, 1e-8, 1e-8);
        assert!((r.actual_reduction - 1.3).abs() < 1e-12);
        assert!(r.accepted);
    }

    #[test]
    fn test_rejects_merit_increase() {
        let r = RatioTest::evaluate((1.0, 0.0), (1.5, 0.0), 10.0, 0.3, 1e-8, 1e-8);
        assert!(!r.accepted);
    }

    #[test]
    fn test_rejects_tiny_increase_beyond_noise_floor() {
        // ared = -1e-6 clears eta_s * pred = -1e-5 but not the -tol floor.
        let r = RatioTest::evaluate((1.0, 0.0), (1.0 + 1e-6, 0.0), 1.0, -1000.0, 1e-8, 1e-8);
        assert!(!r.accepted);
    }

    #[test]
    fn test_radius_shrinks_on_poor_agreement() {
        let ratio = RatioTest {
            actual_reduction: 0.1,
            predicted_reduction: 1.0,
            accepted: true,
        };
        let (delta, change) = rule().apply(1.0, &ratio, 0.3);
        assert_eq!(change, RadiusChange::Shrunk);
        assert!((delta - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_radius_grows_only_on_boundary_steps() {
        let ratio = RatioTest {
            actual_reduction: 0.9,
            predicted_reduction: 1.0,
            accepted: true,
        };
        let (delta, change) = rule().apply(1.0, &ratio, 1.0);
        assert_eq!(change, RadiusChange::Expanded);
        assert!((delta - 2.0).abs() < 1e-15);

        let (delta, change) = rule().apply(1.0, &ratio, 0.5);
        assert_eq!(change, RadiusChange::Unchanged);
        assert_eq!(delta, 1.0);

        // capped at delta_max
        let (delta, _) = rule().apply(8.0, &ratio, 8.0);
        assert_eq!(delta, 10.0);
    }
}
