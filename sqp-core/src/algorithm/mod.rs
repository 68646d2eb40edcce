//! Trust-region SQP driver.
//!
//! Each outer iteration:
//! 1. Build (first iteration) or refresh the stale parts of the QP subproblem.
//! 2. Solve it; a failure ends the run with the subproblem status.
//! 3. Raise the penalty if the step leaves the linearization infeasible.
//! 4. Evaluate the trial point and run the ratio test on the l1 merit.
//! 5. On rejection, try a second-order correction.
//! 6. Update the trust-region radius and check first-order optimality.
//!
//! The committed iterate only changes when a trial point is accepted; every
//! terminal path leaves it as the reported solution.

mod correction;
mod penalty;
pub mod trust_region;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::classify::{classify_all, ActivityStatus};
use crate::error::{SqpError, SqpResult};
use crate::linalg::{SparseTriplet, Vector};
use crate::nlp::{FinalSolution, NlpProblem, NlpSizes};
use crate::opt_test::{
    excursions, KktPoint, OptimalityStatus, OptimalityTester, OptimalityTolerances,
};
use crate::options::{Formulation, SqpOptions};
use crate::qp::{make_handler, Linearization, ProblemType, QpHandler, QpStatus, SubproblemLayout};
use crate::stats::Statistics;
use crate::status::ExitStatus;

use trust_region::{predicted_reduction, RadiusChange, RadiusRule, RatioTest};

/// Where the driver is in its iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Initializing,
    IteratingQp,
    StepComputed,
    RatioTested { accepted: bool },
    SecondOrderCorrection,
    RadiusUpdated,
    OptimalityChecked,
    Terminated,
}

/// One row of the iteration history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iter: usize,
    pub objective: f64,
    pub infeasibility: f64,
    pub delta: f64,
    pub rho: f64,
    pub step_norm: f64,
    pub actual_reduction: f64,
    pub predicted_reduction: f64,
    pub accepted: bool,
    pub kkt_error: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subproblem {
    Qp,
    Lp,
}

/// Committed NLP iterate and its derivatives.
struct Iterate {
    x: Vector,
    c: Vector,
    objective: f64,
    infeasibility: f64,
    gradient: Vector,
    jacobian: SparseTriplet,
    /// Hessian of `f - lambda^T c`, one triangle.
    hessian: SparseTriplet,
    constraint_multipliers: Vector,
}

struct Bounds {
    x_l: Vector,
    x_u: Vector,
    c_l: Vector,
    c_u: Vector,
}

impl Bounds {
    /// l1 violation of the constraint and variable bounds.
    fn infeasibility(&self, x: &Vector, c: &Vector) -> f64 {
        excursions(c, &self.c_l, &self.c_u) + excursions(x, &self.x_l, &self.x_u)
    }
}

fn linearize<'a>(iterate: &'a Iterate, bounds: &'a Bounds) -> Linearization<'a> {
    Linearization {
        x_k: &iterate.x,
        c_k: &iterate.c,
        x_l: &bounds.x_l,
        x_u: &bounds.x_u,
        c_l: &bounds.c_l,
        c_u: &bounds.c_u,
        gradient: &iterate.gradient,
        jacobian: &iterate.jacobian,
        hessian: &iterate.hessian,
    }
}

/// Trust-region SQP solver for one NLP.
pub struct Algorithm<N: NlpProblem> {
    nlp: N,
    options: SqpOptions,
    sizes: NlpSizes,

    iterate: Iterate,
    bounds: Bounds,

    // Trial point
    p_k: Vector,
    x_trial: Vector,
    c_trial: Vector,
    obj_value_trial: f64,
    infea_trial: f64,
    norm_p_k: f64,

    // Subproblem results of the current iteration
    qp_obj: f64,
    infea_model: f64,
    qp_bound_multipliers: Vector,
    qp_constraint_multipliers: Vector,
    ratio: RatioTest,

    // Globalization controls
    delta: f64,
    rho: f64,
    eps1: f64,
    penalty_trials_total: usize,

    qp: QpHandler,
    lp: QpHandler,
    qp_built: bool,

    tester: OptimalityTester,
    opt_status: OptimalityStatus,
    bound_activity: Vec<ActivityStatus>,
    constraint_activity: Vec<ActivityStatus>,

    exit_status: ExitStatus,
    phase: Phase,
    stats: Statistics,
    history: Vec<IterationRecord>,
}

impl<N: NlpProblem> Algorithm<N> {
    /// Query the NLP and set up the subproblems with the backends named in
    /// `options`.
    pub fn new(nlp: N, options: SqpOptions) -> SqpResult<Self> {
        let sizes = nlp.sizes()?;
        let layout = SubproblemLayout::new(
            options.formulation,
            sizes.num_variables,
            sizes.num_constraints,
        );
        let qp = make_handler(ProblemType::Qp, layout, &options)?;
        let lp = make_handler(ProblemType::Lp, layout, &options)?;
        Self::with_handlers(nlp, options, qp, lp)
    }

    /// Like [`new`](Self::new) with caller-supplied subproblem handlers.
    pub fn with_handlers(
        nlp: N,
        options: SqpOptions,
        qp: QpHandler,
        lp: QpHandler,
    ) -> SqpResult<Self> {
        let sizes = nlp.sizes()?;
        let (n, m) = (sizes.num_variables, sizes.num_constraints);
        if n == 0 {
            return Err(SqpError::InvalidProblem("problem has no variables".to_string()));
        }
        for (handler, expected) in [(&qp, ProblemType::Qp), (&lp, ProblemType::Lp)] {
            let layout = handler.layout();
            if handler.problem_type() != expected
                || layout.num_nlp_variables() != n
                || layout.num_nlp_constraints() != m
                || layout.formulation() != options.formulation
            {
                return Err(SqpError::Structure(format!(
                    "{:?} handler does not match a {:?} problem with {} variables and {} constraints",
                    expected, options.formulation, n, m
                )));
            }
        }

        // Bounds
        let mut bounds = Bounds {
            x_l: Vector::new(n),
            x_u: Vector::new(n),
            c_l: Vector::new(m),
            c_u: Vector::new(m),
        };
        nlp.bounds(
            bounds.x_l.values_mut(),
            bounds.x_u.values_mut(),
            bounds.c_l.values_mut(),
            bounds.c_u.values_mut(),
        )?;
        for i in 0..n {
            if bounds.x_l[i] > bounds.x_u[i] {
                return Err(SqpError::InvalidProblem(format!(
                    "variable {} has lower bound {} above upper bound {}",
                    i, bounds.x_l[i], bounds.x_u[i]
                )));
            }
        }
        for i in 0..m {
            if bounds.c_l[i] > bounds.c_u[i] {
                return Err(SqpError::InvalidProblem(format!(
                    "constraint {} has lower bound {} above upper bound {}",
                    i, bounds.c_l[i], bounds.c_u[i]
                )));
            }
        }

        // Starting point
        let mut x = Vector::new(n);
        let mut lambda = Vector::new(m);
        nlp.starting_point(x.values_mut(), lambda.values_mut())?;
        if options.formulation == Formulation::Compact {
            for i in 0..n {
                x[i] = x[i].max(bounds.x_l[i]).min(bounds.x_u[i]);
            }
        }

        // Structures
        let mut rows = vec![0; sizes.nnz_jacobian];
        let mut cols = vec![0; sizes.nnz_jacobian];
        nlp.jacobian_structure(&mut rows, &mut cols)?;
        let mut jacobian = SparseTriplet::new(m, n, sizes.nnz_jacobian, false);
        jacobian.set_structure(&rows, &cols)?;

        let mut rows = vec![0; sizes.nnz_hessian];
        let mut cols = vec![0; sizes.nnz_hessian];
        nlp.hessian_structure(&mut rows, &mut cols)?;
        let mut hessian = SparseTriplet::new(n, n, sizes.nnz_hessian, true);
        hessian.set_structure(&rows, &cols)?;

        let mut iterate = Iterate {
            x,
            c: Vector::new(m),
            objective: 0.0,
            infeasibility: 0.0,
            gradient: Vector::new(n),
            jacobian,
            hessian,
            constraint_multipliers: lambda,
        };
        evaluate_iterate(&nlp, &mut iterate)?;
        evaluate_derivatives(&nlp, &mut iterate)?;
        iterate.infeasibility = bounds.infeasibility(&iterate.x, &iterate.c);

        let tester = OptimalityTester::new(
            OptimalityTolerances::from_options(&options),
            classify_all(&bounds.x_l, &bounds.x_u),
            classify_all(&bounds.c_l, &bounds.c_u),
        );

        log::debug!(
            "SQP initialized: {} variables, {} constraints, f0 = {:.6e}, infeasibility = {:.6e}",
            n,
            m,
            iterate.objective,
            iterate.infeasibility
        );

        Ok(Self {
            p_k: Vector::new(n),
            x_trial: Vector::new(n),
            c_trial: Vector::new(m),
            obj_value_trial: 0.0,
            infea_trial: 0.0,
            norm_p_k: 0.0,
            qp_obj: 0.0,
            infea_model: 0.0,
            qp_bound_multipliers: Vector::new(n),
            qp_constraint_multipliers: iterate.constraint_multipliers.clone(),
            ratio: RatioTest {
                actual_reduction: 0.0,
                predicted_reduction: 0.0,
                accepted: false,
            },
            delta: options.delta_0,
            rho: options.rho_0,
            eps1: options.eps1,
            penalty_trials_total: 0,
            qp,
            lp,
            qp_built: false,
            tester,
            opt_status: OptimalityStatus::default(),
            bound_activity: vec![ActivityStatus::Inactive; n],
            constraint_activity: vec![ActivityStatus::Inactive; m],
            exit_status: ExitStatus::Unknown,
            phase: Phase::Initializing,
            stats: Statistics::new(),
            history: Vec::new(),
            nlp,
            options,
            sizes,
            iterate,
            bounds,
        })
    }

    // === Accessors ===

    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn options(&self) -> &SqpOptions {
        &self.options
    }

    pub fn x(&self) -> &Vector {
        &self.iterate.x
    }

    pub fn objective(&self) -> f64 {
        self.iterate.objective
    }

    pub fn constraint_values(&self) -> &Vector {
        &self.iterate.c
    }

    pub fn infeasibility(&self) -> f64 {
        self.iterate.infeasibility
    }

    /// Bound multipliers from the last optimality check.
    pub fn bound_multipliers(&self) -> &Vector {
        &self.qp_bound_multipliers
    }

    /// Constraint multipliers from the last optimality check.
    pub fn constraint_multipliers(&self) -> &Vector {
        &self.qp_constraint_multipliers
    }

    pub fn bound_activity(&self) -> &[ActivityStatus] {
        &self.bound_activity
    }

    pub fn constraint_activity(&self) -> &[ActivityStatus] {
        &self.constraint_activity
    }

    pub fn optimality_status(&self) -> &OptimalityStatus {
        &self.opt_status
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Give the NLP back.
    pub fn into_problem(self) -> N {
        self.nlp
    }

    // === Main loop ===

    /// Run until a terminal status is reached.
    ///
    /// Errors from the oracle or from the driver itself are returned after
    /// the exit status has been set (`InvalidNlp` or `InternalError`) and the
    /// last committed iterate has been reported through
    /// [`NlpProblem::finalize_solution`].
    pub fn optimize(&mut self) -> SqpResult<ExitStatus> {
        if self.exit_status.is_terminal() {
            return Ok(self.exit_status);
        }
        let start = Instant::now();
        let result = self.run(start);
        if let Err(e) = &result {
            log::error!("SQP run aborted at iteration {}: {}", self.stats.iter, e);
            let status = match e {
                SqpError::InvalidProblem(_) | SqpError::Evaluation(_) => ExitStatus::InvalidNlp,
                _ => ExitStatus::InternalError,
            };
            self.set_exit_status(status);
        }
        self.stats.total_time = start.elapsed();
        self.phase = Phase::Terminated;
        self.finalize();
        self.print_summary();
        result.map(|_| self.exit_status)
    }

    fn run(&mut self, start: Instant) -> SqpResult<()> {
        if self.options.print_level >= 2 {
            print_header();
        }

        while self.stats.iter < self.options.iter_max && !self.exit_status.is_terminal() {
            self.phase = Phase::IteratingQp;
            self.setup_qp()?;
            let status = self.qp.solve(&mut self.stats);
            if status != QpStatus::Optimal {
                self.fail_on_subproblem(Subproblem::Qp, status);
                break;
            }
            self.extract_step();
            self.phase = Phase::StepComputed;

            self.update_penalty_parameter()?;
            if self.exit_status.is_terminal() {
                break;
            }

            self.evaluate_trial_point()?;
            self.ratio_test()?;
            if !self.ratio.accepted && self.options.second_order_correction {
                self.second_order_correction()?;
                if self.exit_status.is_terminal() {
                    break;
                }
            }

            self.stats.iter_addone();
            let step_delta = self.delta;
            self.update_radius();
            self.check_optimality();
            self.record_iteration(step_delta);

            if self.delta < self.options.delta_min {
                let status = if self.opt_status.first_order_opt {
                    ExitStatus::Optimal
                } else {
                    ExitStatus::TrustRegionTooSmall
                };
                self.set_exit_status(status);
                break;
            }
            if self.opt_status.first_order_opt {
                self.set_exit_status(ExitStatus::Optimal);
                break;
            }
            if start.elapsed().as_secs_f64() >= self.options.time_max {
                self.set_exit_status(ExitStatus::ExceedTimeLimits);
                break;
            }
        }

        if !self.exit_status.is_terminal() {
            self.set_exit_status(ExitStatus::ExceedMaxIter);
        }
        Ok(())
    }

    /// Build the QP on the first call, refresh its stale parts afterwards.
    fn setup_qp(&mut self) -> SqpResult<()> {
        let lin = linearize(&self.iterate, &self.bounds);
        if self.qp_built {
            self.qp.rebuild(self.delta, self.rho, &lin)
        } else {
            self.qp.build(self.delta, self.rho, &lin)?;
            self.qp_built = true;
            Ok(())
        }
    }

    /// Full LP build for the penalty check at the current iterate.
    fn setup_lp(&mut self) -> SqpResult<()> {
        let lin = linearize(&self.iterate, &self.bounds);
        self.lp.build(self.delta, self.rho, &lin)
    }

    /// Copy step, objective, model infeasibility and multipliers out of the QP.
    fn extract_step(&mut self) {
        self.p_k.copy_from(self.qp.step());
        self.qp_obj = self.qp.objective();
        self.infea_model = self.qp.model_infeasibility();
        self.qp_bound_multipliers = self.qp.bound_multipliers();
        self.qp_constraint_multipliers = self.qp.constraint_multipliers();
    }

    /// x_trial = x_k + p_k with objective, constraints and infeasibility.
    fn evaluate_trial_point(&mut self) -> SqpResult<()> {
        self.x_trial.copy_from(self.iterate.x.values());
        self.x_trial.add_vector(self.p_k.values());
        self.obj_value_trial = self.nlp.eval_objective(self.x_trial.values())?;
        self.nlp
            .eval_constraints(self.x_trial.values(), self.c_trial.values_mut())?;
        self.infea_trial = self.bounds.infeasibility(&self.x_trial, &self.c_trial);
        self.norm_p_k = self.p_k.inf_norm();
        Ok(())
    }

    /// Ratio test on the l1 merit; commits the trial point when accepted.
    fn ratio_test(&mut self) -> SqpResult<()> {
        let pred = predicted_reduction(self.rho, self.iterate.infeasibility, self.qp_obj);
        self.ratio = RatioTest::evaluate(
            (self.iterate.objective, self.iterate.infeasibility),
            (self.obj_value_trial, self.infea_trial),
            self.rho,
            pred,
            self.options.eta_s,
            self.options.tol,
        );
        self.phase = Phase::RatioTested {
            accepted: self.ratio.accepted,
        };
        if self.ratio.accepted {
            self.accept_trial_point()?;
        }
        Ok(())
    }

    fn accept_trial_point(&mut self) -> SqpResult<()> {
        self.iterate.x.copy_from(self.x_trial.values());
        self.iterate.c.copy_from(self.c_trial.values());
        self.iterate.objective = self.obj_value_trial;
        self.iterate.infeasibility = self.infea_trial;
        self.iterate
            .constraint_multipliers
            .copy_from(self.qp_constraint_multipliers.values());
        evaluate_derivatives(&self.nlp, &mut self.iterate)?;
        self.qp.mark_iterate_changed();
        Ok(())
    }

    fn update_radius(&mut self) {
        let rule = RadiusRule {
            eta_c: self.options.eta_c,
            eta_e: self.options.eta_e,
            gamma_c: self.options.gamma_c,
            gamma_e: self.options.gamma_e,
            delta_max: self.options.delta_max,
            tol: self.options.tol,
        };
        let (delta, change) = rule.apply(self.delta, &self.ratio, self.norm_p_k);
        if change != RadiusChange::Unchanged {
            log::trace!("Radius {:?}: {:.3e} -> {:.3e}", change, self.delta, delta);
            self.delta = delta;
            self.qp.mark_radius_changed();
        }
        self.phase = Phase::RadiusUpdated;
    }

    fn kkt_point(&self) -> KktPoint<'_> {
        KktPoint {
            x: &self.iterate.x,
            x_l: &self.bounds.x_l,
            x_u: &self.bounds.x_u,
            c: &self.iterate.c,
            c_l: &self.bounds.c_l,
            c_u: &self.bounds.c_u,
            gradient: &self.iterate.gradient,
            jacobian: &self.iterate.jacobian,
            bound_multipliers: &self.qp_bound_multipliers,
            constraint_multipliers: &self.qp_constraint_multipliers,
        }
    }

    fn check_optimality(&mut self) {
        self.opt_status = self.tester.check(&self.kkt_point());
        self.phase = Phase::OptimalityChecked;
    }

    /// End the run because a subproblem could not be solved.
    fn fail_on_subproblem(&mut self, which: Subproblem, status: QpStatus) {
        let handler = match which {
            Subproblem::Qp => &self.qp,
            Subproblem::Lp => &self.lp,
        };
        log::error!(
            "{:?} subproblem failed with {:?} at iteration {}",
            which,
            status,
            self.stats.iter
        );
        if let Some(dir) = &self.options.dump_dir {
            match handler.write_dump(dir, &self.sizes.name) {
                Ok(path) => log::info!("Subproblem written to {}", path.display()),
                Err(e) => log::warn!("Could not write subproblem dump: {}", e),
            }
        }
        self.set_exit_status(ExitStatus::from(status));
    }

    fn set_exit_status(&mut self, status: ExitStatus) {
        debug_assert!(
            !self.exit_status.is_terminal(),
            "exit status set twice ({} then {})",
            self.exit_status,
            status
        );
        if self.exit_status.is_terminal() {
            log::error!(
                "Exit status already {}, ignoring {}",
                self.exit_status,
                status
            );
            return;
        }
        self.exit_status = status;
    }

    /// Classify activity at the committed iterate and report it to the NLP.
    fn finalize(&mut self) {
        let (bound_activity, constraint_activity) =
            self.tester.identify_active_set(&self.kkt_point());
        self.bound_activity = bound_activity;
        self.constraint_activity = constraint_activity;

        let solution = FinalSolution {
            status: self.exit_status,
            x: self.iterate.x.values(),
            bound_multipliers: self.qp_bound_multipliers.values(),
            bound_activity: &self.bound_activity,
            constraint_values: self.iterate.c.values(),
            constraint_multipliers: self.qp_constraint_multipliers.values(),
            constraint_activity: &self.constraint_activity,
            objective_value: self.iterate.objective,
            stats: &self.stats,
        };
        self.nlp.finalize_solution(&solution);
    }

    // === Output ===

    fn record_iteration(&mut self, delta: f64) {
        let record = IterationRecord {
            iter: self.stats.iter,
            objective: self.iterate.objective,
            infeasibility: self.iterate.infeasibility,
            delta,
            rho: self.rho,
            step_norm: self.norm_p_k,
            actual_reduction: self.ratio.actual_reduction,
            predicted_reduction: self.ratio.predicted_reduction,
            accepted: self.ratio.accepted,
            kkt_error: self.opt_status.kkt_error,
        };
        log::info!(
            "iter {} f={:.6e} infea={:.3e} delta={:.2e} rho={:.2e} |p|={:.2e} ared={:.3e} pred={:.3e} {}",
            record.iter,
            record.objective,
            record.infeasibility,
            record.delta,
            record.rho,
            record.step_norm,
            record.actual_reduction,
            record.predicted_reduction,
            if record.accepted { "accepted" } else { "rejected" }
        );
        if self.options.print_level >= 2 {
            if record.iter > 1 && record.iter % 20 == 1 {
                print_header();
            }
            println!(
                "{:>5} {:>14.6e} {:>10.2e} {:>9.2e} {:>9.2e} {:>9.2e} {:>10.3e} {:>10.3e} {:>3} {:>10.2e}",
                record.iter,
                record.objective,
                record.infeasibility,
                record.delta,
                record.rho,
                record.step_norm,
                record.actual_reduction,
                record.predicted_reduction,
                if record.accepted { "a" } else { "r" },
                record.kkt_error,
            );
        }
        self.history.push(record);
    }

    fn print_summary(&self) {
        log::info!(
            "SQP finished: {} after {} iterations, f = {:.8e}, infeasibility = {:.3e}",
            self.exit_status,
            self.stats.iter,
            self.iterate.objective,
            self.iterate.infeasibility
        );
        if self.options.print_level == 0 {
            return;
        }
        println!();
        println!("Exit status:            {}", self.exit_status);
        println!("Objective:              {:.10e}", self.iterate.objective);
        println!("Infeasibility:          {:.3e}", self.iterate.infeasibility);
        println!(
            "KKT error:              {:.3e} (primal {:.2e}, dual {:.2e}, compl {:.2e}, stat {:.2e})",
            self.opt_status.kkt_error,
            self.opt_status.primal_violation,
            self.opt_status.dual_violation,
            self.opt_status.compl_violation,
            self.opt_status.stationarity_violation
        );
        println!("Iterations:             {}", self.stats.iter);
        println!(
            "QP solves / iterations: {} / {}",
            self.stats.qp_solves, self.stats.qp_iter
        );
        println!(
            "Penalty trials:         {} ({} accepted, {} rejected), final rho {:.3e}",
            self.stats.penalty_change_trial,
            self.stats.penalty_change_succ,
            self.stats.penalty_change_fail,
            self.rho
        );
        println!(
            "SOC:                    {} tried, {} succeeded",
            self.stats.soc_trial, self.stats.soc_succ
        );
        println!(
            "Time:                   {:.3}s",
            self.stats.total_time.as_secs_f64()
        );
    }
}

fn print_header() {
    println!(
        "{:>5} {:>14} {:>10} {:>9} {:>9} {:>9} {:>10} {:>10} {:>3} {:>10}",
        "iter", "objective", "infea", "delta", "rho", "|p|", "ared", "pred", "", "kkt"
    );
}

/// Objective and constraints at `iterate.x`.
fn evaluate_iterate<N: NlpProblem>(nlp: &N, iterate: &mut Iterate) -> SqpResult<()> {
    iterate.objective = nlp.eval_objective(iterate.x.values())?;
    nlp.eval_constraints(iterate.x.values(), iterate.c.values_mut())
}

/// Gradient, Jacobian and Lagrangian Hessian at `iterate.x`.
fn evaluate_derivatives<N: NlpProblem>(nlp: &N, iterate: &mut Iterate) -> SqpResult<()> {
    nlp.eval_gradient(iterate.x.values(), iterate.gradient.values_mut())?;
    nlp.eval_jacobian(iterate.x.values(), iterate.jacobian.values_mut())?;
    let negated: Vec<f64> = iterate.constraint_multipliers.iter().map(|l| -l).collect();
    nlp.eval_hessian(iterate.x.values(), 1.0, &negated, iterate.hessian.values_mut())
}
