//! Builds and maintains the trust-region subproblem around the current iterate.
//!
//! The handler owns a [`QpSolverInterface`] backend (plus an optional shadow
//! copy) and translates NLP quantities into subproblem data through a
//! [`SubproblemLayout`]. Between outer iterations only the pieces marked in
//! [`DirtyFlags`] are rewritten.
//!
//! The Hessian handed to the backends is the NLP Hessian, shifted along the
//! diagonal only when it is indefinite. Backends only ever see convex
//! subproblems.

use std::path::{Path, PathBuf};

use nalgebra::linalg::SymmetricEigen;

use crate::classify::{activity, classify, ActivityStatus, INFINITE_BOUND};
use crate::error::{SqpError, SqpResult};
use crate::linalg::{IdentityBlock, SparseTriplet, Vector};
use crate::options::Formulation;
use crate::stats::Statistics;

use super::backend::{ProblemType, QpSolverInterface, QpStatus};
use super::layout::SubproblemLayout;
use super::shadow::ShadowComparison;

/// Which parts of the subproblem are stale.
///
/// Only the handler sets or clears flags, through its `mark_*` methods and
/// [`QpHandler::rebuild`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    gradient: bool,
    hessian: bool,
    jacobian: bool,
    bounds: bool,
    trust_region: bool,
    penalty: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.gradient
            || self.hessian
            || self.jacobian
            || self.bounds
            || self.trust_region
            || self.penalty
    }

    pub fn gradient(&self) -> bool {
        self.gradient
    }

    pub fn hessian(&self) -> bool {
        self.hessian
    }

    pub fn jacobian(&self) -> bool {
        self.jacobian
    }

    pub fn bounds(&self) -> bool {
        self.bounds
    }

    pub fn trust_region(&self) -> bool {
        self.trust_region
    }

    pub fn penalty(&self) -> bool {
        self.penalty
    }
}

/// NLP quantities at the iterate the subproblem is built around.
#[derive(Debug, Clone, Copy)]
pub struct Linearization<'a> {
    pub x_k: &'a Vector,
    pub c_k: &'a Vector,
    pub x_l: &'a Vector,
    pub x_u: &'a Vector,
    pub c_l: &'a Vector,
    pub c_u: &'a Vector,
    pub gradient: &'a Vector,
    pub jacobian: &'a SparseTriplet,
    pub hessian: &'a SparseTriplet,
}

pub struct QpHandler {
    layout: SubproblemLayout,
    problem_type: ProblemType,
    backend: Box<dyn QpSolverInterface>,
    shadow: Option<ShadowComparison>,
    identities: Vec<IdentityBlock>,
    flags: DirtyFlags,
    /// Penalty currently written into the slack objective; negative before
    /// the first write.
    last_penalty: f64,
    /// NLP Hessian structure followed by one diagonal entry per variable.
    convexified: Option<SparseTriplet>,
    hessian_shift: f64,
    /// Per NLP variable: whether the lower and upper step bounds currently
    /// come from the trust region instead of the variable bounds.
    radius_sides: Vec<(bool, bool)>,
    kkt_tol: f64,
    active_set_tol: f64,
    status: QpStatus,
}

/// Smallest `s >= 0` such that `H + s I` is diagonally dominant.
///
/// `hessian` stores one triangle; off-diagonal entries count for both rows.
/// Zero proves `H` positive semidefinite without a factorization.
pub fn gershgorin_shift(hessian: &SparseTriplet) -> f64 {
    let n = hessian.num_rows();
    let mut diagonal = vec![0.0; n];
    let mut radius = vec![0.0; n];
    for ((&i, &j), &v) in hessian
        .row_indices()
        .iter()
        .zip(hessian.col_indices())
        .zip(hessian.values())
    {
        if i == j {
            diagonal[i] += v;
        } else {
            radius[i] += v.abs();
            radius[j] += v.abs();
        }
    }
    diagonal
        .iter()
        .zip(&radius)
        .map(|(d, r)| r - d)
        .fold(0.0, f64::max)
}

/// Diagonal shift that makes `H + s I` positive semidefinite.
///
/// Zero whenever `H` already is. Otherwise `s` lifts the smallest eigenvalue
/// just above zero.
pub fn convexity_shift(hessian: &SparseTriplet) -> f64 {
    if hessian.num_rows() == 0 || gershgorin_shift(hessian) == 0.0 {
        return 0.0;
    }
    let eig = SymmetricEigen::new(hessian.to_dense());
    let min = eig.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let max = eig.eigenvalues.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if min >= -EIGEN_TOL * max.max(1.0) {
        0.0
    } else {
        -min + EIGEN_TOL * max.max(1.0)
    }
}

/// Relative eigenvalue tolerance for the convexity check.
const EIGEN_TOL: f64 = 1e-10;

/// `bound - value`, keeping infinite bounds infinite.
fn shifted(bound: f64, value: f64) -> f64 {
    if bound <= -INFINITE_BOUND {
        f64::NEG_INFINITY
    } else if bound >= INFINITE_BOUND {
        f64::INFINITY
    } else {
        bound - value
    }
}

impl QpHandler {
    pub fn new(
        layout: SubproblemLayout,
        problem_type: ProblemType,
        backend: Box<dyn QpSolverInterface>,
        shadow: Option<ShadowComparison>,
        kkt_tol: f64,
    ) -> SqpResult<Self> {
        let expected = (layout.num_qp_variables(), layout.num_qp_constraints());
        let actual = (backend.data().num_variables, backend.data().num_constraints);
        if expected != actual {
            return Err(SqpError::Structure(format!(
                "backend sized {:?}, subproblem layout needs {:?}",
                actual, expected
            )));
        }

        let mut handler = Self {
            layout,
            problem_type,
            backend,
            shadow,
            identities: layout.identity_blocks(),
            flags: DirtyFlags::default(),
            last_penalty: -1.0,
            convexified: None,
            hessian_shift: 0.0,
            radius_sides: vec![(true, true); layout.num_nlp_variables()],
            kkt_tol,
            active_set_tol: f64::EPSILON.sqrt(),
            status: QpStatus::Unknown,
        };

        // Slacks are nonnegative for the whole run.
        let (start, end) = (layout.slack_offset(), layout.num_qp_variables());
        handler.for_each_backend(|b| {
            for j in start..end {
                b.set_lower_variable_bound(j, 0.0);
                b.set_upper_variable_bound(j, f64::INFINITY);
            }
        });
        Ok(handler)
    }

    /// Tolerance used by [`active_set`](Self::active_set).
    pub fn with_active_set_tol(mut self, tol: f64) -> Self {
        self.active_set_tol = tol;
        self
    }

    pub fn layout(&self) -> &SubproblemLayout {
        &self.layout
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn backend(&self) -> &dyn QpSolverInterface {
        self.backend.as_ref()
    }

    pub fn flags(&self) -> &DirtyFlags {
        &self.flags
    }

    pub fn status(&self) -> QpStatus {
        self.status
    }

    /// Diagonal shift added to the last installed Hessian.
    pub fn hessian_shift(&self) -> f64 {
        self.hessian_shift
    }

    fn for_each_backend(&mut self, mut f: impl FnMut(&mut dyn QpSolverInterface)) {
        f(self.backend.as_mut());
        if let Some(shadow) = self.shadow.as_mut() {
            f(shadow.backend_mut());
        }
    }

    fn try_for_each_backend(
        &mut self,
        mut f: impl FnMut(&mut dyn QpSolverInterface) -> SqpResult<()>,
    ) -> SqpResult<()> {
        f(self.backend.as_mut())?;
        if let Some(shadow) = self.shadow.as_mut() {
            f(shadow.backend_mut())?;
        }
        Ok(())
    }

    // === Dirty flags ===

    /// A new iterate was accepted: every derivative and bound is stale.
    pub fn mark_iterate_changed(&mut self) {
        self.flags.gradient = true;
        self.flags.jacobian = true;
        self.flags.bounds = true;
        if self.problem_type == ProblemType::Qp {
            self.flags.hessian = true;
        }
    }

    pub fn mark_radius_changed(&mut self) {
        self.flags.trust_region = true;
    }

    pub fn mark_penalty_changed(&mut self) {
        self.flags.penalty = true;
    }

    // === Full build ===

    /// Write every part of the subproblem.
    pub fn build(&mut self, delta: f64, rho: f64, lin: &Linearization<'_>) -> SqpResult<()> {
        self.set_jacobian(lin.jacobian)?;
        if self.problem_type == ProblemType::Qp {
            self.set_hessian(lin.hessian)?;
            self.set_linear_objective(lin.gradient, rho);
        } else {
            self.update_penalty(rho);
        }
        self.set_bounds(delta, lin);
        self.flags = DirtyFlags::default();
        Ok(())
    }

    /// Rewrite the stale parts and clear the flags.
    ///
    /// Fails with [`SqpError::QpUnchanged`] when nothing is stale.
    pub fn rebuild(&mut self, delta: f64, rho: f64, lin: &Linearization<'_>) -> SqpResult<()> {
        if !self.flags.any() {
            return Err(SqpError::QpUnchanged);
        }
        let flags = self.flags;
        if flags.jacobian {
            self.set_jacobian(lin.jacobian)?;
        }
        if flags.hessian {
            self.set_hessian(lin.hessian)?;
        }
        if flags.bounds {
            self.set_bounds(delta, lin);
        } else if flags.trust_region {
            self.update_trust_region(delta, lin);
        }
        if flags.penalty {
            self.update_penalty(rho);
        }
        if flags.gradient {
            self.update_gradient(lin.gradient);
        }
        self.flags = DirtyFlags::default();
        Ok(())
    }

    // === Pieces ===

    /// Step and row bounds around `lin.x_k` with trust-region radius `delta`.
    pub fn set_bounds(&mut self, delta: f64, lin: &Linearization<'_>) {
        let n = self.layout.num_nlp_variables();
        let m = self.layout.num_nlp_constraints();
        let formulation = self.layout.formulation();
        let bound_rows = self.layout.bound_row_offset();

        self.for_each_backend(|b| {
            for i in 0..m {
                b.set_lower_constraint_bound(i, shifted(lin.c_l[i], lin.c_k[i]));
                b.set_upper_constraint_bound(i, shifted(lin.c_u[i], lin.c_k[i]));
            }
            if let Some(offset) = bound_rows {
                for i in 0..n {
                    b.set_lower_constraint_bound(offset + i, shifted(lin.x_l[i], lin.x_k[i]));
                    b.set_upper_constraint_bound(offset + i, shifted(lin.x_u[i], lin.x_k[i]));
                }
            }
        });
        self.write_step_bounds(formulation, delta, lin);
    }

    /// Same as [`set_bounds`](Self::set_bounds); used when the iterate moved.
    pub fn update_bounds(&mut self, delta: f64, lin: &Linearization<'_>) {
        self.set_bounds(delta, lin);
    }

    /// Only the radius changed: rewrite the step bounds.
    pub fn update_trust_region(&mut self, delta: f64, lin: &Linearization<'_>) {
        let formulation = self.layout.formulation();
        self.write_step_bounds(formulation, delta, lin);
    }

    fn write_step_bounds(&mut self, formulation: Formulation, delta: f64, lin: &Linearization<'_>) {
        let n = self.layout.num_nlp_variables();
        let bounds: Vec<(f64, f64)> = (0..n)
            .map(|i| match formulation {
                Formulation::Compact => (
                    shifted(lin.x_l[i], lin.x_k[i]).max(-delta),
                    shifted(lin.x_u[i], lin.x_k[i]).min(delta),
                ),
                Formulation::SlackRange => (-delta, delta),
            })
            .collect();
        self.radius_sides = (0..n)
            .map(|i| match formulation {
                Formulation::Compact => (
                    shifted(lin.x_l[i], lin.x_k[i]) < -delta,
                    shifted(lin.x_u[i], lin.x_k[i]) > delta,
                ),
                Formulation::SlackRange => (true, true),
            })
            .collect();
        self.for_each_backend(|b| {
            for (i, &(lower, upper)) in bounds.iter().enumerate() {
                b.set_lower_variable_bound(i, lower);
                b.set_upper_variable_bound(i, upper);
            }
        });
    }

    /// Gradient on the step block and `rho` on every slack.
    pub fn set_linear_objective(&mut self, gradient: &Vector, rho: f64) {
        self.update_gradient(gradient);
        self.update_penalty(rho);
    }

    pub fn update_gradient(&mut self, gradient: &Vector) {
        self.for_each_backend(|b| {
            for (i, &g) in gradient.iter().enumerate() {
                b.set_linear_objective_coefficient(i, g);
            }
        });
    }

    /// Write `rho` on the slack block unless it is already there.
    pub fn update_penalty(&mut self, rho: f64) {
        if rho == self.last_penalty {
            return;
        }
        let (start, end) = (self.layout.slack_offset(), self.layout.num_qp_variables());
        self.for_each_backend(|b| {
            for j in start..end {
                b.set_linear_objective_coefficient(j, rho);
            }
        });
        self.last_penalty = rho;
    }

    /// Install the shifted Hessian; structure on the first call, values
    /// afterwards.
    pub fn set_hessian(&mut self, hessian: &SparseTriplet) -> SqpResult<()> {
        let n = hessian.num_rows();
        let nnz = hessian.nnz();
        let mut convexified = match self.convexified.take() {
            Some(t) => t,
            None => {
                let mut rows = hessian.row_indices().to_vec();
                let mut cols = hessian.col_indices().to_vec();
                rows.extend(0..n);
                cols.extend(0..n);
                let mut t = SparseTriplet::new(n, n, nnz + n, true);
                t.set_structure(&rows, &cols)?;
                t
            }
        };
        if convexified.nnz() != nnz + n {
            return Err(SqpError::Structure(format!(
                "Hessian changed from {} to {} entries",
                convexified.nnz() - n,
                nnz
            )));
        }

        let shift = convexity_shift(hessian);
        if shift > 0.0 && shift != self.hessian_shift {
            log::trace!("Hessian shifted by {:.3e}", shift);
        }
        let values = convexified.values_mut();
        values[..nnz].copy_from_slice(hessian.values());
        values[nnz..].fill(shift);

        let result = self.try_for_each_backend(|b| b.set_objective_hessian(&convexified));
        self.convexified = Some(convexified);
        self.hessian_shift = shift;
        result
    }

    /// Install the Jacobian next to the slack identity blocks; structure on
    /// the first call, values afterwards.
    pub fn set_jacobian(&mut self, jacobian: &SparseTriplet) -> SqpResult<()> {
        let identities = std::mem::take(&mut self.identities);
        let result = self.try_for_each_backend(|b| b.set_constraint_jacobian(jacobian, &identities));
        self.identities = identities;
        result
    }

    // === Solve and results ===

    /// Solve; on failure retry once from scratch. An optimal answer that
    /// fails the KKT re-check is reported as [`QpStatus::NotOptimal`].
    pub fn solve(&mut self, stats: &mut Statistics) -> QpStatus {
        let mut status = self.backend.optimize(stats);
        if status != QpStatus::Optimal {
            log::warn!(
                "{} {:?} solve returned {:?}, retrying from scratch",
                self.backend.name(),
                self.problem_type,
                status
            );
            stats.qp_retries += 1;
            self.backend.reset();
            status = self.backend.optimize(stats);
        }

        if status == QpStatus::Optimal {
            let kkt = self.backend.kkt_error();
            if kkt.worst() > self.kkt_tol {
                log::warn!(
                    "{} {:?} solution fails KKT re-check: {:?}",
                    self.backend.name(),
                    self.problem_type,
                    kkt
                );
                status = QpStatus::NotOptimal;
            }
        }

        if let Some(shadow) = self.shadow.as_mut() {
            shadow.compare(self.backend.as_ref(), stats);
        }

        self.status = status;
        status
    }

    /// Step block of the last solution.
    pub fn step(&self) -> &[f64] {
        let x = self.backend.primal_solution();
        &x[..self.layout.num_nlp_variables().min(x.len())]
    }

    /// Objective of the last solution.
    pub fn objective(&self) -> f64 {
        self.backend.objective_value()
    }

    /// One-norm of the slacks of the last solution.
    pub fn model_infeasibility(&self) -> f64 {
        let x = self.backend.primal_solution();
        x.iter().skip(self.layout.slack_offset()).map(|v| v.abs()).sum()
    }

    /// Multipliers of the NLP variable bounds.
    ///
    /// In the compact form a step bound set by the trust region carries no
    /// NLP bound multiplier; those entries are zero.
    pub fn bound_multipliers(&self) -> Vector {
        let n = self.layout.num_nlp_variables();
        match self.layout.bound_row_offset() {
            Some(offset) => self
                .backend
                .constraint_multipliers()
                .get(offset..offset + n)
                .map(Vector::from_slice)
                .unwrap_or_else(|| Vector::new(n)),
            None => {
                let Some(mu) = self.backend.bound_multipliers().get(..n) else {
                    return Vector::new(n);
                };
                let mut out = Vector::new(n);
                for (i, (&value, &(lower_radius, upper_radius))) in
                    mu.iter().zip(&self.radius_sides).enumerate()
                {
                    let radius_side = if value > 0.0 { lower_radius } else { upper_radius };
                    if !radius_side {
                        out[i] = value;
                    }
                }
                out
            }
        }
    }

    /// `H p` with the Hessian currently installed, shift included.
    pub fn hessian_times(&self, p: &[f64]) -> Vector {
        match &self.convexified {
            Some(hessian) => hessian.times(p),
            None => Vector::new(p.len()),
        }
    }

    /// Multipliers of the NLP constraints.
    pub fn constraint_multipliers(&self) -> Vector {
        let m = self.layout.num_nlp_constraints();
        self.backend
            .constraint_multipliers()
            .get(..m)
            .map(Vector::from_slice)
            .unwrap_or_else(|| Vector::new(m))
    }

    /// Activity of every subproblem variable and row at `point`, or at the
    /// last solution when `point` is `None`.
    pub fn active_set(&self, point: Option<&[f64]>) -> (Vec<ActivityStatus>, Vec<ActivityStatus>) {
        let tol = self.active_set_tol;
        let data = self.backend.data();
        let x = point.unwrap_or_else(|| self.backend.primal_solution());
        if x.len() != data.num_variables {
            return (
                vec![ActivityStatus::Inactive; data.num_variables],
                vec![ActivityStatus::Inactive; data.num_constraints],
            );
        }
        let ax = data.constraint_values(x);
        let tag = |value: f64, lower: f64, upper: f64| {
            activity(classify(lower, upper), value, lower, upper, tol)
        };
        let vars = (0..data.num_variables)
            .map(|j| tag(x[j], data.lb[j], data.ub[j]))
            .collect();
        let rows = (0..data.num_constraints)
            .map(|i| tag(ax[i], data.lb_a[i], data.ub_a[i]))
            .collect();
        (vars, rows)
    }

    /// Write the current subproblem to `<dir>/<name>_<qp|lp>data.json`.
    pub fn write_dump(&self, dir: &Path, name: &str) -> SqpResult<PathBuf> {
        let suffix = match self.problem_type {
            ProblemType::Qp => "qpdata",
            ProblemType::Lp => "lpdata",
        };
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}_{suffix}.json"));
        self.backend.dump()?.write_json(&path)?;
        Ok(path)
    }
}
