//! Penalty parameter update.
//!
//! When the QP step leaves the linearized constraints violated, an LP with
//! the same constraints and only the slack objective measures how much
//! infeasibility reduction is achievable inside the trust region. The penalty
//! is then raised geometrically until the QP step captures enough of it.

use crate::error::SqpResult;
use crate::nlp::NlpProblem;
use crate::qp::QpStatus;

use super::{Algorithm, Subproblem};

impl<N: NlpProblem> Algorithm<N> {
    /// Raise `rho` if the current QP step is not reducing the linearized
    /// infeasibility enough. On a subproblem failure the exit status is set
    /// and `Ok` is returned.
    pub(super) fn update_penalty_parameter(&mut self) -> SqpResult<()> {
        if !self.options.penalty_update || self.infea_model <= self.options.penalty_update_tol {
            return Ok(());
        }

        let infea = self.iterate.infeasibility;
        let infea_model_saved = self.infea_model;
        let tol = self.options.penalty_update_tol;
        let rho_max = self.options.rho_max;

        self.setup_lp()?;
        let status = self.lp.solve(&mut self.stats);
        if status != QpStatus::Optimal {
            self.fail_on_subproblem(Subproblem::Lp, status);
            return Ok(());
        }
        let infea_infty = self.lp.model_infeasibility();
        let feasible_model = infea_infty <= tol;

        let mut rho_trial = self.rho;
        let mut trials = 0;
        loop {
            let insufficient = if feasible_model {
                self.infea_model > tol
            } else {
                (infea - self.infea_model) < self.eps1 * (infea - infea_infty)
                    && trials < self.options.penalty_iter_max
            };
            if !insufficient
                || rho_trial >= rho_max
                || self.penalty_trials_total >= self.options.penalty_iter_max_total
            {
                break;
            }

            rho_trial = (rho_trial * self.options.increase_parm).min(rho_max);
            trials += 1;
            self.penalty_trials_total += 1;
            self.stats.penalty_change_trial += 1;

            self.qp.update_penalty(rho_trial);
            let status = self.qp.solve(&mut self.stats);
            if status != QpStatus::Optimal {
                self.fail_on_subproblem(Subproblem::Qp, status);
                return Ok(());
            }
            self.infea_model = self.qp.model_infeasibility();
        }

        if rho_trial > self.rho {
            let pred_trial = rho_trial * infea - self.qp.objective();
            if pred_trial >= self.options.eps2 * rho_trial * (infea - self.infea_model) {
                self.stats.penalty_change_succ += 1;
                self.eps1 += (1.0 - self.eps1) * self.options.eps1_change_parm;
                log::debug!(
                    "Penalty raised {:.3e} -> {:.3e} (model infeasibility {:.3e} -> {:.3e}, LP bound {:.3e})",
                    self.rho,
                    rho_trial,
                    infea_model_saved,
                    self.infea_model,
                    infea_infty
                );
                self.rho = rho_trial;
                self.extract_step();
            } else {
                self.stats.penalty_change_fail += 1;
                log::warn!(
                    "Penalty {:.3e} rejected: predicted reduction {:.3e} too small",
                    rho_trial,
                    pred_trial
                );
                self.infea_model = infea_model_saved;
                self.qp.mark_penalty_changed();
            }
        }
        Ok(())
    }
}
