use crate::error::SqpResult;
use crate::nlp::NlpProblem;
use crate::qp::{Linearization, QpStatus};

use super::{linearize, Algorithm, Phase, Subproblem};

impl<N: NlpProblem> Algorithm<N> {
    /// Second-order correction of a rejected step.
    ///
    /// Solves the QP again with the gradient shifted to `H p + g` and the
    /// constraints linearized at the trial point, then retests `p + s`. If the
    /// corrected point is rejected too, the step, gradient and bounds of the
    /// original subproblem are put back.
    pub(super) fn second_order_correction(&mut self) -> SqpResult<()> {
        self.phase = Phase::SecondOrderCorrection;
        self.stats.soc_trial += 1;

        let p_saved = self.p_k.clone();
        let qp_obj_saved = self.qp_obj;
        let norm_saved = self.norm_p_k;
        let ratio_saved = self.ratio;

        let mut shifted_gradient = self.qp.hessian_times(self.p_k.values());
        shifted_gradient.add_vector(self.iterate.gradient.values());
        self.qp.update_gradient(&shifted_gradient);
        self.qp.update_penalty(self.rho);
        let at_trial = Linearization {
            x_k: &self.x_trial,
            c_k: &self.c_trial,
            ..linearize(&self.iterate, &self.bounds)
        };
        self.qp.update_bounds(self.delta, &at_trial);

        let status = self.qp.solve(&mut self.stats);
        if status != QpStatus::Optimal {
            self.fail_on_subproblem(Subproblem::Qp, status);
            return Ok(());
        }

        // Model value at p + s: the quadratic part at p plus the correction
        // objective, which carries the new slack penalty.
        self.qp_obj = self.qp.objective() + (qp_obj_saved - self.rho * self.infea_model);
        self.p_k.add_vector(self.qp.step());

        self.evaluate_trial_point()?;
        self.ratio_test()?;

        if self.ratio.accepted {
            self.stats.soc_succ += 1;
            log::debug!("Second-order correction accepted, |p| = {:.3e}", self.norm_p_k);
        } else {
            self.p_k = p_saved;
            self.qp_obj = qp_obj_saved;
            self.norm_p_k = norm_saved;
            self.ratio = ratio_saved;
            self.qp.update_gradient(&self.iterate.gradient);
            self.qp
                .update_bounds(self.delta, &linearize(&self.iterate, &self.bounds));
        }
        Ok(())
    }
}
