//! Index layout of the penalized trust-region subproblem.
//!
//! With `n` NLP variables and `m` NLP constraints:
//!
//! ```text
//! Compact     vars [p (n) | u (m) | v (m)]                       rows [J p + u - v (m)]
//! SlackRange  vars [p (n) | u (m) | v (m) | u_x (n) | v_x (n)]   rows [J p + u - v (m) | p + u_x - v_x (n)]
//! ```
//!
//! Every slack has bounds `[0, inf)` and objective coefficient `rho`.

use crate::linalg::IdentityBlock;
use crate::options::Formulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubproblemLayout {
    formulation: Formulation,
    num_nlp_variables: usize,
    num_nlp_constraints: usize,
}

impl SubproblemLayout {
    pub fn new(formulation: Formulation, num_nlp_variables: usize, num_nlp_constraints: usize) -> Self {
        Self {
            formulation,
            num_nlp_variables,
            num_nlp_constraints,
        }
    }

    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    pub fn num_nlp_variables(&self) -> usize {
        self.num_nlp_variables
    }

    pub fn num_nlp_constraints(&self) -> usize {
        self.num_nlp_constraints
    }

    pub fn num_qp_variables(&self) -> usize {
        let (n, m) = (self.num_nlp_variables, self.num_nlp_constraints);
        match self.formulation {
            Formulation::Compact => n + 2 * m,
            Formulation::SlackRange => 3 * n + 2 * m,
        }
    }

    pub fn num_qp_constraints(&self) -> usize {
        let (n, m) = (self.num_nlp_variables, self.num_nlp_constraints);
        match self.formulation {
            Formulation::Compact => m,
            Formulation::SlackRange => m + n,
        }
    }

    /// First slack column; slacks run to the end of the variable vector.
    pub fn slack_offset(&self) -> usize {
        self.num_nlp_variables
    }

    /// First row carrying a variable bound, if bounds are rows.
    pub fn bound_row_offset(&self) -> Option<usize> {
        match self.formulation {
            Formulation::Compact => None,
            Formulation::SlackRange => Some(self.num_nlp_constraints),
        }
    }

    /// Fixed blocks appended to the NLP Jacobian.
    pub fn identity_blocks(&self) -> Vec<IdentityBlock> {
        let (n, m) = (self.num_nlp_variables, self.num_nlp_constraints);
        let mut blocks = vec![
            IdentityBlock::new(0, n, m, 1.0),
            IdentityBlock::new(0, n + m, m, -1.0),
        ];
        if self.formulation == Formulation::SlackRange {
            blocks.push(IdentityBlock::new(m, 0, n, 1.0));
            blocks.push(IdentityBlock::new(m, n + 2 * m, n, 1.0));
            blocks.push(IdentityBlock::new(m, 2 * n + 2 * m, n, -1.0));
        }
        blocks
    }
}
