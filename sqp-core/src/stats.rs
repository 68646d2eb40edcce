//! Run statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters collected over one SQP run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Outer iterations completed
    pub iter: usize,

    /// Inner iterations summed over all QP/LP solves
    pub qp_iter: usize,

    /// Number of QP/LP solves (retries included)
    pub qp_solves: usize,

    /// Fresh re-solves after a failed QP/LP solve
    pub qp_retries: usize,

    /// Penalty values tried
    pub penalty_change_trial: usize,

    /// Penalty increases accepted
    pub penalty_change_succ: usize,

    /// Penalty increases rejected
    pub penalty_change_fail: usize,

    /// Second-order corrections attempted
    pub soc_trial: usize,

    /// Second-order corrections that rescued a step
    pub soc_succ: usize,

    /// Shadow solves that disagreed with the primary backend
    pub shadow_mismatches: usize,

    /// Wall-clock time of the run
    #[serde(with = "duration_secs")]
    pub total_time: Duration,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter_addone(&mut self) {
        self.iter += 1;
    }

    pub fn qp_iter_add(&mut self, iters: usize) {
        self.qp_iter += iters;
        self.qp_solves += 1;
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
