//! Result table and JSON output.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqp_core::{ExitStatus, Formulation, NlpSizes, SolveOutcome, SqpOptions};

/// One problem's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    pub name: String,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub reference_objective: Option<f64>,
    /// Relative distance to the reference objective, if one is known.
    pub objective_error: Option<f64>,
    pub solve_time_ms: u64,
    pub outcome: SolveOutcome,
}

impl BenchRecord {
    pub fn new(
        sizes: &NlpSizes,
        reference_objective: Option<f64>,
        elapsed: Duration,
        outcome: SolveOutcome,
    ) -> Self {
        let objective_error = reference_objective
            .map(|r| (outcome.objective - r).abs() / (1.0 + r.abs()));
        Self {
            name: sizes.name.clone(),
            num_variables: sizes.num_variables,
            num_constraints: sizes.num_constraints,
            reference_objective,
            objective_error,
            solve_time_ms: elapsed.as_millis() as u64,
            outcome,
        }
    }
}

/// Everything written by `--json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub formulation: Formulation,
    pub options: SqpOptions,
    pub records: Vec<BenchRecord>,
}

impl BenchReport {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub fn print_table(records: &[BenchRecord]) {
    println!(
        "{:<18} {:>6} {:>5} {:<24} {:>6} {:>16} {:>10} {:>10} {:>8} {:>10}",
        "problem", "n", "m", "status", "iter", "objective", "infea", "kkt", "qp", "time"
    );
    println!("{}", "-".repeat(122));
    for r in records {
        let o = &r.outcome;
        println!(
            "{:<18} {:>6} {:>5} {:<24} {:>6} {:>16.8e} {:>10.2e} {:>10.2e} {:>8} {:>8}ms",
            r.name,
            r.num_variables,
            r.num_constraints,
            o.status.to_string(),
            o.stats.iter,
            o.objective,
            o.infeasibility,
            o.optimality.kkt_error,
            o.stats.qp_solves,
            r.solve_time_ms
        );
    }

    let optimal = records
        .iter()
        .filter(|r| r.outcome.status == ExitStatus::Optimal)
        .count();
    let matched = records
        .iter()
        .filter(|r| r.objective_error.is_some_and(|e| e < 1e-6))
        .count();
    let with_reference = records.iter().filter(|r| r.reference_objective.is_some()).count();
    println!("{}", "-".repeat(122));
    println!(
        "Optimal: {}/{}   Reference objective matched: {}/{}",
        optimal,
        records.len(),
        matched,
        with_reference
    );
}
