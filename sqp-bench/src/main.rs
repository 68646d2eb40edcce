//! Benchmarking CLI for the SQP driver.

mod problems;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sqp_core::{solve, Formulation, QpSolverChoice, SqpOptions};

use problems::{select, ProblemChoice};
use report::{print_table, BenchRecord, BenchReport};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormulationArg {
    Compact,
    SlackRange,
}

impl From<FormulationArg> for Formulation {
    fn from(arg: FormulationArg) -> Self {
        match arg {
            FormulationArg::Compact => Formulation::Compact,
            FormulationArg::SlackRange => Formulation::SlackRange,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SolverArg {
    Clarabel,
}

impl From<SolverArg> for QpSolverChoice {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Clarabel => QpSolverChoice::Clarabel,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sqp-bench", about = "Run the SQP driver on a set of test problems")]
struct Args {
    /// Problem to run
    #[arg(long, value_enum, default_value = "all")]
    problem: ProblemChoice,

    /// Dimension of the scalable problems
    #[arg(long, default_value_t = 50)]
    size: usize,

    /// Subproblem formulation
    #[arg(long, value_enum, default_value = "compact")]
    formulation: FormulationArg,

    /// QP/LP backend for the subproblems
    #[arg(long, value_enum, default_value = "clarabel")]
    qp_solver: SolverArg,

    /// Re-solve every subproblem with this backend and report disagreements
    #[arg(long, value_enum)]
    shadow_solver: Option<SolverArg>,

    /// Outer iteration limit
    #[arg(long, default_value_t = 200)]
    iter_max: usize,

    /// Wall-clock limit per problem in seconds
    #[arg(long, default_value_t = 60.0)]
    time_limit: f64,

    /// Disable the second-order correction
    #[arg(long)]
    no_soc: bool,

    /// Driver print level (0 silent, 1 summary, 2 iteration table)
    #[arg(long, default_value_t = 0)]
    print_level: u8,

    /// Directory for subproblem dumps on QP failures
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Write results as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut options = SqpOptions::default()
        .with_iter_max(args.iter_max)
        .with_time_limit(args.time_limit)
        .with_formulation(args.formulation.into())
        .with_second_order_correction(!args.no_soc);
    options.print_level = args.print_level;
    options.qp_solver_choice = args.qp_solver.into();
    if let Some(shadow) = args.shadow_solver {
        options = options.with_shadow_solver(shadow.into());
    }
    if let Some(dir) = &args.dump_dir {
        options = options.with_dump_dir(dir);
    }

    let mut records = Vec::new();
    for mut problem in select(args.problem, args.size) {
        let sizes = problem.nlp.sizes()?;
        log::info!(
            "Solving {} ({} variables, {} constraints)",
            sizes.name,
            sizes.num_variables,
            sizes.num_constraints
        );
        let start = Instant::now();
        let outcome = solve(&mut *problem.nlp, &options)
            .with_context(|| format!("SQP run on {} failed", sizes.name))?;
        records.push(BenchRecord::new(
            &sizes,
            problem.reference_objective,
            start.elapsed(),
            outcome,
        ));
    }

    print_table(&records);

    if let Some(path) = &args.json {
        BenchReport {
            formulation: args.formulation.into(),
            options,
            records,
        }
        .save_json(path)?;
        println!("\nResults written to {}", path.display());
    }
    Ok(())
}
