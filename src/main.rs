//! Actuarial analytics CLI
//!
//! Runs one analysis over a CSV dataset and prints the result payload as
//! pretty JSON to stdout, or to a file with `--output`.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use actuarial_analytics::dataset::{load_table, load_triangle};
use actuarial_analytics::runner::AnalysisRunner;
use actuarial_analytics::survival::SurvivalConfig;

#[derive(Parser)]
#[command(name = "actuarial_analytics", version, about = "Survival, mortality and reserving analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write the result JSON to a file instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Survival analysis over time/event observations
    Survival {
        /// Path to the observations CSV
        path: PathBuf,

        /// Column to stratify the Kaplan-Meier curves by
        #[arg(long)]
        strata: Option<String>,
    },
    /// Mortality table dashboard over age/qx rates
    Mortality {
        /// Path to the rate table CSV
        path: PathBuf,
    },
    /// Chain-ladder reserve over a cumulative run-off triangle
    Reserving {
        /// Path to the triangle CSV (origin column plus one column per
        /// development period)
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Survival { path, strata } => {
            let table = load_table(path)
                .with_context(|| format!("loading observations from {}", path.display()))?;
            let runner = AnalysisRunner::with_configs(
                SurvivalConfig {
                    strata_col: strata.clone(),
                    ..SurvivalConfig::default()
                },
                Default::default(),
            );
            let result = runner.run_survival(&table)?;
            emit(&cli, &result)
        }
        Command::Mortality { path } => {
            let table = load_table(path)
                .with_context(|| format!("loading rate table from {}", path.display()))?;
            let result = AnalysisRunner::new().run_mortality(&table)?;
            emit(&cli, &result)
        }
        Command::Reserving { path } => {
            let triangle = load_triangle(path)
                .with_context(|| format!("loading triangle from {}", path.display()))?;
            let result = AnalysisRunner::new().run_reserving(&triangle)?;
            emit(&cli, &result)
        }
    }
}

fn emit<T: Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            log::info!("result written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
