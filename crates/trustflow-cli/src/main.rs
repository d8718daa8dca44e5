//! Trustflow CLI
//!
//! - `run`: load an experiment and its CSV snapshot, run the pipeline, write the result
//!   tables and print a report
//! - `allocate`: split a budget over a previously written results file

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod allocate;
mod run;

#[derive(Parser)]
#[command(name = "trustflow")]
#[command(
    author,
    version,
    about = "Trustflow: trust propagation from onchain projects to devtooling"
)]
struct Cli {
    /// Debug logging (overrides `RUST_LOG`)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the devtooling pipeline for one experiment file.
    ///
    /// Writes `devtooling_openrank_results.csv`, `detailed_devtooling_graph.csv` and
    /// `value_flow_sankey.csv` (plus `devtooling_allocations.csv` when the experiment has an
    /// `allocation` section) into the data directory unless `--out-dir` is given.
    Run {
        /// Experiment YAML file
        experiment: PathBuf,
        /// Override `data_snapshot.data_dir`
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Directory for the result tables (default: the data directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Report format: json|text
        #[arg(long, default_value = "text")]
        format: String,
        /// Number of ranked projects shown in the report
        #[arg(long, default_value_t = 20)]
        top: usize,
        /// Print the report without writing any file
        #[arg(long)]
        no_write: bool,
    },

    /// Allocate a budget over the `v_aggregated` column of a results file.
    Allocate {
        /// `devtooling_openrank_results.csv` written by `run`
        results: PathBuf,
        #[arg(long)]
        budget: f64,
        /// Projects below this amount receive nothing
        #[arg(long, default_value_t = 0.0)]
        min_amount: f64,
        /// Largest share of the budget one project may receive
        #[arg(long, default_value_t = 1.0)]
        max_share: f64,
        /// Decimal places kept in the amounts
        #[arg(long, default_value_t = 2)]
        rounding: u32,
        /// Output CSV (default: print to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            experiment,
            data_dir,
            out_dir,
            format,
            top,
            no_write,
        } => run::cmd_run(&run::RunArgs {
            experiment,
            data_dir,
            out_dir,
            format,
            top,
            no_write,
        }),
        Commands::Allocate {
            results,
            budget,
            min_amount,
            max_share,
            rounding,
            out,
        } => allocate::cmd_allocate(
            &results,
            budget,
            min_amount,
            max_share,
            rounding,
            out.as_ref(),
        ),
    }
}
