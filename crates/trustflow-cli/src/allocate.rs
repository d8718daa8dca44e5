use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use trustflow_engine::{allocate_with_constraints, AllocationConfig};
use trustflow_ingest_csv::{
    aggregated_scores, read_results, write_allocations, write_allocations_to,
};

pub fn cmd_allocate(
    results: &Path,
    budget: f64,
    min_amount: f64,
    max_share: f64,
    rounding: u32,
    out: Option<&PathBuf>,
) -> Result<()> {
    let rows = read_results(results)
        .with_context(|| format!("failed to read results {}", results.display()))?;
    let scores = aggregated_scores(&rows);

    let config = AllocationConfig {
        rounding,
        ..AllocationConfig::new(budget, min_amount, max_share)
    };
    let allocations = allocate_with_constraints(&scores, &config)
        .with_context(|| format!("failed to allocate over {}", results.display()))?;

    match out {
        Some(path) => {
            write_allocations(&allocations, path)?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => write_allocations_to(&allocations, std::io::stdout().lock())
            .context("failed to write allocations to stdout")?,
    }

    let funded = allocations.iter().filter(|a| a.amount > 0.0).count();
    let total: f64 = allocations.iter().map(|a| a.amount).sum();
    tracing::info!(
        funded,
        projects = allocations.len(),
        total,
        budget,
        "allocation complete"
    );
    Ok(())
}
