use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use trustflow_engine::value_flow::ConservationMismatch;
use trustflow_engine::{
    allocate_with_constraints, Allocation, AllocationConfig, Analysis, DevtoolingCalculator,
    ScoreEntry,
};
use trustflow_ingest_csv::{
    load_experiment, load_snapshot, write_allocations, write_analysis, ALLOCATIONS_FILE,
};

pub struct RunArgs {
    pub experiment: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub format: String,
    pub top: usize,
    pub no_write: bool,
}

// =============================================================================
// Report format
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunReportV1 {
    pub version: String,
    pub experiment: String,
    pub data_dir: String,
    pub devtooling_projects: usize,
    pub eligible_projects: usize,
    pub weighted_edges: usize,
    pub active_edges: usize,
    pub eigentrust: ConvergenceV1,
    pub value_flow: ValueFlowSummaryV1,
    pub top_projects: Vec<RankedProjectV1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<Vec<Allocation>>,
    pub written: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceV1 {
    pub iterations: usize,
    pub converged: bool,
    pub residual: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueFlowSummaryV1 {
    pub flows: usize,
    pub iterations: usize,
    pub converged: bool,
    pub mismatches: Vec<ConservationMismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedProjectV1 {
    pub rank: usize,
    pub project_id: String,
    pub display_name: String,
    pub is_eligible: bool,
    pub v: f64,
    pub v_aggregated: f64,
}

pub fn cmd_run(args: &RunArgs) -> Result<()> {
    let mut experiment = load_experiment(&args.experiment)
        .with_context(|| format!("failed to load experiment {}", args.experiment.display()))?;
    if let Some(dir) = &args.data_dir {
        experiment.data_snapshot.data_dir = dir.clone();
    }
    let snapshot = &experiment.data_snapshot;

    let inputs = load_snapshot(snapshot, &experiment.simulation).with_context(|| {
        format!("failed to load snapshot from {}", snapshot.data_dir.display())
    })?;
    let calculator = DevtoolingCalculator::new(experiment.simulation.clone())?;
    let analysis = calculator
        .run_analysis(&inputs)
        .context("devtooling analysis failed")?;

    let out_dir = args.out_dir.as_ref().unwrap_or(&snapshot.data_dir);
    let mut written = Vec::new();
    if !args.no_write {
        let paths = write_analysis(&analysis, out_dir)
            .with_context(|| format!("failed to write results to {}", out_dir.display()))?;
        written.extend([paths.results, paths.weighted_edges, paths.value_flow]);
        report_written(&written);
    }

    let allocation = match &experiment.allocation {
        Some(config) => run_allocation(&analysis, config)?,
        None => None,
    };

    match &allocation {
        Some(allocations) if !args.no_write => {
            let path = out_dir.join(ALLOCATIONS_FILE);
            write_allocations(allocations, &path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            report_written(std::slice::from_ref(&path));
            written.push(path);
        }
        _ => {}
    }

    let report = build_report(
        &analysis,
        &args.experiment.display().to_string(),
        &snapshot.data_dir.display().to_string(),
        args.top,
        allocation,
        written.iter().map(|p| p.display().to_string()).collect(),
    );

    let format = args.format.trim().to_ascii_lowercase();
    let rendered = match format.as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        "text" => render_run_report_text(&report),
        other => return Err(anyhow!("unknown --format `{other}` (expected json|text)")),
    };
    println!("{rendered}");
    Ok(())
}

/// Allocates over `v_aggregated`. With no eligible project there is no score mass to split,
/// so allocation is skipped.
fn run_allocation(
    analysis: &Analysis,
    config: &AllocationConfig,
) -> Result<Option<Vec<Allocation>>> {
    let scores: Vec<ScoreEntry> = analysis
        .devtooling_project_results
        .iter()
        .map(|r| ScoreEntry::new(r.project_id.clone(), r.v_aggregated))
        .collect();
    let total: f64 = scores.iter().map(|s| s.v).sum();
    if !(total > 0.0) {
        tracing::warn!(
            budget = config.budget,
            "no eligible devtooling project; skipping allocation"
        );
        return Ok(None);
    }
    let allocations =
        allocate_with_constraints(&scores, config).context("budget allocation failed")?;
    Ok(Some(allocations))
}

fn report_written(paths: &[PathBuf]) {
    for path in paths {
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
}

pub fn build_report(
    analysis: &Analysis,
    experiment: &str,
    data_dir: &str,
    top: usize,
    allocation: Option<Vec<Allocation>>,
    written: Vec<String>,
) -> RunReportV1 {
    let results = &analysis.devtooling_project_results;
    let trust = &analysis.project_openrank_scores;
    let flow = &analysis.detailed_value_flow_graph;

    RunReportV1 {
        version: "run_report_v1".to_string(),
        experiment: experiment.to_string(),
        data_dir: data_dir.to_string(),
        devtooling_projects: results.len(),
        eligible_projects: results.iter().filter(|r| r.is_eligible).count(),
        weighted_edges: analysis.weighted_edges.len(),
        active_edges: analysis.weighted_edges.iter().filter(|e| e.is_active()).count(),
        eigentrust: ConvergenceV1 {
            iterations: trust.iterations,
            converged: trust.converged,
            residual: trust.residual,
        },
        value_flow: ValueFlowSummaryV1 {
            flows: flow.edges.len(),
            iterations: flow.iterations,
            converged: flow.converged,
            mismatches: flow.mismatches.clone(),
        },
        top_projects: results
            .iter()
            .take(top)
            .enumerate()
            .map(|(i, r)| RankedProjectV1 {
                rank: i + 1,
                project_id: r.project_id.clone(),
                display_name: r.display_name.clone(),
                is_eligible: r.is_eligible,
                v: r.v,
                v_aggregated: r.v_aggregated,
            })
            .collect(),
        allocation,
        written,
    }
}

pub fn render_run_report_text(r: &RunReportV1) -> String {
    let mut out = String::new();
    out.push_str("trustflow/run\n");
    out.push_str(&format!("  experiment: {}\n", r.experiment));
    out.push_str(&format!("  data_dir: {}\n", r.data_dir));
    out.push_str(&format!(
        "  devtooling projects: {}  eligible: {}  edges: {} (active {})\n",
        r.devtooling_projects, r.eligible_projects, r.weighted_edges, r.active_edges
    ));

    out.push_str("\neigentrust\n");
    out.push_str(&format!(
        "  iterations={} converged={} residual={:.3e}\n",
        r.eigentrust.iterations, r.eigentrust.converged, r.eigentrust.residual
    ));

    out.push_str("\nvalue_flow\n");
    out.push_str(&format!(
        "  flows={} iterations={} converged={} mismatches={}\n",
        r.value_flow.flows,
        r.value_flow.iterations,
        r.value_flow.converged,
        r.value_flow.mismatches.len()
    ));
    for m in &r.value_flow.mismatches {
        out.push_str(&format!(
            "  ! {:?} {} allocated={:.6} target={:.6}\n",
            m.side, m.project_id, m.allocated, m.target
        ));
    }

    if !r.top_projects.is_empty() {
        out.push_str("\ntop_projects\n");
        for p in &r.top_projects {
            let marker = if p.is_eligible { " " } else { "x" };
            out.push_str(&format!(
                "  {:>3}. {} {} ({}) v_aggregated={:.6} v={:.6}\n",
                p.rank, marker, p.project_id, p.display_name, p.v_aggregated, p.v
            ));
        }
    }

    if let Some(allocation) = &r.allocation {
        let total: f64 = allocation.iter().map(|a| a.amount).sum();
        let funded = allocation.iter().filter(|a| a.amount > 0.0).count();
        out.push_str("\nallocation\n");
        out.push_str(&format!("  funded={funded} total={total:.2}\n"));
        for a in allocation.iter().filter(|a| a.amount > 0.0).take(r.top_projects.len()) {
            out.push_str(&format!("  {} {:.2}\n", a.project_id, a.amount));
        }
    }
    out
}
