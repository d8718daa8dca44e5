//! Value-flow decomposition by iterative proportional fitting (RAS).
//!
//! Connectivity between onchain and devtooling projects comes from two sources:
//! - each `PACKAGE_DEPENDENCY` edge links its onchain source to its devtooling target,
//! - each `DEVELOPER_TO_DEVTOOLING_PROJECT` edge links every onchain project the developer
//!   committed to with the devtooling target.
//!
//! The count matrix is then scaled so that row sums match the onchain pretrust and
//! column sums match `v_aggregated`. Scaling is applied to the contribution matrix itself
//! (`X ← diag(r)·X`, then `X ← X·diag(s)`), so entries stay bounded even when the two
//! margins cannot both be met.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::FittingSettings;
use crate::model::{DevtoolingResult, LinkType, ScoreVector, ValueFlowEdge};
use crate::weighting::WeightedEdge;

/// Dense `onchain × devtooling` connectivity counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityMatrix {
    pub onchain_ids: Vec<String>,
    pub devtooling_ids: Vec<String>,
    /// Row-major, `onchain_ids.len() * devtooling_ids.len()` cells.
    pub counts: Vec<f64>,
}

impl ConnectivityMatrix {
    pub fn rows(&self) -> usize {
        self.onchain_ids.len()
    }

    pub fn cols(&self) -> usize {
        self.devtooling_ids.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.counts[row * self.cols() + col]
    }
}

pub fn build_connectivity(weighted_edges: &[WeightedEdge]) -> ConnectivityMatrix {
    let mut onchain_by_developer: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for e in weighted_edges
        .iter()
        .filter(|e| e.link_type() == LinkType::OnchainProjectToDeveloper)
    {
        onchain_by_developer
            .entry(e.edge.j.as_str())
            .or_default()
            .insert(e.edge.i.as_str());
    }

    let mut pair_counts: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for e in weighted_edges {
        match e.link_type() {
            LinkType::PackageDependency => {
                *pair_counts
                    .entry((e.edge.i.as_str(), e.edge.j.as_str()))
                    .or_default() += 1.0;
            }
            LinkType::DeveloperToDevtoolingProject => {
                let Some(projects) = onchain_by_developer.get(e.edge.i.as_str()) else {
                    continue;
                };
                for onchain in projects {
                    *pair_counts
                        .entry((*onchain, e.edge.j.as_str()))
                        .or_default() += 1.0;
                }
            }
            LinkType::OnchainProjectToDeveloper => {}
        }
    }

    let onchain_ids: Vec<String> = pair_counts
        .keys()
        .map(|(i, _)| *i)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let devtooling_ids: Vec<String> = pair_counts
        .keys()
        .map(|(_, j)| *j)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let row_of: HashMap<&str, usize> = onchain_ids
        .iter()
        .enumerate()
        .map(|(k, id)| (id.as_str(), k))
        .collect();
    let col_of: HashMap<&str, usize> = devtooling_ids
        .iter()
        .enumerate()
        .map(|(k, id)| (id.as_str(), k))
        .collect();

    let cols = devtooling_ids.len();
    let mut counts = vec![0.0f64; onchain_ids.len() * cols];
    for ((i, j), count) in &pair_counts {
        counts[row_of[i] * cols + col_of[j]] = *count;
    }

    ConnectivityMatrix {
        onchain_ids,
        devtooling_ids,
        counts,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Row-major contribution matrix, same shape as the connectivity matrix.
    pub contributions: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Biproportional fitting of `matrix` to the given margins.
///
/// A row or column whose current sum is 0 is scaled by 0: structurally empty rows and
/// columns cannot receive mass. Convergence is declared when, after a column pass, every
/// row with remaining mass is within `settings.tolerance` of its target.
pub fn fit_biproportional(
    matrix: &ConnectivityMatrix,
    row_targets: &[f64],
    col_targets: &[f64],
    settings: &FittingSettings,
) -> FitOutcome {
    let rows = matrix.rows();
    let cols = matrix.cols();
    debug_assert_eq!(row_targets.len(), rows);
    debug_assert_eq!(col_targets.len(), cols);

    let mut x = matrix.counts.clone();
    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < settings.max_iterations {
        iterations += 1;

        for i in 0..rows {
            let row = &mut x[i * cols..(i + 1) * cols];
            let sum: f64 = row.iter().sum();
            let r = if sum > 0.0 { row_targets[i] / sum } else { 0.0 };
            for cell in row.iter_mut() {
                *cell *= r;
            }
        }

        for j in 0..cols {
            let sum: f64 = (0..rows).map(|i| x[i * cols + j]).sum();
            let s = if sum > 0.0 { col_targets[j] / sum } else { 0.0 };
            for i in 0..rows {
                x[i * cols + j] *= s;
            }
        }

        let max_gap = (0..rows)
            .filter_map(|i| {
                let sum: f64 = x[i * cols..(i + 1) * cols].iter().sum();
                (sum > 0.0).then(|| (sum - row_targets[i]).abs())
            })
            .fold(0.0f64, f64::max);
        if max_gap <= settings.tolerance {
            converged = true;
            break;
        }
    }

    FitOutcome {
        contributions: x,
        iterations,
        converged,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSide {
    Onchain,
    Devtooling,
}

/// A project whose contributions do not add up to its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationMismatch {
    pub side: FlowSide,
    pub project_id: String,
    pub allocated: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFlow {
    pub edges: Vec<ValueFlowEdge>,
    pub iterations: usize,
    pub converged: bool,
    pub mismatches: Vec<ConservationMismatch>,
}

/// Pipeline stage: explains every devtooling project's `v_aggregated` as contributions
/// from onchain projects.
///
/// Mismatches are reported for every onchain row and devtooling column of the matrix, and
/// for devtooling projects with a positive score but no onchain connectivity at all.
pub fn serialize_value_flow(
    weighted_edges: &[WeightedEdge],
    onchain_pretrust: &ScoreVector,
    results: &[DevtoolingResult],
    settings: &FittingSettings,
) -> ValueFlow {
    let matrix = build_connectivity(weighted_edges);
    let onchain_scores = onchain_pretrust.to_map();
    let mut devtooling_scores: HashMap<&str, f64> = HashMap::new();
    for r in results {
        devtooling_scores
            .entry(r.project_id.as_str())
            .or_insert(r.v_aggregated);
    }

    let row_targets: Vec<f64> = matrix
        .onchain_ids
        .iter()
        .map(|id| onchain_scores.get(id.as_str()).copied().unwrap_or(0.0))
        .collect();
    let col_targets: Vec<f64> = matrix
        .devtooling_ids
        .iter()
        .map(|id| devtooling_scores.get(id.as_str()).copied().unwrap_or(0.0))
        .collect();

    let fit = fit_biproportional(&matrix, &row_targets, &col_targets, settings);
    let cols = matrix.cols();

    let mut edges = Vec::new();
    let mut row_sums = vec![0.0f64; matrix.rows()];
    let mut col_sums = vec![0.0f64; cols];
    for (k, &value) in fit.contributions.iter().enumerate() {
        if value > 0.0 {
            let (i, j) = (k / cols, k % cols);
            row_sums[i] += value;
            col_sums[j] += value;
            edges.push(ValueFlowEdge {
                onchain_project_id: matrix.onchain_ids[i].clone(),
                devtooling_project_id: matrix.devtooling_ids[j].clone(),
                contribution: value,
            });
        }
    }

    let tol = settings.conservation_tolerance;
    let mut mismatches = Vec::new();
    for (j, id) in matrix.devtooling_ids.iter().enumerate() {
        if (col_sums[j] - col_targets[j]).abs() > tol {
            mismatches.push(ConservationMismatch {
                side: FlowSide::Devtooling,
                project_id: id.clone(),
                allocated: col_sums[j],
                target: col_targets[j],
            });
        }
    }
    let in_matrix: HashSet<&str> =
        matrix.devtooling_ids.iter().map(String::as_str).collect();
    for r in results {
        if r.v_aggregated > tol && !in_matrix.contains(r.project_id.as_str()) {
            mismatches.push(ConservationMismatch {
                side: FlowSide::Devtooling,
                project_id: r.project_id.clone(),
                allocated: 0.0,
                target: r.v_aggregated,
            });
        }
    }
    for (i, id) in matrix.onchain_ids.iter().enumerate() {
        if (row_sums[i] - row_targets[i]).abs() > tol {
            mismatches.push(ConservationMismatch {
                side: FlowSide::Onchain,
                project_id: id.clone(),
                allocated: row_sums[i],
                target: row_targets[i],
            });
        }
    }

    for m in &mismatches {
        tracing::warn!(
            side = ?m.side,
            project_id = %m.project_id,
            allocated = m.allocated,
            target = m.target,
            "value flow contribution total != target"
        );
    }
    if !fit.converged {
        tracing::warn!(
            iterations = fit.iterations,
            "proportional fitting reached max_iterations without meeting tolerance"
        );
    }
    tracing::info!(
        flows = edges.len(),
        iterations = fit.iterations,
        mismatches = mismatches.len(),
        "serialized value flow"
    );

    ValueFlow {
        edges,
        iterations: fit.iterations,
        converged: fit.converged,
        mismatches,
    }
}
