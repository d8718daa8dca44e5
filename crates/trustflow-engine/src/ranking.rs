//! Devtooling project ranking.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::EligibilityThresholds;
use crate::model::{DevtoolingResult, LinkType, ProjectTable, ScoreVector};
use crate::weighting::WeightedEdge;

#[derive(Debug, Default)]
struct IncomingLinks<'a> {
    dependents: HashSet<&'a str>,
    developers: HashSet<&'a str>,
}

/// Ranks devtooling projects.
///
/// Link counts use every weighted edge, including edges that weigh 0. Ineligible projects
/// keep their raw `v` but get `v_aggregated = 0`. Results are sorted by `v_aggregated`
/// descending, then `project_id` ascending.
pub fn rank_devtooling_projects(
    projects: &ProjectTable,
    weighted_edges: &[WeightedEdge],
    scores: &ScoreVector,
    thresholds: &EligibilityThresholds,
) -> Vec<DevtoolingResult> {
    let mut incoming: HashMap<&str, IncomingLinks<'_>> = HashMap::new();
    for e in weighted_edges {
        let links = incoming.entry(e.edge.j.as_str()).or_default();
        match e.link_type() {
            LinkType::PackageDependency => {
                links.dependents.insert(&e.edge.i);
            }
            LinkType::DeveloperToDevtoolingProject => {
                links.developers.insert(&e.edge.i);
            }
            LinkType::OnchainProjectToDeveloper => {}
        }
    }

    let score_of = scores.to_map();
    let mut results: Vec<DevtoolingResult> = projects
        .unique_rows()
        .into_iter()
        .map(|row| {
            let (total_dependents, developer_links) = incoming
                .get(row.project_id.as_str())
                .map(|l| (l.dependents.len(), l.developers.len()))
                .unwrap_or((0, 0));
            let is_eligible = thresholds.is_eligible(total_dependents, developer_links);
            let v = score_of.get(row.project_id.as_str()).copied().unwrap_or(0.0);
            DevtoolingResult {
                project_id: row.project_id.clone(),
                display_name: row.display_name.clone(),
                total_dependents,
                developer_links,
                is_eligible,
                v,
                v_aggregated: if is_eligible { v } else { 0.0 },
            }
        })
        .collect();

    let total: f64 = results.iter().map(|r| r.v_aggregated).sum();
    if total > 0.0 {
        for r in &mut results {
            r.v_aggregated /= total;
        }
    }

    results.sort_by(|a, b| {
        b.v_aggregated
            .partial_cmp(&a.v_aggregated)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });

    tracing::info!(
        projects = results.len(),
        eligible = results.iter().filter(|r| r.is_eligible).count(),
        "ranked devtooling projects"
    );
    results
}
