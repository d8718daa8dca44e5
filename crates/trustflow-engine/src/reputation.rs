//! Developer reputation derived from onchain pretrust.
//!
//! For every `(event_month, developer)` group of commit edges, the developer earns the
//! mean pretrust of the distinct onchain projects they committed to that month. Monthly
//! credit accumulates additively, and the totals are min-max scaled to `[0, 1]`.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::TrustGraph;
use crate::model::{DeveloperProjectEvent, DeveloperReputation, LinkType, ScoreEntry, ScoreVector};
use crate::pretrust::minmax_scale;

/// Reputation per developer, ascending by id.
///
/// Scaling follows [`minmax_scale`]: when every developer has the same raw total (including
/// a single developer whose projects all have zero pretrust), everyone gets 0.5.
pub fn compute_developer_reputation(
    graph: &TrustGraph,
    onchain_pretrust: &ScoreVector,
    events: &[DeveloperProjectEvent],
) -> Vec<DeveloperReputation> {
    let project_reputation = onchain_pretrust.to_map();

    let mut commit_history: BTreeMap<(NaiveDate, &str), BTreeSet<&str>> = BTreeMap::new();
    for edge in graph.edges_of(LinkType::OnchainProjectToDeveloper) {
        commit_history
            .entry((edge.event_month, edge.j.as_str()))
            .or_default()
            .insert(edge.i.as_str());
    }

    let mut raw: BTreeMap<&str, f64> = BTreeMap::new();
    for ((_, developer), projects) in &commit_history {
        let value: f64 = projects
            .iter()
            .map(|p| project_reputation.get(p).copied().unwrap_or(0.0))
            .sum();
        *raw.entry(*developer).or_default() += value / projects.len() as f64;
    }

    let mut names: HashMap<&str, &str> = HashMap::new();
    for ev in events {
        names.insert(&ev.developer_id, &ev.developer_name);
    }

    let values: Vec<f64> = raw.values().copied().collect();
    let scaled = minmax_scale(&values);

    let out: Vec<DeveloperReputation> = raw
        .keys()
        .zip(scaled)
        .map(|(developer, reputation)| DeveloperReputation {
            developer_id: developer.to_string(),
            developer_name: names.get(developer).map(|n| n.to_string()),
            reputation,
        })
        .collect();

    tracing::debug!(developers = out.len(), "computed developer reputation");
    out
}

/// Reputation as a score vector keyed by developer id.
pub fn reputation_scores(reputation: &[DeveloperReputation]) -> ScoreVector {
    ScoreVector::new(
        reputation
            .iter()
            .map(|r| ScoreEntry::new(r.developer_id.clone(), r.reputation))
            .collect(),
    )
}
