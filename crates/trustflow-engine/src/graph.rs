//! Trust graph construction.
//!
//! Three edge kinds are produced from the input tables:
//! - `PACKAGE_DEPENDENCY`: onchain project → devtooling project, stamped with the newest
//!   event month so it never decays,
//! - `ONCHAIN_PROJECT_TO_DEVELOPER`: one edge per `COMMIT_CODE` event on an onchain project,
//! - `DEVELOPER_TO_DEVTOOLING_PROJECT`: one edge per event of any type on a devtooling project.
//!
//! Engagement edges that would credit a project for its own developers are removed
//! according to the configured [`SelfCreditPolicy`].

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::config::SelfCreditPolicy;
use crate::error::{EngineError, Result};
use crate::model::{AnalysisInputs, DeveloperProjectEvent, Edge, LinkType, COMMIT_CODE};

/// The unweighted edge table plus the facts later stages need about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustGraph {
    /// Dependency edges, then commit edges, then engagement edges (input order within each).
    pub edges: Vec<Edge>,
    /// Newest `event_month` among developer events.
    pub reference_month: NaiveDate,
    /// Engagement edges removed by self-credit exclusion.
    pub self_credit_removed: usize,
}

impl TrustGraph {
    pub fn edges_of(&self, link_type: LinkType) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.link_type == link_type)
    }
}

pub fn build_graph(inputs: &AnalysisInputs, policy: SelfCreditPolicy) -> Result<TrustGraph> {
    let onchain_ids = inputs.onchain_projects.ids();
    let devtooling_ids = inputs.devtooling_projects.ids();
    check_id_collisions(&inputs.developers_to_projects, &onchain_ids, &devtooling_ids)?;

    let mut names: HashMap<&str, &str> = HashMap::new();
    for row in inputs
        .onchain_projects
        .rows
        .iter()
        .chain(&inputs.devtooling_projects.rows)
    {
        names.insert(&row.project_id, &row.display_name);
    }
    let name_of = |id: &str| names.get(id).map(|n| n.to_string());

    let reference_month = inputs
        .developers_to_projects
        .iter()
        .map(|e| e.event_month)
        .max()
        .unwrap_or_default();

    let mut edges: Vec<Edge> = Vec::with_capacity(
        inputs.project_dependencies.len() + inputs.developers_to_projects.len(),
    );

    for dep in &inputs.project_dependencies {
        edges.push(Edge {
            i: dep.onchain_builder_project_id.clone(),
            j: dep.devtooling_project_id.clone(),
            i_name: name_of(&dep.onchain_builder_project_id),
            j_name: name_of(&dep.devtooling_project_id),
            link_type: LinkType::PackageDependency,
            event_type: dep.dependency_source.clone(),
            event_month: reference_month,
        });
    }
    let dependency_count = edges.len();

    let commits: Vec<&DeveloperProjectEvent> = inputs
        .developers_to_projects
        .iter()
        .filter(|e| e.event_type == COMMIT_CODE && onchain_ids.contains(e.project_id.as_str()))
        .collect();
    for ev in &commits {
        edges.push(Edge {
            i: ev.project_id.clone(),
            j: ev.developer_id.clone(),
            i_name: name_of(&ev.project_id),
            j_name: Some(ev.developer_name.clone()),
            link_type: LinkType::OnchainProjectToDeveloper,
            event_type: ev.event_type.clone(),
            event_month: ev.event_month,
        });
    }

    let self_credit = SelfCreditFilter::new(policy, &commits);
    let mut self_credit_removed = 0usize;
    for ev in inputs
        .developers_to_projects
        .iter()
        .filter(|e| devtooling_ids.contains(e.project_id.as_str()))
    {
        if self_credit.excludes(&ev.developer_id, &ev.project_id) {
            self_credit_removed += 1;
            continue;
        }
        edges.push(Edge {
            i: ev.developer_id.clone(),
            j: ev.project_id.clone(),
            i_name: Some(ev.developer_name.clone()),
            j_name: name_of(&ev.project_id),
            link_type: LinkType::DeveloperToDevtoolingProject,
            event_type: ev.event_type.clone(),
            event_month: ev.event_month,
        });
    }

    tracing::info!(
        dependency_edges = dependency_count,
        commit_edges = commits.len(),
        engagement_edges = edges.len() - dependency_count - commits.len(),
        self_credit_removed,
        %reference_month,
        "built trust graph"
    );

    Ok(TrustGraph {
        edges,
        reference_month,
        self_credit_removed,
    })
}

fn check_id_collisions(
    events: &[DeveloperProjectEvent],
    onchain_ids: &HashSet<&str>,
    devtooling_ids: &HashSet<&str>,
) -> Result<()> {
    match events.iter().find(|e| {
        onchain_ids.contains(e.developer_id.as_str())
            || devtooling_ids.contains(e.developer_id.as_str())
    }) {
        Some(ev) => Err(EngineError::NodeIdCollision {
            id: ev.developer_id.clone(),
        }),
        None => Ok(()),
    }
}

/// Developer → own onchain project(s), built from commit edges.
enum SelfCreditFilter<'a> {
    AnyCommitted(HashSet<(&'a str, &'a str)>),
    LastSeen(HashMap<&'a str, &'a str>),
}

impl<'a> SelfCreditFilter<'a> {
    fn new(policy: SelfCreditPolicy, commits: &[&'a DeveloperProjectEvent]) -> Self {
        match policy {
            SelfCreditPolicy::AnyCommittedProject => Self::AnyCommitted(
                commits
                    .iter()
                    .map(|e| (e.developer_id.as_str(), e.project_id.as_str()))
                    .collect(),
            ),
            SelfCreditPolicy::LastSeenProject => {
                let mut last = HashMap::new();
                for e in commits {
                    last.insert(e.developer_id.as_str(), e.project_id.as_str());
                }
                Self::LastSeen(last)
            }
        }
    }

    fn excludes(&self, developer: &'a str, project: &'a str) -> bool {
        match self {
            Self::AnyCommitted(pairs) => pairs.contains(&(developer, project)),
            Self::LastSeen(last) => last.get(developer).is_some_and(|p| *p == project),
        }
    }
}
