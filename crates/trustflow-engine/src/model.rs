//! Typed records for the input tables and the pipeline outputs.
//!
//! Every node (onchain project, devtooling project, developer) is identified by a
//! plain string id shared across the four input tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Event type marking a commit to a project repository.
pub const COMMIT_CODE: &str = "COMMIT_CODE";

// =============================================================================
// Categorical values
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    /// Onchain project → devtooling project (static package dependency).
    PackageDependency,
    /// Onchain project → developer (commit activity).
    OnchainProjectToDeveloper,
    /// Developer → devtooling project (GitHub engagement of any kind).
    DeveloperToDevtoolingProject,
}

impl LinkType {
    pub const ALL: [LinkType; 3] = [
        LinkType::PackageDependency,
        LinkType::OnchainProjectToDeveloper,
        LinkType::DeveloperToDevtoolingProject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::PackageDependency => "PACKAGE_DEPENDENCY",
            LinkType::OnchainProjectToDeveloper => "ONCHAIN_PROJECT_TO_DEVELOPER",
            LinkType::DeveloperToDevtoolingProject => "DEVELOPER_TO_DEVTOOLING_PROJECT",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which project table a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    Onchain,
    Devtooling,
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectKind::Onchain => f.write_str("onchain"),
            ProjectKind::Devtooling => f.write_str("devtooling"),
        }
    }
}

// =============================================================================
// Input tables
// =============================================================================

/// One row of the onchain or devtooling project table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub display_name: String,
    /// Numeric metric columns (economic metrics for onchain projects, GitHub metrics for
    /// devtooling projects). A column missing from a row reads as 0.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl ProjectRecord {
    pub fn new(project_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            display_name: display_name.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, column: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(column.into(), value);
        self
    }

    pub fn metric(&self, column: &str) -> f64 {
        self.metrics.get(column).copied().unwrap_or(0.0)
    }
}

/// A project table together with the metric columns its schema declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTable {
    pub columns: BTreeSet<String>,
    pub rows: Vec<ProjectRecord>,
}

impl ProjectTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table whose schema is the union of the rows' metric columns.
    pub fn from_rows(rows: Vec<ProjectRecord>) -> Self {
        let columns = rows
            .iter()
            .flat_map(|r| r.metrics.keys().cloned())
            .collect();
        Self { columns, rows }
    }

    pub fn push(&mut self, row: ProjectRecord) {
        self.columns.extend(row.metrics.keys().cloned());
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.rows.iter().map(|r| r.project_id.as_str()).collect()
    }

    /// Rows with duplicate `project_id`s removed (first occurrence wins).
    pub fn unique_rows(&self) -> Vec<&ProjectRecord> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.project_id.as_str()))
            .collect()
    }
}

/// A static declaration that an onchain project depends on a devtooling package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub onchain_builder_project_id: String,
    pub devtooling_project_id: String,
    pub dependency_source: String,
}

/// Monthly-bucketed developer activity against a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperProjectEvent {
    pub developer_id: String,
    pub developer_name: String,
    pub project_id: String,
    pub event_type: String,
    pub event_month: NaiveDate,
}

/// The four tables the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInputs {
    pub onchain_projects: ProjectTable,
    pub devtooling_projects: ProjectTable,
    pub project_dependencies: Vec<DependencyEdge>,
    pub developers_to_projects: Vec<DeveloperProjectEvent>,
}

// =============================================================================
// Graph and scores
// =============================================================================

/// A directed arc of the trust graph, before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub i: String,
    pub j: String,
    pub i_name: Option<String>,
    pub j_name: Option<String>,
    pub link_type: LinkType,
    pub event_type: String,
    pub event_month: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: String,
    pub v: f64,
}

impl ScoreEntry {
    pub fn new(id: impl Into<String>, v: f64) -> Self {
        Self { id: id.into(), v }
    }
}

/// An ordered `node id → score` vector (pretrust or propagated trust).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreVector {
    pub entries: Vec<ScoreEntry>,
}

impl ScoreVector {
    pub fn new(entries: Vec<ScoreEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|e| e.v).sum()
    }

    /// Lookup table; for repeated ids the first entry wins.
    pub fn to_map(&self) -> HashMap<&str, f64> {
        let mut out = HashMap::with_capacity(self.entries.len());
        for e in &self.entries {
            out.entry(e.id.as_str()).or_insert(e.v);
        }
        out
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperReputation {
    pub developer_id: String,
    pub developer_name: Option<String>,
    /// Min-max scaled to `[0, 1]`.
    pub reputation: f64,
}

/// Final per-devtooling-project ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevtoolingResult {
    pub project_id: String,
    pub display_name: String,
    /// Distinct onchain projects with a package dependency on this project.
    pub total_dependents: usize,
    /// Distinct developers with engagement edges into this project.
    pub developer_links: usize,
    pub is_eligible: bool,
    /// Raw EigenTrust score.
    pub v: f64,
    /// Eligibility-filtered, normalized score.
    pub v_aggregated: f64,
}

/// One onchain → devtooling contribution recovered by proportional fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFlowEdge {
    pub onchain_project_id: String,
    pub devtooling_project_id: String,
    pub contribution: f64,
}
