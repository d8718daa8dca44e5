//! CSV export of analysis results, and reading a results file back for allocation.

use serde::{Deserialize, Deserializer, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use trustflow_engine::{Allocation, Analysis, DevtoolingResult, ScoreEntry, WeightedEdge};

use crate::error::{csv_error, IngestError, Result};

pub const RESULTS_FILE: &str = "devtooling_openrank_results.csv";
pub const WEIGHTED_EDGES_FILE: &str = "detailed_devtooling_graph.csv";
pub const VALUE_FLOW_FILE: &str = "value_flow_sankey.csv";
pub const ALLOCATIONS_FILE: &str = "devtooling_allocations.csv";

/// Files written by [`write_analysis`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub results: PathBuf,
    pub weighted_edges: PathBuf,
    pub value_flow: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub project_id: String,
    pub display_name: String,
    pub total_dependents: usize,
    pub developer_links: usize,
    #[serde(deserialize_with = "flag")]
    pub is_eligible: u8,
    pub v: f64,
    pub v_aggregated: f64,
}

impl From<&DevtoolingResult> for ResultRow {
    fn from(r: &DevtoolingResult) -> Self {
        Self {
            project_id: r.project_id.clone(),
            display_name: r.display_name.clone(),
            total_dependents: r.total_dependents,
            developer_links: r.developer_links,
            is_eligible: u8::from(r.is_eligible),
            v: r.v,
            v_aggregated: r.v_aggregated,
        }
    }
}

/// Accepts `1`/`0` as written by this crate, and `true`/`false` in any case.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(1),
        "0" | "false" | "" => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected 0/1 or true/false, got {other:?}"
        ))),
    }
}

#[derive(Debug, Serialize)]
struct WeightedEdgeRow<'a> {
    i: &'a str,
    j: &'a str,
    i_name: Option<&'a str>,
    j_name: Option<&'a str>,
    link_type: &'static str,
    event_type: &'a str,
    event_month: String,
    v_decay: f64,
    v_linktype: f64,
    v_eventtype: f64,
    v_final: f64,
}

impl<'a> From<&'a WeightedEdge> for WeightedEdgeRow<'a> {
    fn from(e: &'a WeightedEdge) -> Self {
        Self {
            i: &e.edge.i,
            j: &e.edge.j,
            i_name: e.edge.i_name.as_deref(),
            j_name: e.edge.j_name.as_deref(),
            link_type: e.edge.link_type.as_str(),
            event_type: &e.edge.event_type,
            event_month: e.edge.event_month.format("%Y-%m-%d").to_string(),
            v_decay: e.v_decay,
            v_linktype: e.v_linktype,
            v_eventtype: e.v_eventtype,
            v_final: e.v_final,
        }
    }
}

/// Writes the three result tables into `out_dir`, creating it if needed.
pub fn write_analysis(analysis: &Analysis, out_dir: &Path) -> Result<ExportPaths> {
    std::fs::create_dir_all(out_dir).map_err(|source| IngestError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let paths = ExportPaths {
        results: out_dir.join(RESULTS_FILE),
        weighted_edges: out_dir.join(WEIGHTED_EDGES_FILE),
        value_flow: out_dir.join(VALUE_FLOW_FILE),
    };

    write_rows(
        &paths.results,
        analysis.devtooling_project_results.iter().map(ResultRow::from),
    )?;
    write_rows(
        &paths.weighted_edges,
        analysis.weighted_edges.iter().map(WeightedEdgeRow::from),
    )?;
    write_rows(&paths.value_flow, &analysis.detailed_value_flow_graph.edges)?;

    tracing::info!(out_dir = %out_dir.display(), "wrote analysis results");
    Ok(paths)
}

pub fn write_allocations(allocations: &[Allocation], path: &Path) -> Result<()> {
    write_rows(path, allocations)?;
    tracing::info!(path = %path.display(), rows = allocations.len(), "wrote allocations");
    Ok(())
}

/// Writes the allocation table to any writer (stdout for the CLI). Errors are labeled `-`.
pub fn write_allocations_to<W: Write>(allocations: &[Allocation], out: W) -> Result<()> {
    write_rows_to(csv::Writer::from_writer(out), Path::new("-"), allocations)
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    write_rows_to(writer, path, rows)
}

fn write_rows_to<W, T, I>(mut writer: csv::Writer<W>, path: &Path, rows: I) -> Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize::<ResultRow>()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

/// The `v_aggregated` column as allocation input.
pub fn aggregated_scores(rows: &[ResultRow]) -> Vec<ScoreEntry> {
    rows.iter()
        .map(|r| ScoreEntry::new(r.project_id.clone(), r.v_aggregated))
        .collect()
}
