//! Loading the four input tables of a data snapshot.
//!
//! Project tables must carry `project_id` and `display_name`; every other header is a
//! metric column. Only the metric columns named by the pretrust weights are parsed, so
//! free-text extra columns are tolerated.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

use trustflow_engine::{
    AnalysisInputs, DependencyEdge, DeveloperProjectEvent, MetricWeights, ProjectKind,
    ProjectRecord, ProjectTable, SimulationConfig,
};

use crate::error::{csv_error, IngestError, Result};
use crate::experiment::DataSnapshot;

const PROJECT_ID: &str = "project_id";
const DISPLAY_NAME: &str = "display_name";

pub fn load_snapshot(snapshot: &DataSnapshot, config: &SimulationConfig) -> Result<AnalysisInputs> {
    let onchain_projects = load_project_table(
        &snapshot.onchain_projects_path(),
        config.pretrust_weights(ProjectKind::Onchain),
    )?;
    let devtooling_projects = load_project_table(
        &snapshot.devtooling_projects_path(),
        config.pretrust_weights(ProjectKind::Devtooling),
    )?;
    let project_dependencies = load_dependencies(&snapshot.project_dependencies_path())?;
    let developers_to_projects = load_developer_events(&snapshot.developers_to_projects_path())?;

    tracing::info!(
        onchain_projects = onchain_projects.len(),
        devtooling_projects = devtooling_projects.len(),
        dependencies = project_dependencies.len(),
        developer_events = developers_to_projects.len(),
        data_dir = %snapshot.data_dir.display(),
        "loaded snapshot"
    );

    Ok(AnalysisInputs {
        onchain_projects,
        devtooling_projects,
        project_dependencies,
        developers_to_projects,
    })
}

/// Reads a project table, parsing the metric columns `weights` refers to.
///
/// Empty metric cells read as 0.
pub fn load_project_table(path: &Path, weights: &MetricWeights) -> Result<ProjectTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let position = |column: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| IngestError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };
    let id_at = position(PROJECT_ID)?;
    let name_at = position(DISPLAY_NAME)?;
    let metric_at: Vec<(&str, usize)> = weights
        .columns()
        .map(|c| position(c).map(|at| (c, at)))
        .collect::<Result<_>>()?;

    let mut table = ProjectTable::new(
        headers
            .iter()
            .filter(|h| *h != PROJECT_ID && *h != DISPLAY_NAME),
    );
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        let cell = |at: usize| record.get(at).unwrap_or("").trim();

        let mut row = ProjectRecord::new(cell(id_at), cell(name_at));
        for (column, at) in &metric_at {
            let raw = cell(*at);
            let value = if raw.is_empty() {
                0.0
            } else {
                raw.parse::<f64>().map_err(|_| IngestError::InvalidNumber {
                    path: path.to_path_buf(),
                    line,
                    column: column.to_string(),
                    value: raw.to_string(),
                })?
            };
            row.metrics.insert(column.to_string(), value);
        }
        table.rows.push(row);
    }
    Ok(table)
}

pub fn load_dependencies(path: &Path) -> Result<Vec<DependencyEdge>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize::<DependencyEdge>()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct DeveloperEventRow {
    developer_id: String,
    developer_name: String,
    project_id: String,
    event_type: String,
    event_month: String,
}

pub fn load_developer_events(path: &Path) -> Result<Vec<DeveloperProjectEvent>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        let row: DeveloperEventRow = record
            .deserialize(Some(&headers))
            .map_err(|e| csv_error(path, e))?;
        let event_month = parse_event_month(&row.event_month).ok_or_else(|| {
            IngestError::InvalidEventMonth {
                path: path.to_path_buf(),
                line,
                value: row.event_month.clone(),
            }
        })?;
        out.push(DeveloperProjectEvent {
            developer_id: row.developer_id,
            developer_name: row.developer_name,
            project_id: row.project_id,
            event_type: row.event_type,
            event_month,
        });
    }
    Ok(out)
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// RFC 3339 and `YYYY-MM`. Time of day is discarded.
pub fn parse_event_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_month_formats() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_event_month("2024-01-01"), Some(jan));
        assert_eq!(parse_event_month("2024-01-01 00:00:00"), Some(jan));
        assert_eq!(parse_event_month("2024-01-01 00:00:00.000"), Some(jan));
        assert_eq!(parse_event_month("2024-01-01T00:00:00"), Some(jan));
        assert_eq!(parse_event_month("2024-01-01T00:00:00Z"), Some(jan));
        assert_eq!(parse_event_month("2024-01"), Some(jan));
        assert_eq!(parse_event_month("January"), None);
    }
}
