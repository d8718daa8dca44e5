//! Pretrust seeding for onchain and devtooling projects.
//!
//! Each configured metric column is `log1p`-transformed and min-max scaled, the scaled
//! columns are combined with their weights, and the result is normalized to sum to 1.

use crate::config::MetricWeights;
use crate::error::{EngineError, Result};
use crate::model::{ProjectKind, ProjectTable, ScoreEntry, ScoreVector};

/// Min-max scales `values` into `[0, 1]`. A constant series maps to 0.5.
pub fn minmax_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() || max == min {
        return vec![0.5; values.len()];
    }
    let span = max - min;
    values.iter().map(|v| (v - min) / span).collect()
}

/// Computes the normalized pretrust vector for one project table.
///
/// Rows with a repeated `project_id` are ignored after the first. An empty table yields an
/// empty vector.
pub fn compute_project_pretrust(
    table: &ProjectTable,
    weights: &MetricWeights,
    kind: ProjectKind,
) -> Result<ScoreVector> {
    weights.check_columns(kind, table)?;

    let rows = table.unique_rows();
    if rows.len() < table.len() {
        tracing::warn!(
            table = %kind,
            duplicates = table.len() - rows.len(),
            "ignoring duplicate project rows"
        );
    }
    if rows.is_empty() {
        return Ok(ScoreVector::default());
    }

    let mut v = vec![0.0f64; rows.len()];
    for w in weights.iter() {
        let mut transformed = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = row.metric(&w.column);
            if !raw.is_finite() || raw < 0.0 {
                return Err(EngineError::InvalidMetric {
                    table: kind,
                    project_id: row.project_id.clone(),
                    column: w.column.clone(),
                    value: raw,
                });
            }
            transformed.push(raw.ln_1p());
        }
        for (acc, scaled) in v.iter_mut().zip(minmax_scale(&transformed)) {
            *acc += scaled * w.weight;
        }
    }

    let total: f64 = v.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(EngineError::ZeroPretrustMass { table: kind, total });
    }

    let entries = rows
        .iter()
        .zip(v)
        .map(|(row, score)| ScoreEntry::new(row.project_id.clone(), score / total))
        .collect();

    tracing::debug!(table = %kind, projects = rows.len(), "computed project pretrust");
    Ok(ScoreVector::new(entries))
}
