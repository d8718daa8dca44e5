//! Budget allocation over normalized project scores.
//!
//! Allocation starts proportional to score and is then constrained:
//! 1. amounts above `max_share_per_project × budget` are capped and the excess is
//!    redistributed to uncapped projects by score,
//! 2. projects below `min_amount_per_project` are zeroed and their amount is redistributed
//!    to the remaining projects, clipped to each project's headroom under the cap,
//! 3. a final cap pass, then rescaling toward the exact budget, then rounding.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::ScoreEntry;

const NORMALIZATION_TOLERANCE: f64 = 1e-6;
const BUDGET_TOLERANCE: f64 = 1e-6;
const MAX_RESCALE_ROUNDS: usize = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("project scores must sum to 1.0 (got {total})")]
    NotNormalized { total: f64 },

    #[error("allocation setting `{setting}` is invalid (got {value})")]
    InvalidSetting { setting: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub budget: f64,
    pub min_amount_per_project: f64,
    /// Largest share of `budget` one project may receive, in `(0, 1]`.
    pub max_share_per_project: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Decimal places kept in the final amounts.
    #[serde(default = "default_rounding")]
    pub rounding: u32,
}

fn default_max_iterations() -> usize {
    50
}

fn default_rounding() -> u32 {
    2
}

impl AllocationConfig {
    pub fn new(budget: f64, min_amount_per_project: f64, max_share_per_project: f64) -> Self {
        Self {
            budget,
            min_amount_per_project,
            max_share_per_project,
            max_iterations: default_max_iterations(),
            rounding: default_rounding(),
        }
    }

    pub fn validate(&self) -> Result<(), AllocationError> {
        if !(self.budget.is_finite() && self.budget >= 0.0) {
            return Err(AllocationError::InvalidSetting {
                setting: "budget",
                value: self.budget,
            });
        }
        if !(self.min_amount_per_project.is_finite() && self.min_amount_per_project >= 0.0) {
            return Err(AllocationError::InvalidSetting {
                setting: "min_amount_per_project",
                value: self.min_amount_per_project,
            });
        }
        if !(self.max_share_per_project > 0.0 && self.max_share_per_project <= 1.0) {
            return Err(AllocationError::InvalidSetting {
                setting: "max_share_per_project",
                value: self.max_share_per_project,
            });
        }
        if self.max_iterations == 0 {
            return Err(AllocationError::InvalidSetting {
                setting: "max_iterations",
                value: 0.0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub project_id: String,
    pub amount: f64,
}

/// Allocates `config.budget` across `scores`.
///
/// # Errors
/// `NotNormalized` when the scores do not sum to 1 within 1e-6, `InvalidSetting` for an
/// out-of-range configuration.
pub fn allocate_with_constraints(
    scores: &[ScoreEntry],
    config: &AllocationConfig,
) -> Result<Vec<Allocation>, AllocationError> {
    config.validate()?;
    let total: f64 = scores.iter().map(|s| s.v).sum();
    if !((total - 1.0).abs() <= NORMALIZATION_TOLERANCE) {
        return Err(AllocationError::NotNormalized { total });
    }

    let weights: Vec<f64> = scores.iter().map(|s| s.v).collect();
    let cap = config.max_share_per_project * config.budget;
    let mut amounts: Vec<f64> = weights.iter().map(|w| w * config.budget).collect();

    // Cap and redistribute to projects still under the cap.
    for _ in 0..config.max_iterations {
        let excess: f64 = amounts.iter().filter(|a| **a > cap).map(|a| a - cap).sum();
        if excess <= 0.0 {
            break;
        }
        for a in amounts.iter_mut().filter(|a| **a > cap) {
            *a = cap;
        }
        let under: Vec<usize> = (0..amounts.len()).filter(|&k| amounts[k] < cap).collect();
        redistribute(&mut amounts, &weights, &under, excess, None);
    }

    // Drop projects below the minimum.
    for _ in 0..config.max_iterations {
        let below: Vec<usize> = (0..amounts.len())
            .filter(|&k| amounts[k] > 0.0 && amounts[k] < config.min_amount_per_project)
            .collect();
        if below.is_empty() {
            break;
        }
        let freed: f64 = below.iter().map(|&k| amounts[k]).sum();
        for &k in &below {
            amounts[k] = 0.0;
        }
        let active: Vec<usize> = (0..amounts.len()).filter(|&k| amounts[k] > 0.0).collect();
        let headroom: f64 = active.iter().map(|&k| cap - amounts[k]).sum();
        if headroom > 0.0 {
            redistribute(&mut amounts, &weights, &active, freed, Some(cap));
        }
    }

    let excess: f64 = amounts.iter().filter(|a| **a > cap).map(|a| a - cap).sum();
    if excess > 0.0 {
        for a in amounts.iter_mut().filter(|a| **a > cap) {
            *a = cap;
        }
        let under: Vec<usize> = (0..amounts.len())
            .filter(|&k| amounts[k] > 0.0 && amounts[k] < cap)
            .collect();
        redistribute(&mut amounts, &weights, &under, excess, Some(cap));
    }

    for _ in 0..MAX_RESCALE_ROUNDS {
        let sum: f64 = amounts.iter().sum();
        if (sum - config.budget).abs() <= BUDGET_TOLERANCE || sum <= 0.0 {
            break;
        }
        let factor = config.budget / sum;
        for a in &mut amounts {
            *a = (*a * factor).min(cap);
        }
    }

    let scale = 10f64.powi(config.rounding as i32);
    let mut out: Vec<Allocation> = scores
        .iter()
        .zip(amounts)
        .map(|(s, amount)| Allocation {
            project_id: s.id.clone(),
            amount: (amount * scale).round() / scale,
        })
        .collect();
    out.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });

    let allocated: f64 = out.iter().map(|a| a.amount).sum();
    tracing::info!(
        projects = out.iter().filter(|a| a.amount > 0.0).count(),
        allocated,
        budget = config.budget,
        "allocated budget"
    );
    Ok(out)
}

/// Spreads `amount` over `targets` in proportion to their weights, optionally clipped so no
/// target exceeds `cap`.
fn redistribute(
    amounts: &mut [f64],
    weights: &[f64],
    targets: &[usize],
    amount: f64,
    cap: Option<f64>,
) {
    let weight_sum: f64 = targets.iter().map(|&k| weights[k]).sum();
    if targets.is_empty() || !(weight_sum > 0.0) {
        return;
    }
    for &k in targets {
        let mut add = weights[k] / weight_sum * amount;
        if let Some(cap) = cap {
            add = add.min(cap - amounts[k]).max(0.0);
        }
        amounts[k] += add;
    }
}
