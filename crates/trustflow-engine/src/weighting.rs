//! Edge weighting: recency decay × link-type weight × event-type weight.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{SimulationConfig, TimeDecay};
use crate::model::{Edge, LinkType};

const DAYS_PER_YEAR: f64 = 365.0;

/// An edge with its weight components (kept for auditing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    #[serde(flatten)]
    pub edge: Edge,
    pub v_decay: f64,
    pub v_linktype: f64,
    pub v_eventtype: f64,
    pub v_final: f64,
}

impl WeightedEdge {
    pub fn link_type(&self) -> LinkType {
        self.edge.link_type
    }

    /// Whether the edge takes part in propagation.
    pub fn is_active(&self) -> bool {
        self.v_final > 0.0
    }
}

/// Age of `month` relative to `reference`, in 365-day years.
pub fn years_between(reference: NaiveDate, month: NaiveDate) -> f64 {
    (reference - month).num_days() as f64 / DAYS_PER_YEAR
}

/// Exponential decay for one edge. Package dependencies are static facts and never decay.
pub fn decay_factor(link_type: LinkType, age_years: f64, rates: &TimeDecay) -> f64 {
    match link_type {
        LinkType::PackageDependency => 1.0,
        LinkType::OnchainProjectToDeveloper => (-rates.commit_to_onchain_repo * age_years).exp(),
        LinkType::DeveloperToDevtoolingProject => {
            (-rates.event_to_devtooling_repo * age_years).exp()
        }
    }
}

/// Weights every edge. Zero-weight edges are kept here and skipped by propagation.
pub fn weight_edges(edges: &[Edge], config: &SimulationConfig) -> Vec<WeightedEdge> {
    let Some(reference) = edges.iter().map(|e| e.event_month).max() else {
        return Vec::new();
    };

    let mut missing_event_types: BTreeSet<&str> = BTreeSet::new();
    let weighted: Vec<WeightedEdge> = edges
        .iter()
        .map(|edge| {
            let v_decay = decay_factor(
                edge.link_type,
                years_between(reference, edge.event_month),
                &config.time_decay,
            );
            let v_linktype = config.link_type_weight(edge.link_type);
            let v_eventtype = config
                .event_type_weight(&edge.event_type)
                .unwrap_or_else(|| {
                    missing_event_types.insert(&edge.event_type);
                    0.0
                });
            WeightedEdge {
                edge: edge.clone(),
                v_decay,
                v_linktype,
                v_eventtype,
                v_final: v_decay * v_linktype * v_eventtype,
            }
        })
        .collect();

    for event_type in &missing_event_types {
        tracing::debug!(event_type = %event_type, "no event type weight configured; edges weigh 0");
    }
    tracing::info!(
        edges = weighted.len(),
        active = weighted.iter().filter(|e| e.is_active()).count(),
        "weighted edges"
    );
    weighted
}
