//! Stage orchestration.

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::eigentrust::{propagate_trust, TrustScores};
use crate::error::Result;
use crate::graph::{build_graph, TrustGraph};
use crate::model::{AnalysisInputs, DeveloperReputation, DevtoolingResult, ProjectKind, ScoreVector};
use crate::pretrust::compute_project_pretrust;
use crate::ranking::rank_devtooling_projects;
use crate::reputation::compute_developer_reputation;
use crate::value_flow::{serialize_value_flow, ValueFlow};
use crate::weighting::{weight_edges, WeightedEdge};

/// Every stage result of one run, in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(skip)]
    pub graph: TrustGraph,
    pub onchain_projects_pretrust_scores: ScoreVector,
    pub devtooling_projects_pretrust_scores: ScoreVector,
    pub developer_reputation: Vec<DeveloperReputation>,
    pub weighted_edges: Vec<WeightedEdge>,
    pub project_openrank_scores: TrustScores,
    pub devtooling_project_results: Vec<DevtoolingResult>,
    pub detailed_value_flow_graph: ValueFlow,
}

#[derive(Debug, Clone)]
pub struct DevtoolingCalculator {
    config: SimulationConfig,
}

impl DevtoolingCalculator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs the full pipeline. Inputs are not modified.
    pub fn run_analysis(&self, inputs: &AnalysisInputs) -> Result<Analysis> {
        let config = &self.config;
        config.validate_columns(&inputs.onchain_projects, &inputs.devtooling_projects)?;

        let graph = build_graph(inputs, config.self_credit_policy)?;

        let onchain_projects_pretrust_scores = compute_project_pretrust(
            &inputs.onchain_projects,
            config.pretrust_weights(ProjectKind::Onchain),
            ProjectKind::Onchain,
        )?;
        let devtooling_projects_pretrust_scores = compute_project_pretrust(
            &inputs.devtooling_projects,
            config.pretrust_weights(ProjectKind::Devtooling),
            ProjectKind::Devtooling,
        )?;

        let developer_reputation = compute_developer_reputation(
            &graph,
            &onchain_projects_pretrust_scores,
            &inputs.developers_to_projects,
        );

        let weighted_edges = weight_edges(&graph.edges, config);

        let project_openrank_scores = propagate_trust(
            &weighted_edges,
            &onchain_projects_pretrust_scores,
            &devtooling_projects_pretrust_scores,
            &developer_reputation,
            config.alpha,
            config.eigentrust,
        )?;

        let devtooling_project_results = rank_devtooling_projects(
            &inputs.devtooling_projects,
            &weighted_edges,
            &project_openrank_scores.scores,
            &config.eligibility_thresholds,
        );

        let detailed_value_flow_graph = serialize_value_flow(
            &weighted_edges,
            &onchain_projects_pretrust_scores,
            &devtooling_project_results,
            &config.value_flow,
        );

        Ok(Analysis {
            graph,
            onchain_projects_pretrust_scores,
            devtooling_projects_pretrust_scores,
            developer_reputation,
            weighted_edges,
            project_openrank_scores,
            devtooling_project_results,
            detailed_value_flow_graph,
        })
    }
}
