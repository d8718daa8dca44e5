//! Trustflow engine: trust propagation from onchain projects to devtooling projects.
//!
//! The pipeline runs, in order:
//! 1. graph construction from dependencies and developer activity ([`graph`]),
//! 2. project pretrust from weighted metrics ([`pretrust`]),
//! 3. developer reputation from onchain pretrust ([`reputation`]),
//! 4. edge weighting by recency, link type and event type ([`weighting`]),
//! 5. EigenTrust propagation ([`eigentrust`]),
//! 6. eligibility filtering and ranking ([`ranking`]),
//! 7. value-flow attribution by proportional fitting ([`value_flow`]).
//!
//! [`pipeline::DevtoolingCalculator`] runs all of them. [`allocation`] turns the final
//! scores into a constrained budget split.

pub mod allocation;
pub mod config;
pub mod eigentrust;
pub mod error;
pub mod graph;
pub mod model;
pub mod pipeline;
pub mod pretrust;
pub mod ranking;
pub mod reputation;
pub mod value_flow;
pub mod weighting;

pub use allocation::{allocate_with_constraints, Allocation, AllocationConfig, AllocationError};
pub use config::{
    EligibilityThresholds, FittingSettings, MetricWeights, PropagationSettings, SelfCreditPolicy,
    SimulationConfig, TimeDecay,
};
pub use eigentrust::{EigenTrust, TrustScores};
pub use error::{ConfigError, EngineError, Result};
pub use model::{
    AnalysisInputs, DependencyEdge, DeveloperProjectEvent, DeveloperReputation, DevtoolingResult,
    Edge, LinkType, ProjectKind, ProjectRecord, ProjectTable, ScoreEntry, ScoreVector,
    ValueFlowEdge,
};
pub use pipeline::{Analysis, DevtoolingCalculator};
pub use value_flow::{ConservationMismatch, ValueFlow};
pub use weighting::WeightedEdge;
