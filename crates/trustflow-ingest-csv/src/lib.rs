//! CSV snapshots and YAML experiment files for the trustflow engine.
//!
//! - [`experiment`]: experiment files (`data_snapshot`, `simulation`, `allocation`)
//! - [`snapshot`]: the four input tables
//! - [`export`]: result, weighted-edge, value-flow and allocation tables

pub mod error;
pub mod experiment;
pub mod export;
pub mod snapshot;

pub use error::{IngestError, Result};
pub use experiment::{load_experiment, DataSnapshot, ExperimentFile};
pub use export::{
    aggregated_scores, read_results, write_allocations, write_allocations_to, write_analysis,
    ExportPaths, ResultRow, ALLOCATIONS_FILE, RESULTS_FILE, VALUE_FLOW_FILE, WEIGHTED_EDGES_FILE,
};
pub use snapshot::{load_snapshot, parse_event_month};
