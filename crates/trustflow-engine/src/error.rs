use crate::model::ProjectKind;

/// Invalid or inconsistent simulation configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{table} pretrust weights are empty")]
    EmptyPretrustWeights { table: ProjectKind },

    #[error("{table} pretrust weights sum to {sum}; expected a positive total")]
    NonPositiveWeightSum { table: ProjectKind, sum: f64 },

    #[error("weight `{name}` must be a finite non-negative number (got {value})")]
    InvalidWeight { name: String, value: f64 },

    #[error("{table} pretrust weight `{column}` appears more than once")]
    DuplicateMetricColumn { table: ProjectKind, column: String },

    #[error("{table} pretrust weight references unknown column `{column}`")]
    UnknownMetricColumn { table: ProjectKind, column: String },

    #[error("alpha must be in [0, 1] (got {0})")]
    InvalidAlpha(f64),

    #[error("time decay rate `{name}` must be finite and non-negative (got {value})")]
    InvalidDecayRate { name: &'static str, value: f64 },

    #[error("`{setting}` must be positive")]
    InvalidIterationSetting { setting: &'static str },

    #[error("invalid YAML configuration: {0}")]
    Yaml(String),
}

/// Errors raised by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no edge records found: every v_final is 0 or the weighted edge table is empty")]
    NoEdges,

    #[error("no pretrust scores found: no positive pretrust reaches a graph node")]
    NoPretrust,

    #[error("{table} pretrust is undefined: weighted metric total is {total}")]
    ZeroPretrustMass { table: ProjectKind, total: f64 },

    #[error("id `{id}` is used both as a developer and as a project")]
    NodeIdCollision { id: String },

    #[error("{table} project `{project_id}` has an invalid value {value} for `{column}`")]
    InvalidMetric {
        table: ProjectKind,
        project_id: String,
        column: String,
        value: f64,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
