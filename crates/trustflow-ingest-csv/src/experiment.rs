//! Experiment files: where the snapshot lives, how to simulate, and optionally how to
//! allocate a budget over the results.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trustflow_engine::{AllocationConfig, SimulationConfig};

use crate::error::{IngestError, Result};

/// Location of the four input tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSnapshot {
    pub data_dir: PathBuf,
    pub onchain_projects_file: String,
    pub devtooling_projects_file: String,
    pub project_dependencies_file: String,
    pub developers_to_projects_file: String,
}

impl Default for DataSnapshot {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/devtooling"),
            onchain_projects_file: "onchain_projects.csv".to_string(),
            devtooling_projects_file: "devtooling_projects.csv".to_string(),
            project_dependencies_file: "project_dependencies.csv".to_string(),
            developers_to_projects_file: "developers_to_projects.csv".to_string(),
        }
    }
}

impl DataSnapshot {
    pub fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn onchain_projects_path(&self) -> PathBuf {
        self.path(&self.onchain_projects_file)
    }

    pub fn devtooling_projects_path(&self) -> PathBuf {
        self.path(&self.devtooling_projects_file)
    }

    pub fn project_dependencies_path(&self) -> PathBuf {
        self.path(&self.project_dependencies_file)
    }

    pub fn developers_to_projects_path(&self) -> PathBuf {
        self.path(&self.developers_to_projects_file)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFile {
    #[serde(default)]
    pub data_snapshot: DataSnapshot,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub allocation: Option<AllocationConfig>,
}

impl ExperimentFile {
    /// Parses and validates an experiment. `origin` only labels errors.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self> {
        let experiment: Self = serde_yaml::from_str(text).map_err(|source| IngestError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        experiment.simulation.validate()?;
        Ok(experiment)
    }
}

/// Reads an experiment file. Relative `data_dir`s stay relative to the working directory.
pub fn load_experiment(path: impl AsRef<Path>) -> Result<ExperimentFile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let experiment = ExperimentFile::from_yaml_str(&text, path)?;
    tracing::debug!(
        path = %path.display(),
        data_dir = %experiment.data_snapshot.data_dir.display(),
        allocation = experiment.allocation.is_some(),
        "loaded experiment"
    );
    Ok(experiment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustflow_engine::config::DEFAULT_ALPHA;

    const MINIMAL: &str = r#"
simulation:
  onchain_project_pretrust_weights:
    total_gas_fees: 1.0
  devtooling_project_pretrust_weights:
    num_stars: 1.0
"#;

    #[test]
    fn missing_sections_take_defaults() {
        let exp = ExperimentFile::from_yaml_str(MINIMAL, Path::new("exp.yaml")).unwrap();
        assert_eq!(exp.data_snapshot, DataSnapshot::default());
        assert_eq!(exp.simulation.alpha, DEFAULT_ALPHA);
        assert!(exp.allocation.is_none());
        assert!(exp.simulation.event_type_weights.is_empty());
    }

    #[test]
    fn allocation_section_fills_optional_fields() {
        let text = format!(
            "{MINIMAL}allocation:\n  budget: 1000\n  min_amount_per_project: 10\n  max_share_per_project: 0.1\n"
        );
        let exp = ExperimentFile::from_yaml_str(&text, Path::new("exp.yaml")).unwrap();
        let alloc = exp.allocation.unwrap();
        assert_eq!(alloc.budget, 1000.0);
        assert_eq!(alloc.max_iterations, 50);
        assert_eq!(alloc.rounding, 2);
    }

    #[test]
    fn invalid_simulation_is_a_config_error() {
        let text = format!("{MINIMAL}  alpha: 2.0\n");
        assert!(matches!(
            ExperimentFile::from_yaml_str(&text, Path::new("exp.yaml")),
            Err(IngestError::Config(_))
        ));
    }
}
