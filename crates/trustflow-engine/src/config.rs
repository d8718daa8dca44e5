//! Simulation configuration.
//!
//! The configuration is a typed record rather than a free-form dictionary:
//! - pretrust weights are an ordered list of `(column, weight)` pairs, validated against
//!   the project tables before any stage runs,
//! - link types are an enum, so a misspelled link type fails at parse time,
//! - every field has the default the experiment files historically relied on.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::ConfigError;
use crate::model::{LinkType, ProjectKind, ProjectTable};

pub const DEFAULT_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// EigenTrust pretrust weight (teleport probability back to the seed vector).
    pub alpha: f64,
    pub time_decay: TimeDecay,
    pub onchain_project_pretrust_weights: MetricWeights,
    pub devtooling_project_pretrust_weights: MetricWeights,
    /// Weight per event type (`COMMIT_CODE`, `STARRED`, dependency sources, ...).
    /// Event types missing from the map weigh 0.
    pub event_type_weights: BTreeMap<String, f64>,
    /// Weight per link type. Link types missing from the map weigh 0.
    pub link_type_weights: BTreeMap<LinkType, f64>,
    pub eligibility_thresholds: EligibilityThresholds,
    pub self_credit_policy: SelfCreditPolicy,
    pub eigentrust: PropagationSettings,
    pub value_flow: FittingSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            time_decay: TimeDecay::default(),
            onchain_project_pretrust_weights: MetricWeights::default(),
            devtooling_project_pretrust_weights: MetricWeights::default(),
            event_type_weights: BTreeMap::new(),
            link_type_weights: BTreeMap::new(),
            eligibility_thresholds: EligibilityThresholds::default(),
            self_credit_policy: SelfCreditPolicy::default(),
            eigentrust: PropagationSettings::default(),
            value_flow: FittingSettings::default(),
        }
    }
}

/// Exponential decay rates, per year of age relative to the newest event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDecay {
    pub commit_to_onchain_repo: f64,
    pub event_to_devtooling_repo: f64,
}

impl Default for TimeDecay {
    fn default() -> Self {
        Self {
            commit_to_onchain_repo: 1.0,
            event_to_devtooling_repo: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityThresholds {
    pub num_projects_with_package_links: usize,
    pub num_onchain_developers_with_links: usize,
}

impl EligibilityThresholds {
    pub fn is_eligible(&self, total_dependents: usize, developer_links: usize) -> bool {
        total_dependents >= self.num_projects_with_package_links
            || developer_links >= self.num_onchain_developers_with_links
    }
}

/// How engagement edges are matched against a developer's own onchain projects when
/// removing self-credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfCreditPolicy {
    /// Drop `developer → project` when the developer committed to `project` as an
    /// onchain project in any month.
    #[default]
    AnyCommittedProject,
    /// Map each developer to the onchain project of their last commit edge only.
    LastSeenProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationSettings {
    pub max_iterations: usize,
    /// L1 change between successive iterates at which propagation stops.
    pub tolerance: f64,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingSettings {
    pub max_iterations: usize,
    /// Largest row-margin gap accepted as converged.
    pub tolerance: f64,
    /// Contribution-sum gap above which a project is reported as a mismatch.
    pub conservation_tolerance: f64,
}

impl Default for FittingSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            conservation_tolerance: 1e-4,
        }
    }
}

impl SimulationConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn link_type_weight(&self, link_type: LinkType) -> f64 {
        self.link_type_weights.get(&link_type).copied().unwrap_or(0.0)
    }

    pub fn event_type_weight(&self, event_type: &str) -> Option<f64> {
        self.event_type_weights.get(event_type).copied()
    }

    pub fn pretrust_weights(&self, kind: ProjectKind) -> &MetricWeights {
        match kind {
            ProjectKind::Onchain => &self.onchain_project_pretrust_weights,
            ProjectKind::Devtooling => &self.devtooling_project_pretrust_weights,
        }
    }

    /// Checks value ranges. Does not look at the data; see [`Self::validate_columns`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }

        check_decay("commit_to_onchain_repo", self.time_decay.commit_to_onchain_repo)?;
        check_decay(
            "event_to_devtooling_repo",
            self.time_decay.event_to_devtooling_repo,
        )?;

        for kind in [ProjectKind::Onchain, ProjectKind::Devtooling] {
            self.pretrust_weights(kind).validate(kind)?;
        }

        for (name, &value) in &self.event_type_weights {
            check_weight(name, value)?;
        }
        for (link_type, &value) in &self.link_type_weights {
            check_weight(link_type.as_str(), value)?;
        }

        if self.eigentrust.max_iterations == 0 {
            return Err(ConfigError::InvalidIterationSetting {
                setting: "eigentrust.max_iterations",
            });
        }
        if !(self.eigentrust.tolerance > 0.0) {
            return Err(ConfigError::InvalidIterationSetting {
                setting: "eigentrust.tolerance",
            });
        }
        if self.value_flow.max_iterations == 0 {
            return Err(ConfigError::InvalidIterationSetting {
                setting: "value_flow.max_iterations",
            });
        }
        if !(self.value_flow.tolerance > 0.0) {
            return Err(ConfigError::InvalidIterationSetting {
                setting: "value_flow.tolerance",
            });
        }
        if !(self.value_flow.conservation_tolerance > 0.0) {
            return Err(ConfigError::InvalidIterationSetting {
                setting: "value_flow.conservation_tolerance",
            });
        }

        Ok(())
    }

    /// Fails on any pretrust weight column the project tables do not declare.
    pub fn validate_columns(
        &self,
        onchain: &ProjectTable,
        devtooling: &ProjectTable,
    ) -> Result<(), ConfigError> {
        self.onchain_project_pretrust_weights
            .check_columns(ProjectKind::Onchain, onchain)?;
        self.devtooling_project_pretrust_weights
            .check_columns(ProjectKind::Devtooling, devtooling)
    }
}

fn check_decay(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDecayRate { name, value })
    }
}

fn check_weight(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight {
            name: name.to_string(),
            value,
        })
    }
}

// =============================================================================
// Pretrust metric weights
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MetricWeight {
    pub column: String,
    pub weight: f64,
}

/// Ordered `(column, weight)` pairs. Serialized as a YAML/JSON map in list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricWeights(Vec<MetricWeight>);

impl MetricWeights {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(column, weight)| MetricWeight {
                    column: column.into(),
                    weight,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricWeight> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|w| w.column.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|w| w.weight).sum()
    }

    fn validate(&self, kind: ProjectKind) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::EmptyPretrustWeights { table: kind });
        }
        let mut seen = HashSet::new();
        for w in &self.0 {
            check_weight(&w.column, w.weight)?;
            if !seen.insert(w.column.as_str()) {
                return Err(ConfigError::DuplicateMetricColumn {
                    table: kind,
                    column: w.column.clone(),
                });
            }
        }
        let sum = self.total();
        if !(sum > 0.0) || !sum.is_finite() {
            return Err(ConfigError::NonPositiveWeightSum { table: kind, sum });
        }
        Ok(())
    }

    pub(crate) fn check_columns(
        &self,
        kind: ProjectKind,
        table: &ProjectTable,
    ) -> Result<(), ConfigError> {
        match self.columns().find(|c| !table.has_column(c)) {
            Some(column) => Err(ConfigError::UnknownMetricColumn {
                table: kind,
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Serialize for MetricWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for w in &self.0 {
            map.serialize_entry(&w.column, &w.weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricWeights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WeightsVisitor;

        impl<'de> Visitor<'de> for WeightsVisitor {
            type Value = MetricWeights;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of metric column to weight")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, weight)) = access.next_entry::<String, f64>()? {
                    out.push(MetricWeight { column, weight });
                }
                Ok(MetricWeights(out))
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(MetricWeights::default())
            }
        }

        deserializer.deserialize_map(WeightsVisitor)
    }
}
