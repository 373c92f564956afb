//! # Pretraining Configuration
//!
//! Serde model of the stage-2 configuration. Every field has a default, so a
//! config file only needs the values it changes. Loading from TOML and
//! applying command-line overrides is done by the application.

use crate::metrics::Metric;
use crate::optimizer::OptimizerConfig;
use crate::primitives::DEFAULT_FEATURE_DIM;
use crate::GraphragError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// SECTIONS
// =============================================================================

/// Where the knowledge graph lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// redb database written by `build`.
    #[default]
    Redb,
    /// Single binary file (header + postcard payload).
    File,
}

impl std::str::FromStr for StorageKind {
    type Err = GraphragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(GraphragError::InvalidConfig(format!(
                "Unknown backend: {}. Use: redb, file",
                other
            ))),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => write!(f, "redb"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub backend: StorageKind,
    /// Optional JSON map of relation name -> feature vector.
    pub relation_features: Option<PathBuf>,
    pub feature_dim: usize,
    /// Fraction of triplets held out for validation. `0.0` validates on the
    /// training triplets themselves.
    pub valid_ratio: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kg.redb"),
            backend: StorageKind::Redb,
            relation_features: None,
            feature_dim: DEFAULT_FEATURE_DIM,
            valid_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Number of complex components per entity embedding.
    pub embedding_dim: usize,
    /// Parameters are initialised uniformly in `[-init_scale, init_scale)`.
    pub init_scale: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 32,
            init_scale: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub num_epoch: usize,
    pub batch_size: usize,
    /// Cap on batches per epoch; all batches when unset.
    pub batch_per_epoch: Option<usize>,
    /// Report the batch loss every `log_interval` batches.
    pub log_interval: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_epoch: 10,
            batch_size: 64,
            batch_per_epoch: None,
            log_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    pub num_negative: usize,
    /// Never sample known true answers as negatives.
    pub strict_negative: bool,
    /// Self-adversarial weighting temperature; `0` weights negatives uniformly.
    pub adversarial_temperature: f32,
    pub metric: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            num_negative: 256,
            strict_negative: true,
            adversarial_temperature: 1.0,
            metric: ["mr", "mrr", "hits@1", "hits@3", "hits@10", "hits@10_50"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

/// The full stage-2 pretraining configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PretrainConfig {
    pub seed: u64,
    /// Directory receiving `model_epoch_<N>.ckpt` files.
    pub output_dir: PathBuf,
    /// Checkpoint to initialise the model from.
    pub checkpoint: Option<PathBuf>,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
    pub train: TrainConfig,
    pub task: TaskConfig,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            seed: 1024,
            output_dir: PathBuf::from("outputs/stage2_kg_pretrain"),
            checkpoint: None,
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            optimizer: OptimizerConfig::default(),
            train: TrainConfig::default(),
            task: TaskConfig::default(),
        }
    }
}

impl PretrainConfig {
    /// Parse the configured metric names.
    pub fn metrics(&self) -> Result<Vec<Metric>, GraphragError> {
        self.task.metric.iter().map(|m| m.parse()).collect()
    }

    /// Check value ranges. Returns the parsed metrics on success.
    pub fn validate(&self) -> Result<Vec<Metric>, GraphragError> {
        let invalid = |msg: &str| Err(GraphragError::InvalidConfig(msg.to_string()));

        if self.train.batch_size == 0 {
            return invalid("train.batch_size must be positive");
        }
        if self.train.log_interval == 0 {
            return invalid("train.log_interval must be positive");
        }
        if self.train.batch_per_epoch == Some(0) {
            return invalid("train.batch_per_epoch must be positive when set");
        }
        if self.task.num_negative == 0 {
            return invalid("task.num_negative must be positive");
        }
        if !(self.task.adversarial_temperature.is_finite()
            && self.task.adversarial_temperature >= 0.0)
        {
            return invalid("task.adversarial_temperature must be a non-negative number");
        }
        if self.model.embedding_dim == 0 {
            return invalid("model.embedding_dim must be positive");
        }
        if !(self.model.init_scale.is_finite() && self.model.init_scale > 0.0) {
            return invalid("model.init_scale must be a positive number");
        }
        if self.dataset.feature_dim == 0 {
            return invalid("dataset.feature_dim must be positive");
        }
        if !(0.0..1.0).contains(&self.dataset.valid_ratio) {
            return invalid("dataset.valid_ratio must be in [0, 1)");
        }
        self.optimizer.validate()?;
        self.metrics()
    }
}

// =============================================================================
// TESTS
// =============================================================================
