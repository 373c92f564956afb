//! # graphrag-core
//!
//! Knowledge-graph construction and KG pretraining engine for Deep GraphRAG.
//!
//! Stage 1 turns extracted `(head, relation, tail)` facts into a knowledge
//! graph stored in redb or a single binary file. Stage 2 pretrains a
//! relation-conditioned link-prediction model on that graph with
//! self-adversarial negative sampling and filtered-ranking validation.
//!
//! ## Architectural Constraints
//!
//! - No async, no network and no logging dependency (pure Rust)
//! - Deterministic: `BTreeMap` ordering and seeded `StdRng` everywhere
//! - Progress is reported through [`TrainingObserver`]; the application
//!   decides how to display it

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod construction;
pub mod dataset;
pub mod evaluation;
pub mod features;
pub mod formats;
pub mod graph;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod observer;
pub mod optimizer;
pub mod primitives;
pub mod retrieval;
pub mod sampling;
pub mod stats;
pub mod storage;
pub mod training;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Direction, EntityId, GraphragError, RawTriplet, RelationId, Triplet};

// =============================================================================
// RE-EXPORTS: Construction and Storage
// =============================================================================

pub use construction::{ConstructionReport, Constructor, InputFormat};
pub use graph::{KnowledgeGraph, SerializableGraph, TripletStore};
pub use stats::{KgStats, RelationCount};
pub use storage::{GraphStorage, RedbStore, open_graph};

// =============================================================================
// RE-EXPORTS: Pretraining
// =============================================================================

pub use config::{
    DatasetConfig, ModelConfig, PretrainConfig, StorageKind, TaskConfig, TrainConfig,
};
pub use dataset::KgDataset;
pub use evaluation::{EvaluationReport, evaluate};
pub use metrics::{Metric, MetricKind, RankingCollection};
pub use model::RelationScorer;
pub use observer::{NoopObserver, TrainingObserver};
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerState};
pub use retrieval::{LinkPredictor, Prediction};
pub use training::{EpochSummary, Trainer, TrainingSummary, initial_model};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    Checkpoint, CheckpointInfo, PersistenceHeader, graph_from_bytes, graph_to_bytes,
    load_checkpoint, save_checkpoint,
};
