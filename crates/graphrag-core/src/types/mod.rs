//! # Core Type Definitions
//!
//! This module contains the core types shared by construction, training and
//! retrieval:
//! - Graph identifiers (`EntityId`, `RelationId`)
//! - Fact representation (`Triplet`, `RawTriplet`)
//! - Error types (`GraphragError`)
//!
//! ## Determinism Guarantees
//!
//! Identifiers and triplets implement `Ord` so they can live in
//! `BTreeMap`/`BTreeSet` and iterate in a stable order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Dense identifier of an entity in the knowledge graph.
///
/// Ids are assigned in first-seen order starting at 0, so an id doubles as
/// the row index of the entity in the scorer's embedding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Row index of this entity in dense tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense identifier of a relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationId(pub u64);

impl RelationId {
    /// Row index of this relation in dense tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// TRIPLETS
// =============================================================================

/// A single fact `(head, relation, tail)` of the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triplet {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
}

impl Triplet {
    /// Create a new triplet.
    #[must_use]
    pub const fn new(head: EntityId, relation: RelationId, tail: EntityId) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }

    /// Same relation and head, different tail.
    #[must_use]
    pub const fn with_tail(self, tail: EntityId) -> Self {
        Self { tail, ..self }
    }

    /// Same relation and tail, different head.
    #[must_use]
    pub const fn with_head(self, head: EntityId) -> Self {
        Self { head, ..self }
    }
}

/// A textual fact as it arrives from an extraction pipeline.
///
/// Raw triplets are validated and resolved to ids by the construction stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RawTriplet {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl RawTriplet {
    /// Create a new raw triplet.
    #[must_use]
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }
}

/// Which side of a triplet is being predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Predict the tail of `(head, relation, ?)`.
    #[default]
    Tail,
    /// Predict the head of `(?, relation, tail)`.
    Head,
}

impl std::str::FromStr for Direction {
    type Err = GraphragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tail" => Ok(Self::Tail),
            "head" => Ok(Self::Head),
            other => Err(GraphragError::InvalidConfig(format!(
                "Unknown direction: {}. Use: tail, head",
                other
            ))),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while building, training or querying a graph.
///
/// - No silent failures
/// - Use `Result<T, GraphragError>` for fallible operations
/// - The core never panics on user input; all errors are recoverable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphragError {
    /// A raw triplet failed validation.
    #[error("Invalid triplet: {0}")]
    InvalidTriplet(String),

    /// An entity name or id is not part of the graph.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A relation name or id is not part of the graph.
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    /// The graph holds no triplets to train or evaluate on.
    #[error("Dataset contains no triplets")]
    EmptyDataset,

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A metric name could not be parsed.
    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    /// Two vectors that must agree in length do not.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A checkpoint file referenced by training does not exist.
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
