//! # Knowledge Graph
//!
//! The in-memory knowledge graph and the `TripletStore` trait shared with the
//! persistent redb store.
//!
//! All indexes use `BTreeMap`/`BTreeSet` for deterministic ordering. Triplets
//! additionally keep their insertion order, which is the order training
//! shuffles from.

use crate::{EntityId, GraphragError, RelationId, Triplet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TRIPLETSTORE TRAIT
// =============================================================================

/// The TripletStore trait defines the construction-time graph operations.
///
/// All fallible operations return `Result<T, GraphragError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait TripletStore {
    /// Insert an entity by name. Returns the existing id if already present.
    fn insert_entity(&mut self, name: &str) -> Result<EntityId, GraphragError>;

    /// Insert a relation by name. Returns the existing id if already present.
    fn insert_relation(&mut self, name: &str) -> Result<RelationId, GraphragError>;

    /// Insert a triplet whose entities and relation already exist.
    /// Returns `false` if the triplet was already stored.
    fn insert_triplet(&mut self, triplet: Triplet) -> Result<bool, GraphragError>;

    /// Attach a feature vector to a relation, replacing any previous one.
    fn set_relation_features(
        &mut self,
        relation: RelationId,
        features: Vec<f32>,
    ) -> Result<(), GraphragError>;

    /// Look up an entity id by name.
    fn entity_id(&self, name: &str) -> Option<EntityId>;

    /// Look up a relation id by name.
    fn relation_id(&self, name: &str) -> Option<RelationId>;

    /// Number of entities.
    fn entity_count(&self) -> Result<usize, GraphragError>;

    /// Number of relations.
    fn relation_count(&self) -> Result<usize, GraphragError>;

    /// Number of distinct triplets.
    fn triplet_count(&self) -> Result<usize, GraphragError>;
}

/// Reject feature vectors that are empty or contain NaN/inf.
pub(crate) fn validate_features(features: &[f32]) -> Result<(), GraphragError> {
    if features.is_empty() {
        return Err(GraphragError::InvalidConfig(
            "Relation features must not be empty".to_string(),
        ));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(GraphragError::InvalidConfig(
            "Relation features must be finite".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// KNOWLEDGE GRAPH
// =============================================================================

/// The in-memory knowledge graph.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    /// Entity names, indexed by `EntityId`.
    entities: Vec<String>,
    /// Reverse lookup: name -> EntityId
    entity_index: BTreeMap<String, EntityId>,
    /// Relation names, indexed by `RelationId`.
    relations: Vec<String>,
    /// Reverse lookup: name -> RelationId
    relation_index: BTreeMap<String, RelationId>,
    /// Triplets in insertion order.
    triplets: Vec<Triplet>,
    /// Membership index over `triplets`.
    triplet_set: BTreeSet<Triplet>,
    /// (head, relation) -> true tails
    tails: BTreeMap<(EntityId, RelationId), BTreeSet<EntityId>>,
    /// (tail, relation) -> true heads
    heads: BTreeMap<(EntityId, RelationId), BTreeSet<EntityId>>,
    /// Relation embeddings consumed by the scorer.
    relation_features: BTreeMap<RelationId, Vec<f32>>,
}

impl KnowledgeGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from textual facts, creating entities and relations on
    /// the fly. Convenient for tests and small fixtures.
    pub fn from_names<'a>(
        facts: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> Result<Self, GraphragError> {
        let mut graph = Self::new();
        for (head, relation, tail) in facts {
            let h = graph.insert_entity(head)?;
            let r = graph.insert_relation(relation)?;
            let t = graph.insert_entity(tail)?;
            graph.insert_triplet(Triplet::new(h, r, t))?;
        }
        Ok(graph)
    }

    /// Number of entities (infallible, in-memory).
    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of relations (infallible, in-memory).
    #[must_use]
    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    /// Name of an entity.
    #[must_use]
    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.entities.get(id.index()).map(String::as_str)
    }

    /// Name of a relation.
    #[must_use]
    pub fn relation_name(&self, id: RelationId) -> Option<&str> {
        self.relations.get(id.index()).map(String::as_str)
    }

    /// Entity names in id order.
    #[must_use]
    pub fn entity_names(&self) -> &[String] {
        &self.entities
    }

    /// Relation names in id order.
    #[must_use]
    pub fn relation_names(&self) -> &[String] {
        &self.relations
    }

    /// All triplets in insertion order.
    #[must_use]
    pub fn triplets(&self) -> &[Triplet] {
        &self.triplets
    }

    /// Check if the graph contains a triplet.
    #[must_use]
    pub fn contains(&self, triplet: &Triplet) -> bool {
        self.triplet_set.contains(triplet)
    }

    /// All known tails of `(head, relation, ?)`.
    #[must_use]
    pub fn true_tails(&self, head: EntityId, relation: RelationId) -> Option<&BTreeSet<EntityId>> {
        self.tails.get(&(head, relation))
    }

    /// All known heads of `(?, relation, tail)`.
    #[must_use]
    pub fn true_heads(&self, tail: EntityId, relation: RelationId) -> Option<&BTreeSet<EntityId>> {
        self.heads.get(&(tail, relation))
    }

    /// Feature vector of a relation, if one was attached.
    #[must_use]
    pub fn relation_features(&self, relation: RelationId) -> Option<&[f32]> {
        self.relation_features.get(&relation).map(Vec::as_slice)
    }

    /// Iterate attached relation features in id order.
    pub fn relation_feature_entries(&self) -> impl Iterator<Item = (RelationId, &[f32])> + '_ {
        self.relation_features
            .iter()
            .map(|(id, features)| (*id, features.as_slice()))
    }

    /// Common length of all attached relation feature vectors.
    ///
    /// Returns `Ok(None)` when no relation carries features and
    /// `DimensionMismatch` when two vectors disagree.
    pub fn feature_dim(&self) -> Result<Option<usize>, GraphragError> {
        let mut dim = None;
        for features in self.relation_features.values() {
            match dim {
                None => dim = Some(features.len()),
                Some(expected) if expected != features.len() => {
                    return Err(GraphragError::DimensionMismatch {
                        expected,
                        found: features.len(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(dim)
    }

    /// Number of triplets per relation, indexed by `RelationId`.
    #[must_use]
    pub fn relation_frequencies(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.relations.len()];
        for triplet in &self.triplets {
            if let Some(count) = counts.get_mut(triplet.relation.index()) {
                *count = count.saturating_add(1);
            }
        }
        counts
    }

    fn check_entity(&self, id: EntityId) -> Result<(), GraphragError> {
        if id.index() < self.entities.len() {
            Ok(())
        } else {
            Err(GraphragError::UnknownEntity(format!("#{}", id.0)))
        }
    }

    fn check_relation(&self, id: RelationId) -> Result<(), GraphragError> {
        if id.index() < self.relations.len() {
            Ok(())
        } else {
            Err(GraphragError::UnknownRelation(format!("#{}", id.0)))
        }
    }
}

impl TripletStore for KnowledgeGraph {
    fn insert_entity(&mut self, name: &str) -> Result<EntityId, GraphragError> {
        if let Some(&id) = self.entity_index.get(name) {
            return Ok(id);
        }
        let id = EntityId(self.entities.len() as u64);
        self.entities.push(name.to_string());
        self.entity_index.insert(name.to_string(), id);
        Ok(id)
    }

    fn insert_relation(&mut self, name: &str) -> Result<RelationId, GraphragError> {
        if let Some(&id) = self.relation_index.get(name) {
            return Ok(id);
        }
        let id = RelationId(self.relations.len() as u64);
        self.relations.push(name.to_string());
        self.relation_index.insert(name.to_string(), id);
        Ok(id)
    }

    fn insert_triplet(&mut self, triplet: Triplet) -> Result<bool, GraphragError> {
        self.check_entity(triplet.head)?;
        self.check_entity(triplet.tail)?;
        self.check_relation(triplet.relation)?;

        if !self.triplet_set.insert(triplet) {
            return Ok(false);
        }
        self.triplets.push(triplet);
        self.tails
            .entry((triplet.head, triplet.relation))
            .or_default()
            .insert(triplet.tail);
        self.heads
            .entry((triplet.tail, triplet.relation))
            .or_default()
            .insert(triplet.head);
        Ok(true)
    }

    fn set_relation_features(
        &mut self,
        relation: RelationId,
        features: Vec<f32>,
    ) -> Result<(), GraphragError> {
        self.check_relation(relation)?;
        validate_features(&features)?;
        self.relation_features.insert(relation, features);
        Ok(())
    }

    fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.entity_index.get(name).copied()
    }

    fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.relation_index.get(name).copied()
    }

    fn entity_count(&self) -> Result<usize, GraphragError> {
        Ok(self.entities.len())
    }

    fn relation_count(&self) -> Result<usize, GraphragError> {
        Ok(self.relations.len())
    }

    fn triplet_count(&self) -> Result<usize, GraphragError> {
        Ok(self.triplets.len())
    }
}

// =============================================================================
// SERIALIZABLE GRAPH
// =============================================================================

/// Flat, serde-friendly form of a `KnowledgeGraph`.
///
/// Indexes are rebuilt on conversion back, so only names, triplets and
/// relation features are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub entities: Vec<String>,
    pub relations: Vec<String>,
    pub triplets: Vec<Triplet>,
    pub relation_features: Vec<(RelationId, Vec<f32>)>,
}

impl From<&KnowledgeGraph> for SerializableGraph {
    fn from(graph: &KnowledgeGraph) -> Self {
        Self {
            entities: graph.entities.clone(),
            relations: graph.relations.clone(),
            triplets: graph.triplets.clone(),
            relation_features: graph
                .relation_features
                .iter()
                .map(|(id, features)| (*id, features.clone()))
                .collect(),
        }
    }
}

impl TryFrom<SerializableGraph> for KnowledgeGraph {
    type Error = GraphragError;

    fn try_from(serializable: SerializableGraph) -> Result<Self, Self::Error> {
        let mut graph = Self::new();
        for name in &serializable.entities {
            graph.insert_entity(name)?;
        }
        for name in &serializable.relations {
            graph.insert_relation(name)?;
        }
        // Duplicate names would collapse ids and shift every later triplet.
        if graph.entities.len() != serializable.entities.len()
            || graph.relations.len() != serializable.relations.len()
        {
            return Err(GraphragError::DeserializationError(
                "Duplicate entity or relation name in graph data".to_string(),
            ));
        }
        for triplet in serializable.triplets {
            graph.insert_triplet(triplet)?;
        }
        for (relation, features) in serializable.relation_features {
            graph.set_relation_features(relation, features)?;
        }
        Ok(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> KnowledgeGraph {
        KnowledgeGraph::from_names([
            ("alice", "parent_of", "bob"),
            ("alice", "parent_of", "carol"),
            ("bob", "sibling_of", "carol"),
        ])
        .expect("build")
    }

    #[test]
    fn ids_are_dense_and_first_seen() {
        let graph = family();
        assert_eq!(graph.entity_id("alice"), Some(EntityId(0)));
        assert_eq!(graph.entity_id("bob"), Some(EntityId(1)));
        assert_eq!(graph.entity_id("carol"), Some(EntityId(2)));
        assert_eq!(graph.relation_id("sibling_of"), Some(RelationId(1)));
        assert_eq!(graph.entity_name(EntityId(2)), Some("carol"));
    }

    #[test]
    fn duplicate_triplet_not_reinserted() {
        let mut graph = family();
        let t = graph.triplets()[0];
        assert!(!graph.insert_triplet(t).expect("insert"));
        assert_eq!(graph.triplet_count().expect("count"), 3);
    }

    #[test]
    fn true_answers_indexed_both_ways() {
        let graph = family();
        let alice = EntityId(0);
        let parent = RelationId(0);
        let tails = graph.true_tails(alice, parent).expect("tails");
        assert_eq!(tails.len(), 2);

        let heads = graph.true_heads(EntityId(2), parent).expect("heads");
        assert!(heads.contains(&alice));
        assert!(graph.true_heads(alice, parent).is_none());
    }

    #[test]
    fn dangling_triplet_rejected() {
        let mut graph = family();
        let result = graph.insert_triplet(Triplet::new(EntityId(0), RelationId(0), EntityId(99)));
        assert!(matches!(result, Err(GraphragError::UnknownEntity(_))));

        let result = graph.insert_triplet(Triplet::new(EntityId(0), RelationId(7), EntityId(1)));
        assert!(matches!(result, Err(GraphragError::UnknownRelation(_))));
    }

    #[test]
    fn feature_dim_detects_mismatch() {
        let mut graph = family();
        assert_eq!(graph.feature_dim().expect("dim"), None);

        graph
            .set_relation_features(RelationId(0), vec![1.0, 0.0])
            .expect("set");
        assert_eq!(graph.feature_dim().expect("dim"), Some(2));

        graph
            .set_relation_features(RelationId(1), vec![1.0, 0.0, 0.5])
            .expect("set");
        assert!(matches!(
            graph.feature_dim(),
            Err(GraphragError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn non_finite_features_rejected() {
        let mut graph = family();
        assert!(
            graph
                .set_relation_features(RelationId(0), vec![f32::NAN])
                .is_err()
        );
        assert!(graph.set_relation_features(RelationId(0), vec![]).is_err());
    }

    #[test]
    fn serializable_roundtrip_preserves_ids() {
        let mut graph = family();
        graph
            .set_relation_features(RelationId(1), vec![0.5, 0.5])
            .expect("set");

        let restored = KnowledgeGraph::try_from(SerializableGraph::from(&graph)).expect("restore");
        assert_eq!(restored.triplets(), graph.triplets());
        assert_eq!(restored.entity_names(), graph.entity_names());
        assert_eq!(restored.relation_features(RelationId(1)), Some(&[0.5, 0.5][..]));
    }

    #[test]
    fn relation_frequencies_count_triplets() {
        let graph = family();
        assert_eq!(graph.relation_frequencies(), vec![2, 1]);
    }
}
