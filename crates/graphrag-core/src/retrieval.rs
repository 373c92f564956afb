//! # Retrieval
//!
//! Serving side of the pretrained model: given an entity and a relation,
//! rank candidate entities for the missing side of the triplet.

use crate::graph::{KnowledgeGraph, TripletStore};
use crate::model::RelationScorer;
use crate::primitives::MAX_TOP_K;
use crate::stats::KgStats;
use crate::{Direction, EntityId, GraphragError, Triplet};
use serde::{Deserialize, Serialize};

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub entity: String,
    pub entity_id: u64,
    pub score: f32,
    /// The completed triplet is already in the graph.
    pub known: bool,
}

/// A graph together with a scorer trained on it.
#[derive(Debug, Clone)]
pub struct LinkPredictor {
    graph: KnowledgeGraph,
    model: RelationScorer,
}

impl LinkPredictor {
    /// Pair a graph with a compatible scorer.
    pub fn new(graph: KnowledgeGraph, model: RelationScorer) -> Result<Self, GraphragError> {
        model.check_compatible(&graph)?;
        Ok(Self { graph, model })
    }

    #[must_use]
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    #[must_use]
    pub fn model(&self) -> &RelationScorer {
        &self.model
    }

    #[must_use]
    pub fn stats(&self) -> KgStats {
        KgStats::from_graph(&self.graph)
    }

    /// Top-`top_k` completions of `(entity, relation, ?)` for
    /// [`Direction::Tail`] or `(?, relation, entity)` for [`Direction::Head`].
    ///
    /// Results are ordered by descending score, ties by entity id. With
    /// `exclude_known`, completions already in the graph are skipped.
    pub fn predict(
        &self,
        entity: &str,
        relation: &str,
        direction: Direction,
        top_k: usize,
        exclude_known: bool,
    ) -> Result<Vec<Prediction>, GraphragError> {
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(GraphragError::InvalidConfig(format!(
                "top_k must be in 1..={}",
                MAX_TOP_K
            )));
        }
        let anchor = self
            .graph
            .entity_id(entity)
            .ok_or_else(|| GraphragError::UnknownEntity(entity.to_string()))?;
        let relation_id = self
            .graph
            .relation_id(relation)
            .ok_or_else(|| GraphragError::UnknownRelation(relation.to_string()))?;

        let (scores, known) = match direction {
            Direction::Tail => (
                self.model.score_tails(&self.graph, anchor, relation_id)?,
                self.graph.true_tails(anchor, relation_id),
            ),
            Direction::Head => (
                self.model.score_heads(&self.graph, anchor, relation_id)?,
                self.graph.true_heads(anchor, relation_id),
            ),
        };

        let mut ranked: Vec<(EntityId, f32, bool)> = scores
            .into_iter()
            .enumerate()
            .map(|(idx, score)| {
                let id = EntityId(idx as u64);
                (id, score, known.is_some_and(|set| set.contains(&id)))
            })
            .filter(|(_, _, is_known)| !(exclude_known && *is_known))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .map(|(id, score, known)| {
                let name = self
                    .graph
                    .entity_name(id)
                    .ok_or_else(|| GraphragError::UnknownEntity(format!("#{}", id.0)))?;
                Ok(Prediction {
                    entity: name.to_string(),
                    entity_id: id.0,
                    score,
                    known,
                })
            })
            .collect()
    }

    /// Score a single named triplet.
    pub fn score(&self, head: &str, relation: &str, tail: &str) -> Result<f32, GraphragError> {
        let lookup = |name: &str| {
            self.graph
                .entity_id(name)
                .ok_or_else(|| GraphragError::UnknownEntity(name.to_string()))
        };
        let relation = self
            .graph
            .relation_id(relation)
            .ok_or_else(|| GraphragError::UnknownRelation(relation.to_string()))?;
        self.model
            .score(&self.graph, &Triplet::new(lookup(head)?, relation, lookup(tail)?))
    }
}

// =============================================================================
// TESTS
// =============================================================================
