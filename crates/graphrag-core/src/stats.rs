//! # Graph Statistics
//!
//! Integer-only summary of a knowledge graph for `status` and the HTTP API.

use crate::graph::KnowledgeGraph;
use crate::primitives::TOP_RELATIONS;
use serde::{Deserialize, Serialize};

/// A relation and the number of triplets using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCount {
    pub relation: String,
    pub triplets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KgStats {
    pub entities: usize,
    pub relations: usize,
    pub triplets: usize,
    /// Relations carrying a feature vector.
    pub relations_with_features: usize,
    /// `triplets / entities^2`, in millionths.
    pub density_millionths: u64,
    /// `triplets / entities`, in thousandths.
    pub avg_out_degree_thousandths: u64,
    /// Most frequent relations, ties broken by name.
    pub top_relations: Vec<RelationCount>,
}

impl KgStats {
    #[must_use]
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        let entities = graph.num_entities() as u64;
        let triplets = graph.triplets().len() as u64;

        let density_millionths = match entities.checked_mul(entities) {
            Some(0) | None => 0,
            Some(squared) => triplets.saturating_mul(1_000_000) / squared,
        };
        let avg_out_degree_thousandths = if entities == 0 {
            0
        } else {
            triplets.saturating_mul(1_000) / entities
        };

        let mut top_relations: Vec<RelationCount> = graph
            .relation_names()
            .iter()
            .zip(graph.relation_frequencies())
            .map(|(name, count)| RelationCount {
                relation: name.clone(),
                triplets: count,
            })
            .collect();
        top_relations.sort_by(|a, b| {
            b.triplets
                .cmp(&a.triplets)
                .then_with(|| a.relation.cmp(&b.relation))
        });
        top_relations.truncate(TOP_RELATIONS);

        Self {
            entities: graph.num_entities(),
            relations: graph.num_relations(),
            triplets: graph.triplets().len(),
            relations_with_features: graph.relation_feature_entries().count(),
            density_millionths,
            avg_out_degree_thousandths,
            top_relations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_ratios() {
        let graph = KnowledgeGraph::from_names([
            ("a", "r", "b"),
            ("b", "r", "c"),
            ("c", "s", "a"),
            ("a", "t", "c"),
        ])
        .expect("graph");
        let stats = KgStats::from_graph(&graph);
        assert_eq!(stats.entities, 3);
        assert_eq!(stats.relations, 3);
        assert_eq!(stats.triplets, 4);
        assert_eq!(stats.density_millionths, 4_000_000 / 9);
        assert_eq!(stats.avg_out_degree_thousandths, 1_333);
        assert_eq!(stats.top_relations[0].relation, "r");
        assert_eq!(stats.top_relations[1].relation, "s");
        assert_eq!(stats.top_relations[2].relation, "t");
    }

    #[test]
    fn empty_graph() {
        let stats = KgStats::from_graph(&KnowledgeGraph::new());
        assert_eq!(stats.density_millionths, 0);
        assert_eq!(stats.avg_out_degree_thousandths, 0);
        assert!(stats.top_relations.is_empty());
    }
}
