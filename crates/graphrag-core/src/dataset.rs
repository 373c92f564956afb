//! # KG Dataset
//!
//! Training and validation splits over a knowledge graph. The full graph is
//! kept as the filter for strict negatives and filtered ranking, whatever
//! the split.

use crate::config::DatasetConfig;
use crate::features::{apply_feature_map, ensure_relation_features, parse_feature_map};
use crate::graph::KnowledgeGraph;
use crate::storage::open_graph;
use crate::{GraphragError, Triplet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A knowledge graph with its training and validation triplets.
#[derive(Debug, Clone)]
pub struct KgDataset {
    graph: KnowledgeGraph,
    train: Vec<Triplet>,
    valid: Vec<Triplet>,
}

impl KgDataset {
    /// Build the splits for an in-memory graph.
    ///
    /// Relations without features receive hashed name embeddings of
    /// `config.feature_dim` components.
    pub fn from_graph(
        mut graph: KnowledgeGraph,
        config: &DatasetConfig,
        seed: u64,
    ) -> Result<Self, GraphragError> {
        if graph.triplets().is_empty() {
            return Err(GraphragError::EmptyDataset);
        }
        if !(0.0..1.0).contains(&config.valid_ratio) {
            return Err(GraphragError::InvalidConfig(
                "dataset.valid_ratio must be in [0, 1)".to_string(),
            ));
        }
        ensure_relation_features(&mut graph, config.feature_dim)?;

        let all = graph.triplets().to_vec();
        let n = all.len();
        let (train, valid) = if config.valid_ratio == 0.0 || n < 2 {
            (all.clone(), all)
        } else {
            let mut shuffled = all;
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
            let held_out = ((config.valid_ratio * n as f64).ceil() as usize).clamp(1, n - 1);
            let train = shuffled.split_off(held_out);
            (train, shuffled)
        };

        Ok(Self {
            graph,
            train,
            valid,
        })
    }

    /// Load the graph named by `config`, attach the relation feature file if
    /// one is configured, then split.
    ///
    /// Feature names that match no relation are returned alongside.
    pub fn load(config: &DatasetConfig, seed: u64) -> Result<(Self, Vec<String>), GraphragError> {
        let mut graph = open_graph(&config.path, config.backend)?;
        let mut unknown = Vec::new();
        if let Some(path) = &config.relation_features {
            let data = std::fs::read(path)
                .map_err(|e| GraphragError::IoError(format!("{}: {}", path.display(), e)))?;
            unknown = apply_feature_map(&mut graph, parse_feature_map(&data)?)?;
        }
        Ok((Self::from_graph(graph, config, seed)?, unknown))
    }

    /// The full graph, used as the filter.
    #[must_use]
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    #[must_use]
    pub fn train_triplets(&self) -> &[Triplet] {
        &self.train
    }

    #[must_use]
    pub fn valid_triplets(&self) -> &[Triplet] {
        &self.valid
    }

    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.graph.num_entities()
    }

    /// Give up the dataset, keeping the graph.
    #[must_use]
    pub fn into_graph(self) -> KnowledgeGraph {
        self.graph
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TripletStore;
    use crate::RelationId;
    use std::collections::BTreeSet;

    fn chain(n: usize) -> KnowledgeGraph {
        let names: Vec<String> = (0..=n).map(|i| format!("e{}", i)).collect();
        KnowledgeGraph::from_names(
            (0..n).map(|i| (names[i].as_str(), "next", names[i + 1].as_str())),
        )
        .expect("graph")
    }

    fn config(valid_ratio: f64) -> DatasetConfig {
        DatasetConfig {
            feature_dim: 8,
            valid_ratio,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn zero_ratio_validates_on_training_set() {
        let dataset = KgDataset::from_graph(chain(5), &config(0.0), 1).expect("dataset");
        assert_eq!(dataset.train_triplets(), dataset.valid_triplets());
        assert_eq!(dataset.train_triplets().len(), 5);
        assert_eq!(dataset.graph().feature_dim().expect("dim"), Some(8));
    }

    #[test]
    fn holdout_is_disjoint_and_seeded() {
        let a = KgDataset::from_graph(chain(10), &config(0.25), 3).expect("dataset");
        let b = KgDataset::from_graph(chain(10), &config(0.25), 3).expect("dataset");
        assert_eq!(a.valid_triplets(), b.valid_triplets());
        assert_eq!(a.valid_triplets().len(), 3);
        assert_eq!(a.train_triplets().len(), 7);

        let train: BTreeSet<_> = a.train_triplets().iter().collect();
        assert!(a.valid_triplets().iter().all(|t| !train.contains(t)));
        // The filter still knows every triplet.
        assert_eq!(a.graph().triplets().len(), 10);
    }

    #[test]
    fn holdout_keeps_one_training_triplet() {
        let dataset = KgDataset::from_graph(chain(2), &config(0.9), 0).expect("dataset");
        assert_eq!(dataset.train_triplets().len(), 1);
        assert_eq!(dataset.valid_triplets().len(), 1);

        let single = KgDataset::from_graph(chain(1), &config(0.5), 0).expect("dataset");
        assert_eq!(single.train_triplets().len(), 1);
    }

    #[test]
    fn empty_graph_rejected() {
        let result = KgDataset::from_graph(KnowledgeGraph::new(), &config(0.0), 0);
        assert!(matches!(result, Err(GraphragError::EmptyDataset)));
    }

    #[test]
    fn mismatched_feature_dim_rejected() {
        let mut graph = chain(3);
        graph
            .set_relation_features(RelationId(0), vec![1.0; 4])
            .expect("features");
        assert!(KgDataset::from_graph(graph, &config(0.0), 0).is_err());
    }
}
