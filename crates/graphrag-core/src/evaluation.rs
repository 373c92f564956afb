//! # Evaluation
//!
//! Filtered link-prediction evaluation. For every test triplet the model
//! scores all tails of `(h, r)` and all heads of `(t, r)`; known true
//! answers other than the target are filtered out before ranking.

use crate::graph::KnowledgeGraph;
use crate::metrics::{Metric, RankingCollection};
use crate::model::RelationScorer;
use crate::observer::TrainingObserver;
use crate::sampling::{compute_ranking, strict_negative_mask};
use crate::{GraphragError, Triplet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean reciprocal rank over both directions.
    pub mrr: f64,
    /// Requested metrics, keyed by their configured name.
    pub metrics: BTreeMap<String, f64>,
    /// Number of test triplets.
    pub num_queries: usize,
}

/// Rankings of a set of test triplets.
#[derive(Debug, Clone, Default)]
pub struct Rankings {
    /// Tail and head rankings.
    pub both: RankingCollection,
    /// Tail rankings only.
    pub tail: RankingCollection,
}

/// Rank the targets of `triplets` in both directions.
pub fn rank_triplets(
    model: &RelationScorer,
    filter: &KnowledgeGraph,
    triplets: &[Triplet],
    batch_size: usize,
    observer: &mut dyn TrainingObserver,
) -> Result<Rankings, GraphragError> {
    if batch_size == 0 {
        return Err(GraphragError::InvalidConfig(
            "batch_size must be positive".to_string(),
        ));
    }
    model.check_compatible(filter)?;

    let mut tail = RankingCollection::new();
    let mut head = RankingCollection::new();
    let mut done = 0;

    for batch in triplets.chunks(batch_size) {
        let (tail_masks, head_masks) = strict_negative_mask(filter, batch);
        for ((triplet, t_mask), h_mask) in batch.iter().zip(&tail_masks).zip(&head_masks) {
            let t_pred = model.score_tails(filter, triplet.head, triplet.relation)?;
            let t_rank = compute_ranking(&t_pred, triplet.tail, Some(t_mask))?;
            tail.push(t_rank, t_mask.iter().filter(|keep| **keep).count());

            let h_pred = model.score_heads(filter, triplet.tail, triplet.relation)?;
            let h_rank = compute_ranking(&h_pred, triplet.head, Some(h_mask))?;
            head.push(h_rank, h_mask.iter().filter(|keep| **keep).count());
        }
        done += batch.len();
        observer.on_evaluation_batch(done, triplets.len());
    }

    let mut both = tail.clone();
    both.extend(&head);
    Ok(Rankings { both, tail })
}

/// Evaluate `model` on `triplets`, reporting every metric to `observer`.
pub fn evaluate(
    model: &RelationScorer,
    filter: &KnowledgeGraph,
    triplets: &[Triplet],
    metrics: &[Metric],
    batch_size: usize,
    observer: &mut dyn TrainingObserver,
) -> Result<EvaluationReport, GraphragError> {
    if triplets.is_empty() {
        return Err(GraphragError::EmptyDataset);
    }
    observer.on_evaluation_start(triplets.len());
    let rankings = rank_triplets(model, filter, triplets, batch_size, observer)?;

    let mut values = BTreeMap::new();
    for metric in metrics {
        let collection = if metric.tail_only() {
            &rankings.tail
        } else {
            &rankings.both
        };
        let value = metric.compute(collection);
        observer.on_metric(metric.name(), value);
        values.insert(metric.name().to_string(), value);
    }

    Ok(EvaluationReport {
        mrr: rankings.both.mrr(),
        metrics: values,
        num_queries: triplets.len(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::features::ensure_relation_features;
    use crate::observer::NoopObserver;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (KnowledgeGraph, RelationScorer) {
        let mut graph = KnowledgeGraph::from_names([
            ("a", "r", "b"),
            ("b", "r", "c"),
            ("c", "r", "d"),
            ("d", "s", "a"),
        ])
        .expect("graph");
        ensure_relation_features(&mut graph, 8).expect("features");
        let config = ModelConfig {
            embedding_dim: 4,
            init_scale: 0.3,
        };
        let model = RelationScorer::for_graph(&graph, &config, &mut StdRng::seed_from_u64(11))
            .expect("model");
        (graph, model)
    }

    #[derive(Default)]
    struct Recorder {
        metrics: Vec<String>,
        batches: Vec<(usize, usize)>,
    }

    impl TrainingObserver for Recorder {
        fn on_metric(&mut self, name: &str, _value: f64) {
            self.metrics.push(name.to_string());
        }
        fn on_evaluation_batch(&mut self, done: usize, total: usize) {
            self.batches.push((done, total));
        }
    }

    #[test]
    fn rankings_cover_both_directions() {
        let (graph, model) = setup();
        let rankings =
            rank_triplets(&model, &graph, graph.triplets(), 3, &mut NoopObserver).expect("rank");
        assert_eq!(rankings.tail.len(), 4);
        assert_eq!(rankings.both.len(), 8);
        // 4 entities, one known answer per query: rank in 1..=4
        assert!(rankings.both.rankings().iter().all(|r| (1..=4).contains(r)));
    }

    #[test]
    fn report_contains_requested_metrics() {
        let (graph, model) = setup();
        let metrics: Vec<Metric> = ["mr", "mrr", "hits@1-tail", "hits@3_2"]
            .iter()
            .map(|m| m.parse().expect("metric"))
            .collect();
        let mut recorder = Recorder::default();
        let report = evaluate(&model, &graph, graph.triplets(), &metrics, 3, &mut recorder)
            .expect("evaluate");

        assert_eq!(report.num_queries, 4);
        assert_eq!(report.metrics.len(), 4);
        assert!(report.mrr > 0.0 && report.mrr <= 1.0);
        assert_eq!(report.metrics["mrr"], report.mrr);
        assert!(report.metrics["mr"] >= 1.0);
        assert_eq!(recorder.metrics.len(), 4);
        assert_eq!(recorder.batches, vec![(3, 4), (4, 4)]);
    }

    #[test]
    fn empty_test_set_rejected() {
        let (graph, model) = setup();
        assert!(matches!(
            evaluate(&model, &graph, &[], &[], 4, &mut NoopObserver),
            Err(GraphragError::EmptyDataset)
        ));
    }
}
