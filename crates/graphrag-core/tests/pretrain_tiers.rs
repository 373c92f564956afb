//! # Pretraining Tier Tests (T0-T3)
//!
//! ## Tiers
//! - T0: Construction integrity
//! - T1: Persistence round-trips
//! - T2: Task building blocks (sampling, loss, ranking)
//! - T3: End-to-end pretraining

use graphrag_core::{
    Constructor, Direction, GraphStorage, GraphragError, InputFormat, KgDataset, KnowledgeGraph,
    LinkPredictor, NoopObserver, Optimizer, PretrainConfig, RawTriplet, StorageKind, Trainer,
    TripletStore, initial_model,
};

/// A small family graph: a parent chain, its inverse and one symmetric edge.
fn family_tsv() -> &'static str {
    "# head\trelation\ttail\n\
     alice\tparent_of\tbob\n\
     bob\tparent_of\tcarol\n\
     carol\tparent_of\tdave\n\
     dave\tparent_of\terin\n\
     bob\tchild_of\talice\n\
     carol\tchild_of\tbob\n\
     dave\tchild_of\tcarol\n\
     erin\tchild_of\tdave\n\
     alice\tmarried_to\tfrank\n\
     frank\tmarried_to\talice\n"
}

fn family_graph() -> KnowledgeGraph {
    let raws = Constructor::parse(family_tsv().as_bytes(), InputFormat::Tsv).expect("parse");
    let mut graph = KnowledgeGraph::new();
    Constructor::ingest_batch(&mut graph, &raws).expect("ingest");
    graph
}

// =============================================================================
// TIER T0: CONSTRUCTION INTEGRITY
// =============================================================================

mod t0_construction {
    use super::*;

    /// T0.1: Every parsed fact lands in the graph exactly once.
    #[test]
    fn facts_are_ingested() {
        let graph = family_graph();
        assert_eq!(graph.triplet_count().expect("count"), 10);
        assert_eq!(graph.num_entities(), 6);
        assert_eq!(graph.num_relations(), 3);
    }

    /// T0.2: Re-ingesting the same facts is idempotent.
    #[test]
    fn reingestion_is_idempotent() {
        let mut graph = family_graph();
        let raws = Constructor::parse(family_tsv().as_bytes(), InputFormat::Tsv).expect("parse");
        let report = Constructor::ingest_batch(&mut graph, &raws).expect("ingest");
        assert_eq!(report.triplets_added, 0);
        assert_eq!(report.duplicates, 10);
        assert_eq!(graph.triplet_count().expect("count"), 10);
    }

    /// T0.3: A malformed record rejects the whole batch.
    #[test]
    fn malformed_batch_rejected() {
        let mut graph = KnowledgeGraph::new();
        let raws = vec![
            RawTriplet::new("a", "r", "b"),
            RawTriplet::new("a", "r", "\u{0}"),
        ];
        let result = Constructor::ingest_batch(&mut graph, &raws);
        assert!(matches!(result, Err(GraphragError::InvalidTriplet(_))));
        assert_eq!(graph.triplet_count().expect("count"), 0);
    }

    /// T0.4: JSON and TSV inputs build the same graph.
    #[test]
    fn json_matches_tsv() {
        let json = br#"[
            {"head": "alice", "relation": "parent_of", "tail": "bob"},
            {"head": "bob", "relation": "child_of", "tail": "alice"}
        ]"#;
        let tsv = "alice\tparent_of\tbob\nbob\tchild_of\talice\n";
        let from_json = Constructor::parse(json, InputFormat::Json).expect("json");
        let from_tsv = Constructor::parse(tsv.as_bytes(), InputFormat::Tsv).expect("tsv");
        assert_eq!(from_json, from_tsv);
    }
}

// =============================================================================
// TIER T1: PERSISTENCE
// =============================================================================

mod t1_persistence {
    use super::*;

    /// T1.1: Both storage backends reload the graph that was built.
    #[test]
    fn backends_reload_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raws = Constructor::parse(family_tsv().as_bytes(), InputFormat::Tsv).expect("parse");
        let expected = family_graph();

        for (name, kind) in [("kg.redb", StorageKind::Redb), ("kg.bin", StorageKind::File)] {
            let path = dir.path().join(name);
            {
                let mut storage = GraphStorage::open(&path, kind).expect("open");
                storage.ingest(&raws).expect("ingest");
                storage.flush().expect("flush");
            }
            let graph = graphrag_core::open_graph(&path, kind).expect("load");
            assert_eq!(graph.triplets(), expected.triplets(), "{}", name);
            assert_eq!(graph.entity_names(), expected.entity_names(), "{}", name);
        }
    }

    /// T1.2: Graph bytes are bit-exact across save -> load -> save.
    #[test]
    fn graph_bytes_stable() {
        let graph = family_graph();
        let bytes = graphrag_core::graph_to_bytes(&graph).expect("bytes");
        let restored = graphrag_core::graph_from_bytes(&bytes).expect("restore");
        assert_eq!(graphrag_core::graph_to_bytes(&restored).expect("bytes"), bytes);
    }
}

// =============================================================================
// TIER T2: TASK BUILDING BLOCKS
// =============================================================================

mod t2_task {
    use super::*;
    use graphrag_core::loss::adversarial_bce;
    use graphrag_core::sampling::{compute_ranking, negative_sampling, strict_negative_mask};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// T2.1: Strict negatives never hit a known answer on a graph with room.
    #[test]
    fn strict_negatives_are_false() {
        let graph = family_graph();
        let batch = graph.triplets().to_vec();
        let mut rng = StdRng::seed_from_u64(5);
        let rows = negative_sampling(&graph, &batch, 32, true, &mut rng).expect("sample");
        for row in &rows {
            for negative in &row[1..] {
                assert!(!graph.contains(negative), "{:?}", negative);
            }
        }
    }

    /// T2.2: A perfect score ranks first under filtering.
    #[test]
    fn perfect_score_ranks_first() {
        let graph = family_graph();
        let target = graph.triplets()[0];
        let (tail_masks, _) = strict_negative_mask(&graph, &[target]);
        let mut pred = vec![0.0f32; graph.num_entities()];
        pred[target.tail.index()] = 10.0;
        let rank = compute_ranking(&pred, target.tail, Some(&tail_masks[0])).expect("rank");
        assert_eq!(rank, 1);
    }

    /// T2.3: Loss is lower when positives outscore negatives.
    #[test]
    fn loss_prefers_separated_scores() {
        let good = adversarial_bce(&[vec![5.0, -5.0, -5.0]], 1.0).expect("loss");
        let bad = adversarial_bce(&[vec![-5.0, 5.0, 5.0]], 1.0).expect("loss");
        assert!(good.loss < bad.loss);
    }
}

// =============================================================================
// TIER T3: END-TO-END PRETRAINING
// =============================================================================

mod t3_pretraining {
    use super::*;

    fn config(output_dir: &std::path::Path) -> PretrainConfig {
        let mut config = PretrainConfig::default();
        config.output_dir = output_dir.to_path_buf();
        config.dataset.feature_dim = 16;
        config.model.embedding_dim = 8;
        config.model.init_scale = 0.1;
        config.optimizer = graphrag_core::OptimizerConfig::Adam {
            lr: 0.05,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        };
        config.train.num_epoch = 20;
        config.train.batch_size = 4;
        config.train.log_interval = 5;
        config.task.num_negative = 4;
        config.task.metric = vec![
            "mr".to_string(),
            "mrr".to_string(),
            "hits@3".to_string(),
            "hits@3_4-tail".to_string(),
        ];
        config
    }

    /// T3.1: Training writes one checkpoint per round and never ends below
    /// the untrained model.
    #[test]
    fn training_improves_validation_mrr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let dataset =
            KgDataset::from_graph(family_graph(), &config.dataset, config.seed).expect("dataset");
        let trainer = Trainer::new(&config).expect("trainer");

        let mut model = initial_model(&config, &dataset).expect("model");
        let before = trainer
            .validate(&model, &dataset, &mut NoopObserver)
            .expect("validate");

        let mut optimizer =
            Optimizer::new(config.optimizer.clone(), &model.parameter_sizes()).expect("opt");
        let summary = trainer
            .train_and_validate(&mut model, &mut optimizer, &dataset, dir.path(), &mut NoopObserver)
            .expect("train");

        // 20 epochs in rounds of 2.
        assert_eq!(summary.checkpoints.len(), 10);
        assert_eq!(summary.checkpoints[0].epoch, 2);
        assert_eq!(summary.epochs.len(), 20);

        let after = trainer
            .validate(&model, &dataset, &mut NoopObserver)
            .expect("validate");
        assert_eq!(Some(after.mrr), summary.best_mrr);
        assert!(after.mrr >= before.mrr, "{} < {}", after.mrr, before.mrr);
        assert_eq!(after.metrics.len(), 4);
    }

    /// T3.2: A trained model serves predictions for every known relation.
    #[test]
    fn trained_model_serves_predictions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config(dir.path());
        config.train.num_epoch = 3;
        let dataset =
            KgDataset::from_graph(family_graph(), &config.dataset, config.seed).expect("dataset");
        let trainer = Trainer::new(&config).expect("trainer");
        let mut model = initial_model(&config, &dataset).expect("model");
        let mut optimizer =
            Optimizer::new(config.optimizer.clone(), &model.parameter_sizes()).expect("opt");
        trainer
            .train_and_validate(&mut model, &mut optimizer, &dataset, dir.path(), &mut NoopObserver)
            .expect("train");

        let predictor = LinkPredictor::new(dataset.into_graph(), model).expect("predictor");
        for relation in ["parent_of", "child_of", "married_to"] {
            let preds = predictor
                .predict("alice", relation, Direction::Tail, 3, false)
                .expect("predict");
            assert_eq!(preds.len(), 3);
        }
        assert_eq!(predictor.stats().triplets, 10);
    }
}
