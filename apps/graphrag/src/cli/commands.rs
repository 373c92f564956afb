//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{ConfigArgs, StoreArgs};
use crate::api;
use crate::config::{config_to_pretty_json, load_config};
use crate::observer::ProgressObserver;
use graphrag_core::{
    Constructor, Direction, GraphStorage, GraphragError, InputFormat, KgDataset, KgStats,
    LinkPredictor, Optimizer, PretrainConfig, Trainer, features::{parse_feature_map, validate_feature_map},
    initial_model, load_checkpoint, open_graph,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a triple file for `build` (500 MB).
const MAX_INPUT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Maximum size of a relation feature file (100 MB).
const MAX_FEATURE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphragError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphragError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GraphragError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphragError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphragError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphragError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read an input file after path and size checks.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, GraphragError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| GraphragError::IoError(format!("Failed to read file: {}", e)))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), GraphragError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GraphragError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Construct or extend the knowledge graph.
pub fn cmd_build(
    store: &StoreArgs,
    json_mode: bool,
    input: &Path,
    format: InputFormat,
    relation_features: Option<&Path>,
    feature_dim: usize,
) -> Result<(), GraphragError> {
    let data = read_input(input, MAX_INPUT_FILE_SIZE)?;
    let raws = Constructor::parse(&data, format)?;
    tracing::info!("Parsed {} triples from {}", raws.len(), input.display());

    let feature_map = match relation_features {
        Some(path) => {
            let map = parse_feature_map(&read_input(path, MAX_FEATURE_FILE_SIZE)?)?;
            validate_feature_map(&map, feature_dim)?;
            tracing::info!(
                "Loaded {} relation feature vectors of dimension {}",
                map.len(),
                feature_dim
            );
            Some(map)
        }
        None => None,
    };

    let mut storage = GraphStorage::open(&store.database, store.backend)?;
    let report = storage.ingest(&raws)?;

    let mut unmatched = Vec::new();
    if let Some(map) = feature_map {
        unmatched = storage.apply_features(map)?;
        for name in &unmatched {
            tracing::warn!("Relation feature '{}' matches no relation", name);
        }
    }
    storage.flush()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": store.database.to_string_lossy(),
            "backend": store.backend.to_string(),
            "report": report,
            "unmatched_features": unmatched,
        }));
    }

    println!("Knowledge Graph Construction");
    println!("============================");
    println!("Database:   {:?}", store.database);
    println!("Backend:    {}", store.backend);
    println!();
    println!("Triples read:  {}", report.triplets_seen);
    println!("Triples added: {}", report.triplets_added);
    println!("Duplicates:    {}", report.duplicates);
    println!("Entities:      {}", report.entities);
    println!("Relations:     {}", report.relations);

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show knowledge graph statistics.
pub fn cmd_status(store: &StoreArgs, json_mode: bool) -> Result<(), GraphragError> {
    let graph = open_graph(&store.database, store.backend)?;
    let stats = KgStats::from_graph(&graph);

    if json_mode {
        return print_json(&serde_json::json!({
            "database": store.database.to_string_lossy(),
            "backend": store.backend.to_string(),
            "stats": stats,
        }));
    }

    println!("Knowledge Graph Status");
    println!("======================");
    println!("Database: {:?}", store.database);
    println!("Backend:  {}", store.backend);
    println!();
    println!("Entities:   {}", stats.entities);
    println!("Relations:  {}", stats.relations);
    println!("Triples:    {}", stats.triplets);
    println!("Featured:   {} relations", stats.relations_with_features);
    println!("Density:    {} per million", stats.density_millionths);
    println!(
        "Out-degree: {}.{:03}",
        stats.avg_out_degree_thousandths / 1000,
        stats.avg_out_degree_thousandths % 1000
    );
    if !stats.top_relations.is_empty() {
        println!();
        println!("Top relations:");
        for entry in &stats.top_relations {
            println!("  {:<24} {}", entry.relation, entry.triplets);
        }
    }

    Ok(())
}

// =============================================================================
// PRETRAIN COMMAND
// =============================================================================

/// Load and log the configuration, then the dataset it names.
fn prepare(args: &ConfigArgs) -> Result<(PretrainConfig, KgDataset), GraphragError> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;
    config.validate()?;
    tracing::info!("Config:\n{}", config_to_pretty_json(&config)?);

    let (dataset, unmatched) = KgDataset::load(&config.dataset, config.seed)?;
    for name in &unmatched {
        tracing::warn!("Relation feature '{}' matches no relation", name);
    }
    tracing::info!(
        "Dataset: {} entities, {} train / {} valid triplets",
        dataset.num_entities(),
        dataset.train_triplets().len(),
        dataset.valid_triplets().len()
    );
    Ok((config, dataset))
}

/// Stage 2: pretrain the scorer, then report a final validation pass.
pub fn cmd_pretrain(
    args: &ConfigArgs,
    json_mode: bool,
    show_progress: bool,
) -> Result<(), GraphragError> {
    let (config, dataset) = prepare(args)?;
    if let Ok(cwd) = std::env::current_dir() {
        tracing::info!("Working directory: {}", cwd.display());
    }
    tracing::info!("Output directory: {}", config.output_dir.display());
    tracing::info!("World size: 1, rank: 0");

    let trainer = Trainer::new(&config)?;
    let mut model = initial_model(&config, &dataset)?;
    if let Some(path) = &config.checkpoint {
        tracing::info!("Initialised model from {}", path.display());
    }
    let mut optimizer = Optimizer::new(config.optimizer.clone(), &model.parameter_sizes())?;

    let mut observer = ProgressObserver::new(show_progress);
    let summary = trainer.train_and_validate(
        &mut model,
        &mut optimizer,
        &dataset,
        &config.output_dir,
        &mut observer,
    )?;
    let report = trainer.validate(&model, &dataset, &mut observer)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "summary": summary,
            "validation": report,
        }));
    }

    match (summary.best_epoch, summary.best_mrr) {
        (Some(epoch), Some(mrr)) => println!("Best epoch: {} (mrr {:.6})", epoch, mrr),
        _ => println!("No training epochs were run"),
    }
    println!("Validation:");
    for (name, value) in &report.metrics {
        println!("  {:<16} {:.6}", name, value);
    }

    Ok(())
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Evaluate a checkpoint on the validation set.
pub fn cmd_evaluate(
    args: &ConfigArgs,
    checkpoint: &Path,
    json_mode: bool,
    show_progress: bool,
) -> Result<(), GraphragError> {
    let (config, dataset) = prepare(args)?;
    let trainer = Trainer::new(&config)?;
    let loaded = load_checkpoint(checkpoint)?;
    loaded.model.check_compatible(dataset.graph())?;
    tracing::info!(
        "Loaded checkpoint {} (epoch {})",
        checkpoint.display(),
        loaded.epoch
    );

    let mut observer = ProgressObserver::new(show_progress);
    let report = trainer.validate(&loaded.model, &dataset, &mut observer)?;

    if json_mode {
        return print_json(&report);
    }

    println!("Evaluation of {:?}", checkpoint);
    println!("Queries: {}", report.num_queries);
    for (name, value) in &report.metrics {
        println!("  {:<16} {:.6}", name, value);
    }

    Ok(())
}

// =============================================================================
// PREDICT COMMAND
// =============================================================================

/// Query of the `predict` command.
#[derive(Debug, Clone)]
pub struct PredictArgs {
    pub entity: String,
    pub relation: String,
    pub direction: Direction,
    pub top_k: usize,
    pub exclude_known: bool,
}

/// Pair the configured graph with a trained checkpoint.
pub fn load_predictor(args: &ConfigArgs, checkpoint: &Path) -> Result<LinkPredictor, GraphragError> {
    let (_, dataset) = prepare(args)?;
    let loaded = load_checkpoint(checkpoint)?;
    tracing::info!(
        "Loaded checkpoint {} (epoch {})",
        checkpoint.display(),
        loaded.epoch
    );
    LinkPredictor::new(dataset.into_graph(), loaded.model)
}

/// Rank candidates for a partial triple.
pub fn cmd_predict(
    args: &ConfigArgs,
    checkpoint: &Path,
    json_mode: bool,
    query: &PredictArgs,
) -> Result<(), GraphragError> {
    let predictor = load_predictor(args, checkpoint)?;
    let predictions = predictor.predict(
        &query.entity,
        &query.relation,
        query.direction,
        query.top_k,
        query.exclude_known,
    )?;

    if json_mode {
        return print_json(&predictions);
    }

    let pattern = match query.direction {
        Direction::Tail => format!("({}, {}, ?)", query.entity, query.relation),
        Direction::Head => format!("(?, {}, {})", query.relation, query.entity),
    };
    println!("Top {} for {}:", predictions.len(), pattern);
    for (rank, p) in predictions.iter().enumerate() {
        let marker = if p.known { " [known]" } else { "" };
        println!("  {:>3}. {:<32} {:>10.4}{}", rank + 1, p.entity, p.score, marker);
    }

    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP retrieval server.
pub async fn cmd_server(
    args: &ConfigArgs,
    checkpoint: &Path,
    host: &str,
    port: u16,
) -> Result<(), GraphragError> {
    let predictor = load_predictor(args, checkpoint)?;

    println!("Deep GraphRAG Retrieval Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", host);
    println!("  Port:       {}", port);
    println!("  Checkpoint: {:?}", checkpoint);
    println!();
    println!("Endpoints:");
    println!("  GET  /health  - Health check");
    println!("  GET  /status  - Knowledge graph statistics");
    println!("  POST /predict - Top-k link prediction");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, predictor).await
}
