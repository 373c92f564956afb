//! # GraphRAG CLI Module
//!
//! This module implements the CLI interface for Deep GraphRAG.
//!
//! ## Available Commands
//!
//! - `build` - Stage 1: construct or extend the knowledge graph
//! - `status` - Show knowledge graph statistics
//! - `pretrain` - Stage 2: KG pretraining
//! - `evaluate` - Evaluate a checkpoint on the validation set
//! - `predict` - Top-k link prediction
//! - `server` - Start the HTTP retrieval server

mod commands;

use clap::{Parser, Subcommand};
use graphrag_core::{Direction, GraphragError, InputFormat, StorageKind};
use graphrag_core::primitives::DEFAULT_FEATURE_DIM;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Deep GraphRAG - knowledge-graph construction and KG pretraining
///
/// Stage 1 builds a knowledge graph from extracted triples; stage 2
/// pretrains a link-prediction model on it.
#[derive(Parser, Debug)]
#[command(name = "graphrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output and progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Storage location of the knowledge graph.
#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to the knowledge graph store
    #[arg(short = 'D', long, default_value = "kg.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "file" (single binary file)
    #[arg(short = 'B', long, default_value = "redb")]
    pub backend: StorageKind,
}

/// Pretraining configuration sources.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dotted override, e.g. `--set train.num_epoch=20` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Construct or extend the knowledge graph from triples
    Build {
        /// Input file of (head, relation, tail) triples
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (tsv, json)
        #[arg(short = 't', long, default_value = "tsv")]
        format: InputFormat,

        #[command(flatten)]
        store: StoreArgs,

        /// JSON map of relation name to feature vector
        #[arg(long)]
        relation_features: Option<PathBuf>,

        /// Required length of every supplied relation feature vector
        #[arg(long, default_value_t = DEFAULT_FEATURE_DIM)]
        feature_dim: usize,
    },

    /// Show knowledge graph statistics
    Status {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Pretrain the link-prediction model
    Pretrain {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Evaluate a checkpoint on the validation set
    Evaluate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Checkpoint to evaluate
        #[arg(long)]
        checkpoint: PathBuf,
    },

    /// Rank candidate entities for a partial triple
    Predict {
        #[command(flatten)]
        config: ConfigArgs,

        /// Trained checkpoint
        #[arg(long)]
        checkpoint: PathBuf,

        /// Known entity of the triple
        #[arg(short, long)]
        entity: String,

        /// Relation of the triple
        #[arg(short, long)]
        relation: String,

        /// Side to predict (tail, head)
        #[arg(short, long, default_value = "tail")]
        direction: Direction,

        /// Number of candidates to return
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Skip candidates already in the graph
        #[arg(long)]
        exclude_known: bool,
    },

    /// Start the HTTP retrieval server
    Server {
        #[command(flatten)]
        config: ConfigArgs,

        /// Trained checkpoint
        #[arg(long)]
        checkpoint: PathBuf,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), GraphragError> {
    let json_mode = cli.json_mode;
    let show_progress = !(cli.quiet || json_mode);

    match cli.command {
        Commands::Build {
            input,
            format,
            store,
            relation_features,
            feature_dim,
        } => cmd_build(
            &store,
            json_mode,
            &input,
            format,
            relation_features.as_deref(),
            feature_dim,
        ),
        Commands::Status { store } => cmd_status(&store, json_mode),
        Commands::Pretrain { config } => cmd_pretrain(&config, json_mode, show_progress),
        Commands::Evaluate { config, checkpoint } => {
            cmd_evaluate(&config, &checkpoint, json_mode, show_progress)
        }
        Commands::Predict {
            config,
            checkpoint,
            entity,
            relation,
            direction,
            top_k,
            exclude_known,
        } => cmd_predict(
            &config,
            &checkpoint,
            json_mode,
            &PredictArgs {
                entity,
                relation,
                direction,
                top_k,
                exclude_known,
            },
        ),
        Commands::Server {
            config,
            checkpoint,
            host,
            port,
        } => cmd_server(&config, &checkpoint, &host, port).await,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn build_feature_dim(args: &[&str]) -> Option<usize> {
        match Cli::try_parse_from(args).expect("parse").command {
            Commands::Build { feature_dim, .. } => Some(feature_dim),
            _ => None,
        }
    }

    #[test]
    fn build_feature_dim_defaults_to_training_dim() {
        assert_eq!(
            build_feature_dim(&["graphrag", "build", "-i", "kg.tsv"]),
            Some(DEFAULT_FEATURE_DIM)
        );
        assert_eq!(
            build_feature_dim(&["graphrag", "build", "-i", "kg.tsv", "--feature-dim", "384"]),
            Some(384)
        );
    }
}
