//! # Deep GraphRAG
//!
//! The main binary for knowledge-graph construction and KG pretraining.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/graphrag (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  TOML config +   │     │
//! │  │  (clap)     │    │   (axum)    │    │  progress output │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │ graphrag-core │                            │
//! │                    │  (THE LOGIC)  │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Stage 1: knowledge-graph construction
//! graphrag build -i triples.tsv -D kg.redb
//!
//! # Stage 2: KG pretraining
//! graphrag pretrain -c configs/stage2_kg_pretrain.toml --set train.num_epoch=20
//!
//! # Retrieval
//! graphrag predict -c configs/stage2_kg_pretrain.toml \
//!     --checkpoint outputs/stage2_kg_pretrain/model_epoch_10.ckpt -e paris -r capital_of
//! ```

use clap::Parser;
use graphrag::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // GRAPHRAG_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("GRAPHRAG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "graphrag=debug,graphrag_core=debug,tower_http=debug"
    } else {
        "graphrag=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !(cli.quiet || cli.json_mode) {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  Deep GraphRAG v{}

  KG construction • KG pretraining • retrieval
"#,
        env!("CARGO_PKG_VERSION")
    );
}
