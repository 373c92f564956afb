//! # graphrag
//!
//! Application layer of Deep GraphRAG: the CLI, TOML configuration, training
//! progress reporting and the HTTP retrieval server. The engine lives in
//! `graphrag-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod observer;
