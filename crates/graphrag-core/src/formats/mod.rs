//! # Binary Formats
//!
//! Header-framed postcard encodings for graph files and model checkpoints.

pub mod checkpoint;
pub mod persistence;

pub use checkpoint::{
    Checkpoint, CheckpointInfo, checkpoint_from_bytes, checkpoint_path, checkpoint_to_bytes,
    load_checkpoint, save_checkpoint,
};
pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, graph_from_bytes, graph_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use checkpoint::checkpoint_digest;
