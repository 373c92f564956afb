//! # Checkpoint Format
//!
//! Model checkpoints written by the trainer.
//!
//! Format: Header (5 bytes) + postcard payload.
//! - 4 bytes: Magic ("DGCK")
//! - 1 byte: Version
//! - payload: `{ epoch, model, optimizer }`

use super::persistence::{frame, unframe};
use crate::model::RelationScorer;
use crate::optimizer::{Optimizer, OptimizerState};
use crate::primitives::{CHECKPOINT_EXTENSION, CHECKPOINT_MAGIC_BYTES};
use crate::GraphragError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Borrowed view used when saving, so the trainer never clones its model.
#[derive(Serialize)]
struct CheckpointRef<'a> {
    epoch: usize,
    model: &'a RelationScorer,
    optimizer: &'a OptimizerState,
}

/// A loaded checkpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Checkpoint {
    /// Number of completed epochs.
    pub epoch: usize,
    pub model: RelationScorer,
    pub optimizer: OptimizerState,
}

/// Where and what was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub epoch: usize,
    pub path: PathBuf,
    pub bytes: usize,
    /// BLAKE3 digest of the file, hex encoded.
    pub digest: Option<String>,
}

/// `dir/model_epoch_<epoch>.ckpt`
#[must_use]
pub fn checkpoint_path(dir: &Path, epoch: usize) -> PathBuf {
    dir.join(format!("model_epoch_{}.{}", epoch, CHECKPOINT_EXTENSION))
}

/// Serialize a checkpoint (header + payload). No file I/O.
pub fn checkpoint_to_bytes(
    epoch: usize,
    model: &RelationScorer,
    optimizer: &Optimizer,
) -> Result<Vec<u8>, GraphragError> {
    let payload = postcard::to_stdvec(&CheckpointRef {
        epoch,
        model,
        optimizer: optimizer.state(),
    })
    .map_err(|e| GraphragError::SerializationError(e.to_string()))?;
    Ok(frame(CHECKPOINT_MAGIC_BYTES, &payload))
}

/// Deserialize a checkpoint. No file I/O.
///
/// The model's parameter vectors are checked against its declared shape.
pub fn checkpoint_from_bytes(bytes: &[u8]) -> Result<Checkpoint, GraphragError> {
    let payload = unframe(CHECKPOINT_MAGIC_BYTES, bytes)?;
    let checkpoint: Checkpoint = postcard::from_bytes(payload).map_err(|e| {
        GraphragError::DeserializationError(format!("Failed to deserialize checkpoint: {}", e))
    })?;
    checkpoint.model.validate_shape()?;
    Ok(checkpoint)
}

/// Write `model_epoch_<epoch>.ckpt` into `dir`, creating the directory.
pub fn save_checkpoint(
    dir: &Path,
    epoch: usize,
    model: &RelationScorer,
    optimizer: &Optimizer,
) -> Result<CheckpointInfo, GraphragError> {
    std::fs::create_dir_all(dir).map_err(|e| GraphragError::IoError(e.to_string()))?;
    let bytes = checkpoint_to_bytes(epoch, model, optimizer)?;
    let path = checkpoint_path(dir, epoch);
    std::fs::write(&path, &bytes)
        .map_err(|e| GraphragError::IoError(format!("{}: {}", path.display(), e)))?;
    Ok(CheckpointInfo {
        epoch,
        path,
        bytes: bytes.len(),
        digest: digest_of(&bytes),
    })
}

/// Read a checkpoint file.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, GraphragError> {
    if !path.exists() {
        return Err(GraphragError::CheckpointNotFound(
            path.display().to_string(),
        ));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| GraphragError::IoError(format!("{}: {}", path.display(), e)))?;
    checkpoint_from_bytes(&bytes)
}

#[cfg(feature = "crypto-hash")]
fn digest_of(bytes: &[u8]) -> Option<String> {
    Some(checkpoint_digest(bytes))
}

#[cfg(not(feature = "crypto-hash"))]
fn digest_of(_bytes: &[u8]) -> Option<String> {
    None
}

/// BLAKE3 digest of serialized checkpoint bytes, hex encoded.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn checkpoint_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
