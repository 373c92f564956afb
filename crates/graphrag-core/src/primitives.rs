//! # Primitives
//!
//! Compiled-in constants for construction, persistence and training.
//! These values are immutable at runtime; tunable knobs live in
//! [`crate::config::PretrainConfig`].

/// Magic bytes for the knowledge-graph file format header.
///
/// - File Header = Magic Bytes ("DGKG") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"DGKG";

/// Magic bytes for checkpoint files.
pub const CHECKPOINT_MAGIC_BYTES: &[u8; 4] = b"DGCK";

/// Current serialization format version.
///
/// Increment this when making breaking changes to either binary format.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the binary header (magic + version).
pub const HEADER_SIZE: usize = 5;

/// Extension used for checkpoint files written by the trainer.
pub const CHECKPOINT_EXTENSION: &str = "ckpt";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length, in bytes, of an entity or relation name.
pub const MAX_NAME_LENGTH: usize = 1024;

/// Maximum number of triplets in a single construction batch.
pub const MAX_TRIPLETS: usize = 10_000_000;

/// Maximum number of results a retrieval query may ask for.
pub const MAX_TOP_K: usize = 1000;

// =============================================================================
// TRAINING CONSTANTS
// =============================================================================

/// Default length of relation feature vectors.
pub const DEFAULT_FEATURE_DIM: usize = 64;

/// Training is split into at most this many rounds; each round ends with a
/// checkpoint and a validation pass.
pub const EVALUATION_ROUNDS: usize = 10;

/// Number of relations listed in graph statistics.
pub const TOP_RELATIONS: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_distinct() {
        assert_ne!(MAGIC_BYTES, CHECKPOINT_MAGIC_BYTES);
        assert_eq!(HEADER_SIZE, MAGIC_BYTES.len() + 1);
    }
}
