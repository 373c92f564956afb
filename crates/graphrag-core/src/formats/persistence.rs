//! # Persistence Format
//!
//! Binary serialization for knowledge graphs (the "file" backend).
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("DGKG")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is deserialized.

use crate::graph::{KnowledgeGraph, SerializableGraph};
use crate::primitives::{self, HEADER_SIZE};
use crate::GraphragError;

/// Maximum allowed payload size for persisted graphs and checkpoints.
///
/// Validated BEFORE attempting deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 2 * 1024 * 1024 * 1024 - 1;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all binary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a graph-file header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self::with_magic(*primitives::MAGIC_BYTES)
    }

    /// Create a header with custom magic bytes and the current version.
    #[must_use]
    pub fn with_magic(magic: [u8; 4]) -> Self {
        Self {
            magic,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header against the expected magic bytes.
    pub fn validate(&self, expected_magic: &[u8; 4]) -> Result<(), GraphragError> {
        if &self.magic != expected_magic {
            return Err(GraphragError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GraphragError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphragError> {
        if bytes.len() < HEADER_SIZE {
            return Err(GraphragError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// FRAMING HELPERS
// =============================================================================

/// Prefix a payload with a header carrying `magic`.
pub(crate) fn frame(magic: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let header = PersistenceHeader::with_magic(*magic);
    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(payload);
    result
}

/// Validate size and header, returning the payload slice.
pub(crate) fn unframe<'a>(magic: &[u8; 4], bytes: &'a [u8]) -> Result<&'a [u8], GraphragError> {
    if bytes.len() < HEADER_SIZE {
        return Err(GraphragError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(GraphragError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }
    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate(magic)?;
    Ok(&bytes[HEADER_SIZE..])
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn graph_to_bytes(graph: &KnowledgeGraph) -> Result<Vec<u8>, GraphragError> {
    let serializable = SerializableGraph::from(graph);
    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| GraphragError::SerializationError(e.to_string()))?;
    Ok(frame(primitives::MAGIC_BYTES, &payload))
}

/// Deserialize a graph from bytes.
///
/// This is a pure transformation - no file I/O.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<KnowledgeGraph, GraphragError> {
    let payload = unframe(primitives::MAGIC_BYTES, bytes)?;
    let serializable: SerializableGraph = postcard::from_bytes(payload).map_err(|e| {
        GraphragError::DeserializationError(format!("Failed to deserialize graph data: {}", e))
    })?;
    KnowledgeGraph::try_from(serializable)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TripletStore;
    use crate::RelationId;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph =
            KnowledgeGraph::from_names([("a", "r", "b"), ("b", "s", "c")]).expect("graph");
        graph
            .set_relation_features(RelationId(0), vec![0.25, -0.5])
            .expect("features");
        graph
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample_graph();
        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");
        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn checkpoint_magic_is_not_a_graph() {
        let bytes = frame(primitives::CHECKPOINT_MAGIC_BYTES, &[0, 0, 0, 0]);
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        let err = graph_from_bytes(&bytes).expect_err("must fail");
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(graph_from_bytes(b"DGK").is_err());
    }
}
