//! # Relation Features
//!
//! Relation feature vectors are the relation embeddings the scorer projects
//! into its own space. They are normally supplied by an upstream text encoder
//! as a JSON map `{ "relation name": [f32, ...] }`; relations without a
//! supplied vector get a hashed character-trigram embedding of their name.
//!
//! Hashing uses FNV-1a so the vectors are identical across platforms and
//! compiler versions.

use crate::graph::{KnowledgeGraph, TripletStore};
use crate::{GraphragError, RelationId};
use std::collections::BTreeMap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic embedding of a text by signed feature hashing of its
/// character trigrams (with boundary markers). The result is L2-normalised.
///
/// `dim == 0` yields an empty vector.
#[must_use]
pub fn hashed_text_features(text: &str, dim: usize) -> Vec<f32> {
    let mut features = vec![0.0f32; dim];
    if dim == 0 {
        return features;
    }

    let normalized: Vec<char> = std::iter::once('^')
        .chain(text.trim().to_lowercase().chars())
        .chain(std::iter::once('$'))
        .collect();

    let mut buf = String::new();
    for window in normalized.windows(3) {
        buf.clear();
        buf.extend(window.iter());
        let hash = fnv1a(buf.as_bytes());
        let bucket = (hash % dim as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        features[bucket] += sign;
    }

    let norm = features.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut features {
            *v /= norm;
        }
    }
    features
}

/// Parse a JSON relation feature map.
pub fn parse_feature_map(data: &[u8]) -> Result<BTreeMap<String, Vec<f32>>, GraphragError> {
    serde_json::from_slice(data).map_err(|e| {
        GraphragError::DeserializationError(format!("Relation feature map: {}", e))
    })
}

/// Fail unless every vector of a feature map has length `dim`.
pub fn validate_feature_map(
    map: &BTreeMap<String, Vec<f32>>,
    dim: usize,
) -> Result<(), GraphragError> {
    if dim == 0 {
        return Err(GraphragError::InvalidConfig(
            "feature_dim must be positive".to_string(),
        ));
    }
    match map.values().find(|features| features.len() != dim) {
        Some(features) => Err(GraphragError::DimensionMismatch {
            expected: dim,
            found: features.len(),
        }),
        None => Ok(()),
    }
}

/// Attach supplied features to the matching relations of a store.
///
/// Names that are not relations of the store are skipped and returned so
/// the caller can report them.
pub fn apply_feature_map<S: TripletStore>(
    store: &mut S,
    map: BTreeMap<String, Vec<f32>>,
) -> Result<Vec<String>, GraphragError> {
    let mut unknown = Vec::new();
    for (name, features) in map {
        match store.relation_id(&name) {
            Some(id) => store.set_relation_features(id, features)?,
            None => unknown.push(name),
        }
    }
    Ok(unknown)
}

/// Give every relation a feature vector of length `dim`.
///
/// Relations that already carry features must match `dim`; the others get
/// [`hashed_text_features`] of their name.
pub fn ensure_relation_features(
    graph: &mut KnowledgeGraph,
    dim: usize,
) -> Result<(), GraphragError> {
    if dim == 0 {
        return Err(GraphragError::InvalidConfig(
            "feature_dim must be positive".to_string(),
        ));
    }
    if let Some(found) = graph.feature_dim()?
        && found != dim
    {
        return Err(GraphragError::DimensionMismatch {
            expected: dim,
            found,
        });
    }

    let missing: Vec<(RelationId, Vec<f32>)> = graph
        .relation_names()
        .iter()
        .enumerate()
        .map(|(idx, name)| (RelationId(idx as u64), name))
        .filter(|(id, _)| graph.relation_features(*id).is_none())
        .map(|(id, name)| (id, hashed_text_features(name, dim)))
        .collect();

    for (id, features) in missing {
        graph.set_relation_features(id, features)?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
