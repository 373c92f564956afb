//! # Negative Sampling and Ranking
//!
//! Each positive triplet of a batch expands to a row of `1 + num_negative`
//! candidates with the positive in column 0. The first half of the rows
//! corrupt the tail, the second half corrupt the head.

use crate::graph::KnowledgeGraph;
use crate::{EntityId, GraphragError, Triplet};
use rand::Rng;
use std::collections::BTreeSet;

fn uniform<R: Rng>(num_entities: usize, rng: &mut R) -> EntityId {
    EntityId(rng.gen_range(0..num_entities) as u64)
}

/// Draw entities uniformly, avoiding `excluded` when possible.
///
/// Rejection sampling is used while the excluded set covers at most half of
/// the entities; beyond that the complement is materialised. When every
/// entity is excluded the draw falls back to uniform.
fn sample_excluding<R: Rng>(
    num_entities: usize,
    excluded: Option<&BTreeSet<EntityId>>,
    count: usize,
    rng: &mut R,
) -> Vec<EntityId> {
    let Some(excluded) = excluded.filter(|set| !set.is_empty()) else {
        return (0..count).map(|_| uniform(num_entities, rng)).collect();
    };

    if excluded.len() <= num_entities / 2 {
        return (0..count)
            .map(|_| loop {
                let candidate = uniform(num_entities, rng);
                if !excluded.contains(&candidate) {
                    break candidate;
                }
            })
            .collect();
    }

    let candidates: Vec<EntityId> = (0..num_entities as u64)
        .map(EntityId)
        .filter(|e| !excluded.contains(e))
        .collect();
    if candidates.is_empty() {
        return (0..count).map(|_| uniform(num_entities, rng)).collect();
    }
    (0..count)
        .map(|_| candidates[rng.gen_range(0..candidates.len())])
        .collect()
}

/// Expand positives into candidate rows.
///
/// With `strict`, negatives never coincide with a known true answer of the
/// corrupted side (unless no other entity exists).
pub fn negative_sampling<R: Rng>(
    filter: &KnowledgeGraph,
    batch: &[Triplet],
    num_negative: usize,
    strict: bool,
    rng: &mut R,
) -> Result<Vec<Vec<Triplet>>, GraphragError> {
    let num_entities = filter.num_entities();
    if num_entities == 0 {
        return Err(GraphragError::EmptyDataset);
    }
    let half = batch.len() / 2;

    let mut rows = Vec::with_capacity(batch.len());
    for (i, positive) in batch.iter().enumerate() {
        let corrupt_tail = i < half;
        let excluded = match (strict, corrupt_tail) {
            (false, _) => None,
            (true, true) => filter.true_tails(positive.head, positive.relation),
            (true, false) => filter.true_heads(positive.tail, positive.relation),
        };

        let mut row = Vec::with_capacity(1 + num_negative);
        row.push(*positive);
        for entity in sample_excluding(num_entities, excluded, num_negative, rng) {
            row.push(if corrupt_tail {
                positive.with_tail(entity)
            } else {
                positive.with_head(entity)
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Per-entity mask that is `false` for every entity in `known`.
fn mask_excluding(num_entities: usize, known: Option<&BTreeSet<EntityId>>) -> Vec<bool> {
    let mut mask = vec![true; num_entities];
    for entity in known.into_iter().flatten() {
        if let Some(slot) = mask.get_mut(entity.index()) {
            *slot = false;
        }
    }
    mask
}

/// Filtered-ranking masks for a batch: `(tail_masks, head_masks)`.
///
/// A tail mask is `false` for every known tail of `(h, r)`, the positive
/// tail included; head masks mirror this for `(t, r)`.
#[must_use]
pub fn strict_negative_mask(
    filter: &KnowledgeGraph,
    batch: &[Triplet],
) -> (Vec<Vec<bool>>, Vec<Vec<bool>>) {
    let n = filter.num_entities();
    batch
        .iter()
        .map(|t| {
            (
                mask_excluding(n, filter.true_tails(t.head, t.relation)),
                mask_excluding(n, filter.true_heads(t.tail, t.relation)),
            )
        })
        .unzip()
}

/// Rank of `pred[target]` among `pred`.
///
/// With a mask the ranking is filtered: only entities whose mask entry is
/// `true` compete, and the result is `competitors + 1`. Without a mask every
/// entity competes, the target included.
pub fn compute_ranking(
    pred: &[f32],
    target: EntityId,
    mask: Option<&[bool]>,
) -> Result<usize, GraphragError> {
    let positive = *pred
        .get(target.index())
        .ok_or_else(|| GraphragError::UnknownEntity(format!("#{}", target.0)))?;

    match mask {
        Some(mask) => {
            if mask.len() != pred.len() {
                return Err(GraphragError::DimensionMismatch {
                    expected: pred.len(),
                    found: mask.len(),
                });
            }
            let competitors = pred
                .iter()
                .zip(mask)
                .filter(|(score, keep)| **keep && **score >= positive)
                .count();
            Ok(competitors + 1)
        }
        None => Ok(pred.iter().filter(|score| **score >= positive).count()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
