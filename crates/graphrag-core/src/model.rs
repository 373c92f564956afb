//! # Relation-Conditioned Scorer
//!
//! Link-prediction model used for KG pretraining.
//!
//! Entities own complex embeddings of `embedding_dim` components, stored as
//! `[re_0 .. re_{d-1}, im_0 .. im_{d-1}]`. Relations do not own free
//! parameters: their vectors are projected from the relation features of the
//! graph (`r = W f_r + b`), so any relation with a feature vector can be
//! scored, including relations unseen during training.
//!
//! Score of `(h, r, t)` is `Re(<e_h, r, conj(e_t)>)`, which is asymmetric in
//! `h` and `t`.

use crate::config::ModelConfig;
use crate::graph::KnowledgeGraph;
use crate::{EntityId, GraphragError, RelationId, Triplet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-candidate scores of a batch: row `i` holds the scores of the
/// candidates generated for positive `i`.
pub type ScoreMatrix = Vec<Vec<f32>>;

/// Complex product `q = h * r`; `score(h, r, t) = <q, t>` in the real sense.
fn tail_query(h: &[f32], r: &[f32], d: usize) -> Vec<f32> {
    let mut q = vec![0.0f32; 2 * d];
    for i in 0..d {
        let (hr, hi) = (h[i], h[d + i]);
        let (rr, ri) = (r[i], r[d + i]);
        q[i] = hr * rr - hi * ri;
        q[d + i] = hr * ri + hi * rr;
    }
    q
}

/// `p = r * conj(t)`; `score(h, r, t) = <h, p>` in the real sense.
fn head_query(r: &[f32], t: &[f32], d: usize) -> Vec<f32> {
    let mut p = vec![0.0f32; 2 * d];
    for i in 0..d {
        let (rr, ri) = (r[i], r[d + i]);
        let (tr, ti) = (t[i], t[d + i]);
        p[i] = rr * tr + ri * ti;
        p[d + i] = rr * ti - ri * tr;
    }
    p
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// =============================================================================
// GRADIENTS
// =============================================================================

/// Gradients of the scorer parameters, shaped like the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub entity_embeddings: Vec<f32>,
    pub projection: Vec<f32>,
    pub projection_bias: Vec<f32>,
}

impl Gradients {
    /// Gradient slices in the same order as [`RelationScorer::parameters_mut`].
    #[must_use]
    pub fn slices(&self) -> [&[f32]; 3] {
        [
            &self.entity_embeddings,
            &self.projection,
            &self.projection_bias,
        ]
    }
}

// =============================================================================
// SCORER
// =============================================================================

/// The relation-conditioned link-prediction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationScorer {
    num_entities: usize,
    embedding_dim: usize,
    feature_dim: usize,
    /// `num_entities x 2d`, row-major.
    entity_embeddings: Vec<f32>,
    /// `2d x feature_dim`, row-major.
    projection: Vec<f32>,
    /// `2d`
    projection_bias: Vec<f32>,
}

impl RelationScorer {
    /// Create a scorer with parameters drawn uniformly from
    /// `[-init_scale, init_scale)`. The bias starts at zero.
    pub fn new<R: Rng>(
        num_entities: usize,
        feature_dim: usize,
        config: &ModelConfig,
        rng: &mut R,
    ) -> Result<Self, GraphragError> {
        if num_entities == 0 {
            return Err(GraphragError::EmptyDataset);
        }
        if feature_dim == 0 || config.embedding_dim == 0 {
            return Err(GraphragError::InvalidConfig(
                "embedding_dim and feature_dim must be positive".to_string(),
            ));
        }
        if !(config.init_scale.is_finite() && config.init_scale > 0.0) {
            return Err(GraphragError::InvalidConfig(
                "model.init_scale must be a positive number".to_string(),
            ));
        }

        let width = 2 * config.embedding_dim;
        let scale = config.init_scale;
        let mut uniform = |len: usize| -> Vec<f32> {
            (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
        };

        Ok(Self {
            num_entities,
            embedding_dim: config.embedding_dim,
            feature_dim,
            entity_embeddings: uniform(num_entities * width),
            projection: uniform(width * feature_dim),
            projection_bias: vec![0.0; width],
        })
    }

    /// Create a scorer sized for a graph whose relation features are set.
    pub fn for_graph<R: Rng>(
        graph: &KnowledgeGraph,
        config: &ModelConfig,
        rng: &mut R,
    ) -> Result<Self, GraphragError> {
        let feature_dim = graph.feature_dim()?.ok_or_else(|| {
            GraphragError::InvalidConfig("Graph has no relation features".to_string())
        })?;
        Self::new(graph.num_entities(), feature_dim, config, rng)
    }

    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.num_entities
    }

    #[must_use]
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn width(&self) -> usize {
        2 * self.embedding_dim
    }

    /// Total number of trainable scalars.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.entity_embeddings.len() + self.projection.len() + self.projection_bias.len()
    }

    /// Parameter slices, in the order used by the optimizer.
    pub fn parameters_mut(&mut self) -> [&mut [f32]; 3] {
        [
            &mut self.entity_embeddings,
            &mut self.projection,
            &mut self.projection_bias,
        ]
    }

    /// Lengths of the parameter slices.
    #[must_use]
    pub fn parameter_sizes(&self) -> [usize; 3] {
        [
            self.entity_embeddings.len(),
            self.projection.len(),
            self.projection_bias.len(),
        ]
    }

    /// Fail unless every parameter vector matches the declared shape.
    ///
    /// Scorers built by [`RelationScorer::new`] always pass; deserialized
    /// ones must be checked before scoring.
    pub fn validate_shape(&self) -> Result<(), GraphragError> {
        if self.num_entities == 0 {
            return Err(GraphragError::EmptyDataset);
        }
        if self.embedding_dim == 0 || self.feature_dim == 0 {
            return Err(GraphragError::InvalidConfig(
                "embedding_dim and feature_dim must be positive".to_string(),
            ));
        }
        let width = self.embedding_dim.checked_mul(2);
        let expected = [
            width.and_then(|w| w.checked_mul(self.num_entities)),
            width.and_then(|w| w.checked_mul(self.feature_dim)),
            width,
        ];
        for (expected, found) in expected.into_iter().zip(self.parameter_sizes()) {
            let expected = expected.ok_or_else(|| {
                GraphragError::InvalidConfig("Scorer shape overflows".to_string())
            })?;
            if expected != found {
                return Err(GraphragError::DimensionMismatch { expected, found });
            }
        }
        Ok(())
    }

    /// Fail unless the scorer was built for a graph of this shape.
    pub fn check_compatible(&self, graph: &KnowledgeGraph) -> Result<(), GraphragError> {
        self.validate_shape()?;
        if graph.num_entities() != self.num_entities {
            return Err(GraphragError::DimensionMismatch {
                expected: self.num_entities,
                found: graph.num_entities(),
            });
        }
        if let Some(dim) = graph.feature_dim()?
            && dim != self.feature_dim
        {
            return Err(GraphragError::DimensionMismatch {
                expected: self.feature_dim,
                found: dim,
            });
        }
        Ok(())
    }

    fn entity(&self, id: EntityId) -> Result<&[f32], GraphragError> {
        let width = self.width();
        let start = id.index() * width;
        self.entity_embeddings
            .get(start..start + width)
            .ok_or_else(|| GraphragError::UnknownEntity(format!("#{}", id.0)))
    }

    /// Project a relation feature vector into the entity space.
    pub fn relation_vector(&self, features: &[f32]) -> Result<Vec<f32>, GraphragError> {
        if features.len() != self.feature_dim {
            return Err(GraphragError::DimensionMismatch {
                expected: self.feature_dim,
                found: features.len(),
            });
        }
        Ok(self
            .projection
            .chunks_exact(self.feature_dim)
            .zip(&self.projection_bias)
            .map(|(row, bias)| dot(row, features) + bias)
            .collect())
    }

    fn relation_features<'g>(
        graph: &'g KnowledgeGraph,
        relation: RelationId,
    ) -> Result<&'g [f32], GraphragError> {
        graph.relation_features(relation).ok_or_else(|| {
            GraphragError::UnknownRelation(format!("#{} has no features", relation.0))
        })
    }

    /// Relation vectors for every relation referenced by `triplets`.
    fn relation_cache<'t>(
        &self,
        graph: &KnowledgeGraph,
        triplets: impl Iterator<Item = &'t Triplet>,
    ) -> Result<BTreeMap<RelationId, Vec<f32>>, GraphragError> {
        let mut cache = BTreeMap::new();
        for triplet in triplets {
            if !cache.contains_key(&triplet.relation) {
                let features = Self::relation_features(graph, triplet.relation)?;
                cache.insert(triplet.relation, self.relation_vector(features)?);
            }
        }
        Ok(cache)
    }

    /// Score a single triplet.
    pub fn score(&self, graph: &KnowledgeGraph, triplet: &Triplet) -> Result<f32, GraphragError> {
        let r = self.relation_vector(Self::relation_features(graph, triplet.relation)?)?;
        let q = tail_query(self.entity(triplet.head)?, &r, self.embedding_dim);
        Ok(dot(&q, self.entity(triplet.tail)?))
    }

    /// Score every candidate of a batch.
    pub fn score_batch(
        &self,
        graph: &KnowledgeGraph,
        batch: &[Vec<Triplet>],
    ) -> Result<ScoreMatrix, GraphragError> {
        let cache = self.relation_cache(graph, batch.iter().flatten())?;
        let d = self.embedding_dim;
        let mut scores = Vec::with_capacity(batch.len());
        for row in batch {
            let mut row_scores = Vec::with_capacity(row.len());
            for triplet in row {
                let r = cache.get(&triplet.relation).ok_or_else(|| {
                    GraphragError::UnknownRelation(format!("#{}", triplet.relation.0))
                })?;
                let q = tail_query(self.entity(triplet.head)?, r, d);
                row_scores.push(dot(&q, self.entity(triplet.tail)?));
            }
            scores.push(row_scores);
        }
        Ok(scores)
    }

    /// Scores of `(head, relation, e)` for every entity `e`.
    pub fn score_tails(
        &self,
        graph: &KnowledgeGraph,
        head: EntityId,
        relation: RelationId,
    ) -> Result<Vec<f32>, GraphragError> {
        let r = self.relation_vector(Self::relation_features(graph, relation)?)?;
        let q = tail_query(self.entity(head)?, &r, self.embedding_dim);
        Ok(self
            .entity_embeddings
            .chunks_exact(self.width())
            .map(|t| dot(&q, t))
            .collect())
    }

    /// Scores of `(e, relation, tail)` for every entity `e`.
    pub fn score_heads(
        &self,
        graph: &KnowledgeGraph,
        tail: EntityId,
        relation: RelationId,
    ) -> Result<Vec<f32>, GraphragError> {
        let r = self.relation_vector(Self::relation_features(graph, relation)?)?;
        let p = head_query(&r, self.entity(tail)?, self.embedding_dim);
        Ok(self
            .entity_embeddings
            .chunks_exact(self.width())
            .map(|h| dot(h, &p))
            .collect())
    }

    /// Backpropagate `d loss / d score` for every candidate of a batch.
    ///
    /// `grad` must have the same shape as the scores of `batch`.
    pub fn backward(
        &self,
        graph: &KnowledgeGraph,
        batch: &[Vec<Triplet>],
        grad: &[Vec<f32>],
    ) -> Result<Gradients, GraphragError> {
        if grad.len() != batch.len() {
            return Err(GraphragError::DimensionMismatch {
                expected: batch.len(),
                found: grad.len(),
            });
        }

        let d = self.embedding_dim;
        let width = self.width();
        let cache = self.relation_cache(graph, batch.iter().flatten())?;
        let mut entity_grad = vec![0.0f32; self.entity_embeddings.len()];
        let mut relation_grad: BTreeMap<RelationId, Vec<f32>> = BTreeMap::new();

        for (row, row_grad) in batch.iter().zip(grad) {
            if row.len() != row_grad.len() {
                return Err(GraphragError::DimensionMismatch {
                    expected: row.len(),
                    found: row_grad.len(),
                });
            }
            for (triplet, &g) in row.iter().zip(row_grad) {
                if g == 0.0 {
                    continue;
                }
                let r = cache.get(&triplet.relation).ok_or_else(|| {
                    GraphragError::UnknownRelation(format!("#{}", triplet.relation.0))
                })?;
                let h = self.entity(triplet.head)?;
                let t = self.entity(triplet.tail)?;
                let q = tail_query(h, r, d);
                let p = head_query(r, t, d);

                let r_grad = relation_grad
                    .entry(triplet.relation)
                    .or_insert_with(|| vec![0.0; width]);
                for i in 0..d {
                    let (hr, hi) = (h[i], h[d + i]);
                    let (tr, ti) = (t[i], t[d + i]);
                    r_grad[i] += g * (hr * tr + hi * ti);
                    r_grad[d + i] += g * (hr * ti - hi * tr);
                }

                let h_start = triplet.head.index() * width;
                for (k, p_k) in p.iter().enumerate() {
                    entity_grad[h_start + k] += g * p_k;
                }
                let t_start = triplet.tail.index() * width;
                for (k, q_k) in q.iter().enumerate() {
                    entity_grad[t_start + k] += g * q_k;
                }
            }
        }

        let mut projection_grad = vec![0.0f32; self.projection.len()];
        let mut bias_grad = vec![0.0f32; width];
        for (relation, r_grad) in &relation_grad {
            let features = Self::relation_features(graph, *relation)?;
            for (k, g) in r_grad.iter().enumerate() {
                bias_grad[k] += g;
                let row = &mut projection_grad[k * self.feature_dim..(k + 1) * self.feature_dim];
                for (w, f) in row.iter_mut().zip(features) {
                    *w += g * f;
                }
            }
        }

        Ok(Gradients {
            entity_embeddings: entity_grad,
            projection: projection_grad,
            projection_bias: bias_grad,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
