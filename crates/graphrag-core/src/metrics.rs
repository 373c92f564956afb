//! # Ranking Metrics
//!
//! Metric names: `mr`, `mrr`, `hits@K` and `hits@K_N`, optionally suffixed
//! with `-tail` to restrict the metric to tail predictions.
//!
//! `hits@K_N` is the unbiased estimate of hits@K when only `N` negatives are
//! sampled: with `p = (rank - 1) / num_negative` it averages
//! `sum_{i<K} C(N-1, i) p^i (1-p)^(N-i-1)`.

use crate::GraphragError;
use std::str::FromStr;

/// What a metric measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    MeanRank,
    MeanReciprocalRank,
    Hits(usize),
    UnbiasedHits { threshold: usize, num_sample: usize },
}

/// A parsed metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    name: String,
    kind: MetricKind,
    tail_only: bool,
}

fn parse_positive(text: &str, original: &str) -> Result<usize, GraphragError> {
    match text.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(GraphragError::InvalidMetric(format!(
            "Unknown metric `{}`",
            original
        ))),
    }
}

impl FromStr for Metric {
    type Err = GraphragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, tail_only) = match s.split_once('-') {
            None => (s, false),
            Some((base, "tail")) => (base, true),
            Some(_) => {
                return Err(GraphragError::InvalidMetric(
                    "Only tail metric is supported in this mode".to_string(),
                ));
            }
        };

        let kind = match base {
            "mr" => MetricKind::MeanRank,
            "mrr" => MetricKind::MeanReciprocalRank,
            other => {
                let Some(body) = other.strip_prefix("hits@") else {
                    return Err(GraphragError::InvalidMetric(format!(
                        "Unknown metric `{}`",
                        s
                    )));
                };
                match body.split_once('_') {
                    None => MetricKind::Hits(parse_positive(body, s)?),
                    Some((threshold, num_sample)) => MetricKind::UnbiasedHits {
                        threshold: parse_positive(threshold, s)?,
                        num_sample: parse_positive(num_sample, s)?,
                    },
                }
            }
        };

        Ok(Self {
            name: s.to_string(),
            kind,
            tail_only,
        })
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// `C(n, k)` computed multiplicatively in floating point.
fn combination(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0f64, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f64>() / len as f64
}

impl Metric {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Whether only tail predictions are scored.
    #[must_use]
    pub fn tail_only(&self) -> bool {
        self.tail_only
    }

    /// Evaluate over a ranking collection. Empty collections score `0`.
    #[must_use]
    pub fn compute(&self, rankings: &RankingCollection) -> f64 {
        let ranks = rankings.rankings.iter();
        match self.kind {
            MetricKind::MeanRank => mean(ranks.map(|&r| r as f64)),
            MetricKind::MeanReciprocalRank => mean(ranks.map(|&r| 1.0 / r as f64)),
            MetricKind::Hits(k) => mean(ranks.map(|&r| if r <= k { 1.0 } else { 0.0 })),
            MetricKind::UnbiasedHits {
                threshold,
                num_sample,
            } => mean(
                ranks
                    .zip(&rankings.num_negatives)
                    .map(|(&rank, &num_negative)| {
                        unbiased_hits(rank, num_negative, threshold, num_sample)
                    }),
            ),
        }
    }
}

fn unbiased_hits(rank: usize, num_negative: usize, threshold: usize, num_sample: usize) -> f64 {
    let fp_rate = if num_negative == 0 {
        0.0
    } else {
        rank.saturating_sub(1) as f64 / num_negative as f64
    };
    let n = num_sample - 1;
    (0..threshold.min(num_sample))
        .map(|i| {
            combination(n, i) * fp_rate.powi(i as i32) * (1.0 - fp_rate).powi((n - i) as i32)
        })
        .sum()
}

// =============================================================================
// COLLECTION
// =============================================================================

/// Rankings and per-query negative counts gathered during evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingCollection {
    rankings: Vec<usize>,
    num_negatives: Vec<usize>,
}

impl RankingCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ranking: usize, num_negative: usize) {
        self.rankings.push(ranking);
        self.num_negatives.push(num_negative);
    }

    pub fn extend(&mut self, other: &RankingCollection) {
        self.rankings.extend_from_slice(&other.rankings);
        self.num_negatives.extend_from_slice(&other.num_negatives);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rankings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }

    #[must_use]
    pub fn rankings(&self) -> &[usize] {
        &self.rankings
    }

    /// Mean reciprocal rank.
    #[must_use]
    pub fn mrr(&self) -> f64 {
        mean(self.rankings.iter().map(|&r| 1.0 / r as f64))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(rankings: &[usize], num_negative: usize) -> RankingCollection {
        let mut c = RankingCollection::new();
        for &r in rankings {
            c.push(r, num_negative);
        }
        c
    }

    #[test]
    fn parse_names() {
        let m: Metric = "hits@10_50-tail".parse().expect("parse");
        assert_eq!(
            m.kind(),
            MetricKind::UnbiasedHits {
                threshold: 10,
                num_sample: 50
            }
        );
        assert!(m.tail_only());
        assert_eq!(m.to_string(), "hits@10_50-tail");
        assert_eq!("mr".parse::<Metric>().expect("mr").kind(), MetricKind::MeanRank);
        assert_eq!(
            "hits@3".parse::<Metric>().expect("hits").kind(),
            MetricKind::Hits(3)
        );
    }

    #[test]
    fn non_tail_suffix_rejected() {
        let err = "mrr-head".parse::<Metric>().expect_err("must fail");
        assert_eq!(
            err,
            GraphragError::InvalidMetric("Only tail metric is supported in this mode".to_string())
        );
    }

    #[test]
    fn unknown_names_rejected() {
        for name in ["auc", "hits@", "hits@0", "hits@x", "hits@3_0", "hits@3_"] {
            assert!(name.parse::<Metric>().is_err(), "{}", name);
        }
    }

    #[test]
    fn basic_metrics() {
        let c = collection(&[1, 2, 4], 10);
        let mr: Metric = "mr".parse().expect("mr");
        let mrr: Metric = "mrr".parse().expect("mrr");
        let hits: Metric = "hits@2".parse().expect("hits");
        assert!((mr.compute(&c) - 7.0 / 3.0).abs() < 1e-12);
        assert!((mrr.compute(&c) - (1.0 + 0.5 + 0.25) / 3.0).abs() < 1e-12);
        assert!((hits.compute(&c) - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.mrr() - mrr.compute(&c)).abs() < 1e-12);
    }

    #[test]
    fn unbiased_hits_extremes() {
        let m: Metric = "hits@1_5".parse().expect("parse");
        // Best rank: no false positives, always a hit.
        assert!((m.compute(&collection(&[1], 10)) - 1.0).abs() < 1e-12);
        // Worst rank: every negative beats the positive.
        assert!(m.compute(&collection(&[11], 10)).abs() < 1e-12);
        // No negatives at all.
        assert!((m.compute(&collection(&[1], 0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unbiased_hits_matches_binomial() {
        // p = 0.5, N = 3, K = 2: C(2,0)/4 + C(2,1)/4 = 0.75
        let m: Metric = "hits@2_3".parse().expect("parse");
        assert!((m.compute(&collection(&[3], 4)) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn combination_values() {
        assert_eq!(combination(5, 2), 10.0);
        assert_eq!(combination(5, 0), 1.0);
        assert_eq!(combination(3, 4), 0.0);
    }

    #[test]
    fn empty_collection_scores_zero() {
        let m: Metric = "mrr".parse().expect("parse");
        assert_eq!(m.compute(&RankingCollection::new()), 0.0);
    }
}
