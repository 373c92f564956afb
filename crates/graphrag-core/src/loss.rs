//! # Self-Adversarial BCE Loss
//!
//! Binary cross entropy with logits over candidate rows (column 0 is the
//! positive). Negatives are weighted by a softmax over their own scores when
//! the adversarial temperature is positive, uniformly otherwise. The
//! adversarial weights are treated as constants during backpropagation.

use crate::GraphragError;
use crate::model::ScoreMatrix;

/// Loss value and gradient with respect to the logits.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput {
    pub loss: f32,
    pub grad: ScoreMatrix,
}

fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable `BCE(sigmoid(x), y)`.
fn bce_with_logits(x: f32, y: f32) -> f32 {
    x.max(0.0) - x * y + (-x.abs()).exp().ln_1p()
}

/// Weights of the negatives of one row.
fn negative_weights(negatives: &[f32], temperature: f32) -> Vec<f32> {
    if negatives.is_empty() {
        return Vec::new();
    }
    if temperature > 0.0 {
        let max = negatives
            .iter()
            .map(|x| x / temperature)
            .fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = negatives
            .iter()
            .map(|x| (x / temperature - max).exp())
            .collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![1.0 / negatives.len() as f32; negatives.len()]
    }
}

/// Compute the batch loss and its gradient.
///
/// Row loss is the weighted mean of the element losses; batch loss is the
/// mean over rows.
pub fn adversarial_bce(pred: &[Vec<f32>], temperature: f32) -> Result<LossOutput, GraphragError> {
    if pred.is_empty() {
        return Err(GraphragError::EmptyDataset);
    }
    let rows = pred.len() as f32;
    let mut total = 0.0f32;
    let mut grad = Vec::with_capacity(pred.len());

    for row in pred {
        let Some((&positive, negatives)) = row.split_first() else {
            return Err(GraphragError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        };

        let mut weights = Vec::with_capacity(row.len());
        weights.push(1.0f32);
        weights.extend(negative_weights(negatives, temperature));
        let weight_sum: f32 = weights.iter().sum();

        let mut row_loss = bce_with_logits(positive, 1.0);
        let mut row_grad = Vec::with_capacity(row.len());
        row_grad.push((sigmoid(positive) - 1.0) / (weight_sum * rows));
        for (x, w) in negatives.iter().zip(&weights[1..]) {
            row_loss += w * bce_with_logits(*x, 0.0);
            row_grad.push(w * sigmoid(*x) / (weight_sum * rows));
        }
        total += row_loss / weight_sum;
        grad.push(row_grad);
    }

    Ok(LossOutput {
        loss: total / rows,
        grad,
    })
}

// =============================================================================
// TESTS
// =============================================================================
