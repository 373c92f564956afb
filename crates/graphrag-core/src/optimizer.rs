//! # Optimizers
//!
//! First-order optimizers over the flat parameter slices exposed by the
//! scorer. Optimizer state is serializable so checkpoints resume exactly.

use crate::GraphragError;
use serde::{Deserialize, Serialize};

fn default_adam_lr() -> f32 {
    5.0e-3
}
fn default_beta1() -> f32 {
    0.9
}
fn default_beta2() -> f32 {
    0.999
}
fn default_eps() -> f32 {
    1.0e-8
}
fn default_sgd_lr() -> f32 {
    0.1
}

/// Optimizer selection and hyper-parameters, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Adam {
        #[serde(default = "default_adam_lr")]
        lr: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_eps")]
        eps: f32,
        /// L2 penalty added to the gradient.
        #[serde(default)]
        weight_decay: f32,
    },
    Sgd {
        #[serde(default = "default_sgd_lr")]
        lr: f32,
        #[serde(default)]
        weight_decay: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: default_adam_lr(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    /// Learning rate of either optimizer.
    #[must_use]
    pub fn lr(&self) -> f32 {
        match self {
            Self::Adam { lr, .. } | Self::Sgd { lr, .. } => *lr,
        }
    }

    /// Check hyper-parameter ranges.
    pub fn validate(&self) -> Result<(), GraphragError> {
        let lr = self.lr();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(GraphragError::InvalidConfig(
                "optimizer.lr must be a positive number".to_string(),
            ));
        }
        match self {
            Self::Adam {
                beta1,
                beta2,
                eps,
                weight_decay,
                ..
            } => {
                if !(0.0..1.0).contains(beta1) || !(0.0..1.0).contains(beta2) {
                    return Err(GraphragError::InvalidConfig(
                        "optimizer betas must be in [0, 1)".to_string(),
                    ));
                }
                if !(*eps > 0.0) || *weight_decay < 0.0 {
                    return Err(GraphragError::InvalidConfig(
                        "optimizer.eps must be positive and weight_decay non-negative"
                            .to_string(),
                    ));
                }
            }
            Self::Sgd { weight_decay, .. } => {
                if *weight_decay < 0.0 {
                    return Err(GraphragError::InvalidConfig(
                        "optimizer.weight_decay must be non-negative".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// OPTIMIZER
// =============================================================================

/// Running state of an optimizer: update count and Adam moments, one vector
/// per parameter group. This is what checkpoints store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub steps: u64,
    pub first_moment: Vec<Vec<f32>>,
    pub second_moment: Vec<Vec<f32>>,
}

/// An optimizer with its running state.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimizer {
    config: OptimizerConfig,
    state: OptimizerState,
}

impl Optimizer {
    /// Create an optimizer for parameter groups of the given sizes.
    pub fn new(config: OptimizerConfig, sizes: &[usize]) -> Result<Self, GraphragError> {
        config.validate()?;
        let state = match config {
            OptimizerConfig::Adam { .. } => OptimizerState {
                steps: 0,
                first_moment: sizes.iter().map(|&n| vec![0.0; n]).collect(),
                second_moment: sizes.iter().map(|&n| vec![0.0; n]).collect(),
            },
            OptimizerConfig::Sgd { .. } => OptimizerState::default(),
        };
        Ok(Self { config, state })
    }

    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Number of updates applied so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.state.steps
    }

    #[must_use]
    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    /// Replace the running state, e.g. from a checkpoint. The moment shapes
    /// must match the ones this optimizer was created with.
    pub fn restore(&mut self, state: OptimizerState) -> Result<(), GraphragError> {
        let shape = |moments: &[Vec<f32>]| moments.iter().map(Vec::len).collect::<Vec<_>>();
        let expected = shape(&self.state.first_moment);
        for moments in [&state.first_moment, &state.second_moment] {
            let found = shape(moments);
            if found != expected {
                return Err(GraphragError::DimensionMismatch {
                    expected: expected.iter().sum(),
                    found: found.iter().sum(),
                });
            }
        }
        self.state = state;
        Ok(())
    }

    /// Apply one update. `params` and `grads` are matched group by group.
    pub fn step(&mut self, params: &mut [&mut [f32]], grads: &[&[f32]]) -> Result<(), GraphragError> {
        if params.len() != grads.len() {
            return Err(GraphragError::DimensionMismatch {
                expected: params.len(),
                found: grads.len(),
            });
        }
        for (param, grad) in params.iter().zip(grads) {
            if param.len() != grad.len() {
                return Err(GraphragError::DimensionMismatch {
                    expected: param.len(),
                    found: grad.len(),
                });
            }
        }

        let state = &mut self.state;
        state.steps = state.steps.saturating_add(1);
        match self.config {
            OptimizerConfig::Sgd { lr, weight_decay } => {
                for (param, grad) in params.iter_mut().zip(grads) {
                    for (p, g) in param.iter_mut().zip(grad.iter()) {
                        *p -= lr * (g + weight_decay * *p);
                    }
                }
            }
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                if state.first_moment.len() != params.len() {
                    return Err(GraphragError::DimensionMismatch {
                        expected: state.first_moment.len(),
                        found: params.len(),
                    });
                }
                let t = state.steps.min(i32::MAX as u64) as i32;
                let bias1 = 1.0 - beta1.powi(t);
                let bias2 = 1.0 - beta2.powi(t);

                for (group, (param, grad)) in params.iter_mut().zip(grads).enumerate() {
                    let m = &mut state.first_moment[group];
                    let v = &mut state.second_moment[group];
                    if m.len() != param.len() {
                        return Err(GraphragError::DimensionMismatch {
                            expected: m.len(),
                            found: param.len(),
                        });
                    }
                    for (i, p) in param.iter_mut().enumerate() {
                        let g = grad[i] + weight_decay * *p;
                        m[i] = beta1 * m[i] + (1.0 - beta1) * g;
                        v[i] = beta2 * v[i] + (1.0 - beta2) * g * g;
                        let m_hat = m[i] / bias1;
                        let v_hat = v[i] / bias2;
                        *p -= lr * m_hat / (v_hat.sqrt() + eps);
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
