//! # KG Pretraining
//!
//! The training loop: negative sampling, self-adversarial BCE, backward pass
//! and optimizer step per batch. Epochs run in at most
//! [`EVALUATION_ROUNDS`] rounds; every round ends with a checkpoint and a
//! validation pass, and the best round by MRR is restored at the end.
//!
//! Every random draw comes from an `StdRng` seeded from the configured seed
//! and the epoch number, so a run is reproducible.

use crate::config::{PretrainConfig, TaskConfig, TrainConfig};
use crate::dataset::KgDataset;
use crate::evaluation::{EvaluationReport, evaluate};
use crate::formats::checkpoint::{CheckpointInfo, checkpoint_path, load_checkpoint, save_checkpoint};
use crate::loss::adversarial_bce;
use crate::metrics::Metric;
use crate::model::RelationScorer;
use crate::observer::TrainingObserver;
use crate::optimizer::Optimizer;
use crate::primitives::EVALUATION_ROUNDS;
use crate::sampling::negative_sampling;
use crate::GraphragError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// 1-based epoch number.
    pub epoch: usize,
    pub num_batches: usize,
    pub average_loss: f32,
}

/// Outcome of [`Trainer::train_and_validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epoch whose checkpoint was restored.
    pub best_epoch: Option<usize>,
    pub best_mrr: Option<f64>,
    pub epochs: Vec<EpochSummary>,
    pub checkpoints: Vec<CheckpointInfo>,
    /// Validation report of every round, in order.
    pub validations: Vec<EvaluationReport>,
}

/// Number of epochs per evaluation round.
#[must_use]
pub fn round_length(num_epoch: usize) -> usize {
    num_epoch.div_ceil(EVALUATION_ROUNDS).max(1)
}

/// Build the initial scorer: seeded initialisation, then the configured
/// checkpoint's model weights if one is set.
pub fn initial_model(
    config: &PretrainConfig,
    dataset: &KgDataset,
) -> Result<RelationScorer, GraphragError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = RelationScorer::for_graph(dataset.graph(), &config.model, &mut rng)?;
    match &config.checkpoint {
        None => Ok(model),
        Some(path) => {
            let checkpoint = load_checkpoint(path)?;
            checkpoint.model.check_compatible(dataset.graph())?;
            if checkpoint.model.embedding_dim() != model.embedding_dim() {
                return Err(GraphragError::DimensionMismatch {
                    expected: model.embedding_dim(),
                    found: checkpoint.model.embedding_dim(),
                });
            }
            Ok(checkpoint.model)
        }
    }
}

/// Drives training and validation.
#[derive(Debug, Clone)]
pub struct Trainer {
    train: TrainConfig,
    task: TaskConfig,
    metrics: Vec<Metric>,
    seed: u64,
}

impl Trainer {
    /// Validate the configuration and parse its metrics.
    pub fn new(config: &PretrainConfig) -> Result<Self, GraphragError> {
        let metrics = config.validate()?;
        Ok(Self {
            train: config.train.clone(),
            task: config.task.clone(),
            metrics,
            seed: config.seed,
        })
    }

    #[must_use]
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    fn epoch_rng(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64))
    }

    /// Run one epoch. `epoch` is 0-based; `global_batch` counts batches
    /// across epochs and drives loss logging.
    pub fn train_epoch(
        &self,
        model: &mut RelationScorer,
        optimizer: &mut Optimizer,
        dataset: &KgDataset,
        epoch: usize,
        global_batch: &mut usize,
        observer: &mut dyn TrainingObserver,
    ) -> Result<EpochSummary, GraphragError> {
        let graph = dataset.graph();
        let mut rng = self.epoch_rng(epoch);
        let mut order = dataset.train_triplets().to_vec();
        order.shuffle(&mut rng);

        let available = order.len().div_ceil(self.train.batch_size);
        let num_batches = self
            .train
            .batch_per_epoch
            .map_or(available, |cap| cap.min(available));
        observer.on_epoch_start(epoch, num_batches);

        let mut total_loss = 0.0f32;
        for batch in order.chunks(self.train.batch_size).take(num_batches) {
            let rows = negative_sampling(
                graph,
                batch,
                self.task.num_negative,
                self.task.strict_negative,
                &mut rng,
            )?;
            let pred = model.score_batch(graph, &rows)?;
            let loss = adversarial_bce(&pred, self.task.adversarial_temperature)?;
            let grads = model.backward(graph, &rows, &loss.grad)?;
            optimizer.step(&mut model.parameters_mut(), &grads.slices())?;

            observer.on_batch_end(*global_batch, loss.loss);
            if *global_batch % self.train.log_interval == 0 {
                observer.on_loss_logged(*global_batch, loss.loss);
            }
            *global_batch += 1;
            total_loss += loss.loss;
        }

        let average_loss = if num_batches == 0 {
            0.0
        } else {
            total_loss / num_batches as f32
        };
        observer.on_epoch_end(epoch, average_loss);
        Ok(EpochSummary {
            epoch: epoch + 1,
            num_batches,
            average_loss,
        })
    }

    /// Evaluate on the validation triplets.
    pub fn validate(
        &self,
        model: &RelationScorer,
        dataset: &KgDataset,
        observer: &mut dyn TrainingObserver,
    ) -> Result<EvaluationReport, GraphragError> {
        evaluate(
            model,
            dataset.graph(),
            dataset.valid_triplets(),
            &self.metrics,
            self.train.batch_size,
            observer,
        )
    }

    /// Train for `num_epoch` epochs with periodic checkpoints and
    /// validation, then restore the best checkpoint into `model` and
    /// `optimizer`.
    pub fn train_and_validate(
        &self,
        model: &mut RelationScorer,
        optimizer: &mut Optimizer,
        dataset: &KgDataset,
        output_dir: &Path,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary, GraphragError> {
        let num_epoch = self.train.num_epoch;
        let mut summary = TrainingSummary::default();
        if num_epoch == 0 {
            return Ok(summary);
        }
        model.check_compatible(dataset.graph())?;
        observer.on_training_start(
            num_epoch,
            dataset.train_triplets().len(),
            model.num_parameters(),
        );

        let step = round_length(num_epoch);
        let mut epoch = 0;
        let mut global_batch = 0;
        let mut best: Option<(usize, f64)> = None;

        while epoch < num_epoch {
            let round_end = (epoch + step).min(num_epoch);
            while epoch < round_end {
                let epoch_summary =
                    self.train_epoch(model, optimizer, dataset, epoch, &mut global_batch, observer)?;
                summary.epochs.push(epoch_summary);
                epoch += 1;
            }

            let info = save_checkpoint(output_dir, epoch, model, optimizer)?;
            observer.on_checkpoint_saved(&info);
            summary.checkpoints.push(info);

            let report = self.validate(model, dataset, observer)?;
            if best.is_none_or(|(_, mrr)| report.mrr > mrr) {
                best = Some((epoch, report.mrr));
            }
            summary.validations.push(report);
        }

        if let Some((best_epoch, best_mrr)) = best {
            let checkpoint = load_checkpoint(&checkpoint_path(output_dir, best_epoch))?;
            checkpoint.model.check_compatible(dataset.graph())?;
            optimizer.restore(checkpoint.optimizer)?;
            *model = checkpoint.model;
            observer.on_best_checkpoint(best_epoch, best_mrr);
            summary.best_epoch = Some(best_epoch);
            summary.best_mrr = Some(best_mrr);
        }
        Ok(summary)
    }
}

// =============================================================================
// TESTS
// =============================================================================
