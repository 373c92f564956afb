//! # Training Observer
//!
//! The core has no logging dependency. Training and evaluation report their
//! progress through this trait; every method has an empty default so an
//! implementation only overrides what it displays.

use crate::formats::checkpoint::CheckpointInfo;

/// Progress callbacks for [`crate::training::Trainer`] and
/// [`crate::evaluation::evaluate`].
pub trait TrainingObserver {
    /// Training is about to start.
    fn on_training_start(&mut self, _num_epoch: usize, _num_triplets: usize, _num_parameters: usize) {}

    /// Epoch `epoch` (0-based) begins with `num_batches` batches.
    fn on_epoch_start(&mut self, _epoch: usize, _num_batches: usize) {}

    /// A batch finished. `batch_id` counts batches across epochs.
    fn on_batch_end(&mut self, _batch_id: usize, _loss: f32) {}

    /// Periodic loss report, every `log_interval` batches.
    fn on_loss_logged(&mut self, _batch_id: usize, _loss: f32) {}

    /// Epoch finished with the given average loss.
    fn on_epoch_end(&mut self, _epoch: usize, _average_loss: f32) {}

    fn on_checkpoint_saved(&mut self, _info: &CheckpointInfo) {}

    /// Evaluation over `num_triplets` triplets begins.
    fn on_evaluation_start(&mut self, _num_triplets: usize) {}

    /// `done` of `total` evaluation triplets have been ranked.
    fn on_evaluation_batch(&mut self, _done: usize, _total: usize) {}

    fn on_metric(&mut self, _name: &str, _value: f64) {}

    /// The best checkpoint was reloaded at the end of training.
    fn on_best_checkpoint(&mut self, _epoch: usize, _mrr: f64) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}
