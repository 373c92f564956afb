//! # Training Progress
//!
//! [`TrainingObserver`] implementation that logs through `tracing` and draws
//! `indicatif` progress bars for epochs and evaluation passes.

use graphrag_core::{CheckpointInfo, TrainingObserver};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}";

/// Logs training progress and optionally shows progress bars.
pub struct ProgressObserver {
    show_bars: bool,
    num_epoch: usize,
    bar: Option<ProgressBar>,
}

impl ProgressObserver {
    /// `show_bars = false` keeps logging but never draws to the terminal.
    #[must_use]
    pub fn new(show_bars: bool) -> Self {
        Self {
            show_bars,
            num_epoch: 0,
            bar: None,
        }
    }

    fn start_bar(&mut self, len: usize, message: String) {
        self.finish_bar();
        let bar = if self.show_bars {
            ProgressBar::new(len as u64)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(message);
        self.bar = Some(bar);
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl TrainingObserver for ProgressObserver {
    fn on_training_start(&mut self, num_epoch: usize, num_triplets: usize, num_parameters: usize) {
        self.num_epoch = num_epoch;
        tracing::info!(
            num_epoch,
            num_triplets,
            num_parameters,
            "Starting KG pretraining"
        );
    }

    fn on_epoch_start(&mut self, epoch: usize, num_batches: usize) {
        tracing::debug!("Epoch {} begin", epoch + 1);
        self.start_bar(
            num_batches,
            format!("epoch {}/{}", epoch + 1, self.num_epoch),
        );
    }

    fn on_batch_end(&mut self, _batch_id: usize, _loss: f32) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_loss_logged(&mut self, batch_id: usize, loss: f32) {
        match &self.bar {
            Some(bar) if self.show_bars => bar.suspend(|| {
                tracing::info!(batch_id, "binary cross entropy: {:.6}", loss);
            }),
            _ => tracing::info!(batch_id, "binary cross entropy: {:.6}", loss),
        }
    }

    fn on_epoch_end(&mut self, epoch: usize, average_loss: f32) {
        self.finish_bar();
        tracing::info!(
            "Epoch {} end, average binary cross entropy: {:.6}",
            epoch + 1,
            average_loss
        );
    }

    fn on_checkpoint_saved(&mut self, info: &CheckpointInfo) {
        match &info.digest {
            Some(digest) => tracing::info!(
                "Save checkpoint to {} ({} bytes, blake3 {})",
                info.path.display(),
                info.bytes,
                digest
            ),
            None => tracing::info!(
                "Save checkpoint to {} ({} bytes)",
                info.path.display(),
                info.bytes
            ),
        }
    }

    fn on_evaluation_start(&mut self, num_triplets: usize) {
        tracing::info!("Evaluate on {} triplets", num_triplets);
        self.start_bar(num_triplets, "evaluate".to_string());
    }

    fn on_evaluation_batch(&mut self, done: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
        }
    }

    fn on_metric(&mut self, name: &str, value: f64) {
        self.finish_bar();
        tracing::info!("{}: {:.6}", name, value);
    }

    fn on_best_checkpoint(&mut self, epoch: usize, mrr: f64) {
        tracing::info!("Load checkpoint from epoch {} (mrr {:.6})", epoch, mrr);
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        self.finish_bar();
    }
}
