//! Periodic batch trainer.
//!
//! Owns the canonical model and its optimizer. Inference borrows a
//! `valid()` snapshot (inner backend, stochastic regularization off); the
//! optimizer step is the only mutator of weights.

use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

use super::encoder::{FeatureEncoder, Observation};
use super::error::MlError;
use super::metrics::MetricsSink;
use super::network::{LabelBatch, PolicyConfig, PolicyModel, composite_loss};
use super::samples::{Sample, SampleSet};

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Samples per training batch.
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Target number of optimizer steps for a full training run.
    pub target_iterations: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            learning_rate: 1e-3,
            target_iterations: 10_000,
        }
    }
}

/// Scalar result of one completed training batch.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub loss: f32,
}

pub struct Trainer<B: AutodiffBackend> {
    model: PolicyModel<B>,
    optimizer: OptimizerAdaptor<Adam, PolicyModel<B>, B>,
    samples: SampleSet,
    encoder: FeatureEncoder,
    config: TrainerConfig,
    device: B::Device,
    iterations: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        device: B::Device,
        encoder: FeatureEncoder,
        policy_config: &PolicyConfig,
        config: TrainerConfig,
    ) -> Self {
        let model = PolicyModel::new(&device, policy_config);
        let optimizer = AdamConfig::new().init::<B, PolicyModel<B>>();

        let trainer = Self {
            model,
            optimizer,
            samples: SampleSet::new(),
            encoder,
            config,
            device,
            iterations: 0,
        };
        trainer.log_startup();
        trainer
    }

    fn log_startup(&self) {
        tracing::info!(
            "trainer starting: device={:?}, batch_size={}, lr={}, target_iterations={}",
            self.device,
            self.config.batch_size,
            self.config.learning_rate,
            self.config.target_iterations
        );
    }

    /// Append a harvested sample to the repository.
    pub fn receive_sample(&mut self, sample: Sample) {
        self.samples.add_sample(sample);
    }

    /// Delegate to the repository's grouped random pick with the configured
    /// batch size. `false` means some group cannot fill a batch yet.
    pub fn try_select_sequence_samples<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        out: &mut Vec<Arc<Sample>>,
    ) -> bool {
        self.samples
            .try_pick_random_sequence(self.config.batch_size, rng, out)
    }

    /// One optimizer step over a same-action-kind batch.
    pub fn train_batch(&mut self, batch: &[Arc<Sample>]) -> Result<TrainReport, MlError> {
        if batch.is_empty() {
            return Err(MlError::EmptyBatch);
        }

        let observations: Vec<&Observation> = batch.iter().map(|s| &s.observation).collect();
        let packed = self.encoder.pack_batch::<B>(&observations, &self.device)?;
        let labels = LabelBatch::from_samples(batch, &self.device);

        let output = self
            .model
            .forward(packed.players, packed.minions, packed.buildings);
        let terms = composite_loss(&output, &labels);

        let grads = terms.total.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);
        self.iterations += 1;

        let loss = terms
            .total
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| MlError::Tensor(format!("{e:?}")))?[0];

        Ok(TrainReport { loss })
    }

    /// One periodic training cycle: pick a batch, train, report the loss.
    ///
    /// Returns `None` when the repository cannot fill a batch or the batch
    /// fails; failed cycles are skipped, never retried with backoff.
    pub fn train_cycle<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        sink: &mut dyn MetricsSink,
    ) -> Option<TrainReport> {
        let mut batch = Vec::with_capacity(self.config.batch_size);
        if !self.try_select_sequence_samples(rng, &mut batch) {
            tracing::debug!(
                "skipping training cycle: {} samples cannot fill a batch of {}",
                self.samples.len(),
                self.config.batch_size
            );
            return None;
        }

        match self.train_batch(&batch) {
            Ok(report) => {
                sink.push_scalar("loss", report.loss);
                tracing::debug!(
                    "training iteration {}: loss={:.4}",
                    self.iterations,
                    report.loss
                );
                Some(report)
            }
            Err(err) => {
                tracing::error!("training batch failed: {err}");
                None
            }
        }
    }

    /// Inference-mode snapshot of the model on the inner backend; dropout and
    /// gradient tracking are off.
    pub fn inference_model(&self) -> PolicyModel<B::InnerBackend> {
        self.model.valid()
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}
