//! Orchestration service - the per-frame entry point the host simulation
//! calls.
//!
//! Every frame it harvests a labeled sample from the human-controlled agent,
//! batches a decision for every tracked player, and on a much lower cadence
//! runs one training cycle. Decisions and training never overlap: both are
//! driven from this single cooperative callback, and the model hand-off
//! between them goes through the trainer's `inference_model()` snapshot.

use burn::tensor::backend::AutodiffBackend;

use crate::world::{Activity, EntityId, Unit, UnitKind, World};

use super::decider::Decider;
use super::encoder::FeatureEncoder;
use super::error::MlError;
use super::metrics::{MetricsRegistry, MetricsSink};
use super::network::PolicyConfig;
use super::samples::{ActionLabel, Sample, TargetKind};
use super::trainer::{Trainer, TrainerConfig};

/// Work discovered during one frame, dispatched exhaustively.
#[derive(Debug)]
enum PipelineMessage {
    SampleCollected(Sample),
    DecisionRequested(EntityId),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Frames between training cycles; decisions happen every frame.
    pub train_interval: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { train_interval: 64 }
    }
}

pub struct PolicyService<B: AutodiffBackend> {
    trainer: Trainer<B>,
    decider: Decider<B::InnerBackend>,
    config: ServiceConfig,
    metrics: MetricsRegistry,
    frame: u64,
}

impl<B: AutodiffBackend> PolicyService<B> {
    pub fn new(
        device: B::Device,
        encoder: FeatureEncoder,
        policy_config: &PolicyConfig,
        trainer_config: TrainerConfig,
        config: ServiceConfig,
    ) -> Self {
        let trainer = Trainer::new(device.clone(), encoder.clone(), policy_config, trainer_config);
        let decider = Decider::new(encoder, device);

        Self {
            trainer,
            decider,
            config,
            metrics: MetricsRegistry::default(),
            frame: 0,
        }
    }

    /// Per-frame callback from the host simulation.
    pub fn update<W: World>(&mut self, world: &mut W) {
        let messages = self.collect_messages(world);

        let mut requests = Vec::new();
        for message in messages {
            match message {
                PipelineMessage::SampleCollected(sample) => self.trainer.receive_sample(sample),
                PipelineMessage::DecisionRequested(agent) => requests.push(agent),
            }
        }

        self.decide_and_apply(world, &requests);

        self.frame += 1;
        if self.frame.is_multiple_of(self.config.train_interval) {
            let mut rng = rand::rng();
            self.trainer.train_cycle(&mut rng, &mut self.metrics);
        }
    }

    /// Gather this frame's work: one sample from the human-controlled agent
    /// (when it is in one of the three acting states) and a decision request
    /// per tracked player.
    fn collect_messages<W: World>(&self, world: &W) -> Vec<PipelineMessage> {
        let mut messages = Vec::new();

        if let Some(human) = world.human_agent() {
            match self.collect_sample(world, human) {
                Ok(sample) => messages.push(PipelineMessage::SampleCollected(sample)),
                Err(err) => tracing::warn!("sample collection failed: {err}"),
            }
        }

        for agent in world.units_of_kind(UnitKind::Player) {
            messages.push(PipelineMessage::DecisionRequested(agent));
        }

        messages
    }

    fn collect_sample<W: World>(&self, world: &W, agent: EntityId) -> Result<Sample, MlError> {
        let unit = world.unit(agent).ok_or(MlError::MissingAgent)?;
        let observation = self.decider.collect_input(world, agent)?;
        let label = self.label_for(world, unit);

        Ok(Sample { observation, label })
    }

    /// Ground-truth label from what the supervising agent is doing right now.
    fn label_for<W: World>(&self, world: &W, unit: &Unit) -> ActionLabel {
        match unit.activity {
            Activity::Idle => ActionLabel::continue_previous(),
            Activity::Moving { target } => {
                let normalized = self.decider.encoder().play_area().normalize(target);
                ActionLabel::move_to(normalized)
            }
            Activity::Attacking { target } => {
                // Stale target handles fall back to the default kind rather
                // than dropping the sample.
                let kind = world
                    .unit(target)
                    .map(|t| match t.kind {
                        UnitKind::Player => TargetKind::Player,
                        UnitKind::Minion => TargetKind::Minion,
                        UnitKind::Tower | UnitKind::Castle => TargetKind::Building,
                    })
                    .unwrap_or(TargetKind::Player);
                ActionLabel::attack(kind)
            }
        }
    }

    fn decide_and_apply<W: World>(&mut self, world: &mut W, agents: &[EntityId]) {
        if agents.is_empty() {
            return;
        }

        let mut observations = Vec::with_capacity(agents.len());
        let mut observed = Vec::with_capacity(agents.len());
        for agent in agents {
            match self.decider.collect_input(world, *agent) {
                Ok(observation) => {
                    observations.push(observation);
                    observed.push(*agent);
                }
                Err(err) => tracing::warn!("skipping agent observation: {err}"),
            }
        }
        if observations.is_empty() {
            return;
        }

        // Inference uses the evaluation-mode snapshot; the trainer keeps the
        // only mutable model.
        let model = self.trainer.inference_model();
        let decisions = self.decider.make_decision(&model, &observations);

        for (agent, decision) in observed.iter().zip(decisions) {
            self.decider.receive_decision(world, *agent, decision);
        }
    }

    pub fn trainer(&self) -> &Trainer<B> {
        &self.trainer
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Push an externally computed scalar into the service metrics.
    pub fn push_metric(&mut self, name: &str, value: f32) {
        self.metrics.push_scalar(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{PlayArea, Vec2};
    use crate::ml::encoder::EncoderConfig;
    use crate::world::{Skirmish, Team};

    type TestAutodiff = burn::backend::Autodiff<burn::backend::NdArray>;

    fn test_service(train_interval: u64) -> PolicyService<TestAutodiff> {
        PolicyService::new(
            Default::default(),
            FeatureEncoder::new(EncoderConfig::default()),
            &PolicyConfig::default(),
            TrainerConfig {
                batch_size: 4,
                ..TrainerConfig::default()
            },
            ServiceConfig { train_interval },
        )
    }

    fn small_world() -> (Skirmish, EntityId) {
        let area = PlayArea::default();
        let mut world = Skirmish::new(area);

        let human = world.spawn(Unit::new(
            UnitKind::Player,
            Team::Red,
            area.center(),
            100.0,
        ));
        world.spawn(Unit::new(
            UnitKind::Player,
            Team::Blue,
            area.center() + Vec2::new(300.0, 0.0),
            100.0,
        ));
        world.spawn(Unit::new(
            UnitKind::Minion,
            Team::Blue,
            area.center() + Vec2::new(-300.0, 100.0),
            40.0,
        ));
        world.spawn(Unit::new(
            UnitKind::Castle,
            Team::Blue,
            area.center() + Vec2::new(0.0, 400.0),
            1000.0,
        ));
        world.set_human_agent(Some(human));

        (world, human)
    }

    #[test]
    fn test_update_collects_samples_from_human_agent() {
        let (mut world, _human) = small_world();
        let mut service = test_service(1000);

        for _ in 0..5 {
            service.update(&mut world);
            world.step(1.0 / 60.0);
        }

        assert_eq!(service.trainer().samples().len(), 5);
        assert_eq!(service.frame(), 5);
    }

    #[test]
    fn test_labels_follow_human_activity() {
        let (mut world, human) = small_world();
        let mut service = test_service(1000);

        let move_target = world.play_area().center() + Vec2::new(500.0, 0.0);
        world.move_to(human, move_target);
        service.update(&mut world);

        let samples = service.trainer().samples();
        assert_eq!(samples.group_len(crate::ml::samples::ActionKind::Move), 1);
    }

    #[test]
    fn test_periodic_training_fires() {
        let (mut world, human) = small_world();
        let mut service = test_service(4);

        // Keep the human moving so one group accumulates enough samples.
        let target = world.play_area().center() + Vec2::new(800.0, 0.0);
        for _ in 0..12 {
            world.move_to(human, target);
            service.update(&mut world);
            world.step(1.0 / 60.0);
        }

        assert!(service.trainer().iterations() > 0);
        assert!(service.metrics().count("loss") > 0);
    }
}
