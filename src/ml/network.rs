//! Policy network using the Burn framework.
//!
//! Three embedding towers (player, minion, building) pool per-neighbor
//! embeddings into one fixed-width vector each; the concatenated
//! representation feeds three independent task heads:
//!
//! - action: log-probabilities over {continue, move, attack}
//! - move: a squashed (0, 1)² normalized target coordinate
//! - target: log-probabilities over {player, minion, building}

use std::sync::Arc;

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::{log_softmax, sigmoid};

use super::encoder::{BUILDING_FEATURES, UNIT_FEATURES};
use super::samples::Sample;

/// Size of the discrete action space: continue, move, attack.
pub const ACTION_COUNT: usize = 3;
/// Size of the discrete target-entity space: player, minion, building.
pub const TARGET_COUNT: usize = 3;
/// Width of a decoded move coordinate.
pub const MOVE_COORD_SIZE: usize = 2;

#[derive(Debug, Config)]
pub struct PolicyConfig {
    /// Hidden width of the first two tower layers.
    pub embed_hidden: usize,
    /// Output width of each embedding tower.
    pub embed_width: usize,
    /// Hidden widths of the two inner head layers.
    pub head_hidden: usize,
    pub head_inner: usize,
    /// Dropout probability on head layers; inactive in inference mode.
    pub dropout: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            embed_hidden: 16,
            embed_width: 32,
            head_hidden: 48,
            head_inner: 24,
            dropout: 0.25,
        }
    }
}

impl PolicyConfig {
    /// Width of the concatenated representation the heads consume.
    pub fn representation_width(&self) -> usize {
        self.embed_width * 3
    }
}

/// 3-layer feed-forward block reducing one entity type's feature groups to a
/// fixed-width embedding, mean-pooled across the neighbor dimension.
#[derive(Module, Debug)]
pub struct EmbedTower<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> EmbedTower<B> {
    fn new(device: &B::Device, in_features: usize, config: &PolicyConfig) -> Self {
        Self {
            fc1: LinearConfig::new(in_features, config.embed_hidden).init(device),
            fc2: LinearConfig::new(config.embed_hidden, config.embed_hidden * 2).init(device),
            fc3: LinearConfig::new(config.embed_hidden * 2, config.embed_width).init(device),
            activation: Relu::new(),
        }
    }

    /// `[batch, slots, features]` -> `[batch, embed_width]`
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.fc1.forward(input));
        let x = self.activation.forward(self.fc2.forward(x));
        let x = self.activation.forward(self.fc3.forward(x));

        // Pool across the slot dimension so neighbor count never changes the
        // representation shape. Zero-padded slots dilute the mean uniformly.
        x.mean_dim(1).squeeze::<2>(1)
    }
}

/// 3-layer feed-forward task head over the shared representation.
#[derive(Module, Debug)]
pub struct TaskHead<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

impl<B: Backend> TaskHead<B> {
    fn new(device: &B::Device, out_features: usize, config: &PolicyConfig) -> Self {
        Self {
            fc1: LinearConfig::new(config.representation_width(), config.head_hidden).init(device),
            fc2: LinearConfig::new(config.head_hidden, config.head_inner).init(device),
            fc3: LinearConfig::new(config.head_inner, out_features).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            activation: Relu::new(),
        }
    }

    /// Raw (unsquashed) head output.
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.fc1.forward(input));
        let x = self.dropout.forward(x);
        let x = self.activation.forward(self.fc2.forward(x));
        let x = self.dropout.forward(x);
        self.fc3.forward(x)
    }
}

/// Batch-first network output.
#[derive(Debug)]
pub struct PolicyOutput<B: Backend> {
    /// `[batch, ACTION_COUNT]` log-probabilities.
    pub action_log_probs: Tensor<B, 2>,
    /// `[batch, MOVE_COORD_SIZE]` in (0, 1)².
    pub move_coord: Tensor<B, 2>,
    /// `[batch, TARGET_COUNT]` log-probabilities.
    pub target_log_probs: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct PolicyModel<B: Backend> {
    player_tower: EmbedTower<B>,
    minion_tower: EmbedTower<B>,
    building_tower: EmbedTower<B>,
    action_head: TaskHead<B>,
    move_head: TaskHead<B>,
    target_head: TaskHead<B>,
}

impl<B: Backend> PolicyModel<B> {
    pub fn new(device: &B::Device, config: &PolicyConfig) -> Self {
        Self {
            player_tower: EmbedTower::new(device, UNIT_FEATURES, config),
            minion_tower: EmbedTower::new(device, UNIT_FEATURES, config),
            building_tower: EmbedTower::new(device, BUILDING_FEATURES, config),
            action_head: TaskHead::new(device, ACTION_COUNT, config),
            move_head: TaskHead::new(device, MOVE_COORD_SIZE, config),
            target_head: TaskHead::new(device, TARGET_COUNT, config),
        }
    }

    /// Forward pass over a packed observation batch, batch-first.
    pub fn forward(
        &self,
        players: Tensor<B, 3>,
        minions: Tensor<B, 3>,
        buildings: Tensor<B, 3>,
    ) -> PolicyOutput<B> {
        let p = self.player_tower.forward(players);
        let m = self.minion_tower.forward(minions);
        let b = self.building_tower.forward(buildings);

        let representation = Tensor::cat(vec![p, m, b], 1);

        PolicyOutput {
            action_log_probs: log_softmax(self.action_head.forward(representation.clone()), 1),
            move_coord: sigmoid(self.move_head.forward(representation.clone())),
            target_log_probs: log_softmax(self.target_head.forward(representation), 1),
        }
    }
}

/// Label side of a training batch, packed to tensors.
#[derive(Debug)]
pub struct LabelBatch<B: Backend> {
    /// `[batch]` true action indices.
    pub actions: Tensor<B, 1, Int>,
    /// `[batch, MOVE_COORD_SIZE]` true normalized move targets.
    pub move_targets: Tensor<B, 2>,
    /// `[batch]` true target-entity indices.
    pub target_choices: Tensor<B, 1, Int>,
}

impl<B: Backend> LabelBatch<B> {
    pub fn from_samples(samples: &[Arc<Sample>], device: &B::Device) -> Self {
        let batch = samples.len();

        let actions: Vec<i64> = samples
            .iter()
            .map(|s| s.label.action.index() as i64)
            .collect();
        let move_targets: Vec<f32> = samples
            .iter()
            .flat_map(|s| [s.label.move_target.x, s.label.move_target.y])
            .collect();
        let target_choices: Vec<i64> = samples
            .iter()
            .map(|s| s.label.target_kind.index() as i64)
            .collect();

        Self {
            actions: Tensor::<B, 1, Int>::from_ints(actions.as_slice(), device),
            move_targets: Tensor::<B, 1>::from_floats(move_targets.as_slice(), device)
                .reshape([batch, MOVE_COORD_SIZE]),
            target_choices: Tensor::<B, 1, Int>::from_ints(target_choices.as_slice(), device),
        }
    }
}

/// Per-task loss terms, each a scalar tensor.
#[derive(Debug)]
pub struct LossTerms<B: Backend> {
    pub action: Tensor<B, 1>,
    pub movement: Tensor<B, 1>,
    pub target: Tensor<B, 1>,
    pub total: Tensor<B, 1>,
}

/// Composite multi-task loss.
///
/// The action head trains on every sample. The move and target heads are
/// masked per sample: a sample only contributes to the head its true action
/// exercised, because the unselected label fields carry meaningless defaults.
pub fn composite_loss<B: Backend>(
    output: &PolicyOutput<B>,
    labels: &LabelBatch<B>,
) -> LossTerms<B> {
    let batch = labels.actions.dims()[0];

    // Negative log-likelihood of the true action, mean over the batch.
    let action_idx: Tensor<B, 2, Int> = labels.actions.clone().reshape([batch, 1]);
    let action_nll: Tensor<B, 1> = -output
        .action_log_probs
        .clone()
        .gather(1, action_idx)
        .squeeze::<1>(1);
    let action = action_nll.mean();

    // Per-sample MSE on the move coordinate, zeroed wherever the true action
    // is not Move, then averaged over the whole batch.
    let diff = output.move_coord.clone() - labels.move_targets.clone();
    let move_mse: Tensor<B, 1> = diff.powf_scalar(2.0).mean_dim(1).squeeze::<1>(1);
    let move_mask = labels.actions.clone().equal_elem(1).float();
    let movement = (move_mse * move_mask).mean();

    // Per-sample NLL on the target choice, zeroed wherever the true action is
    // not Attack, then averaged.
    let target_idx: Tensor<B, 2, Int> = labels.target_choices.clone().reshape([batch, 1]);
    let target_nll: Tensor<B, 1> = -output
        .target_log_probs
        .clone()
        .gather(1, target_idx)
        .squeeze::<1>(1);
    let attack_mask = labels.actions.clone().equal_elem(2).float();
    let target = (target_nll * attack_mask).mean();

    let total = action.clone() + movement.clone() + target.clone();

    LossTerms {
        action,
        movement,
        target,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Vec2;
    use crate::ml::encoder::{EncoderConfig, FeatureEncoder, Observation, UnitFeatures};
    use crate::ml::samples::{ActionLabel, TargetKind};

    type TestBackend = burn::backend::NdArray;

    fn observation(seed: f32) -> Observation {
        let unit = |offset: f32| UnitFeatures {
            position: Vec2::new(seed * 0.1 + offset, -seed * 0.05),
            velocity: Vec2::new(0.2, -0.1),
            health: 0.8,
        };
        Observation {
            agent: unit(0.0),
            players: vec![unit(0.3)],
            minions: vec![unit(0.1), unit(0.2)],
            buildings: Vec::new(),
        }
    }

    fn forward_batch(samples: &[Arc<Sample>]) -> (PolicyOutput<TestBackend>, LabelBatch<TestBackend>) {
        let device = Default::default();
        let encoder = FeatureEncoder::new(EncoderConfig::default());
        let model = PolicyModel::<TestBackend>::new(&device, &PolicyConfig::default());

        let observations: Vec<&Observation> = samples.iter().map(|s| &s.observation).collect();
        let packed = encoder
            .pack_batch::<TestBackend>(&observations, &device)
            .unwrap();

        let output = model.forward(packed.players, packed.minions, packed.buildings);
        let labels = LabelBatch::from_samples(samples, &device);
        (output, labels)
    }

    fn scalar(tensor: &Tensor<TestBackend, 1>) -> f32 {
        tensor.clone().into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn test_output_shapes_and_ranges() {
        let samples: Vec<Arc<Sample>> = (0..4)
            .map(|i| {
                Arc::new(Sample {
                    observation: observation(i as f32),
                    label: ActionLabel::continue_previous(),
                })
            })
            .collect();

        let (output, _) = forward_batch(&samples);

        assert_eq!(output.action_log_probs.dims(), [4, ACTION_COUNT]);
        assert_eq!(output.move_coord.dims(), [4, MOVE_COORD_SIZE]);
        assert_eq!(output.target_log_probs.dims(), [4, TARGET_COUNT]);

        // Move coordinates squash into (0, 1).
        let coords: Vec<f32> = output.move_coord.into_data().to_vec().unwrap();
        assert!(coords.iter().all(|c| (0.0..=1.0).contains(c)));

        // Log-probabilities exponentiate to a distribution.
        let probs: Vec<f32> = output
            .action_log_probs
            .exp()
            .sum_dim(1)
            .into_data()
            .to_vec()
            .unwrap();
        assert!(probs.iter().all(|p| (p - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_masking_all_continue_batch() {
        let samples: Vec<Arc<Sample>> = (0..6)
            .map(|i| {
                Arc::new(Sample {
                    observation: observation(i as f32),
                    label: ActionLabel::continue_previous(),
                })
            })
            .collect();

        let (output, labels) = forward_batch(&samples);
        let terms = composite_loss(&output, &labels);

        assert_eq!(scalar(&terms.movement), 0.0);
        assert_eq!(scalar(&terms.target), 0.0);
        assert!((scalar(&terms.total) - scalar(&terms.action)).abs() < 1e-6);
    }

    #[test]
    fn test_masked_heads_contribute_for_their_action() {
        let mut samples: Vec<Arc<Sample>> = (0..3)
            .map(|i| {
                Arc::new(Sample {
                    observation: observation(i as f32),
                    label: ActionLabel::move_to(Vec2::new(0.25, 0.75)),
                })
            })
            .collect();
        samples.push(Arc::new(Sample {
            observation: observation(3.0),
            label: ActionLabel::attack(TargetKind::Building),
        }));

        let (output, labels) = forward_batch(&samples);
        let terms = composite_loss(&output, &labels);

        assert!(scalar(&terms.movement) > 0.0);
        assert!(scalar(&terms.target) > 0.0);

        let sum = scalar(&terms.action) + scalar(&terms.movement) + scalar(&terms.target);
        assert!((scalar(&terms.total) - sum).abs() < 1e-5);
    }
}
