//! Decider - per-frame inference and action decoding.
//!
//! Turns network output into typed world commands. Any failure in the
//! forward/decode path degrades the whole batch to "continue previous
//! action" so a bad frame never stalls the simulation.

use burn::prelude::*;

use crate::infra::Vec2;
use crate::world::{EntityId, UnitKind, World};

use super::encoder::{FeatureEncoder, Observation};
use super::error::MlError;
use super::network::{ACTION_COUNT, MOVE_COORD_SIZE, PolicyModel, TARGET_COUNT};
use super::samples::TargetKind;

/// Typed action decoded from one network output row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Decision {
    /// Keep doing whatever the agent was already doing; no command issued.
    #[default]
    Continue,
    /// Move to a world-space position.
    MoveTo(Vec2),
    /// Attack the nearest hostile entity of the chosen kind.
    Attack(TargetKind),
}

pub struct Decider<B: Backend> {
    encoder: FeatureEncoder,
    device: B::Device,
}

impl<B: Backend> Decider<B> {
    pub fn new(encoder: FeatureEncoder, device: B::Device) -> Self {
        Self { encoder, device }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Collect one agent's observation for this frame.
    pub fn collect_input<W: World>(
        &self,
        world: &W,
        agent: EntityId,
    ) -> Result<Observation, MlError> {
        self.encoder.encode(world, agent)
    }

    /// Decide for a whole batch of observations in one forward pass.
    ///
    /// On any failure the error is logged and every agent in the batch
    /// receives the neutral [`Decision::Continue`].
    pub fn make_decision(
        &self,
        model: &PolicyModel<B>,
        batch: &[Observation],
    ) -> Vec<Decision> {
        match self.try_decide(model, batch) {
            Ok(decisions) => decisions,
            Err(err) => {
                tracing::error!(
                    "decision batch of {} failed, defaulting to continue: {err}",
                    batch.len()
                );
                vec![Decision::default(); batch.len()]
            }
        }
    }

    /// Fallible forward/decode path.
    pub fn try_decide(
        &self,
        model: &PolicyModel<B>,
        batch: &[Observation],
    ) -> Result<Vec<Decision>, MlError> {
        let observations: Vec<&Observation> = batch.iter().collect();
        let packed = self.encoder.pack_batch::<B>(&observations, &self.device)?;

        let output = model.forward(packed.players, packed.minions, packed.buildings);

        let actions: Vec<f32> = output
            .action_log_probs
            .into_data()
            .to_vec()
            .map_err(|e| MlError::Tensor(format!("{e:?}")))?;
        let moves: Vec<f32> = output
            .move_coord
            .into_data()
            .to_vec()
            .map_err(|e| MlError::Tensor(format!("{e:?}")))?;
        let targets: Vec<f32> = output
            .target_log_probs
            .into_data()
            .to_vec()
            .map_err(|e| MlError::Tensor(format!("{e:?}")))?;

        self.decode_outputs(&actions, &moves, &targets, batch.len())
    }

    /// Decode flattened batch-first network outputs into typed decisions.
    pub fn decode_outputs(
        &self,
        action_log_probs: &[f32],
        move_coords: &[f32],
        target_log_probs: &[f32],
        count: usize,
    ) -> Result<Vec<Decision>, MlError> {
        if action_log_probs.len() != count * ACTION_COUNT
            || move_coords.len() != count * MOVE_COORD_SIZE
            || target_log_probs.len() != count * TARGET_COUNT
        {
            return Err(MlError::Tensor(format!(
                "output lengths {}/{}/{} do not match batch size {}",
                action_log_probs.len(),
                move_coords.len(),
                target_log_probs.len(),
                count
            )));
        }

        let mut decisions = Vec::with_capacity(count);
        for i in 0..count {
            let action = argmax(&action_log_probs[i * ACTION_COUNT..(i + 1) * ACTION_COUNT]);

            let decision = match action {
                1 => {
                    let coord = Vec2::new(
                        move_coords[i * MOVE_COORD_SIZE],
                        move_coords[i * MOVE_COORD_SIZE + 1],
                    );
                    Decision::MoveTo(self.encoder.play_area().denormalize(coord))
                }
                2 => {
                    let choice =
                        argmax(&target_log_probs[i * TARGET_COUNT..(i + 1) * TARGET_COUNT]);
                    let kind = TargetKind::from_index(choice).ok_or_else(|| {
                        MlError::Tensor(format!("target choice {choice} out of range"))
                    })?;
                    Decision::Attack(kind)
                }
                _ => Decision::Continue,
            };
            decisions.push(decision);
        }

        Ok(decisions)
    }

    /// Apply a decision through the world's normal control surface.
    ///
    /// Decisions for the human-controlled agent are discarded so the model
    /// never overrides manual input.
    pub fn receive_decision<W: World>(&self, world: &mut W, agent: EntityId, decision: Decision) {
        if world.human_agent() == Some(agent) {
            return;
        }

        match decision {
            Decision::Continue => {}
            Decision::MoveTo(position) => world.move_to(agent, position),
            Decision::Attack(kind) => {
                let target = match kind {
                    TargetKind::Player => {
                        nearest_hostile(world, agent, &[UnitKind::Player])
                    }
                    TargetKind::Minion => {
                        nearest_hostile(world, agent, &[UnitKind::Minion])
                    }
                    // Whichever building subtype is nearer wins.
                    TargetKind::Building => {
                        nearest_hostile(world, agent, &[UnitKind::Tower, UnitKind::Castle])
                    }
                };

                if let Some(target) = target {
                    world.attack(agent, target);
                } else {
                    tracing::debug!("attack decision with no hostile {kind:?} in world");
                }
            }
        }
    }
}

/// Nearest hostile entity of any of the given kinds, by straight-line
/// distance. Accumulators start from "no candidate / +infinity".
fn nearest_hostile<W: World>(
    world: &W,
    agent: EntityId,
    kinds: &[UnitKind],
) -> Option<EntityId> {
    let observer = world.unit(agent)?;

    let mut nearest = None;
    let mut min_distance = f32::INFINITY;

    for kind in kinds {
        for id in world.units_of_kind(*kind) {
            if id == agent {
                continue;
            }
            let Some(unit) = world.unit(id) else {
                continue;
            };
            if !unit.team.is_hostile(observer.team) {
                continue;
            }

            let distance = unit.position.distance(&observer.position);
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(id);
            }
        }
    }

    nearest
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;

    for (i, value) in values.iter().enumerate() {
        if *value > best_value {
            best_value = *value;
            best = i;
        }
    }

    best
}
