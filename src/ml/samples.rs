//! Sample repository - labeled examples harvested from the human-controlled
//! agent, grouped by action kind for batch construction.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand::seq::{IndexedRandom, IteratorRandom};

use crate::infra::Vec2;

use super::encoder::Observation;

/// Discrete action choice. The index is the network's class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Keep doing whatever the agent was already doing.
    Continue,
    Move,
    Attack,
}

impl ActionKind {
    pub fn index(self) -> usize {
        match self {
            ActionKind::Continue => 0,
            ActionKind::Move => 1,
            ActionKind::Attack => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<ActionKind> {
        match index {
            0 => Some(ActionKind::Continue),
            1 => Some(ActionKind::Move),
            2 => Some(ActionKind::Attack),
            _ => None,
        }
    }
}

/// Discrete target-entity choice for attack actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Player,
    Minion,
    Building,
}

impl TargetKind {
    pub fn index(self) -> usize {
        match self {
            TargetKind::Player => 0,
            TargetKind::Minion => 1,
            TargetKind::Building => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<TargetKind> {
        match index {
            0 => Some(TargetKind::Player),
            1 => Some(TargetKind::Minion),
            2 => Some(TargetKind::Building),
            _ => None,
        }
    }
}

/// Ground-truth action the supervising agent took.
///
/// `move_target` is meaningful only for [`ActionKind::Move`] and
/// `target_kind` only for [`ActionKind::Attack`]; the unselected fields stay
/// at their defaults and are masked out of the loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionLabel {
    pub action: ActionKind,
    /// Play-area-normalized move target in [0, 1]².
    pub move_target: Vec2,
    pub target_kind: TargetKind,
}

impl ActionLabel {
    pub fn continue_previous() -> Self {
        Self {
            action: ActionKind::Continue,
            move_target: Vec2::ZERO,
            target_kind: TargetKind::Player,
        }
    }

    pub fn move_to(target: Vec2) -> Self {
        Self {
            action: ActionKind::Move,
            move_target: target,
            target_kind: TargetKind::Player,
        }
    }

    pub fn attack(target_kind: TargetKind) -> Self {
        Self {
            action: ActionKind::Attack,
            move_target: Vec2::ZERO,
            target_kind,
        }
    }
}

/// Immutable (observation, label) pair. Shared, never mutated after insertion.
#[derive(Debug, Clone)]
pub struct Sample {
    pub observation: Observation,
    pub label: ActionLabel,
}

/// Append-only sample store with a grouped-by-action-kind view.
///
/// Samples are never removed; growth is unbounded by design and capping the
/// repository is left to the embedding application.
#[derive(Debug, Default)]
pub struct SampleSet {
    samples: Vec<Arc<Sample>>,
    groups: HashMap<ActionKind, Vec<usize>>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) amortized append; the grouped view updates incrementally.
    pub fn add_sample(&mut self, sample: Sample) {
        let action = sample.label.action;
        let index = self.samples.len();

        self.samples.push(Arc::new(sample));
        self.groups.entry(action).or_default().push(index);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn group_len(&self, action: ActionKind) -> usize {
        self.groups.get(&action).map(|g| g.len()).unwrap_or(0)
    }

    /// Fill `out` with `length` samples drawn uniformly at random (without
    /// replacement) from a single randomly chosen action-kind group.
    ///
    /// Batches never mix groups because the loss path differs per action
    /// kind. Returns `false` and leaves `out` empty when no group exists yet
    /// or any existing group holds fewer than `length` samples; the caller
    /// must skip that training cycle rather than use a partial buffer.
    pub fn try_pick_random_sequence<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
        out: &mut Vec<Arc<Sample>>,
    ) -> bool {
        out.clear();

        if length == 0 || self.groups.is_empty() {
            return false;
        }
        if self.groups.values().any(|group| group.len() < length) {
            return false;
        }

        let Some(group) = self.groups.values().choose(rng) else {
            return false;
        };

        for index in group.choose_multiple(rng, length) {
            out.push(Arc::clone(&self.samples[*index]));
        }

        true
    }
}
