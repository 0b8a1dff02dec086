//! World collaborator surface.
//!
//! The pipeline never owns the simulation; it reads entity state through
//! [`World`] and issues the same move/attack commands normal agent control
//! uses. [`Skirmish`] is a small scripted implementation used by the demo
//! binary and tests.

mod arena;
mod skirmish;

pub use arena::{Arena, EntityId};
pub use skirmish::Skirmish;

use crate::infra::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Player,
    Minion,
    Tower,
    Castle,
}

impl UnitKind {
    /// Towers and castles feed one merged "buildings" feature list.
    pub fn is_building(self) -> bool {
        matches!(self, UnitKind::Tower | UnitKind::Castle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn is_hostile(self, other: Team) -> bool {
        self != other
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max > 0.0 {
            (self.current / self.max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

/// What an agent is currently doing. The discriminant doubles as the action
/// index used for training labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Idle,
    Moving { target: Vec2 },
    Attacking { target: EntityId },
}

impl Activity {
    pub fn action_index(&self) -> usize {
        match self {
            Activity::Idle => 0,
            Activity::Moving { .. } => 1,
            Activity::Attacking { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    pub team: Team,
    pub position: Vec2,
    pub velocity: Vec2,
    pub health: Option<Health>,
    pub activity: Activity,
}

impl Unit {
    pub fn new(kind: UnitKind, team: Team, position: Vec2, max_health: f32) -> Self {
        Self {
            kind,
            team,
            position,
            velocity: Vec2::ZERO,
            health: Some(Health::new(max_health)),
            activity: Activity::Idle,
        }
    }
}

/// Read and command surface the pipeline needs from the host simulation.
pub trait World {
    fn unit(&self, id: EntityId) -> Option<&Unit>;

    /// Live entities of one kind, in stable enumeration order. The pipeline
    /// relies on the order being distance-independent; it must not re-sort.
    fn units_of_kind(&self, kind: UnitKind) -> Vec<EntityId>;

    /// The agent currently under direct human control, if any.
    fn human_agent(&self) -> Option<EntityId>;

    fn move_to(&mut self, agent: EntityId, target: Vec2);

    fn attack(&mut self, agent: EntityId, target: EntityId);
}
