//! Scripted two-team skirmish used by the demo binary and tests.
//!
//! Movement and combat here are deliberately crude: units walk straight at
//! their targets and attacks tick flat damage in range. The pipeline only
//! needs positions, velocities, health and activity to change plausibly from
//! frame to frame.

use crate::infra::{PlayArea, Vec2};

use super::arena::{Arena, EntityId};
use super::{Activity, Unit, UnitKind, World};

const ATTACK_RANGE: f32 = 200.0;
const ATTACK_DAMAGE_PER_SECOND: f32 = 25.0;
const ARRIVE_DISTANCE: f32 = 8.0;

#[derive(Debug)]
pub struct Skirmish {
    units: Arena<Unit>,
    human: Option<EntityId>,
    play_area: PlayArea,
    move_speed: f32,
}

impl Skirmish {
    pub fn new(play_area: PlayArea) -> Self {
        Self {
            units: Arena::new(),
            human: None,
            play_area,
            move_speed: 240.0,
        }
    }

    pub fn play_area(&self) -> &PlayArea {
        &self.play_area
    }

    pub fn spawn(&mut self, unit: Unit) -> EntityId {
        self.units.insert(unit)
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.units.remove(id).is_some()
    }

    pub fn set_human_agent(&mut self, agent: Option<EntityId>) {
        self.human = agent;
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> impl Iterator<Item = (EntityId, &Unit)> {
        self.units.iter()
    }

    /// Advance the scripted simulation by one frame.
    pub fn step(&mut self, dt: f32) {
        let ids: Vec<EntityId> = self.units.iter().map(|(id, _)| id).collect();

        for id in &ids {
            self.step_unit(*id, dt);
        }

        // Destroyed units leave the arena so their handles go stale.
        for id in ids {
            let dead = self
                .units
                .get(id)
                .and_then(|u| u.health)
                .is_some_and(|h| h.is_dead());
            if dead {
                self.units.remove(id);
                if self.human == Some(id) {
                    self.human = None;
                }
            }
        }
    }

    fn step_unit(&mut self, id: EntityId, dt: f32) {
        let Some(unit) = self.units.get(id).copied() else {
            return;
        };

        match unit.activity {
            Activity::Idle => {
                if let Some(u) = self.units.get_mut(id) {
                    u.velocity = Vec2::ZERO;
                }
            }
            Activity::Moving { target } => {
                let to_target = target - unit.position;
                if to_target.length() <= ARRIVE_DISTANCE {
                    if let Some(u) = self.units.get_mut(id) {
                        u.position = target;
                        u.velocity = Vec2::ZERO;
                        u.activity = Activity::Idle;
                    }
                } else {
                    let velocity = to_target.normalized() * self.move_speed;
                    if let Some(u) = self.units.get_mut(id) {
                        u.velocity = velocity;
                        u.position = unit.position + velocity * dt;
                    }
                }
            }
            Activity::Attacking { target } => {
                let Some(target_unit) = self.units.get(target).copied() else {
                    // Target destroyed; the attacker goes idle.
                    if let Some(u) = self.units.get_mut(id) {
                        u.velocity = Vec2::ZERO;
                        u.activity = Activity::Idle;
                    }
                    return;
                };

                let to_target = target_unit.position - unit.position;
                if to_target.length() <= ATTACK_RANGE {
                    if let Some(u) = self.units.get_mut(id) {
                        u.velocity = Vec2::ZERO;
                    }
                    if let Some(t) = self.units.get_mut(target)
                        && let Some(health) = t.health.as_mut()
                    {
                        health.current -= ATTACK_DAMAGE_PER_SECOND * dt;
                    }
                } else {
                    let velocity = to_target.normalized() * self.move_speed;
                    if let Some(u) = self.units.get_mut(id) {
                        u.velocity = velocity;
                        u.position = unit.position + velocity * dt;
                    }
                }
            }
        }
    }
}

impl World for Skirmish {
    fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(id)
    }

    fn units_of_kind(&self, kind: UnitKind) -> Vec<EntityId> {
        self.units
            .iter()
            .filter(|(_, unit)| unit.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    fn human_agent(&self) -> Option<EntityId> {
        self.human
    }

    fn move_to(&mut self, agent: EntityId, target: Vec2) {
        if let Some(unit) = self.units.get_mut(agent) {
            unit.activity = Activity::Moving { target };
        }
    }

    fn attack(&mut self, agent: EntityId, target: EntityId) {
        if let Some(unit) = self.units.get_mut(agent) {
            unit.activity = Activity::Attacking { target };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Health, Team};

    fn spawn_player(world: &mut Skirmish, team: Team, position: Vec2) -> EntityId {
        world.spawn(Unit::new(UnitKind::Player, team, position, 100.0))
    }

    #[test]
    fn test_move_command_changes_activity_and_position() {
        let mut world = Skirmish::new(PlayArea::default());
        let id = spawn_player(&mut world, Team::Red, Vec2::new(100.0, 1500.0));

        world.move_to(id, Vec2::new(500.0, 1500.0));
        world.step(0.1);

        let unit = world.unit(id).unwrap();
        assert!(matches!(unit.activity, Activity::Moving { .. }));
        assert!(unit.position.x > 100.0);
        assert!(unit.velocity.length() > 0.0);
    }

    #[test]
    fn test_attack_damages_target_in_range() {
        let mut world = Skirmish::new(PlayArea::default());
        let attacker = spawn_player(&mut world, Team::Red, Vec2::new(100.0, 1500.0));
        let victim = spawn_player(&mut world, Team::Blue, Vec2::new(150.0, 1500.0));

        world.attack(attacker, victim);
        world.step(1.0);

        let health = world.unit(victim).unwrap().health.unwrap();
        assert!(health.current < health.max);
    }

    #[test]
    fn test_dead_unit_leaves_stale_handle() {
        let mut world = Skirmish::new(PlayArea::default());
        let attacker = spawn_player(&mut world, Team::Red, Vec2::new(100.0, 1500.0));
        let mut victim_unit = Unit::new(UnitKind::Minion, Team::Blue, Vec2::new(120.0, 1500.0), 1.0);
        victim_unit.health = Some(Health {
            current: 1.0,
            max: 1.0,
        });
        let victim = world.spawn(victim_unit);

        world.attack(attacker, victim);
        world.step(1.0);
        world.step(1.0);

        assert!(world.unit(victim).is_none());
    }

    #[test]
    fn test_attacker_goes_idle_when_target_destroyed() {
        let mut world = Skirmish::new(PlayArea::default());
        let attacker = spawn_player(&mut world, Team::Red, Vec2::new(100.0, 1500.0));
        let victim = spawn_player(&mut world, Team::Blue, Vec2::new(150.0, 1500.0));

        world.attack(attacker, victim);
        world.despawn(victim);
        world.step(0.1);

        assert_eq!(world.unit(attacker).unwrap().activity, Activity::Idle);
    }
}
