//! Feature encoder - converts live world state into normalized observations
//! and packs observation batches into fixed-shape tensors.
//!
//! The layout here is a contract with the network: any change to feature
//! order, scale constants or slot capacities invalidates previously trained
//! weights.

use burn::prelude::*;

use crate::infra::{PlayArea, Vec2};
use crate::world::{EntityId, Unit, UnitKind, World};

use super::error::MlError;

/// Floats per player/minion feature group: relative position, velocity, health.
pub const UNIT_FEATURES: usize = 5;
/// Floats per building feature group: relative position, health. No velocity.
pub const BUILDING_FEATURES: usize = 3;

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Player slots per observation. Slot 0 holds the observing agent itself.
    pub max_players: usize,
    pub max_minions: usize,
    pub max_buildings: usize,
    /// World-extent constant dividing relative positions.
    pub position_scale: f32,
    /// Speed constant dividing velocities.
    pub velocity_scale: f32,
    pub play_area: PlayArea,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            max_minions: 16,
            max_buildings: 8,
            position_scale: 4096.0,
            velocity_scale: 400.0,
            play_area: PlayArea::default(),
        }
    }
}

/// One player/minion feature group, already normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitFeatures {
    pub position: Vec2,
    pub velocity: Vec2,
    pub health: f32,
}

/// One building feature group, already normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingFeatures {
    pub position: Vec2,
    pub health: f32,
}

/// Normalized snapshot of an agent's surroundings. Recomputed fresh every
/// frame; owns no cross-frame state.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The observing agent, positioned relative to the play-area center.
    pub agent: UnitFeatures,
    /// Other players, relative to the observing agent, in world enumeration
    /// order (not distance-sorted).
    pub players: Vec<UnitFeatures>,
    pub minions: Vec<UnitFeatures>,
    pub buildings: Vec<BuildingFeatures>,
}

/// Observation batch packed into zero-padded, fixed-shape tensors.
#[derive(Debug)]
pub struct PackedBatch<B: Backend> {
    /// `[batch, max_players, UNIT_FEATURES]`, the self group in slot 0.
    pub players: Tensor<B, 3>,
    /// `[batch, max_minions, UNIT_FEATURES]`
    pub minions: Tensor<B, 3>,
    /// `[batch, max_buildings, BUILDING_FEATURES]`
    pub buildings: Tensor<B, 3>,
}

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn play_area(&self) -> &PlayArea {
        &self.config.play_area
    }

    /// Encode the world as seen by `agent`.
    ///
    /// Neighbor groups are expressed relative to the agent's position and
    /// normalized by the fixed scale constants; a unit without a health
    /// component reports neutral full health instead of failing the frame.
    pub fn encode<W: World>(&self, world: &W, agent: EntityId) -> Result<Observation, MlError> {
        let observer = world.unit(agent).ok_or(MlError::MissingAgent)?;

        let mut players = Vec::new();
        for id in world.units_of_kind(UnitKind::Player) {
            if id == agent {
                continue;
            }
            if let Some(unit) = world.unit(id) {
                players.push(self.unit_features(unit, observer.position));
            }
        }

        let mut minions = Vec::new();
        for id in world.units_of_kind(UnitKind::Minion) {
            if let Some(unit) = world.unit(id) {
                minions.push(self.unit_features(unit, observer.position));
            }
        }

        // The two building subtypes merge into one list, towers first --
        // stable enumeration order within each subtype, no re-sorting.
        let mut buildings = Vec::new();
        for kind in [UnitKind::Tower, UnitKind::Castle] {
            for id in world.units_of_kind(kind) {
                if let Some(unit) = world.unit(id) {
                    buildings.push(self.building_features(unit, observer.position));
                }
            }
        }

        Ok(Observation {
            agent: self.unit_features(observer, self.config.play_area.center()),
            players,
            minions,
            buildings,
        })
    }

    fn unit_features(&self, unit: &Unit, origin: Vec2) -> UnitFeatures {
        let relative = unit.position - origin;
        UnitFeatures {
            position: relative * (1.0 / self.config.position_scale),
            velocity: unit.velocity * (1.0 / self.config.velocity_scale),
            health: Self::health_fraction(unit),
        }
    }

    fn building_features(&self, unit: &Unit, origin: Vec2) -> BuildingFeatures {
        let relative = unit.position - origin;
        BuildingFeatures {
            position: relative * (1.0 / self.config.position_scale),
            health: Self::health_fraction(unit),
        }
    }

    fn health_fraction(unit: &Unit) -> f32 {
        // Neutral full health for units missing the component, so absent data
        // does not read as a dying target.
        unit.health.map(|h| h.fraction()).unwrap_or(1.0)
    }

    /// Pack a batch of observations into the three fixed-shape input tensors.
    ///
    /// Absent slots are zero-padded up to each kind's capacity; observations
    /// over capacity are a shape error the caller must handle.
    pub fn pack_batch<B: Backend>(
        &self,
        observations: &[&Observation],
        device: &B::Device,
    ) -> Result<PackedBatch<B>, MlError> {
        if observations.is_empty() {
            return Err(MlError::EmptyBatch);
        }

        let batch = observations.len();
        let cfg = &self.config;

        let mut players = vec![0.0f32; batch * cfg.max_players * UNIT_FEATURES];
        let mut minions = vec![0.0f32; batch * cfg.max_minions * UNIT_FEATURES];
        let mut buildings = vec![0.0f32; batch * cfg.max_buildings * BUILDING_FEATURES];

        for (i, obs) in observations.iter().enumerate() {
            if obs.players.len() + 1 > cfg.max_players {
                return Err(MlError::TooManyNeighbors {
                    kind: UnitKind::Player,
                    count: obs.players.len() + 1,
                    capacity: cfg.max_players,
                });
            }
            if obs.minions.len() > cfg.max_minions {
                return Err(MlError::TooManyNeighbors {
                    kind: UnitKind::Minion,
                    count: obs.minions.len(),
                    capacity: cfg.max_minions,
                });
            }
            if obs.buildings.len() > cfg.max_buildings {
                return Err(MlError::TooManyNeighbors {
                    kind: UnitKind::Tower,
                    count: obs.buildings.len(),
                    capacity: cfg.max_buildings,
                });
            }

            let base = i * cfg.max_players * UNIT_FEATURES;
            Self::write_unit(&mut players[base..base + UNIT_FEATURES], &obs.agent);
            for (slot, unit) in obs.players.iter().enumerate() {
                let offset = base + (slot + 1) * UNIT_FEATURES;
                Self::write_unit(&mut players[offset..offset + UNIT_FEATURES], unit);
            }

            let base = i * cfg.max_minions * UNIT_FEATURES;
            for (slot, unit) in obs.minions.iter().enumerate() {
                let offset = base + slot * UNIT_FEATURES;
                Self::write_unit(&mut minions[offset..offset + UNIT_FEATURES], unit);
            }

            let base = i * cfg.max_buildings * BUILDING_FEATURES;
            for (slot, building) in obs.buildings.iter().enumerate() {
                let offset = base + slot * BUILDING_FEATURES;
                buildings[offset] = building.position.x;
                buildings[offset + 1] = building.position.y;
                buildings[offset + 2] = building.health;
            }
        }

        Ok(PackedBatch {
            players: Tensor::<B, 1>::from_floats(players.as_slice(), device).reshape([
                batch,
                cfg.max_players,
                UNIT_FEATURES,
            ]),
            minions: Tensor::<B, 1>::from_floats(minions.as_slice(), device).reshape([
                batch,
                cfg.max_minions,
                UNIT_FEATURES,
            ]),
            buildings: Tensor::<B, 1>::from_floats(buildings.as_slice(), device).reshape([
                batch,
                cfg.max_buildings,
                BUILDING_FEATURES,
            ]),
        })
    }

    fn write_unit(out: &mut [f32], unit: &UnitFeatures) {
        out[0] = unit.position.x;
        out[1] = unit.position.y;
        out[2] = unit.velocity.x;
        out[3] = unit.velocity.y;
        out[4] = unit.health;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Skirmish, Team, Unit};

    type TestBackend = burn::backend::NdArray;

    fn corner_world() -> (Skirmish, EntityId) {
        let area = PlayArea::default();
        let mut world = Skirmish::new(area);

        let low = area.origin;
        let high = area.origin + area.size;

        let agent = world.spawn(Unit::new(UnitKind::Player, Team::Red, low, 100.0));
        world.spawn(Unit::new(UnitKind::Player, Team::Blue, high, 100.0));
        world.spawn(Unit::new(UnitKind::Minion, Team::Blue, high, 40.0));
        world.spawn(Unit::new(UnitKind::Tower, Team::Blue, high, 500.0));
        world.spawn(Unit::new(UnitKind::Castle, Team::Blue, area.center(), 1000.0));

        (world, agent)
    }

    fn assert_in_range(value: f32) {
        assert!(
            (-1.5..=1.5).contains(&value),
            "feature component {value} outside [-1.5, 1.5]"
        );
    }

    #[test]
    fn test_normalization_range() {
        let (mut world, agent) = corner_world();
        // Give everything some velocity by ordering moves.
        let center = world.play_area().center();
        let ids: Vec<EntityId> = world.units().map(|(id, _)| id).collect();
        for id in ids {
            world.move_to(id, center);
        }
        world.step(0.05);

        let encoder = FeatureEncoder::new(EncoderConfig::default());
        let obs = encoder.encode(&world, agent).unwrap();

        for unit in std::iter::once(&obs.agent)
            .chain(obs.players.iter())
            .chain(obs.minions.iter())
        {
            assert_in_range(unit.position.x);
            assert_in_range(unit.position.y);
            assert_in_range(unit.velocity.x);
            assert_in_range(unit.velocity.y);
            assert!((0.0..=1.0).contains(&unit.health));
        }
        for building in &obs.buildings {
            assert_in_range(building.position.x);
            assert_in_range(building.position.y);
            assert!((0.0..=1.0).contains(&building.health));
        }
    }

    #[test]
    fn test_observer_excluded_from_players() {
        let (world, agent) = corner_world();
        let encoder = FeatureEncoder::new(EncoderConfig::default());

        let obs = encoder.encode(&world, agent).unwrap();

        assert_eq!(obs.players.len(), 1);
        assert_eq!(obs.minions.len(), 1);
        assert_eq!(obs.buildings.len(), 2);
    }

    #[test]
    fn test_missing_health_reads_neutral() {
        let area = PlayArea::default();
        let mut world = Skirmish::new(area);
        let agent = world.spawn(Unit::new(UnitKind::Player, Team::Red, area.center(), 100.0));

        let mut bare = Unit::new(UnitKind::Minion, Team::Blue, area.center(), 10.0);
        bare.health = None;
        world.spawn(bare);

        let encoder = FeatureEncoder::new(EncoderConfig::default());
        let obs = encoder.encode(&world, agent).unwrap();

        assert_eq!(obs.minions[0].health, 1.0);
    }

    #[test]
    fn test_encode_stale_agent_fails() {
        let (mut world, agent) = corner_world();
        world.despawn(agent);

        let encoder = FeatureEncoder::new(EncoderConfig::default());
        assert!(matches!(
            encoder.encode(&world, agent),
            Err(MlError::MissingAgent)
        ));
    }

    #[test]
    fn test_pack_zero_pads_empty_lists() {
        let area = PlayArea::default();
        let mut world = Skirmish::new(area);
        let agent = world.spawn(Unit::new(UnitKind::Player, Team::Red, area.center(), 100.0));

        let encoder = FeatureEncoder::new(EncoderConfig::default());
        let obs = encoder.encode(&world, agent).unwrap();
        let device = Default::default();

        let packed = encoder
            .pack_batch::<TestBackend>(&[&obs], &device)
            .unwrap();

        assert_eq!(packed.players.dims(), [1, 8, UNIT_FEATURES]);
        assert_eq!(packed.minions.dims(), [1, 16, UNIT_FEATURES]);
        assert_eq!(packed.buildings.dims(), [1, 8, BUILDING_FEATURES]);

        // Everything but the self slot is zero padding.
        let minions: Vec<f32> = packed.minions.into_data().to_vec().unwrap();
        assert!(minions.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pack_rejects_over_capacity() {
        let config = EncoderConfig::default();
        let encoder = FeatureEncoder::new(config.clone());

        let filler = UnitFeatures {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            health: 1.0,
        };
        let obs = Observation {
            agent: filler,
            players: Vec::new(),
            minions: vec![filler; config.max_minions + 1],
            buildings: Vec::new(),
        };

        let device = Default::default();
        let result = encoder.pack_batch::<TestBackend>(&[&obs], &device);

        assert!(matches!(result, Err(MlError::TooManyNeighbors { .. })));
    }
}
