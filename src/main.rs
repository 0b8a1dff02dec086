//! Demo loop: a scripted two-team skirmish where one agent plays the human
//! demonstrator role and the rest are driven by the policy network while it
//! trains.

use std::env;

use lanebot::infra::{PlayArea, Vec2};
use lanebot::ml::{
    EncoderConfig, FeatureEncoder, PolicyConfig, PolicyService, ServiceConfig, TrainerConfig,
};
use lanebot::world::{EntityId, Skirmish, Team, Unit, UnitKind, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

fn get_env_var_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|val| val.parse::<u64>().ok())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lanebot=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spawn_team(world: &mut Skirmish, team: Team, base: Vec2, toward: f32) -> Vec<EntityId> {
    world.spawn(Unit::new(UnitKind::Castle, team, base, 2000.0));
    world.spawn(Unit::new(
        UnitKind::Tower,
        team,
        base + Vec2::new(toward * 400.0, 0.0),
        800.0,
    ));
    world.spawn(Unit::new(
        UnitKind::Tower,
        team,
        base + Vec2::new(toward * 400.0, 250.0),
        800.0,
    ));

    (0..4)
        .map(|i| {
            world.spawn(Unit::new(
                UnitKind::Player,
                team,
                base + Vec2::new(toward * 150.0, -120.0 + 80.0 * i as f32),
                100.0,
            ))
        })
        .collect()
}

fn spawn_minion_wave(world: &mut Skirmish, team: Team, base: Vec2, toward: f32) {
    for i in 0..3 {
        world.spawn(Unit::new(
            UnitKind::Minion,
            team,
            base + Vec2::new(toward * 250.0, 40.0 * i as f32),
            40.0,
        ));
    }
}

/// Scripted demonstrator input: cycles the human-controlled agent through idle,
/// move and attack so every sample group accumulates.
fn drive_human(world: &mut Skirmish, human: EntityId, frame: u64, rng: &mut StdRng) {
    let area = *world.play_area();

    match (frame / 40) % 3 {
        0 => {
            // Stop in place so the idle/continue group accumulates too.
            if let Some(position) = world.unit(human).map(|u| u.position) {
                world.move_to(human, position);
            }
        }
        1 => {
            let target = area.denormalize(Vec2::new(rng.random::<f32>(), rng.random::<f32>()));
            world.move_to(human, target);
        }
        _ => {
            let hostiles: Vec<EntityId> = world
                .units()
                .filter(|(id, unit)| *id != human && unit.team == Team::Blue)
                .map(|(id, _)| id)
                .collect();
            if let Some(target) = hostiles.first() {
                world.attack(human, *target);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let frames = get_env_var_u64("LANEBOT_FRAMES").unwrap_or(2000);
    let seed = get_env_var_u64("LANEBOT_SEED").unwrap_or(0);
    let train_interval = get_env_var_u64("LANEBOT_TRAIN_INTERVAL").unwrap_or(64);

    tracing::info!("running {frames} frames, train interval {train_interval}");

    let area = PlayArea::default();
    let mut world = Skirmish::new(area);

    let red_base = area.origin + Vec2::new(200.0, 700.0);
    let blue_base = area.origin + area.size - Vec2::new(200.0, 700.0);
    let red_players = spawn_team(&mut world, Team::Red, red_base, 1.0);
    spawn_team(&mut world, Team::Blue, blue_base, -1.0);

    let human = red_players[0];
    world.set_human_agent(Some(human));

    let encoder = FeatureEncoder::new(EncoderConfig::default());
    let mut service = PolicyService::<TrainBackend>::new(
        Default::default(),
        encoder,
        &PolicyConfig::default(),
        TrainerConfig::default(),
        ServiceConfig { train_interval },
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let dt = 1.0 / 60.0;

    for frame in 0..frames {
        // Waves stay under the encoder's minion capacity.
        let minion_count = world
            .units()
            .filter(|(_, u)| u.kind == UnitKind::Minion)
            .count();
        if frame % 300 == 0 && minion_count + 6 <= EncoderConfig::default().max_minions {
            spawn_minion_wave(&mut world, Team::Red, red_base, 1.0);
            spawn_minion_wave(&mut world, Team::Blue, blue_base, -1.0);
        }

        drive_human(&mut world, human, frame, &mut rng);
        service.update(&mut world);
        world.step(dt);

        if frame % 500 == 0 {
            tracing::info!(
                "frame {}: {} units, {} samples, {} training iterations",
                frame,
                world.unit_count(),
                service.trainer().samples().len(),
                service.trainer().iterations()
            );
        }
    }

    service.metrics().log_summary();
    tracing::info!(
        "done: {} samples collected, {} training iterations",
        service.trainer().samples().len(),
        service.trainer().iterations()
    );

    Ok(())
}
