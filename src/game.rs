use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub mod clusters;
pub mod config;
pub mod effects;
pub mod floxels;
pub mod flow;
pub mod grid;
pub mod maze;
pub mod simulation;
pub mod world;

use config::{GameConfigPlugin, InitialConfig};
use effects::Vent;
use floxels::Population;
use maze::{save_maze, Maze};
use simulation::{BeginMorph, SimSet, SimTick, SimulationPlugin, SummonFloxels};
use world::FloxelWorld;

/// Config, simulation and the demo scenario.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((GameConfigPlugin, SimulationPlugin))
            .add_systems(PostStartup, setup_demo)
            .add_systems(
                FixedUpdate,
                (cycle_demo_maze, finish_run)
                    .after(SimSet::Report)
                    .run_if(resource_exists::<DemoSchedule>),
            );
    }
}

/// Demo pacing: periodic maze morphs and an optional tick limit.
#[derive(Resource)]
pub struct DemoSchedule {
    rng: StdRng,
    openness: f32,
    morph_every: u64,
    pub max_ticks: Option<u64>,
    pub snapshot_path: Option<String>,
}

/// Optional run limit for the headless binary, read by [`setup_demo`].
#[derive(Resource, Default, Clone, Debug)]
pub struct RunLimit {
    pub max_ticks: Option<u64>,
    pub snapshot_path: Option<String>,
}

fn setup_demo(
    mut commands: Commands,
    initial: Res<InitialConfig>,
    limit: Option<Res<RunLimit>>,
    mut world: ResMut<FloxelWorld>,
    mut summons: MessageWriter<SummonFloxels>,
) {
    let (w, h) = (world.maze().width() as f32, world.maze().height() as f32);
    let radius = w.min(h) * 0.2;
    info!("[DEMO] Summoning {} per population", initial.demo_population);

    summons.write(SummonFloxels {
        population: Population::Zero,
        center: Vec2::new(w * 0.25, h * 0.5),
        radius,
        count: initial.demo_population,
    });
    summons.write(SummonFloxels {
        population: Population::One,
        center: Vec2::new(w * 0.75, h * 0.5),
        radius,
        count: initial.demo_population,
    });

    // Gentle outward drift from the middle keeps the swarms from parking.
    world.add_vent(Vent {
        pos: Vec2::new(w * 0.5, h * 0.5),
        strength: 2.0,
        population: None,
    });

    let limit = limit.map(|l| (*l).clone()).unwrap_or_default();
    commands.insert_resource(DemoSchedule {
        rng: StdRng::seed_from_u64(initial.seed.wrapping_add(1)),
        openness: initial.maze_openness,
        morph_every: (initial.tick_rate * 10.0) as u64,
        max_ticks: limit.max_ticks,
        snapshot_path: limit.snapshot_path,
    });
}

fn cycle_demo_maze(
    tick: Res<SimTick>,
    world: Res<FloxelWorld>,
    mut schedule: ResMut<DemoSchedule>,
    mut morphs: MessageWriter<BeginMorph>,
) {
    if schedule.morph_every == 0 || tick.0 % schedule.morph_every != 0 || world.morph().is_some() {
        return;
    }
    let (width, height) = (world.maze().width(), world.maze().height());
    let openness = schedule.openness;
    let target = Maze::generate(width, height, openness, &mut schedule.rng);
    morphs.write(BeginMorph { target });
}

fn finish_run(
    tick: Res<SimTick>,
    world: Res<FloxelWorld>,
    schedule: Res<DemoSchedule>,
    mut exit: MessageWriter<AppExit>,
) {
    let Some(max_ticks) = schedule.max_ticks else {
        return;
    };
    if tick.0 < max_ticks {
        return;
    }
    if let Some(path) = &schedule.snapshot_path {
        match save_maze(path, &world.snapshot()) {
            Ok(()) => info!("[DEMO] Maze snapshot written to {}", path),
            Err(e) => error!("[DEMO] Failed to write maze snapshot {}: {}", path, e),
        }
    }
    info!("[DEMO] Stopping after {} ticks", tick.0);
    exit.write(AppExit::Success);
}
