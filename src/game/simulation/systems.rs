use bevy::prelude::*;
use floxels_macros::profile;

use crate::game::config::{GameConfig, GameConfigHandle, InitialConfig};
use crate::game::floxels::Population;
use crate::game::maze::Maze;
use crate::game::world::FloxelWorld;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::events::*;
use super::resources::*;

// ============================================================================
// Startup
// ============================================================================

/// Set the fixed timestep and build the world from [`InitialConfig`].
///
/// A [`FloxelWorld`] inserted before startup is kept as is.
pub fn init_sim_from_initial(
    mut commands: Commands,
    mut fixed_time: ResMut<Time<Fixed>>,
    mut sim_config: ResMut<SimConfig>,
    initial_config: Option<Res<InitialConfig>>,
    existing_world: Option<Res<FloxelWorld>>,
) {
    let config = match &initial_config {
        Some(cfg) => cfg.as_ref().clone(),
        None => {
            warn!("[CONFIG] InitialConfig not found, using defaults");
            InitialConfig::default()
        }
    };

    fixed_time.set_timestep_seconds(1.0 / config.tick_rate);
    *sim_config = SimConfig::from_initial(&config);

    if existing_world.is_some() {
        info!("[SIM] Using pre-built world");
        return;
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let maze = Maze::generate(config.maze_width, config.maze_height, config.maze_openness, &mut rng);
    commands.insert_resource(FloxelWorld::new(maze, config.world_settings()));
}

// ============================================================================
// Config
// ============================================================================

/// Push hot-reloaded tuning into the running world.
pub fn update_sim_from_runtime_config(
    config_handle: Res<GameConfigHandle>,
    game_configs: Res<Assets<GameConfig>>,
    mut events: MessageReader<AssetEvent<GameConfig>>,
    mut sim_config: ResMut<SimConfig>,
    world: Option<ResMut<FloxelWorld>>,
) {
    let id = config_handle.0.id();
    let changed = events
        .read()
        .any(|event| event.is_modified(id) || event.is_loaded_with_dependencies(id));
    if !changed {
        return;
    }
    let Some(config) = game_configs.get(&config_handle.0) else {
        return;
    };
    sim_config.tuning = config.floxels.clone();
    sim_config.effects = config.effects.clone();
    if let Some(mut world) = world {
        world.set_tuning(config.floxels.clone(), config.effects.clone());
    }
    info!("[CONFIG] Runtime tuning loaded/updated");
}

// ============================================================================
// Fixed tick
// ============================================================================

pub fn increment_sim_tick(mut tick: ResMut<SimTick>) {
    tick.increment();
}

/// Apply queued commands before the tick runs.
#[allow(clippy::too_many_arguments)]
pub fn process_commands(
    mut world: ResMut<FloxelWorld>,
    mut summons: MessageReader<SummonFloxels>,
    mut releases: MessageReader<ReleaseFloxels>,
    mut captures: MessageReader<CaptureFloxels>,
    mut explosions: MessageReader<TriggerExplosion>,
    mut pulls: MessageReader<SetPull>,
    mut cursors: MessageReader<SetCursor>,
    mut switches: MessageReader<SwitchPopulations>,
    mut morphs: MessageReader<BeginMorph>,
) {
    for cmd in summons.read() {
        world.summon(cmd.population, cmd.center, cmd.radius, cmd.count);
    }
    for cmd in releases.read() {
        world.release(cmd.population, cmd.center, cmd.radius, cmd.count);
    }
    for cmd in captures.read() {
        world.capture(cmd.population, cmd.center, cmd.radius);
    }
    for cmd in explosions.read() {
        world.trigger_explosion(cmd.center);
    }
    for cmd in pulls.read() {
        world.set_pull(cmd.zone);
    }
    for cmd in cursors.read() {
        world.set_cursor(cmd.cursor);
    }
    for _ in switches.read() {
        world.switch_populations();
    }
    for cmd in morphs.read() {
        if (cmd.target.width(), cmd.target.height()) != (world.maze().width(), world.maze().height()) {
            warn!("[SIM] Ignoring morph to a maze of a different size");
            continue;
        }
        world.begin_morph(&cmd.target);
    }
}

pub fn step_morph(mut world: ResMut<FloxelWorld>) {
    world.step_morph();
}

pub fn apply_effects(mut world: ResMut<FloxelWorld>) {
    world.apply_effects();
}

#[profile(4)]
pub fn solve_flows(mut world: ResMut<FloxelWorld>, #[allow(unused_variables)] tick: Res<SimTick>) {
    world.solve();
}

#[profile(4)]
pub fn step_floxels(mut world: ResMut<FloxelWorld>, mut report: ResMut<LastTickReport>) {
    report.0 = world.step();
}

/// Publish the tick's outcome and log status periodically.
pub fn report_tick(
    report: Res<LastTickReport>,
    tick: Res<SimTick>,
    sim_config: Res<SimConfig>,
    world: Res<FloxelWorld>,
    mut destroyed: MessageWriter<PopulationDestroyed>,
) {
    use crate::profile_log;

    for &population in &report.0.destroyed {
        destroyed.write(PopulationDestroyed { population, tick: tick.0 });
    }

    profile_log!(tick, "[SIM STATUS] Tick: {} | Splats: {}", tick.0, report.0.splats);

    let interval = sim_config.status_interval_ticks;
    if interval > 0 && tick.0 % interval == 0 {
        let floxels = world.floxels();
        info!(
            "[SIM STATUS] Tick: {} | Zero: {} (held {}) | One: {} (held {}) | Morph pending: {}",
            tick.0,
            floxels.count(Population::Zero),
            floxels.held(Population::Zero),
            floxels.count(Population::One),
            floxels.held(Population::One),
            world.morph().map_or(0, |morph| morph.remaining())
        );
    }
}
