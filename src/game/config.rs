use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use serde::{Deserialize, Serialize};

use crate::game::effects::EffectTuning;
use crate::game::floxels::{FloxelSettings, FloxelTuning};
use crate::game::flow::SolverParams;
use crate::game::world::WorldSettings;

pub const INITIAL_CONFIG_PATH: &str = "assets/initial_config.ron";

/// Static configuration read once at startup. Sizes the maze, solver and
/// particle pool, none of which can change while the simulation runs.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InitialConfig {
    // Timing
    pub tick_rate: f64,

    // Maze
    pub maze_width: usize,
    pub maze_height: usize,
    /// Share of spanning-tree walls knocked out to create loops.
    pub maze_openness: f32,
    pub morph_delay_ticks: u32,

    // Solver
    pub refinement_levels: usize,
    pub coarse_passes: usize,
    pub fine_passes: usize,
    pub wall_inflow: f32,

    // Particles
    pub capacity: usize,
    pub cluster_subdivision: usize,
    pub kill_grid_factor: usize,
    pub intention_level: usize,

    // Demo
    pub seed: u64,
    pub demo_population: u32,
    pub status_interval_ticks: u64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            maze_width: 16,
            maze_height: 12,
            maze_openness: 0.15,
            morph_delay_ticks: 2,
            refinement_levels: 2,
            coarse_passes: 24,
            fine_passes: 3,
            wall_inflow: 0.5,
            capacity: 1000,
            cluster_subdivision: 2,
            kill_grid_factor: 4,
            intention_level: 1,
            seed: 7,
            demo_population: 300,
            status_interval_ticks: 90,
        }
    }
}

impl InitialConfig {
    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            coarse_passes: self.coarse_passes,
            fine_passes: self.fine_passes,
            wall_inflow: self.wall_inflow,
        }
    }

    pub fn floxel_settings(&self) -> FloxelSettings {
        FloxelSettings {
            capacity: self.capacity,
            cluster_subdivision: self.cluster_subdivision,
            kill_grid_factor: self.kill_grid_factor,
            intention_level: self.intention_level.min(self.refinement_levels),
            tick_seconds: (1.0 / self.tick_rate) as f32,
        }
    }

    /// World settings with default tuning; runtime tuning arrives with [`GameConfig`].
    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            max_level: self.refinement_levels,
            solver: self.solver_params(),
            floxels: self.floxel_settings(),
            tuning: FloxelTuning::default(),
            effects: EffectTuning::default(),
            morph_delay_ticks: self.morph_delay_ticks,
            seed: self.seed,
        }
    }
}

/// Read [`InitialConfig`] from disk, falling back to defaults on any error.
pub fn load_initial_config(path: &str) -> InitialConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            error!("[CONFIG] Failed to read {}: {}", path, e);
            error!("[CONFIG] Using default InitialConfig");
            return InitialConfig::default();
        }
    };
    match ron::from_str::<InitialConfig>(&contents) {
        Ok(config) => {
            info!("[CONFIG] Loaded initial config from {}", path);
            config
        }
        Err(e) => {
            error!("[CONFIG] Failed to parse initial config: {}", e);
            error!("[CONFIG] Using default InitialConfig");
            InitialConfig::default()
        }
    }
}

/// Behaviour tuning that can be hot-reloaded while the simulation runs.
#[derive(Deserialize, Serialize, Asset, TypePath, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub floxels: FloxelTuning,
    pub effects: EffectTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            floxels: FloxelTuning::default(),
            effects: EffectTuning::default(),
        }
    }
}

#[derive(Resource)]
pub struct GameConfigHandle(pub Handle<GameConfig>);

/// Registers the config asset and inserts [`InitialConfig`] if the app has none yet.
pub struct GameConfigPlugin;

impl Plugin for GameConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<GameConfig>::new(&["game_config.ron"]))
            .add_systems(Startup, setup_runtime_config);
        if !app.world().contains_resource::<InitialConfig>() {
            app.insert_resource(load_initial_config(INITIAL_CONFIG_PATH));
        }
    }
}

fn setup_runtime_config(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handle = asset_server.load("game_config.ron");
    commands.insert_resource(GameConfigHandle(handle));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_initial_config_fills_defaults() {
        let config: InitialConfig = ron::from_str("(maze_width: 5, maze_height: 5, capacity: 64)").expect("valid ron");
        assert_eq!(config.maze_width, 5);
        assert_eq!(config.capacity, 64);
        assert_eq!(config.tick_rate, 30.0, "missing fields take their defaults");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_initial_config("does/not/exist.ron");
        assert_eq!(config, InitialConfig::default());
    }

    #[test]
    fn test_shipped_config_files_parse() {
        let initial = std::fs::read_to_string(INITIAL_CONFIG_PATH).expect("initial config present");
        ron::from_str::<InitialConfig>(&initial).expect("initial config parses");
        let game = std::fs::read_to_string("assets/game_config.ron").expect("game config present");
        ron::from_str::<GameConfig>(&game).expect("game config parses");
    }

    #[test]
    fn test_world_settings_clamp_intention_level() {
        let config = InitialConfig {
            refinement_levels: 1,
            intention_level: 3,
            ..Default::default()
        };
        let settings = config.world_settings();
        assert_eq!(settings.floxels.intention_level, 1);
        assert!((settings.floxels.tick_seconds - 1.0 / 30.0).abs() < 1e-6);
    }
}
