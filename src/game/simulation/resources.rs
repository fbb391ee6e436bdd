/// Resource definitions for the simulation plugin.

use bevy::prelude::*;

use crate::game::config::InitialConfig;
use crate::game::effects::EffectTuning;
use crate::game::floxels::{FloxelTuning, TickReport};
use crate::game::flow::SolverParams;

/// Number of fixed ticks simulated so far.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Runtime simulation parameters.
///
/// Sizes and solver constants come from [`InitialConfig`] at startup; the
/// tuning fields are replaced whenever the hot-reloadable `GameConfig` changes.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub tick_rate: f64,
    pub solver: SolverParams,
    pub tuning: FloxelTuning,
    pub effects: EffectTuning,
    /// Ticks between `[SIM STATUS]` lines; 0 disables them.
    pub status_interval_ticks: u64,
}

impl SimConfig {
    pub fn from_initial(config: &InitialConfig) -> Self {
        Self {
            tick_rate: config.tick_rate,
            solver: config.solver_params(),
            tuning: FloxelTuning::default(),
            effects: EffectTuning::default(),
            status_interval_ticks: config.status_interval_ticks,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_initial(&InitialConfig::default())
    }
}

/// Report of the most recent tick.
#[derive(Resource, Default, Debug, Clone)]
pub struct LastTickReport(pub TickReport);
