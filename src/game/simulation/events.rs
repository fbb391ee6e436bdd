/// Commands into the simulation and notifications out of it.

use bevy::prelude::*;

use crate::game::floxels::Population;
use crate::game::maze::Maze;

// ============================================================================
// Commands
// ============================================================================

/// Create new particles from free pool capacity.
#[derive(Message, Debug, Clone)]
pub struct SummonFloxels {
    pub population: Population,
    pub center: Vec2,
    pub radius: f32,
    pub count: u32,
}

/// Return held particles to play.
#[derive(Message, Debug, Clone)]
pub struct ReleaseFloxels {
    pub population: Population,
    pub center: Vec2,
    pub radius: f32,
    pub count: u32,
}

/// Take active particles out of play and hold them.
#[derive(Message, Debug, Clone)]
pub struct CaptureFloxels {
    pub population: Population,
    pub center: Vec2,
    pub radius: f32,
}

#[derive(Message, Debug, Clone)]
pub struct TriggerExplosion {
    pub center: Vec2,
}

/// Start, move or clear the pull zone.
#[derive(Message, Debug, Clone)]
pub struct SetPull {
    pub zone: Option<(Population, Vec2, f32)>,
}

/// Place or clear the steering cursor.
#[derive(Message, Debug, Clone)]
pub struct SetCursor {
    pub cursor: Option<(Population, Vec2)>,
}

#[derive(Message, Debug, Clone)]
pub struct SwitchPopulations;

/// Morph the current maze toward `target`, one wall at a time.
#[derive(Message, Debug, Clone)]
pub struct BeginMorph {
    pub target: Maze,
}

// ============================================================================
// Notifications
// ============================================================================

/// A population's active count reached zero.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct PopulationDestroyed {
    pub population: Population,
    pub tick: u64,
}
