use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// One of the two competing particle populations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Population {
    #[default]
    Zero,
    One,
}

impl Population {
    pub const ALL: [Population; 2] = [Population::Zero, Population::One];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn other(self) -> Population {
        match self {
            Population::Zero => Population::One,
            Population::One => Population::Zero,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloxelState {
    /// Free pool slot.
    #[default]
    Unused,
    Normal,
    /// Defeated; converts to the other population when the timer runs out.
    Splatted,
    /// Silent removal on a timer. Kept for completeness; nothing enters it.
    Reclaimed,
    /// Halted by a blast, then waking up over `stun_wake` ticks.
    Stunned,
}

impl FloxelState {
    #[inline]
    pub fn is_active(self) -> bool {
        self != FloxelState::Unused
    }

    /// States that flock, cluster, emit sources and take part in combat.
    #[inline]
    pub fn is_combatant(self) -> bool {
        matches!(self, FloxelState::Normal | FloxelState::Stunned)
    }
}

/// A pooled particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Floxel {
    /// Position in base-cell units.
    pub pos: Vec2,
    pub state: FloxelState,
    pub population: Population,
    /// Countdown for the current timed state.
    pub timer: u16,
    /// Length of the wake-up window at the end of a stun.
    pub stun_wake: u16,
    /// Smoothed crowding score, moved one step per tick toward the clustered value.
    pub cluster_score: u8,
    pub shade: u8,
    pub face: u8,
    pub needs_nudge: bool,
    /// Inside an active pull zone this tick; ignores walls while set.
    pub pulled: bool,
}

impl Default for Floxel {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            state: FloxelState::Unused,
            population: Population::Zero,
            timer: 0,
            stun_wake: 0,
            cluster_score: 0,
            shade: 0,
            face: 0,
            needs_nudge: false,
            pulled: false,
        }
    }
}

impl Floxel {
    /// Speed multiplier from the current state.
    ///
    /// A stunned particle is fully halted until its timer drops into the wake
    /// window, then eases from 0 back to 1 with `0.5 - 0.5 cos(pi u)`.
    pub fn slowdown(&self) -> f32 {
        match self.state {
            FloxelState::Normal => 1.0,
            FloxelState::Stunned => {
                if self.stun_wake == 0 || self.timer >= self.stun_wake {
                    return 0.0;
                }
                let u = 1.0 - self.timer as f32 / self.stun_wake as f32;
                0.5 - 0.5 * (PI * u).cos()
            }
            FloxelState::Unused | FloxelState::Splatted | FloxelState::Reclaimed => 0.0,
        }
    }

    pub fn view(&self) -> FloxelView {
        FloxelView {
            x: self.pos.x,
            y: self.pos.y,
            population: self.population,
            state: self.state,
            shade: self.shade,
            face: self.face,
        }
    }
}

/// Read-only particle snapshot handed to renderers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloxelView {
    pub x: f32,
    pub y: f32,
    pub population: Population,
    pub state: FloxelState,
    pub shade: u8,
    pub face: u8,
}
