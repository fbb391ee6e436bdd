//! External source-term contributors: blasts, capture pulls, ambient vents and
//! the player cursor. Each writes into one population's finest source grid for
//! the current tick only.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game::floxels::{Population, PullZone};
use crate::game::grid::Grid2;


/// Hot-reloadable strengths for effects triggered through commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTuning {
    pub explosion_strength: f32,
    pub explosion_radius: f32,
    pub explosion_fade_ticks: u16,
    pub pull_strength: f32,
    pub cursor_strength: f32,
}

impl Default for EffectTuning {
    fn default() -> Self {
        Self {
            explosion_strength: 40.0,
            explosion_radius: 1.5,
            explosion_fade_ticks: 20,
            pull_strength: 12.0,
            cursor_strength: 8.0,
        }
    }
}

/// Something that adds to a population's source grid each tick.
///
/// `refinement` is the number of source cells per base cell along each axis.
pub trait SourceContributor: Send + Sync {
    fn add_to_source(&self, population: Population, source: &mut Grid2<f32>, refinement: usize);

    /// Advance one tick. Returns `false` once the contributor has expired.
    fn advance(&mut self) -> bool {
        true
    }
}

/// Source cell containing `pos`, as signed coordinates.
fn fine_cell(pos: Vec2, refinement: usize) -> (isize, isize) {
    let r = refinement as f32;
    ((pos.x * r).floor() as isize, (pos.y * r).floor() as isize)
}

/// Point blast: a fading 9-point repulsion stencil in both populations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    pub center: Vec2,
    pub strength: f32,
    /// Particles within this distance are stunned when the blast goes off.
    pub radius: f32,
    pub fade_ticks: u16,
    remaining: u16,
}

impl Explosion {
    pub fn new(center: Vec2, strength: f32, radius: f32, fade_ticks: u16) -> Self {
        let fade_ticks = fade_ticks.max(1);
        Self {
            center,
            strength,
            radius,
            fade_ticks,
            remaining: fade_ticks,
        }
    }

    /// Current fade in `(0, 1]`.
    pub fn fade(&self) -> f32 {
        self.remaining as f32 / self.fade_ticks as f32
    }
}

impl SourceContributor for Explosion {
    fn add_to_source(&self, _population: Population, source: &mut Grid2<f32>, refinement: usize) {
        let (cx, cy) = fine_cell(self.center, refinement);
        let peak = self.strength * self.fade();
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let weight = match dx.abs() + dy.abs() {
                    0 => 1.0,
                    1 => 0.5,
                    _ => 0.25,
                };
                source.add_clipped(cx + dx, cy + dy, peak * weight);
            }
        }
    }

    fn advance(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }
}

/// Capture or summon pull: attraction ramping from `strength` at the centre to
/// zero at the zone radius, for one population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pull {
    pub zone: PullZone,
    pub strength: f32,
}

impl Pull {
    pub fn new(population: Population, center: Vec2, radius: f32, strength: f32) -> Self {
        Self {
            zone: PullZone {
                population,
                center,
                radius,
            },
            strength,
        }
    }
}

impl SourceContributor for Pull {
    fn add_to_source(&self, population: Population, source: &mut Grid2<f32>, refinement: usize) {
        if population != self.zone.population || self.zone.radius <= 0.0 {
            return;
        }
        let r = refinement as f32;
        let (x0, y0) = fine_cell(self.zone.center - self.zone.radius, refinement);
        let (x1, y1) = fine_cell(self.zone.center + self.zone.radius, refinement);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell_center = Vec2::new((x as f32 + 0.5) / r, (y as f32 + 0.5) / r);
                let ramp = 1.0 - cell_center.distance(self.zone.center) / self.zone.radius;
                if ramp > 0.0 {
                    source.add_clipped(x, y, -self.strength * ramp);
                }
            }
        }
    }
}

/// Ambient drift: a constant source at one point. Positive pushes away,
/// negative draws in. Applies to both populations unless `population` is set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vent {
    pub pos: Vec2,
    pub strength: f32,
    pub population: Option<Population>,
}

impl SourceContributor for Vent {
    fn add_to_source(&self, population: Population, source: &mut Grid2<f32>, refinement: usize) {
        if self.population.is_some_and(|only| only != population) {
            return;
        }
        let (x, y) = fine_cell(self.pos, refinement);
        source.add_clipped(x, y, self.strength);
    }
}

/// Player steering point attracting one population.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub population: Population,
    pub pos: Vec2,
    pub strength: f32,
}

impl SourceContributor for Cursor {
    fn add_to_source(&self, population: Population, source: &mut Grid2<f32>, refinement: usize) {
        if population == self.population {
            let (x, y) = fine_cell(self.pos, refinement);
            source.add_clipped(x, y, -self.strength);
        }
    }
}

/// Live contributors, applied in insertion order and dropped once expired.
#[derive(Default)]
pub struct EffectStack {
    contributors: Vec<Box<dyn SourceContributor>>,
}

impl EffectStack {
    pub fn push(&mut self, contributor: impl SourceContributor + 'static) {
        self.contributors.push(Box::new(contributor));
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn clear(&mut self) {
        self.contributors.clear();
    }

    pub fn add_to_source(&self, population: Population, source: &mut Grid2<f32>, refinement: usize) {
        for contributor in &self.contributors {
            contributor.add_to_source(population, source, refinement);
        }
    }

    /// Tick every contributor and drop the expired ones.
    pub fn advance(&mut self) {
        let before = self.contributors.len();
        self.contributors.retain_mut(|contributor| contributor.advance());
        let expired = before - self.contributors.len();
        if expired > 0 {
            debug!("[EFFECTS] {expired} contributor(s) expired, {} live", self.contributors.len());
        }
    }
}

impl std::fmt::Debug for EffectStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectStack").field("live", &self.contributors.len()).finish()
    }
}
