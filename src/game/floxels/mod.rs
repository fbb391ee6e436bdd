//! Particle engine for both populations.
//!
//! Owns a fixed-capacity pool and drives it through one tick:
//!
//! 1. Advance timed states (splat, stun, reclaim)
//! 2. Sample each population's flow field and integrate, respecting walls
//! 3. Resolve combat on the kill grid ([`Floxels::fight_floxels`])
//! 4. Recount occupancy and refresh the solver's level-of-detail hints
//! 5. Re-cluster and step every particle's score toward the fresh value
//! 6. Rotate a batch of cosmetic faces
//! 7. Emit source terms for the next solve
//!
//! Per-population storage (counts, held particles, occupancy, clusters and
//! the flows passed to [`Floxels::tick`]) is addressed by slot through a
//! [`PopulationMap`], so switching populations never moves buffers.

use bevy::prelude::*;
use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::f32::consts::TAU;

use crate::game::clusters::{Clusters, MAX_SCORE};
use crate::game::flow::Flow;
use crate::game::grid::Grid2;
use crate::game::maze::{BoundaryField, Direction};

mod floxel;

pub use floxel::{Floxel, FloxelState, FloxelView, Population};

/// Stored positions stay strictly below the domain's far edge.
const POSITION_EPSILON: f32 = 1e-3;

/// Longest single-tick displacement, so a step crosses at most one cell edge per axis.
const MAX_CELL_STEP: f32 = 0.5;

// ============================================================================
// Configuration
// ============================================================================

/// Hot-reloadable behaviour constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloxelTuning {
    /// Flow-to-velocity factor per population.
    pub velocity_factor: [f32; 2],
    /// Speed cap in base cells per second.
    pub max_speed: f32,
    /// Attraction spread over each particle's intention block.
    pub attraction: f32,
    /// Repulsion spike at each particle's own fine cell.
    pub repulsion: f32,
    pub hunt: f32,
    pub flee: f32,
    pub splat_ticks: u16,
    pub stun_plateau_ticks: u16,
    pub stun_wake_min: u16,
    pub stun_wake_max: u16,
    pub reclaim_ticks: u16,
    pub shade_count: u8,
    pub face_count: u8,
    /// Faces re-rolled per tick.
    pub face_batch: usize,
    /// Half-width of the random offset applied to overlapping particles.
    pub nudge: f32,
}

impl Default for FloxelTuning {
    fn default() -> Self {
        Self {
            velocity_factor: [1.0, 1.0],
            max_speed: 4.0,
            attraction: 6.0,
            repulsion: 1.0,
            hunt: 2.0,
            flee: 3.0,
            splat_ticks: 15,
            stun_plateau_ticks: 20,
            stun_wake_min: 10,
            stun_wake_max: 30,
            reclaim_ticks: 30,
            shade_count: 8,
            face_count: 4,
            face_batch: 16,
            nudge: 0.01,
        }
    }
}

/// Construction-time sizes. Fixed for the lifetime of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloxelSettings {
    pub capacity: usize,
    /// Clustering cells per base cell along each axis.
    pub cluster_subdivision: usize,
    /// Kill-grid cells per base cell along each axis.
    pub kill_grid_factor: usize,
    /// Solver level whose cell size is the attraction blob.
    pub intention_level: usize,
    /// Seconds per tick.
    pub tick_seconds: f32,
}

impl Default for FloxelSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            cluster_subdivision: 2,
            kill_grid_factor: 4,
            intention_level: 1,
            tick_seconds: 1.0 / 30.0,
        }
    }
}

// ============================================================================
// Population Slots
// ============================================================================

/// Population to storage-slot mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopulationMap {
    slots: [usize; 2],
}

impl Default for PopulationMap {
    fn default() -> Self {
        Self { slots: [0, 1] }
    }
}

impl PopulationMap {
    #[inline]
    pub fn slot(&self, population: Population) -> usize {
        self.slots[population.index()]
    }

    pub fn population_in(&self, slot: usize) -> Population {
        if self.slots[0] == slot { Population::Zero } else { Population::One }
    }

    pub fn swap(&mut self) {
        self.slots.swap(0, 1);
    }
}

/// Area whose particles are being drawn toward a capture or summon point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PullZone {
    pub population: Population,
    pub center: Vec2,
    pub radius: f32,
}

impl PullZone {
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.distance_squared(self.center) <= self.radius * self.radius
    }
}

/// Outcome of one tick, indexed by population.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub counts: [u32; 2],
    /// Populations whose active count dropped to zero this tick.
    pub destroyed: SmallVec<[Population; 2]>,
    pub splats: u32,
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone, Debug)]
pub struct Floxels {
    settings: FloxelSettings,
    tuning: FloxelTuning,
    base_width: usize,
    base_height: usize,
    pool: Vec<Floxel>,
    map: PopulationMap,
    // Per slot.
    counts: [u32; 2],
    held: [u32; 2],
    last_counts: [u32; 2],
    occupancy: [Grid2<u16>; 2],
    clusters: [Clusters; 2],
    kill_grid: Grid2<i16>,
    kill_touched: Vec<usize>,
    targets: FxHashSet<(u32, u32)>,
    face_cursor: usize,
    pull: Option<PullZone>,
}

impl Floxels {
    pub fn new(base_width: usize, base_height: usize, settings: FloxelSettings, tuning: FloxelTuning) -> Self {
        assert!(base_width > 0 && base_height > 0, "floxel domain must have at least one cell");
        assert!(settings.kill_grid_factor > 0, "kill grid factor must be at least 1");
        let k = settings.kill_grid_factor;
        let occupancy = Grid2::new(base_width, base_height);
        let clusters = Clusters::new(base_width, base_height, settings.cluster_subdivision);
        info!(
            "[FLOXELS] Pool of {} on a {}x{} maze (cluster x{}, kill grid x{})",
            settings.capacity, base_width, base_height, settings.cluster_subdivision, k
        );
        Self {
            settings,
            tuning,
            base_width,
            base_height,
            pool: vec![Floxel::default(); settings.capacity],
            map: PopulationMap::default(),
            counts: [0; 2],
            held: [0; 2],
            last_counts: [0; 2],
            occupancy: [occupancy.clone(), occupancy],
            clusters: [clusters.clone(), clusters],
            // One extra row and column absorbs the random sub-cell offset.
            kill_grid: Grid2::new(base_width * k + 1, base_height * k + 1),
            kill_touched: Vec::new(),
            targets: FxHashSet::default(),
            face_cursor: 0,
            pull: None,
        }
    }

    pub fn settings(&self) -> &FloxelSettings {
        &self.settings
    }

    pub fn tuning(&self) -> &FloxelTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: FloxelTuning) {
        self.tuning = tuning;
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    pub fn population_map(&self) -> PopulationMap {
        self.map
    }

    pub fn count(&self, population: Population) -> u32 {
        self.counts[self.map.slot(population)]
    }

    /// Particles of `population` parked outside the simulation by a capture.
    pub fn held(&self, population: Population) -> u32 {
        self.held[self.map.slot(population)]
    }

    pub fn active_total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn held_total(&self) -> u32 {
        self.held.iter().sum()
    }

    /// Capacity not claimed by active or held particles.
    pub fn free_capacity(&self) -> u32 {
        (self.settings.capacity as u32).saturating_sub(self.active_total() + self.held_total())
    }

    pub fn floxels(&self) -> &[Floxel] {
        &self.pool
    }

    pub fn iter_active(&self) -> impl Iterator<Item = FloxelView> + '_ {
        self.pool.iter().filter(|f| f.state.is_active()).map(Floxel::view)
    }

    /// Per-base-cell particle counts of `population` from the last tick.
    pub fn occupancy(&self, population: Population) -> &Grid2<u16> {
        &self.occupancy[self.map.slot(population)]
    }

    pub fn pull_zone(&self) -> Option<PullZone> {
        self.pull
    }

    pub fn set_pull_zone(&mut self, zone: Option<PullZone>) {
        self.pull = zone;
    }

    fn domain_limit(&self) -> Vec2 {
        Vec2::new(
            self.base_width as f32 - POSITION_EPSILON,
            self.base_height as f32 - POSITION_EPSILON,
        )
    }

    fn check_capacity(&self) {
        debug_assert!(
            (self.active_total() + self.held_total()) as usize <= self.settings.capacity,
            "pool overcommitted: {} active + {} held > {}",
            self.active_total(),
            self.held_total(),
            self.settings.capacity
        );
    }

    // ------------------------------------------------------------------------
    // Pool operations
    // ------------------------------------------------------------------------

    fn spawn<R: Rng + ?Sized>(&mut self, population: Population, center: Vec2, radius: f32, count: u32, rng: &mut R) -> u32 {
        let slot = self.map.slot(population);
        let limit = self.domain_limit();
        let faces = self.tuning.face_count.max(1);
        let mut spawned = 0;
        for floxel in self.pool.iter_mut().filter(|f| !f.state.is_active()) {
            if spawned == count {
                break;
            }
            let angle = rng.random::<f32>() * TAU;
            let dist = rng.random::<f32>().sqrt() * radius;
            *floxel = Floxel {
                pos: (center + Vec2::from_angle(angle) * dist).clamp(Vec2::ZERO, limit),
                state: FloxelState::Normal,
                population,
                face: rng.random_range(0..faces),
                ..default()
            };
            spawned += 1;
        }
        self.counts[slot] += spawned;
        spawned
    }

    /// Create up to `count` new particles from free capacity inside a disc.
    pub fn summon<R: Rng + ?Sized>(&mut self, population: Population, center: Vec2, radius: f32, count: u32, rng: &mut R) -> u32 {
        let available = self.free_capacity();
        if count > available {
            warn!("[FLOXELS] Summon of {count} {population:?} clamped to {available} free slots");
        }
        let spawned = self.spawn(population, center, radius, count.min(available), rng);
        self.check_capacity();
        spawned
    }

    /// Put up to `count` held particles back into play inside a disc.
    pub fn release<R: Rng + ?Sized>(&mut self, population: Population, center: Vec2, radius: f32, count: u32, rng: &mut R) -> u32 {
        let slot = self.map.slot(population);
        let held = self.held[slot];
        if count > held {
            warn!("[FLOXELS] Release of {count} {population:?} clamped to {held} held");
        }
        let released = self.spawn(population, center, radius, count.min(held), rng);
        self.held[slot] -= released;
        self.check_capacity();
        released
    }

    /// Remove active particles of `population` within `radius` of `center` and hold them.
    pub fn capture(&mut self, population: Population, center: Vec2, radius: f32) -> u32 {
        let slot = self.map.slot(population);
        let r2 = radius * radius;
        let mut captured = 0;
        for floxel in &mut self.pool {
            if floxel.population == population
                && floxel.state.is_combatant()
                && floxel.pos.distance_squared(center) <= r2
            {
                *floxel = Floxel::default();
                captured += 1;
            }
        }
        self.counts[slot] -= captured;
        self.held[slot] += captured;
        self.check_capacity();
        debug!("[FLOXELS] Captured {captured} {population:?} at {center}");
        captured
    }

    /// Stun every fighting particle within `radius` of `center`.
    pub fn stun_area<R: Rng + ?Sized>(&mut self, center: Vec2, radius: f32, rng: &mut R) -> u32 {
        let r2 = radius * radius;
        let plateau = self.tuning.stun_plateau_ticks;
        let wake_min = self.tuning.stun_wake_min;
        let wake_max = self.tuning.stun_wake_max.max(wake_min);
        let mut stunned = 0;
        for floxel in &mut self.pool {
            if !floxel.state.is_combatant() || floxel.pos.distance_squared(center) > r2 {
                continue;
            }
            let wake = rng.random_range(wake_min..=wake_max);
            floxel.state = FloxelState::Stunned;
            floxel.stun_wake = wake;
            floxel.timer = plateau.saturating_add(wake).max(1);
            stunned += 1;
        }
        stunned
    }

    /// Exchange the two populations' identities.
    ///
    /// Every particle changes type and the slot mapping swaps, so each slot's
    /// flow, counts and occupancy now belong to the other population.
    pub fn switch_populations(&mut self) {
        self.map.swap();
        for floxel in self.pool.iter_mut().filter(|f| f.state.is_active()) {
            floxel.population = floxel.population.other();
        }
        if let Some(zone) = &mut self.pull {
            zone.population = zone.population.other();
        }
        info!(
            "[FLOXELS] Populations switched: {} / {}",
            self.count(Population::Zero),
            self.count(Population::One)
        );
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance the pool by one tick. `flows` is indexed by slot and must
    /// already hold this tick's solution.
    pub fn tick<R: Rng + ?Sized>(&mut self, flows: &mut [Flow; 2], boundary: &dyn BoundaryField, rng: &mut R) -> TickReport {
        let mut report = TickReport::default();

        self.advance_states();
        self.integrate(flows, boundary, rng);

        let offset = Vec2::new(rng.random::<f32>(), rng.random::<f32>());
        report.splats = self.fight_floxels(offset);

        self.recount();
        for (flow, occupancy) in flows.iter_mut().zip(&self.occupancy) {
            flow.update_desired_levels(occupancy);
        }

        self.cluster(boundary);
        self.rotate_faces(rng);
        self.emit_sources(flows);

        for population in Population::ALL {
            let slot = self.map.slot(population);
            report.counts[population.index()] = self.counts[slot];
            if self.last_counts[slot] > 0 && self.counts[slot] == 0 {
                info!("[FLOXELS] Population {population:?} destroyed");
                report.destroyed.push(population);
            }
        }
        self.last_counts = self.counts;
        report
    }

    fn advance_states(&mut self) {
        for floxel in &mut self.pool {
            match floxel.state {
                FloxelState::Unused | FloxelState::Normal => {}
                FloxelState::Splatted => {
                    floxel.timer = floxel.timer.saturating_sub(1);
                    if floxel.timer == 0 {
                        let winner = floxel.population.other();
                        self.counts[self.map.slot(floxel.population)] -= 1;
                        self.counts[self.map.slot(winner)] += 1;
                        floxel.population = winner;
                        floxel.state = FloxelState::Normal;
                    }
                }
                FloxelState::Stunned => {
                    floxel.timer = floxel.timer.saturating_sub(1);
                    if floxel.timer == 0 {
                        floxel.state = FloxelState::Normal;
                        floxel.stun_wake = 0;
                    }
                }
                FloxelState::Reclaimed => {
                    floxel.timer = floxel.timer.saturating_sub(1);
                    if floxel.timer == 0 {
                        self.counts[self.map.slot(floxel.population)] -= 1;
                        *floxel = Floxel::default();
                    }
                }
            }
        }
    }

    fn integrate<R: Rng + ?Sized>(&mut self, flows: &[Flow; 2], boundary: &dyn BoundaryField, rng: &mut R) {
        let dt = self.settings.tick_seconds;
        let limit = self.domain_limit();
        let nudge = self.tuning.nudge.abs();
        self.targets.clear();

        for floxel in self.pool.iter_mut().filter(|f| f.state.is_active()) {
            floxel.pulled = self
                .pull
                .is_some_and(|zone| zone.population == floxel.population && zone.contains(floxel.pos));

            let slowdown = floxel.slowdown();
            if slowdown > 0.0 {
                let flow = &flows[self.map.slot(floxel.population)];
                let velocity = flow.velocity(floxel.pos)
                    * self.tuning.velocity_factor[floxel.population.index()]
                    * slowdown;
                let mut step = velocity.clamp_length_max(self.tuning.max_speed) * dt;
                if floxel.needs_nudge {
                    step += Vec2::new(rng.random_range(-nudge..=nudge), rng.random_range(-nudge..=nudge));
                    floxel.needs_nudge = false;
                }
                floxel.pos = move_within(boundary, floxel.pos, step, floxel.pulled, limit);
            }

            if !self.targets.insert((floxel.pos.x.to_bits(), floxel.pos.y.to_bits())) {
                floxel.needs_nudge = true;
            }
        }
    }

    /// Resolve combat on the kill grid, shifted by `offset` kill cells (each in `[0, 1)`).
    ///
    /// Each cell records its strongest fighter as `±(score + 1)`, positive for
    /// [`Population::Zero`]; the first fighter keeps the cell on equal strength.
    /// Opponents strictly weaker than the record are splatted, so equal
    /// strengths (two loners at score 0 included) never convert each other.
    /// Returns the number of splats.
    pub fn fight_floxels(&mut self, offset: Vec2) -> u32 {
        let grid = self.kill_grid.as_mut_slice();
        for idx in self.kill_touched.drain(..) {
            grid[idx] = 0;
        }
        let k = self.settings.kill_grid_factor as f32;
        let (kw, kh) = (self.kill_grid.width(), self.kill_grid.height());
        let cell = |pos: Vec2| {
            let x = ((pos.x * k + offset.x).max(0.0) as usize).min(kw - 1);
            let y = ((pos.y * k + offset.y).max(0.0) as usize).min(kh - 1);
            y * kw + x
        };

        let grid = self.kill_grid.as_mut_slice();
        for floxel in self.pool.iter().filter(|f| f.state.is_combatant()) {
            let idx = cell(floxel.pos);
            let strength = floxel.cluster_score as i16 + 1;
            let signed = match floxel.population {
                Population::Zero => strength,
                Population::One => -strength,
            };
            let recorded = &mut grid[idx];
            if *recorded == 0 {
                self.kill_touched.push(idx);
                *recorded = signed;
            } else if strength > recorded.abs() {
                *recorded = signed;
            }
        }

        let splat_ticks = self.tuning.splat_ticks.max(1);
        let mut splats = 0;
        for floxel in self.pool.iter_mut().filter(|f| f.state.is_combatant()) {
            let recorded = grid[cell(floxel.pos)];
            let attacker = match recorded.signum() {
                1 => Population::Zero,
                -1 => Population::One,
                _ => continue,
            };
            if attacker != floxel.population && (floxel.cluster_score as i16 + 1) < recorded.abs() {
                floxel.state = FloxelState::Splatted;
                floxel.timer = splat_ticks;
                floxel.stun_wake = 0;
                splats += 1;
            }
        }
        splats
    }

    fn recount(&mut self) {
        for grid in &mut self.occupancy {
            grid.fill(0);
        }
        let mut counts = [0u32; 2];
        let (w, h) = (self.base_width, self.base_height);
        for floxel in self.pool.iter().filter(|f| f.state.is_active()) {
            let slot = self.map.slot(floxel.population);
            counts[slot] += 1;
            let x = (floxel.pos.x.max(0.0) as usize).min(w - 1);
            let y = (floxel.pos.y.max(0.0) as usize).min(h - 1);
            let cell = &mut self.occupancy[slot][(x, y)];
            *cell = cell.saturating_add(1);
        }
        debug_assert_eq!(counts, self.counts, "population counts drifted from the pool");
        self.counts = counts;
    }

    fn cluster(&mut self, boundary: &dyn BoundaryField) {
        for clusters in &mut self.clusters {
            clusters.reset();
        }
        for floxel in self.pool.iter().filter(|f| f.state.is_combatant()) {
            self.clusters[self.map.slot(floxel.population)].add_point(floxel.pos);
        }
        for clusters in &mut self.clusters {
            clusters.build(boundary);
        }

        let shades = self.tuning.shade_count.max(1) as u32;
        for floxel in self.pool.iter_mut().filter(|f| f.state.is_combatant()) {
            let target = self.clusters[self.map.slot(floxel.population)].score_at(floxel.pos);
            floxel.cluster_score = match floxel.cluster_score.cmp(&target) {
                std::cmp::Ordering::Less => floxel.cluster_score + 1,
                std::cmp::Ordering::Greater => floxel.cluster_score - 1,
                std::cmp::Ordering::Equal => target,
            };
            floxel.shade = (floxel.cluster_score as u32 * shades / (MAX_SCORE as u32 + 1)) as u8;
        }
    }

    fn rotate_faces<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let faces = self.tuning.face_count;
        if faces <= 1 || self.pool.is_empty() {
            return;
        }
        for _ in 0..self.tuning.face_batch.min(self.pool.len()) {
            let floxel = &mut self.pool[self.face_cursor];
            if floxel.state.is_active() {
                floxel.face = rng.random_range(0..faces);
            }
            self.face_cursor = (self.face_cursor + 1) % self.pool.len();
        }
    }

    /// Replace every slot's source with this tick's particle contributions.
    fn emit_sources(&self, flows: &mut [Flow; 2]) {
        for flow in flows.iter_mut() {
            flow.clear_source();
        }
        let tuning = &self.tuning;
        for floxel in self.pool.iter().filter(|f| f.state.is_combatant()) {
            let own = &mut flows[self.map.slot(floxel.population)];
            let block = 1usize << own.max_level().saturating_sub(self.settings.intention_level);
            let (fx, fy) = own.fine_cell(floxel.pos);
            let (bx, by) = (fx / block * block, fy / block * block);
            let spread = -tuning.attraction / (block * block) as f32;
            let source = own.source_mut();
            for y in by..by + block {
                for x in bx..bx + block {
                    source[(x, y)] += spread;
                }
            }
            source[(fx, fy)] += tuning.repulsion;

            // Opponents close in on loners and back away from crowds.
            let s = floxel.cluster_score as f32 / MAX_SCORE as f32;
            let pressure = tuning.flee * s - tuning.hunt * (1.0 - s);
            let opposing = &mut flows[self.map.slot(floxel.population.other())];
            let (ox, oy) = opposing.fine_cell(floxel.pos);
            opposing.source_mut()[(ox, oy)] += pressure;
        }
    }
}

/// Move from `pos` by `step`, refusing any axis step that crosses a closed wall.
fn move_within(boundary: &dyn BoundaryField, pos: Vec2, step: Vec2, ignore_walls: bool, limit: Vec2) -> Vec2 {
    let target = (pos + step.clamp_length_max(MAX_CELL_STEP)).clamp(Vec2::ZERO, limit);
    if ignore_walls {
        return target;
    }
    let (cx, cy) = (pos.x as usize, pos.y as usize);
    let mut next = pos;

    let tx = target.x as usize;
    let x_dir = if tx > cx { Direction::East } else { Direction::West };
    if tx == cx || boundary.wall_open(cx, cy, x_dir) {
        next.x = target.x;
    }

    let nx = next.x as usize;
    let ty = target.y as usize;
    let y_dir = if ty > cy { Direction::South } else { Direction::North };
    if ty == cy || boundary.wall_open(nx, cy, y_dir) {
        next.y = target.y;
    }
    next
}
