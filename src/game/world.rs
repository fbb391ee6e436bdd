//! The simulation facade: maze, per-slot flows, particle engine, effects and rng.
//!
//! [`FloxelWorld::tick`] runs the stages in order; the Bevy systems call the
//! stages individually so each lands in its own system set.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game::effects::{Cursor, EffectStack, EffectTuning, Explosion, Pull, SourceContributor, Vent};
use crate::game::floxels::{FloxelSettings, FloxelTuning, Floxels, Population, TickReport};
use crate::game::flow::{Flow, SolverParams};
use crate::game::maze::{Maze, MazeData, MazeMorph, WallChange};

/// Everything needed to build a [`FloxelWorld`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Finest solver level `L`; the fine grid has `2^L` cells per base cell.
    pub max_level: usize,
    pub solver: SolverParams,
    pub floxels: FloxelSettings,
    pub tuning: FloxelTuning,
    pub effects: EffectTuning,
    pub morph_delay_ticks: u32,
    pub seed: u64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            max_level: 2,
            solver: SolverParams::default(),
            floxels: FloxelSettings::default(),
            tuning: FloxelTuning::default(),
            effects: EffectTuning::default(),
            morph_delay_ticks: 2,
            seed: 0,
        }
    }
}

#[derive(Resource)]
pub struct FloxelWorld {
    maze: Maze,
    /// Indexed by slot, see [`crate::game::floxels::PopulationMap`].
    flows: [Flow; 2],
    floxels: Floxels,
    effects: EffectStack,
    effect_tuning: EffectTuning,
    pull: Option<Pull>,
    cursor: Option<Cursor>,
    morph: Option<MazeMorph>,
    morph_delay_ticks: u32,
    rng: StdRng,
}

impl FloxelWorld {
    pub fn new(maze: Maze, settings: WorldSettings) -> Self {
        let flow = Flow::from_boundary(&maze, settings.max_level, settings.solver);
        let floxels = Floxels::new(maze.width(), maze.height(), settings.floxels, settings.tuning);
        info!(
            "[WORLD] {}x{} maze, {} solver levels, seed {}",
            maze.width(),
            maze.height(),
            settings.max_level + 1,
            settings.seed
        );
        Self {
            flows: [flow.clone(), flow],
            maze,
            floxels,
            effects: EffectStack::default(),
            effect_tuning: settings.effects,
            pull: None,
            cursor: None,
            morph: None,
            morph_delay_ticks: settings.morph_delay_ticks,
            rng: StdRng::seed_from_u64(settings.seed),
        }
    }

    /// Rebuild from a loaded snapshot, keeping the snapshot's wall inflow.
    pub fn from_snapshot(data: MazeData, mut settings: WorldSettings) -> Self {
        settings.solver.wall_inflow = data.wall_inflow;
        Self::new(data.maze, settings)
    }

    pub fn snapshot(&self) -> MazeData {
        MazeData::new(self.maze.clone(), self.flows[0].params().wall_inflow)
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn floxels(&self) -> &Floxels {
        &self.floxels
    }

    /// The flow field `population` currently moves along.
    pub fn flow(&self, population: Population) -> &Flow {
        &self.flows[self.floxels.population_map().slot(population)]
    }

    pub fn effects(&self) -> &EffectStack {
        &self.effects
    }

    pub fn effect_tuning(&self) -> &EffectTuning {
        &self.effect_tuning
    }

    pub fn set_tuning(&mut self, tuning: FloxelTuning, effects: EffectTuning) {
        self.floxels.set_tuning(tuning);
        self.effect_tuning = effects;
    }

    pub fn morph(&self) -> Option<&MazeMorph> {
        self.morph.as_ref()
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    /// Run one full tick: morph, effects, solve, step.
    pub fn tick(&mut self) -> TickReport {
        self.step_morph();
        self.apply_effects();
        self.solve();
        self.step()
    }

    /// Apply at most one pending wall change from the running morph.
    pub fn step_morph(&mut self) {
        let Some(morph) = &mut self.morph else {
            return;
        };
        let change = morph.step();
        let done = morph.is_done();
        if let Some(change) = change {
            self.apply_wall_change(change);
        }
        if done {
            info!("[WORLD] Maze morph finished");
            self.morph = None;
        }
    }

    /// Add every external contributor to the sources of this tick.
    pub fn apply_effects(&mut self) {
        let map = self.floxels.population_map();
        for (slot, flow) in self.flows.iter_mut().enumerate() {
            let population = map.population_in(slot);
            let refinement = flow.refinement();
            let source = flow.source_mut();
            self.effects.add_to_source(population, source, refinement);
            if let Some(pull) = &self.pull {
                pull.add_to_source(population, source, refinement);
            }
            if let Some(cursor) = &self.cursor {
                cursor.add_to_source(population, source, refinement);
            }
        }
        self.effects.advance();
    }

    pub fn solve(&mut self) {
        for flow in &mut self.flows {
            flow.solve();
        }
    }

    /// Advance the particles on the freshly solved flows.
    pub fn step(&mut self) -> TickReport {
        self.floxels.set_pull_zone(self.pull.map(|pull| pull.zone));
        self.floxels.tick(&mut self.flows, &self.maze, &mut self.rng)
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn summon(&mut self, population: Population, center: Vec2, radius: f32, count: u32) -> u32 {
        self.floxels.summon(population, center, radius, count, &mut self.rng)
    }

    pub fn release(&mut self, population: Population, center: Vec2, radius: f32, count: u32) -> u32 {
        self.floxels.release(population, center, radius, count, &mut self.rng)
    }

    pub fn capture(&mut self, population: Population, center: Vec2, radius: f32) -> u32 {
        self.floxels.capture(population, center, radius)
    }

    /// Detonate at `center`: stun everything in the blast radius and push
    /// both populations away while the blast fades.
    pub fn trigger_explosion(&mut self, center: Vec2) -> u32 {
        let tuning = &self.effect_tuning;
        let explosion = Explosion::new(center, tuning.explosion_strength, tuning.explosion_radius, tuning.explosion_fade_ticks);
        let stunned = self.floxels.stun_area(center, explosion.radius, &mut self.rng);
        self.effects.push(explosion);
        debug!("[WORLD] Explosion at {center} stunned {stunned}");
        stunned
    }

    /// Start, move or (with `None`) stop the pull zone.
    pub fn set_pull(&mut self, pull: Option<(Population, Vec2, f32)>) {
        self.pull = pull.map(|(population, center, radius)| {
            Pull::new(population, center, radius, self.effect_tuning.pull_strength)
        });
    }

    pub fn set_cursor(&mut self, cursor: Option<(Population, Vec2)>) {
        self.cursor = cursor.map(|(population, pos)| Cursor {
            population,
            pos,
            strength: self.effect_tuning.cursor_strength,
        });
    }

    pub fn add_vent(&mut self, vent: Vent) {
        self.effects.push(vent);
    }

    pub fn switch_populations(&mut self) {
        self.floxels.switch_populations();
        if let Some(pull) = &mut self.pull {
            pull.zone.population = pull.zone.population.other();
        }
    }

    /// Toggle one wall in the maze and both flows. Border edges are ignored.
    pub fn apply_wall_change(&mut self, change: WallChange) -> bool {
        if !self.maze.apply(change) {
            return false;
        }
        for flow in &mut self.flows {
            flow.apply_wall_change(change);
        }
        true
    }

    /// Start morphing toward `target`, replacing any morph in progress.
    pub fn begin_morph(&mut self, target: &Maze) {
        let morph = MazeMorph::new(&self.maze, target, self.morph_delay_ticks, &mut self.rng);
        self.morph = (!morph.is_done()).then_some(morph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::floxels::FloxelState;
    use crate::game::maze::{BoundaryField, Direction};

    fn world(maze: Maze) -> FloxelWorld {
        FloxelWorld::new(maze, WorldSettings { seed: 3, ..Default::default() })
    }

    #[test]
    fn test_morph_reaches_target_one_change_at_a_time() {
        let mut rng = StdRng::seed_from_u64(10);
        let target = Maze::generate(5, 5, 0.2, &mut rng);
        let mut world = world(Maze::open(5, 5));
        world.begin_morph(&target);
        let total = world.morph().map(MazeMorph::remaining).unwrap_or(0);
        assert!(total > 0);

        let mut ticks = 0;
        while world.morph().is_some() {
            let before = world.maze().diff(&target).len();
            world.tick();
            let after = world.maze().diff(&target).len();
            assert!(before - after <= 1, "at most one wall changes per tick");
            ticks += 1;
            assert!(ticks < 10_000, "morph never finished");
        }
        assert_eq!(world.maze(), &target);

        let fresh = Flow::from_boundary(&target, 2, SolverParams::default());
        for y in 0..5 {
            for x in 0..5 {
                for population in Population::ALL {
                    assert_eq!(
                        world.flow(population).block(x, y).boundary,
                        fresh.block(x, y).boundary,
                        "flow boundary at ({x}, {y}) out of sync with the maze"
                    );
                }
            }
        }
    }

    #[test]
    fn test_explosion_stuns_and_repels() {
        let mut world = world(Maze::open(6, 6));
        world.summon(Population::Zero, Vec2::new(3.0, 3.0), 0.5, 20);
        world.summon(Population::One, Vec2::new(0.5, 0.5), 0.2, 5);

        let stunned = world.trigger_explosion(Vec2::new(3.0, 3.0));
        assert_eq!(stunned, 20);
        assert_eq!(world.effects().len(), 1);
        assert!(world
            .floxels()
            .iter_active()
            .filter(|view| view.population == Population::One)
            .all(|view| view.state == FloxelState::Normal));

        world.apply_effects();
        let (fx, fy) = world.flow(Population::One).fine_cell(Vec2::new(3.0, 3.0));
        assert!(world.flow(Population::One).finest().source()[(fx, fy)] > 0.0);
    }

    #[test]
    fn test_wall_change_and_inverse_round_trip_through_world() {
        let mut world = world(Maze::open(4, 4));
        let maze_before = world.maze().clone();
        let blocks_before = world.flow(Population::Zero).blocks().clone();

        let change = WallChange { x: 1, y: 1, dir: Direction::East, open: false };
        assert!(world.apply_wall_change(change));
        assert!(!world.maze().wall_open(2, 1, Direction::West));
        assert!(!world.apply_wall_change(change), "repeating a change is a no-op");

        assert!(world.apply_wall_change(change.inverse()));
        assert_eq!(world.maze(), &maze_before);
        assert_eq!(world.flow(Population::Zero).blocks(), &blocks_before);
        assert_eq!(world.flow(Population::One).blocks(), &blocks_before);
    }

    #[test]
    fn test_flow_follows_population_after_switch() {
        let mut world = world(Maze::open(5, 5));
        world.summon(Population::Zero, Vec2::new(1.0, 1.0), 0.3, 10);
        world.tick();
        let zero_potential = world.flow(Population::Zero).finest().potential().clone();

        world.switch_populations();
        assert_eq!(world.flow(Population::One).finest().potential(), &zero_potential);
        assert_eq!(world.floxels().count(Population::One), 10);
    }

    #[test]
    fn test_pull_and_cursor_feed_their_population_only() {
        let mut world = world(Maze::open(4, 4));
        world.set_pull(Some((Population::One, Vec2::new(2.0, 2.0), 1.0)));
        world.set_cursor(Some((Population::Zero, Vec2::new(0.5, 0.5))));
        world.apply_effects();

        let one = world.flow(Population::One).finest().source();
        let zero = world.flow(Population::Zero).finest().source();
        assert!(one.sum() < 0.0, "pull attracts its own population");
        assert_eq!(zero.sum(), -world.effect_tuning().cursor_strength);

        world.set_pull(None);
        world.step();
        assert!(world.floxels().pull_zone().is_none());
    }

    #[test]
    fn test_snapshot_round_trip_rebuilds_world() {
        let mut rng = StdRng::seed_from_u64(2);
        let maze = Maze::generate(4, 3, 0.0, &mut rng);
        let world = FloxelWorld::new(maze.clone(), WorldSettings::default());
        let rebuilt = FloxelWorld::from_snapshot(world.snapshot(), WorldSettings::default());
        assert_eq!(rebuilt.maze(), &maze);
        assert_eq!(rebuilt.flow(Population::Zero).blocks(), world.flow(Population::Zero).blocks());
    }
}
