/// Simulation layer: drives [`FloxelWorld`] on the fixed timestep.
///
/// This module is organized into:
/// - **resources**: tick counter, runtime config, last tick report
/// - **events**: command messages in, population notifications out
/// - **systems**: startup, hot reload and the per-tick stages

use bevy::prelude::*;

use crate::game::config::GameConfigHandle;
use crate::game::world::FloxelWorld;

pub mod events;
pub mod resources;
pub mod systems;

pub use events::*;
pub use resources::*;

/// Stages of one tick, run in this order.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SimSet {
    Input,   // Queued commands
    Morph,   // At most one wall change
    Effects, // External source contributors
    Solve,   // One V-cycle per population
    Step,    // Particle update and fresh sources
    Report,  // Notifications and status
}

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(30.0));

        app.init_resource::<SimTick>();
        app.init_resource::<SimConfig>();
        app.init_resource::<LastTickReport>();

        app.add_message::<SummonFloxels>();
        app.add_message::<ReleaseFloxels>();
        app.add_message::<CaptureFloxels>();
        app.add_message::<TriggerExplosion>();
        app.add_message::<SetPull>();
        app.add_message::<SetCursor>();
        app.add_message::<SwitchPopulations>();
        app.add_message::<BeginMorph>();
        app.add_message::<PopulationDestroyed>();

        app.configure_sets(
            FixedUpdate,
            (
                SimSet::Input,
                SimSet::Morph,
                SimSet::Effects,
                SimSet::Solve,
                SimSet::Step,
                SimSet::Report,
            )
                .chain()
                .run_if(resource_exists::<FloxelWorld>),
        );

        app.add_systems(Startup, systems::init_sim_from_initial);

        app.add_systems(
            Update,
            systems::update_sim_from_runtime_config.run_if(resource_exists::<GameConfigHandle>),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::increment_sim_tick
                    .before(SimSet::Input)
                    .run_if(resource_exists::<FloxelWorld>),
                systems::process_commands.in_set(SimSet::Input),
                systems::step_morph.in_set(SimSet::Morph),
                systems::apply_effects.in_set(SimSet::Effects),
                systems::solve_flows.in_set(SimSet::Solve),
                systems::step_floxels.in_set(SimSet::Step),
                systems::report_tick.in_set(SimSet::Report),
            ),
        );
    }
}
