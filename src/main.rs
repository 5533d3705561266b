use bevy::prelude::*;

mod actions;
mod agents;
mod input;
mod setup;

use gridlock::plugin::CitySet;
use gridlock::world::settings::DEFAULT_SETTINGS_PATH;
use gridlock::{CityPlugin, CityRenderPlugin, CitySettings};

use actions::ActionState;
use agents::{despawn_agents_on_built, init_agent_assets, move_agents, spawn_agents, AgentSpawner};
use input::{camera_controller, input_mapping_system, move_player, request_rebuild};
use setup::place_player_on_built;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        // settings before the city plugin so its init_resource keeps them
        .insert_resource(CitySettings::load_or_default(DEFAULT_SETTINGS_PATH))
        .add_plugins((CityPlugin, CityRenderPlugin))
        .init_resource::<ActionState>()
        .init_resource::<AgentSpawner>()
        .add_systems(Startup, (setup::setup, init_agent_assets))
        // input -> movement -> camera, all before agents sync with the grid
        .add_systems(
            Update,
            (input_mapping_system, request_rebuild, move_player, move_agents, camera_controller)
                .chain()
                .before(CitySet::Rebuild),
        )
        .add_systems(
            Update,
            (place_player_on_built, despawn_agents_on_built, spawn_agents)
                .chain()
                .after(CitySet::Sweep),
        )
        .run();
}
