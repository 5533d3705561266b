//! City plugin wiring (glue).
//! - Build at Startup from `CitySettings`
//! - Rebuild requests
//! - Agent registration with the grid
//! - Activation sweep around the tracked agent

use bevy::prelude::*;
use std::collections::HashMap;

use crate::activation::{BodyTable, RenderQueue};
use crate::world::core::{BodyHandle, Footprint, ObjectId, WorldSeed};
use crate::world::random::random_seed;
use crate::world::settings::{CitySettings, LayoutSource};
use crate::world::CityWorld;

/// Ask for a fresh city. `None` draws a random seed.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct RebuildCity {
    pub seed: Option<u64>,
}

/// Fired after every build, startup included.
#[derive(Event, Clone, Copy, Debug)]
pub struct CityBuilt {
    pub seed: WorldSeed,
    pub objects: usize,
    pub player_spawn: Vec2,
}

/// The entity activation radii are measured from (the player).
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct TrackedAgent;

/// A moving actor indexed as a dynamic object.
#[derive(Component, Debug, Clone, Copy)]
pub struct CityAgent {
    pub half_extent: f32,
    pub height: f32,
}

impl Default for CityAgent {
    fn default() -> Self {
        Self { half_extent: 0.5, height: 1.8 }
    }
}

/// Set once an agent is registered with the current city.
#[derive(Component, Debug, Clone, Copy)]
pub struct AgentHandle {
    pub object: ObjectId,
    pub body: BodyHandle,
}

/// Entity -> object id for agents, so despawned agents can be unregistered.
#[derive(Resource, Default, Debug)]
pub struct AgentIndex(pub HashMap<Entity, ObjectId>);

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum CitySet {
    Rebuild,
    Agents,
    Sweep,
}

pub struct CityPlugin;
impl Plugin for CityPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CitySettings>()
            .init_resource::<BodyTable>()
            .init_resource::<RenderQueue>()
            .init_resource::<AgentIndex>()
            .add_event::<RebuildCity>()
            .add_event::<CityBuilt>()
            .configure_sets(
                Update,
                (CitySet::Rebuild, CitySet::Agents, CitySet::Sweep)
                    .chain()
                    .run_if(resource_exists::<CityWorld>),
            )
            .add_systems(Startup, build_city)
            .add_systems(Update, handle_rebuild_requests.in_set(CitySet::Rebuild))
            .add_systems(
                Update,
                (register_agents, sync_agents, unregister_agents).chain().in_set(CitySet::Agents),
            )
            .add_systems(Update, sweep_activation.in_set(CitySet::Sweep));
    }
}

/// Startup: resolve the map, build, announce.
fn build_city(
    mut commands: Commands,
    settings: Res<CitySettings>,
    mut bodies: ResMut<BodyTable>,
    mut built: EventWriter<CityBuilt>,
) {
    let source = settings.map.resolve().unwrap_or_else(|err| {
        warn!("City: map {:?} unusable ({err}); generating procedurally", settings.map);
        LayoutSource::Procedural
    });
    let world = CityWorld::build(settings.clone(), source, settings.seed.resolve(), &mut *bodies);
    built.write(CityBuilt {
        seed: world.seed(),
        objects: world.arena().len(),
        player_spawn: world.player_spawn(),
    });
    commands.insert_resource(world);
}

/// Update: rebuild on request. Registered agents lose their handles and are
/// picked up again by `register_agents`.
fn handle_rebuild_requests(
    mut requests: EventReader<RebuildCity>,
    mut world: ResMut<CityWorld>,
    mut bodies: ResMut<BodyTable>,
    mut index: ResMut<AgentIndex>,
    agents: Query<Entity, With<AgentHandle>>,
    mut commands: Commands,
    mut built: EventWriter<CityBuilt>,
) {
    // several requests in one frame collapse into the last
    let Some(request) = requests.read().last().copied() else { return; };
    let seed = request.seed.map(WorldSeed).unwrap_or_else(random_seed);
    info!("City: rebuilding with seed {}", seed.0);

    world.rebuild(seed, &mut *bodies);
    index.0.clear();
    for e in &agents {
        commands.entity(e).remove::<AgentHandle>();
    }
    built.write(CityBuilt {
        seed: world.seed(),
        objects: world.arena().len(),
        player_spawn: world.player_spawn(),
    });
}

fn agent_footprint(tf: &Transform, agent: &CityAgent) -> Footprint {
    Footprint::new(tf.translation.x, tf.translation.z, agent.half_extent, agent.half_extent, agent.height)
}

fn register_agents(
    time: Res<Time>,
    mut world: ResMut<CityWorld>,
    mut bodies: ResMut<BodyTable>,
    mut index: ResMut<AgentIndex>,
    q: Query<(Entity, &Transform, &CityAgent), Without<AgentHandle>>,
    mut commands: Commands,
) {
    for (e, tf, agent) in &q {
        let footprint = agent_footprint(tf, agent);
        let body = bodies.create_dynamic_body(&footprint);
        let object = world.register_dynamic(footprint, Some(body), time.elapsed_secs());
        index.0.insert(e, object);
        commands.entity(e).insert(AgentHandle { object, body });
    }
}

fn sync_agents(
    mut world: ResMut<CityWorld>,
    mut bodies: ResMut<BodyTable>,
    q: Query<(&Transform, &CityAgent, &AgentHandle), Changed<Transform>>,
) {
    for (tf, agent, handle) in &q {
        world.move_dynamic(handle.object, tf.translation.x, tf.translation.z);
        bodies.sync_footprint(handle.body, &agent_footprint(tf, agent));
    }
}

fn unregister_agents(
    mut removed: RemovedComponents<CityAgent>,
    mut world: ResMut<CityWorld>,
    mut bodies: ResMut<BodyTable>,
    mut index: ResMut<AgentIndex>,
) {
    for e in removed.read() {
        let Some(object) = index.0.remove(&e) else { continue };
        if world.unregister_dynamic(object, &mut *bodies).is_none() {
            debug!("City: agent {e} was not registered with the current city");
        }
    }
}

fn sweep_activation(
    time: Res<Time>,
    tracked: Query<&Transform, With<TrackedAgent>>,
    mut world: ResMut<CityWorld>,
    mut bodies: ResMut<BodyTable>,
    mut queue: ResMut<RenderQueue>,
) {
    let Ok(tf) = tracked.single() else { return; };
    let agent = Vec2::new(tf.translation.x, tf.translation.z);
    world.tick(time.delta_secs(), agent, time.elapsed_secs(), &mut *bodies, &mut *queue);
}
