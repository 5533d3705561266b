//! Demo agents: spawned on the preselected ring around the player, shuffling
//! towards them, cleared on every rebuild.

use bevy::prelude::*;

use gridlock::plugin::{CityAgent, CityBuilt, TrackedAgent};
use gridlock::CityWorld;

#[derive(Component)]
pub struct DemoAgent;

#[derive(Resource)]
pub struct AgentSpawner {
    pub timer: Timer,
    pub max_agents: usize,
    pub speed: f32,
}

impl Default for AgentSpawner {
    fn default() -> Self {
        Self { timer: Timer::from_seconds(0.5, TimerMode::Repeating), max_agents: 100, speed: 3.0 }
    }
}

#[derive(Resource)]
pub struct AgentAssets {
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

pub fn init_agent_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(AgentAssets {
        mesh: meshes.add(Cuboid::new(1.0, 1.8, 1.0)),
        material: materials.add(StandardMaterial { base_color: Color::srgb(0.75, 0.15, 0.15), ..default() }),
    });
}

pub fn spawn_agents(
    time: Res<Time>,
    mut spawner: ResMut<AgentSpawner>,
    world: Option<ResMut<CityWorld>>,
    assets: Option<Res<AgentAssets>>,
    player_q: Query<&Transform, With<TrackedAgent>>,
    agents: Query<(), With<DemoAgent>>,
    mut commands: Commands,
) {
    if !spawner.timer.tick(time.delta()).just_finished() { return; }
    let (Some(mut world), Some(assets)) = (world, assets) else { return; };
    if agents.iter().count() >= spawner.max_agents { return; }
    let Ok(player) = player_q.single() else { return; };

    let Some(at) = world.take_agent_spawn(Vec2::new(player.translation.x, player.translation.z)) else {
        debug!("Agents: spawn pool is empty");
        return;
    };
    commands.spawn((
        DemoAgent,
        CityAgent::default(),
        Mesh3d(assets.mesh.clone()),
        MeshMaterial3d(assets.material.clone()),
        Transform::from_xyz(at.x, 0.9, at.y),
    ));
}

pub fn move_agents(
    time: Res<Time>,
    spawner: Res<AgentSpawner>,
    world: Option<Res<CityWorld>>,
    player_q: Query<&Transform, (With<TrackedAgent>, Without<DemoAgent>)>,
    mut agents: Query<&mut Transform, With<DemoAgent>>,
) {
    let Some(world) = world else { return; };
    let Ok(player) = player_q.single() else { return; };
    let target = Vec2::new(player.translation.x, player.translation.z);
    let step = spawner.speed * time.delta_secs();

    for mut tf in &mut agents {
        let from = Vec2::new(tf.translation.x, tf.translation.z);
        let to = from + (target - from).normalize_or_zero() * step;
        if from.distance_squared(target) > 4.0 && !world.check_static_collision(to.x, to.y, 1.0, 1.0, None) {
            tf.translation.x = to.x;
            tf.translation.z = to.y;
        }
    }
}

pub fn despawn_agents_on_built(
    mut built: EventReader<CityBuilt>,
    agents: Query<Entity, With<DemoAgent>>,
    mut commands: Commands,
) {
    if built.read().last().is_none() { return; }
    for e in &agents {
        commands.entity(e).despawn();
    }
}
