use bevy::prelude::*;

use gridlock::plugin::{CityAgent, CityBuilt, TrackedAgent};

use crate::input::CameraOrbit;

#[derive(Component)]
pub struct MainCamera;

/// The player entity: tracked by the activation sweep and indexed like any agent.
#[derive(Component)]
pub struct Player;

const PLAYER_HEIGHT: f32 = 1.8;

pub fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // 1) Light
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            illuminance: 10_000.0,
            ..default()
        },
        Transform::from_xyz(80.0, 200.0, 40.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // 2) Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-30.0, 30.0, 30.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
        CameraOrbit {
            radius: 40.0,
            yaw: 0.0,
            pitch: 0.6,
        },
    ));

    // 3) Player
    commands.spawn((
        Player,
        TrackedAgent,
        CityAgent { half_extent: 0.5, height: PLAYER_HEIGHT },
        Mesh3d(meshes.add(Capsule3d::new(0.4, PLAYER_HEIGHT - 0.8))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.9, 0.75, 0.2),
            ..default()
        })),
        Transform::from_xyz(0.0, PLAYER_HEIGHT * 0.5, 0.0),
    ));
}

/// Drop the player on the spawn chosen by each build.
pub fn place_player_on_built(
    mut built: EventReader<CityBuilt>,
    mut player_q: Query<&mut Transform, With<Player>>,
) {
    let Some(ev) = built.read().last() else { return; };
    let Ok(mut tf) = player_q.single_mut() else { return; };
    tf.translation = Vec3::new(ev.player_spawn.x, PLAYER_HEIGHT * 0.5, ev.player_spawn.y);
    info!("Player placed at ({:.1}, {:.1}) in city {}", ev.player_spawn.x, ev.player_spawn.y, ev.seed.0);
}
