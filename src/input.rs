use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::{keyboard::KeyCode, ButtonInput};
use bevy::prelude::*;

use gridlock::plugin::{RebuildCity, TrackedAgent};
use gridlock::CityWorld;

use crate::actions::{ActionState, PlayerAction};
use crate::setup::MainCamera;

pub const WALK_SPEED: f32 = 12.0;
pub const SPRINT_SPEED: f32 = 40.0;
pub const ROTATE_SPEED: f32 = 0.2;
pub const MAX_CAMERA_DT: f32 = 0.05; // never use a dt larger than 50ms
/// Side of the square probed against static geometry when the player moves.
pub const PLAYER_PROBE: f32 = 1.0;

#[derive(Component)]
pub struct CameraOrbit {
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
}

pub fn input_mapping_system(keys: Res<ButtonInput<KeyCode>>, mut action_state: ResMut<ActionState>) {
    let bind = [
        (PlayerAction::MoveForward, KeyCode::KeyW),
        (PlayerAction::MoveBackward, KeyCode::KeyS),
        (PlayerAction::MoveLeft, KeyCode::KeyA),
        (PlayerAction::MoveRight, KeyCode::KeyD),
        (PlayerAction::Sprint, KeyCode::ShiftLeft),
        (PlayerAction::Rebuild, KeyCode::KeyR),
    ];
    for (action, key) in bind {
        action_state.set(action, keys.pressed(key), keys.just_pressed(key));
    }
}

pub fn request_rebuild(action_state: Res<ActionState>, mut requests: EventWriter<RebuildCity>) {
    if action_state.just_pressed(PlayerAction::Rebuild) {
        requests.write(RebuildCity { seed: None });
    }
}

/// Camera-relative WASD movement, sliding along whatever static geometry blocks the way.
pub fn move_player(
    time: Res<Time>,
    action_state: Res<ActionState>,
    world: Option<Res<CityWorld>>,
    cam_q: Query<&CameraOrbit, With<MainCamera>>,
    mut player_q: Query<&mut Transform, With<TrackedAgent>>,
) {
    let Some(world) = world else { return; };
    let Ok(orbit) = cam_q.single() else { return; };
    let Ok(mut tf) = player_q.single_mut() else { return; };

    let forward = Vec2::new(-orbit.yaw.cos(), -orbit.yaw.sin());
    let right = Vec2::new(-forward.y, forward.x);

    let mut dir = Vec2::ZERO;
    if action_state.pressed(PlayerAction::MoveForward) { dir += forward; }
    if action_state.pressed(PlayerAction::MoveBackward) { dir -= forward; }
    if action_state.pressed(PlayerAction::MoveLeft) { dir -= right; }
    if action_state.pressed(PlayerAction::MoveRight) { dir += right; }
    if dir == Vec2::ZERO { return; }

    let speed = if action_state.pressed(PlayerAction::Sprint) { SPRINT_SPEED } else { WALK_SPEED };
    let delta = dir.normalize() * speed * time.delta_secs().min(MAX_CAMERA_DT);
    let from = Vec2::new(tf.translation.x, tf.translation.z);
    let blocked = |p: Vec2| world.check_static_collision(p.x, p.y, PLAYER_PROBE, PLAYER_PROBE, None);

    // full step, then each axis on its own
    let to = [from + delta, from + Vec2::new(delta.x, 0.0), from + Vec2::new(0.0, delta.y)]
        .into_iter()
        .find(|&p| !blocked(p));
    if let Some(to) = to {
        tf.translation.x = to.x;
        tf.translation.z = to.y;
    }
}

pub fn camera_controller(
    time: Res<Time>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut motion_evr: EventReader<MouseMotion>,
    mut scroll_evr: EventReader<MouseWheel>,
    player_q: Query<&Transform, (With<TrackedAgent>, Without<MainCamera>)>,
    mut query: Query<(&mut Transform, &mut CameraOrbit), With<MainCamera>>,
) {
    let dt = time.delta_secs().min(MAX_CAMERA_DT);
    let Ok((mut tf, mut orbit)) = query.single_mut() else { return; };
    let focus = player_q.single().map(|p| p.translation).unwrap_or(Vec3::ZERO);

    for ev in scroll_evr.read() {
        let amount = match ev.unit {
            MouseScrollUnit::Line => ev.y * 2.0,
            MouseScrollUnit::Pixel => ev.y * 0.04,
        };
        orbit.radius = (orbit.radius - amount).clamp(5.0, 600.0);
    }

    if mouse_buttons.pressed(MouseButton::Middle) || mouse_buttons.pressed(MouseButton::Right) {
        for ev in motion_evr.read() {
            orbit.yaw += ev.delta.x * ROTATE_SPEED * dt;
            orbit.pitch += ev.delta.y * ROTATE_SPEED * dt;
        }
    } else {
        motion_evr.clear();
    }
    orbit.pitch = orbit.pitch.clamp(0.05, std::f32::consts::FRAC_PI_2 - 0.01);

    let xz_radius = orbit.radius * orbit.pitch.cos();
    let offset = Vec3::new(
        xz_radius * orbit.yaw.cos(),
        orbit.radius * orbit.pitch.sin(),
        xz_radius * orbit.yaw.sin(),
    );
    tf.translation = focus + offset;
    tf.look_at(focus, Vec3::Y);
}
