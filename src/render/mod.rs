// src/render/mod.rs
//! Bevy render glue: one cuboid entity per static object, visibility and
//! shadow casting driven by the ops the activation sweep queues.

use bevy::pbr::NotShadowCaster;
use bevy::prelude::*;
use std::collections::HashMap;

use crate::activation::{RenderOp, RenderQueue};
use crate::plugin::{CityBuilt, CitySet};
use crate::world::core::{MaterialHint, ObjectId, WorldObject};
use crate::world::CityWorld;

/// Tag on each spawned city box (stable identity until the next rebuild).
#[derive(Component, Debug, Clone, Copy)]
pub struct CityPiece(pub ObjectId);

/// Object id -> entity for the current build.
#[derive(Resource, Default, Debug)]
pub struct PieceEntities(pub HashMap<ObjectId, Entity>);

/// One unit cube shared by every piece, plus one material per hint.
#[derive(Resource)]
pub struct PieceAssets {
    pub cube: Handle<Mesh>,
    pub materials: HashMap<MaterialHint, Handle<StandardMaterial>>,
}

pub struct CityRenderPlugin;
impl Plugin for CityRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PieceEntities>()
            .add_systems(Startup, init_piece_assets)
            .add_systems(
                Update,
                (spawn_city_pieces, apply_render_ops)
                    .chain()
                    .after(CitySet::Sweep)
                    .run_if(resource_exists::<CityWorld>),
            );
    }
}

fn base_color(hint: MaterialHint) -> Color {
    match hint {
        MaterialHint::Ground => Color::srgb(0.30, 0.31, 0.29),
        MaterialHint::Road => Color::srgb(0.18, 0.18, 0.19),
        MaterialHint::Storefront => Color::srgb(0.55, 0.70, 0.80),
        MaterialHint::Brick => Color::srgb(0.55, 0.27, 0.20),
        MaterialHint::WarmConcrete => Color::srgb(0.72, 0.66, 0.58),
        MaterialHint::Concrete => Color::srgb(0.60, 0.60, 0.60),
        MaterialHint::Glass => Color::srgb(0.45, 0.60, 0.72),
        MaterialHint::Metal => Color::srgb(0.50, 0.52, 0.55),
        MaterialHint::Roof => Color::srgb(0.25, 0.25, 0.28),
        MaterialHint::Industrial => Color::srgb(0.48, 0.45, 0.40),
        MaterialHint::Residential => Color::srgb(0.78, 0.70, 0.58),
        MaterialHint::Commercial => Color::srgb(0.62, 0.68, 0.75),
        MaterialHint::Water => Color::srgb(0.20, 0.40, 0.65),
        MaterialHint::Grass => Color::srgb(0.25, 0.50, 0.22),
        MaterialHint::Bark => Color::srgb(0.36, 0.25, 0.15),
        MaterialHint::Foliage => Color::srgb(0.18, 0.42, 0.16),
        MaterialHint::Wood => Color::srgb(0.55, 0.40, 0.24),
    }
}

const ALL_HINTS: [MaterialHint; 17] = [
    MaterialHint::Ground,
    MaterialHint::Road,
    MaterialHint::Storefront,
    MaterialHint::Brick,
    MaterialHint::WarmConcrete,
    MaterialHint::Concrete,
    MaterialHint::Glass,
    MaterialHint::Metal,
    MaterialHint::Roof,
    MaterialHint::Industrial,
    MaterialHint::Residential,
    MaterialHint::Commercial,
    MaterialHint::Water,
    MaterialHint::Grass,
    MaterialHint::Bark,
    MaterialHint::Foliage,
    MaterialHint::Wood,
];

fn init_piece_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let cube = meshes.add(Cuboid::new(1.0, 1.0, 1.0));
    let materials = ALL_HINTS
        .into_iter()
        .map(|hint| {
            let glossy = matches!(hint, MaterialHint::Glass | MaterialHint::Water | MaterialHint::Metal);
            let handle = materials.add(StandardMaterial {
                base_color: base_color(hint),
                perceptual_roughness: if glossy { 0.2 } else { 0.9 },
                ..Default::default()
            });
            (hint, handle)
        })
        .collect();
    commands.insert_resource(PieceAssets { cube, materials });
}

fn piece_transform(object: &WorldObject) -> Transform {
    let fp = &object.footprint;
    Transform::from_xyz(fp.x, object.base_y + fp.height * 0.5, fp.z)
        .with_scale(Vec3::new(fp.width(), fp.height, fp.depth()))
}

/// On every build: drop the previous city's entities and spawn the new one.
/// Spawned state already reflects any sweep that ran this frame, so pending ops are stale.
fn spawn_city_pieces(
    mut built: EventReader<CityBuilt>,
    world: Res<CityWorld>,
    assets: Option<Res<PieceAssets>>,
    old: Query<Entity, With<CityPiece>>,
    mut entities: ResMut<PieceEntities>,
    mut queue: ResMut<RenderQueue>,
    mut commands: Commands,
) {
    if built.read().last().is_none() { return; }
    let Some(assets) = assets else {
        warn!("Render: piece assets missing; city stays invisible");
        return;
    };

    for e in &old {
        commands.entity(e).try_despawn();
    }
    entities.0.clear();
    queue.ops.clear();

    let arena = world.arena();
    for &id in arena.static_ids() {
        let Some(object) = arena.get(id) else { continue; };
        let material = assets.materials.get(&object.material).cloned().unwrap_or_default();
        let visibility = if object.activation.render { Visibility::Inherited } else { Visibility::Hidden };
        let mut e = commands.spawn((
            CityPiece(id),
            Mesh3d(assets.cube.clone()),
            MeshMaterial3d(material),
            piece_transform(object),
            visibility,
        ));
        if !object.activation.shadow {
            e.insert(NotShadowCaster);
        }
        entities.0.insert(id, e.id());
    }
    info!("Render: spawned {} city pieces", entities.0.len());
}

/// Drain the sweep's queued visibility and shadow changes.
fn apply_render_ops(
    mut queue: ResMut<RenderQueue>,
    entities: Res<PieceEntities>,
    mut vis_q: Query<&mut Visibility, With<CityPiece>>,
    mut commands: Commands,
) {
    for op in queue.ops.drain(..) {
        let id = match op {
            RenderOp::Show(id) | RenderOp::Hide(id) | RenderOp::Shadows(id, _) => id,
        };
        let Some(&e) = entities.0.get(&id) else { continue; };
        match op {
            RenderOp::Show(_) | RenderOp::Hide(_) => {
                if let Ok(mut vis) = vis_q.get_mut(e) {
                    let next = if matches!(op, RenderOp::Show(_)) { Visibility::Inherited } else { Visibility::Hidden };
                    vis.set_if_neq(next);
                }
            }
            RenderOp::Shadows(_, true) => {
                commands.entity(e).try_remove::<NotShadowCaster>();
            }
            RenderOp::Shadows(_, false) => {
                commands.entity(e).try_insert(NotShadowCaster);
            }
        }
    }
}
