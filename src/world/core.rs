// src/world/core.rs
//! Core types shared by the grid, the generator and the activation sweep.
//! Keep this file dependency-light; everything else in the crate builds on it.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

// ---------- Seeds, ids, handles ----------

/// Global world seed; changing this reshuffles the whole city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(pub u64);

/// Index of an object in the [`ObjectArena`]. Valid until the next rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    #[inline]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// Integer cell coordinate in the spatial grid (XZ).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub x: i32,
    pub z: i32,
}

impl CellKey {
    pub const fn new(x: i32, z: i32) -> Self { Self { x, z } }
}

/// Opaque handle issued by the physics service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

// ---------- Footprints ----------

/// Axis-aligned footprint on the XZ plane plus a height. Extents are halves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub x: f32,
    pub z: f32,
    pub half_width: f32,
    pub half_depth: f32,
    pub height: f32,
}

impl Footprint {
    pub const fn new(x: f32, z: f32, half_width: f32, half_depth: f32, height: f32) -> Self {
        Self { x, z, half_width, half_depth, height }
    }

    /// Build from full extents, the way boxes are authored.
    pub fn from_extents(x: f32, z: f32, width: f32, depth: f32, height: f32) -> Self {
        Self::new(x, z, width * 0.5, depth * 0.5, height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 { Vec2::new(self.x, self.z) }
    #[inline]
    pub fn min(&self) -> Vec2 { Vec2::new(self.x - self.half_width, self.z - self.half_depth) }
    #[inline]
    pub fn max(&self) -> Vec2 { Vec2::new(self.x + self.half_width, self.z + self.half_depth) }
    #[inline]
    pub fn width(&self) -> f32 { self.half_width * 2.0 }
    #[inline]
    pub fn depth(&self) -> f32 { self.half_depth * 2.0 }

    /// Strict overlap on XZ; touching edges do not count.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        (self.x - other.x).abs() < self.half_width + other.half_width
            && (self.z - other.z).abs() < self.half_depth + other.half_depth
    }

    pub fn with_center(self, x: f32, z: f32) -> Self { Self { x, z, ..self } }

    /// Squared planar distance from the footprint center to `p`.
    #[inline]
    pub fn distance_squared(&self, p: Vec2) -> f32 { self.center().distance_squared(p) }
}

// ---------- Object classification ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    Static,
    Dynamic,
}

/// Flags owned by the activation sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActivationState {
    pub physics: bool,
    pub render: bool,
    pub shadow: bool,
    pub query: bool,
}

impl ActivationState {
    pub const ALL: Self = Self { physics: true, render: true, shadow: true, query: true };

    /// Freshly built static geometry: drawn and casting shadows, not yet simulated.
    pub const VISIBLE: Self = Self { physics: false, render: true, shadow: true, query: false };
}

/// Surface hint carried through to rendering. Pools of these are drawn per archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialHint {
    Ground,
    Road,
    Storefront,
    Brick,
    WarmConcrete,
    Concrete,
    Glass,
    Metal,
    Roof,
    Industrial,
    Residential,
    Commercial,
    Water,
    Grass,
    Bark,
    Foliage,
    Wood,
}

/// What a box stands for; used by render glue and stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Ground,
    Road,
    Structure,
    Decoration,
    Container,
    Wall,
    Cover,
    Agent,
}

/// One box emitted by generation. Plain data; no engine state attached yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedPiece {
    pub footprint: Footprint,
    /// World Y of the bottom face.
    pub base_y: f32,
    pub material: MaterialHint,
    pub kind: PieceKind,
    /// Gets a static rigid body.
    pub collides: bool,
    /// Never deactivated by distance (roads, ground).
    pub always_active: bool,
}

impl PlacedPiece {
    /// Box standing on `at.y`, centred on `at.x`/`at.z`. `size` holds full extents.
    pub fn boxed(at: Vec3, size: Vec3, material: MaterialHint, kind: PieceKind, collides: bool) -> Self {
        Self {
            footprint: Footprint::from_extents(at.x, at.z, size.x, size.z, size.y),
            base_y: at.y,
            material,
            kind,
            collides,
            always_active: false,
        }
    }

    pub fn always_active(mut self) -> Self {
        self.always_active = true;
        self
    }

    /// Full extents (width, height, depth).
    pub fn size(&self) -> Vec3 {
        Vec3::new(self.footprint.width(), self.footprint.height, self.footprint.depth())
    }

    /// Zero or negative extents never make it into the world.
    pub fn is_degenerate(&self) -> bool {
        let smallest = self.size().min_element();
        smallest <= 0.0 || smallest.is_nan()
    }
}

/// Fixed-layout record for every object known to the world.
#[derive(Clone, Debug)]
pub struct WorldObject {
    pub footprint: Footprint,
    pub base_y: f32,
    pub classification: Classification,
    pub kind: PieceKind,
    pub material: MaterialHint,
    pub activation: ActivationState,
    pub always_active: bool,
    pub body: Option<BodyHandle>,
    /// Cells this object is recorded in; kept equal to the cells its footprint covers.
    pub cells: Vec<CellKey>,
    /// Registration time in seconds (dynamic objects only).
    pub registered_at: f32,
}

impl WorldObject {
    pub fn from_piece(piece: &PlacedPiece) -> Self {
        Self {
            footprint: piece.footprint,
            base_y: piece.base_y,
            classification: Classification::Static,
            kind: piece.kind,
            material: piece.material,
            activation: if piece.always_active { ActivationState::ALL } else { ActivationState::VISIBLE },
            always_active: piece.always_active,
            body: None,
            cells: Vec::new(),
            registered_at: 0.0,
        }
    }

    pub fn dynamic(footprint: Footprint, body: Option<BodyHandle>, now: f32) -> Self {
        Self {
            footprint,
            base_y: 0.0,
            classification: Classification::Dynamic,
            kind: PieceKind::Agent,
            material: MaterialHint::Metal,
            activation: ActivationState { physics: body.is_some(), ..ActivationState::ALL },
            always_active: false,
            body,
            cells: Vec::new(),
            registered_at: now,
        }
    }

    #[inline]
    pub fn is_static(&self) -> bool { self.classification == Classification::Static }
}

// ---------- Arena ----------

/// Contiguous object storage indexed by [`ObjectId`].
/// Removal leaves a tombstone so ids never shift; `clear` invalidates every id at once.
#[derive(Default, Clone, Debug)]
pub struct ObjectArena {
    slots: Vec<Option<WorldObject>>,
    statics: Vec<ObjectId>,
    dynamics: Vec<ObjectId>,
}

impl ObjectArena {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, object: WorldObject) -> ObjectId {
        let id = ObjectId(self.slots.len() as u32);
        match object.classification {
            Classification::Static => self.statics.push(id),
            Classification::Dynamic => self.dynamics.push(id),
        }
        self.slots.push(Some(object));
        id
    }

    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<WorldObject> {
        let object = self.slots.get_mut(id.index())?.take()?;
        let order = match object.classification {
            Classification::Static => &mut self.statics,
            Classification::Dynamic => &mut self.dynamics,
        };
        if let Some(i) = order.iter().position(|&o| o == id) {
            order.remove(i);
        }
        Some(object)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.statics.clear();
        self.dynamics.clear();
    }

    /// Static ids in insertion order; the activation cursor walks this.
    pub fn static_ids(&self) -> &[ObjectId] { &self.statics }
    pub fn dynamic_ids(&self) -> &[ObjectId] { &self.dynamics }

    /// Live objects.
    pub fn len(&self) -> usize { self.statics.len() + self.dynamics.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &WorldObject)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|o| (ObjectId(i as u32), o)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(x: f32, z: f32) -> PlacedPiece {
        PlacedPiece {
            footprint: Footprint::from_extents(x, z, 2.0, 2.0, 3.0),
            base_y: 0.0,
            material: MaterialHint::Concrete,
            kind: PieceKind::Structure,
            collides: true,
            always_active: false,
        }
    }

    #[test]
    fn touching_footprints_do_not_overlap() {
        let a = Footprint::from_extents(0.0, 0.0, 2.0, 2.0, 1.0);
        let b = Footprint::from_extents(2.0, 0.0, 2.0, 2.0, 1.0);
        let c = Footprint::from_extents(1.9, 0.5, 2.0, 2.0, 1.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn arena_keeps_ids_stable_across_removal() {
        let mut arena = ObjectArena::new();
        let a = arena.push(WorldObject::from_piece(&piece(0.0, 0.0)));
        let b = arena.push(WorldObject::from_piece(&piece(5.0, 0.0)));
        let d = arena.push(WorldObject::dynamic(Footprint::new(1.0, 1.0, 0.5, 0.5, 2.0), None, 0.0));

        assert!(arena.remove(a).is_some());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|o| o.footprint.x), Some(5.0));
        assert_eq!(arena.static_ids(), &[b]);
        assert_eq!(arena.dynamic_ids(), &[d]);
        assert_eq!(arena.len(), 2);
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn always_active_pieces_start_fully_active() {
        let mut p = piece(0.0, 0.0);
        p.always_active = true;
        assert_eq!(WorldObject::from_piece(&p).activation, ActivationState::ALL);
        assert_eq!(WorldObject::from_piece(&piece(0.0, 0.0)).activation, ActivationState::VISIBLE);
    }
}
