// src/layout/archetypes.rs
//! Block archetypes and their construction procedures.
//!
//! Each archetype maps to a plain function through an exhaustive `match`, so a
//! new variant does not compile until it has a builder. Procedures draw every
//! dimension and material from the world stream in a fixed order, and the
//! [`BlockBuilder`] clamps whatever they emit back inside the block.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::blocks::Block;
use super::scatter::{scatter_park, scatter_plaza};
use crate::world::core::{MaterialHint, PieceKind, PlacedPiece};
use crate::world::random::SeededStream;
use crate::world::settings::ScatterSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Empty,
    LowRise,
    MidRise,
    HighRise,
    Industrial,
    Plaza,
    Park,
}

impl Archetype {
    pub const ALL: [Archetype; 7] = [
        Archetype::Empty,
        Archetype::LowRise,
        Archetype::MidRise,
        Archetype::HighRise,
        Archetype::Industrial,
        Archetype::Plaza,
        Archetype::Park,
    ];

    /// Total height range used when the weight table gives none.
    pub fn default_height(self) -> HeightRange {
        match self {
            Archetype::LowRise => HeightRange::new(8.0, 15.0),
            Archetype::MidRise => HeightRange::new(20.0, 30.0),
            Archetype::HighRise => HeightRange::new(50.0, 120.0),
            Archetype::Industrial => HeightRange::new(6.0, 10.0),
            Archetype::Empty | Archetype::Plaza | Archetype::Park => HeightRange::new(0.0, 0.0),
        }
    }

    /// Open spaces sit on the regular block centre; buildings use the jittered one.
    pub fn uses_grid_center(self) -> bool {
        matches!(self, Archetype::Plaza | Archetype::Park)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: f32,
    pub max: f32,
}

impl HeightRange {
    pub const fn new(min: f32, max: f32) -> Self { Self { min, max } }

    pub fn sample(&self, stream: &mut SeededStream) -> f32 {
        stream.range(self.min, self.max)
    }
}

/// Inputs every construction procedure receives.
#[derive(Clone, Copy, Debug)]
pub struct BuildParams {
    /// Where the structure stands (jittered or grid centre, see [`Archetype::uses_grid_center`]).
    pub anchor: Vec2,
    /// Block side length.
    pub size: f32,
    pub height: HeightRange,
}

pub type BuildFn = fn(&mut BlockBuilder<'_>, &BuildParams);
pub type ScatterFn = fn(&mut BlockBuilder<'_>, &BuildParams, &ScatterSettings);

/// Construction procedure for the structures of a block.
pub fn structure_builder(archetype: Archetype) -> BuildFn {
    match archetype {
        Archetype::Empty => build_empty,
        Archetype::LowRise => build_low_rise,
        Archetype::MidRise => build_mid_rise,
        Archetype::HighRise => build_high_rise,
        Archetype::Industrial => build_industrial,
        Archetype::Plaza => build_plaza,
        Archetype::Park => build_park,
    }
}

/// Secondary decoration pass; only open spaces get one.
pub fn scatter_builder(archetype: Archetype) -> Option<ScatterFn> {
    match archetype {
        Archetype::Plaza => Some(scatter_plaza),
        Archetype::Park => Some(scatter_park),
        Archetype::Empty
        | Archetype::LowRise
        | Archetype::MidRise
        | Archetype::HighRise
        | Archetype::Industrial => None,
    }
}

// ---------- Builder ----------

/// Collects the boxes of one block and keeps them inside it.
pub struct BlockBuilder<'a> {
    stream: &'a mut SeededStream,
    min: Vec2,
    max: Vec2,
    pieces: Vec<PlacedPiece>,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(stream: &'a mut SeededStream, block: &Block) -> Self {
        Self { stream, min: block.min(), max: block.max(), pieces: Vec::new() }
    }

    #[inline]
    pub fn stream(&mut self) -> &mut SeededStream { self.stream }

    /// Colliding structural box.
    pub fn solid(&mut self, at: Vec3, size: Vec3, material: MaterialHint) {
        self.piece(at, size, material, PieceKind::Structure, true);
    }

    /// Visual-only structural box (no rigid body).
    pub fn visual(&mut self, at: Vec3, size: Vec3, material: MaterialHint) {
        self.piece(at, size, material, PieceKind::Structure, false);
    }

    pub fn piece(&mut self, at: Vec3, size: Vec3, material: MaterialHint, kind: PieceKind, collides: bool) {
        let piece = PlacedPiece::boxed(at, size, material, kind, collides);
        if !piece.is_degenerate() {
            self.pieces.push(piece);
        }
    }

    /// Emitted boxes, each shrunk and shifted as needed to stay inside the block.
    pub fn finish(self) -> Vec<PlacedPiece> {
        let (min, max) = (self.min, self.max);
        self.pieces.into_iter().map(|p| clamp_into(p, min, max)).collect()
    }
}

fn clamp_into(mut piece: PlacedPiece, min: Vec2, max: Vec2) -> PlacedPiece {
    let fp = &mut piece.footprint;
    fp.half_width = fp.half_width.min((max.x - min.x) * 0.5);
    fp.half_depth = fp.half_depth.min((max.y - min.y) * 0.5);
    fp.x = fp.x.clamp(min.x + fp.half_width, max.x - fp.half_width);
    fp.z = fp.z.clamp(min.y + fp.half_depth, max.y - fp.half_depth);
    piece
}

#[inline]
fn at(anchor: Vec2, base_y: f32) -> Vec3 { Vec3::new(anchor.x, base_y, anchor.y) }

#[inline]
fn square(side: f32, height: f32) -> Vec3 { Vec3::new(side, height, side) }

fn pick(stream: &mut SeededStream, pool: &[MaterialHint]) -> MaterialHint {
    stream.pick(pool).unwrap_or(MaterialHint::Concrete)
}

/// Sub-centimetre offset that keeps coplanar faces of neighbouring boxes apart.
fn nudge(stream: &mut SeededStream, anchor: Vec2) -> Vec2 {
    let dx = stream.centered() * 0.01;
    let dz = stream.centered() * 0.01;
    anchor + Vec2::new(dx, dz)
}

// ---------- Procedures ----------

fn build_empty(_: &mut BlockBuilder<'_>, _: &BuildParams) {}

/// Glass storefront (the only collider), solid upper floors, thin roof.
fn build_low_rise(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    let s = b.stream();
    let total = p.height.sample(s);
    let side = p.size * 0.8 * s.range(0.6, 1.0);
    let walls = pick(s, &[MaterialHint::Brick, MaterialHint::WarmConcrete, MaterialHint::Concrete]);

    const STOREFRONT: f32 = 3.0;
    b.solid(at(p.anchor, 0.0), square(side, STOREFRONT), MaterialHint::Storefront);
    let upper = total - STOREFRONT;
    if upper > 0.0 {
        b.visual(at(p.anchor, STOREFRONT), square(side * 0.9, upper), walls);
    }
    b.visual(at(p.anchor, total), square(side * 0.85, 1.0), MaterialHint::Roof);
}

/// Wide plinth, tower, cap and an optional side strip.
fn build_mid_rise(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    let s = b.stream();
    let total = p.height.sample(s);
    let side = p.size * 0.8 * s.range(0.7, 1.0);
    let c = nudge(s, p.anchor);
    let facade = pick(
        s,
        &[MaterialHint::Glass, MaterialHint::WarmConcrete, MaterialHint::Concrete, MaterialHint::Brick],
    );

    const PLINTH: f32 = 3.0;
    const CAP: f32 = 2.0;
    b.solid(at(c, 0.0), square(side * 1.1, PLINTH), MaterialHint::Concrete);
    let tower = total - PLINTH - CAP;
    b.visual(at(c, PLINTH), square(side, tower), facade);
    b.visual(at(c, total - CAP), square(side * 0.9, CAP), MaterialHint::Roof);

    if b.stream().above(0.5) {
        let strip = Vec3::new(side * 0.08, tower, side * 0.1);
        b.visual(at(c + Vec2::new(side * 0.48, 0.0), PLINTH), strip, MaterialHint::Roof);
    }
}

/// Tapering tower on a tall plinth, machine room, antenna and facade strip.
fn build_high_rise(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    let s = b.stream();
    let total = p.height.sample(s);
    let side = p.size * 0.8 * s.range(0.5, 0.8);
    let c = nudge(s, p.anchor);
    let facade = pick(s, &[MaterialHint::Glass, MaterialHint::WarmConcrete, MaterialHint::Concrete]);

    let plinth = b.stream().range(5.0, 8.0);
    b.solid(at(c, 0.0), square(side * 1.2, plinth), MaterialHint::Concrete);

    let tower = total - plinth - 6.0;
    let mut y = plinth;
    if total > 80.0 {
        for (share, scale) in [(0.4, 1.0), (0.35, 0.85), (0.25, 0.7)] {
            let h = tower * share;
            b.visual(at(c, y), square(side * scale, h), facade);
            y += h;
        }
        if b.stream().above(0.5) {
            let strip = Vec3::new(side * 0.1, tower * 0.3, side * 0.1);
            b.visual(at(c + Vec2::new(side * 0.4, 0.0), plinth + tower * 0.35), strip, MaterialHint::Roof);
        }
    } else {
        for (share, scale) in [(0.6, 1.0), (0.4, 0.8)] {
            let h = tower * share;
            b.visual(at(c, y), square(side * scale, h), facade);
            y += h;
        }
    }

    let machine_room = b.stream().range(4.0, 6.0);
    b.visual(at(c, y), square(side * 0.5, machine_room), MaterialHint::Roof);
    y += machine_room;

    if total > 90.0 {
        let antenna = b.stream().range(8.0, 20.0);
        b.visual(at(c, y), square(1.0, antenna), MaterialHint::Metal);
    } else if b.stream().above(0.5) {
        b.visual(at(c, y), square(1.0, 4.0), MaterialHint::Metal);
    }

    if facade == MaterialHint::Glass && b.stream().above(0.4) {
        let strip = Vec3::new(side * 0.15, tower * 0.7, side * 0.1);
        b.visual(at(c + Vec2::new(side * 0.35, 0.0), plinth), strip, MaterialHint::Storefront);
    }
}

/// Long low shed with a metal roof and a door on the front wall. Everything collides.
fn build_industrial(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    let s = b.stream();
    let reach = p.size * 0.8;
    let length = reach * s.range(0.8, 1.0);
    let width = reach * s.range(0.4, 0.6);
    let wall = p.height.sample(s);
    let along_x = s.above(0.5);

    let (body, roof) = if along_x {
        (Vec3::new(length, wall, width), Vec3::new(length, 2.0, width * 1.1))
    } else {
        (Vec3::new(width, wall, length), Vec3::new(width * 1.1, 2.0, length))
    };
    b.solid(at(p.anchor, 0.0), body, MaterialHint::Concrete);
    b.solid(at(p.anchor, wall), roof, MaterialHint::Roof);

    const DOOR_WIDTH: f32 = 3.0;
    const DOOR_DEPTH: f32 = 0.5;
    let door_height = wall * 0.7;
    let push = width * 0.5 + DOOR_DEPTH * 0.5;
    let (offset, door) = if along_x {
        (Vec2::new(0.0, push), Vec3::new(DOOR_WIDTH, door_height, DOOR_DEPTH))
    } else {
        (Vec2::new(push, 0.0), Vec3::new(DOOR_DEPTH, door_height, DOOR_WIDTH))
    };
    b.solid(at(p.anchor + offset, 0.0), door, MaterialHint::Metal);
}

/// Paved square with a monument or a fountain in the middle.
fn build_plaza(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    let s = b.stream();
    let plaza = p.size * 0.9;
    let paving = pick(s, &[MaterialHint::Brick, MaterialHint::Industrial]);
    b.solid(at(p.anchor, 0.0), square(plaza, 0.2), paving);

    if b.stream().next_f32() < 0.5 {
        let base = plaza * 0.25;
        let pillar = base * 0.35;
        b.solid(at(p.anchor, 0.0), square(base, 0.6), MaterialHint::Concrete);
        let pillar_mat = pick(
            b.stream(),
            &[MaterialHint::Brick, MaterialHint::WarmConcrete, MaterialHint::Metal],
        );
        b.solid(at(p.anchor, 0.6), square(pillar, 7.0), pillar_mat);
        b.solid(at(p.anchor, 7.6), square(pillar * 0.65, 3.0), MaterialHint::Roof);
    } else {
        let basin = plaza * 0.35;
        b.solid(at(p.anchor, 0.0), square(basin, 0.6), MaterialHint::Concrete);
        b.solid(at(p.anchor, 0.5), square(basin * 0.8, 0.12), MaterialHint::Water);
    }
}

fn build_park(b: &mut BlockBuilder<'_>, p: &BuildParams) {
    b.solid(at(p.anchor, 0.0), square(p.size * 0.9, 0.2), MaterialHint::Grass);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Block {
        Block {
            grid_x: 0,
            grid_z: 0,
            center: Vec2::ZERO,
            jittered: Vec2::new(4.0, -4.0),
            size: 40.0,
            archetype: Archetype::MidRise,
            safe_zone: false,
        }
    }

    fn build(archetype: Archetype, seed: u64) -> Vec<PlacedPiece> {
        let mut stream = SeededStream::new(seed);
        let mut blk = block();
        blk.archetype = archetype;
        let params = BuildParams {
            anchor: blk.anchor(),
            size: blk.size,
            height: archetype.default_height(),
        };
        let mut b = BlockBuilder::new(&mut stream, &blk);
        structure_builder(archetype)(&mut b, &params);
        b.finish()
    }

    #[test]
    fn every_archetype_has_a_builder() {
        for archetype in Archetype::ALL {
            let pieces = build(archetype, 11);
            assert_eq!(pieces.is_empty(), archetype == Archetype::Empty, "{archetype:?}");
        }
    }

    #[test]
    fn buildings_keep_one_colliding_base() {
        for archetype in [Archetype::LowRise, Archetype::MidRise, Archetype::HighRise] {
            for seed in 0..20 {
                let pieces = build(archetype, seed);
                let colliders = pieces.iter().filter(|p| p.collides).count();
                assert_eq!(colliders, 1, "{archetype:?} seed {seed}");
                assert!(pieces.len() > colliders);
            }
        }
    }

    #[test]
    fn pieces_never_leave_their_block() {
        let blk = block();
        for archetype in Archetype::ALL {
            for seed in 0..50 {
                for p in build(archetype, seed) {
                    let (min, max) = (p.footprint.min(), p.footprint.max());
                    assert!(min.x >= blk.min().x - 1e-3 && min.y >= blk.min().y - 1e-3, "{archetype:?}");
                    assert!(max.x <= blk.max().x + 1e-3 && max.y <= blk.max().y + 1e-3, "{archetype:?}");
                }
            }
        }
    }

    #[test]
    fn heights_follow_the_range() {
        for seed in 0..30 {
            let pieces = build(Archetype::LowRise, seed);
            let top = pieces.iter().map(|p| p.base_y + p.footprint.height).fold(0.0, f32::max);
            // roof slab sits on top of the total height
            assert!((9.0..=16.0).contains(&top), "{top}");
        }
    }

    #[test]
    fn construction_is_deterministic() {
        for archetype in Archetype::ALL {
            assert_eq!(build(archetype, 5), build(archetype, 5));
        }
    }

    #[test]
    fn only_open_spaces_scatter() {
        for archetype in Archetype::ALL {
            assert_eq!(scatter_builder(archetype).is_some(), archetype.uses_grid_center());
        }
    }
}
