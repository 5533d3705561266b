// src/layout/scatter.rs
//! Secondary decoration for open spaces: benches on a ring, trees and bushes
//! from the Poisson sampler, one crate per park.

use bevy::math::{Vec2, Vec3};
use std::f32::consts::TAU;

use super::archetypes::{BlockBuilder, BuildParams};
use crate::placement::poisson::PoissonDiskSampler;
use crate::world::core::{MaterialHint, PieceKind};
use crate::world::settings::ScatterSettings;

/// Which way a bench's seat faces, in quarter turns from +Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    /// Rotate a local offset and box extents into world orientation.
    fn apply(self, local: Vec3, size: Vec3) -> (Vec3, Vec3) {
        let swapped = Vec3::new(size.z, size.y, size.x);
        match self {
            Facing::North => (local, size),
            Facing::East => (Vec3::new(local.z, local.y, -local.x), swapped),
            Facing::South => (Vec3::new(-local.x, local.y, -local.z), size),
            Facing::West => (Vec3::new(-local.z, local.y, local.x), swapped),
        }
    }

    /// Facing towards (`inward`) or away from a centre, from the dominant axis of `offset`.
    fn relative_to(offset: Vec2, inward: bool) -> Self {
        let away = if offset.x.abs() > offset.y.abs() {
            if offset.x > 0.0 { Facing::East } else { Facing::West }
        } else if offset.y > 0.0 {
            Facing::North
        } else {
            Facing::South
        };
        if inward { away.opposite() } else { away }
    }

    fn opposite(self) -> Self {
        match self {
            Facing::North => Facing::South,
            Facing::East => Facing::West,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
        }
    }
}

const BENCH_LENGTH: f32 = 2.2;
const BENCH_WIDTH: f32 = 0.6;
const SEAT_HEIGHT: f32 = 0.5;
const BACK_HEIGHT: f32 = 0.8;

/// Seat, backrest and four legs.
pub fn bench(b: &mut BlockBuilder<'_>, at: Vec2, facing: Facing, material: MaterialHint) {
    let seat = SEAT_HEIGHT * 0.3;
    let leg = 0.12;
    let lx = BENCH_LENGTH * 0.5 - 0.2;
    let lz = BENCH_WIDTH * 0.5 - 0.2;

    let parts = [
        (Vec3::new(0.0, SEAT_HEIGHT - seat * 0.5, 0.0), Vec3::new(BENCH_LENGTH, seat, BENCH_WIDTH)),
        (
            Vec3::new(0.0, SEAT_HEIGHT, -BENCH_WIDTH * 0.3),
            Vec3::new(BENCH_LENGTH, BACK_HEIGHT, BENCH_WIDTH * 0.2),
        ),
        (Vec3::new(-lx, 0.0, lz), Vec3::new(leg, SEAT_HEIGHT, leg)),
        (Vec3::new(lx, 0.0, lz), Vec3::new(leg, SEAT_HEIGHT, leg)),
        (Vec3::new(-lx, 0.0, -lz), Vec3::new(leg, SEAT_HEIGHT, leg)),
        (Vec3::new(lx, 0.0, -lz), Vec3::new(leg, SEAT_HEIGHT, leg)),
    ];
    for (local, size) in parts {
        let (offset, size) = facing.apply(local, size);
        let world = Vec3::new(at.x + offset.x, offset.y, at.y + offset.z);
        b.piece(world, size, material, PieceKind::Decoration, true);
    }
}

pub fn tree(b: &mut BlockBuilder<'_>, at: Vec2) {
    b.piece(Vec3::new(at.x, 0.0, at.y), Vec3::new(0.5, 4.0, 0.5), MaterialHint::Bark, PieceKind::Decoration, true);
    b.piece(Vec3::new(at.x, 3.5, at.y), Vec3::splat(2.0), MaterialHint::Foliage, PieceKind::Decoration, true);
}

/// Main mass plus one offset lump.
pub fn bush(b: &mut BlockBuilder<'_>, at: Vec2) {
    let s = b.stream();
    let w = s.range(1.5, 2.5);
    let d = s.range(1.5, 2.5);
    let h = s.range(1.2, 2.0);
    let ox = s.centered() * w * 0.3;
    let oz = s.centered() * d * 0.3;

    b.piece(Vec3::new(at.x, 0.0, at.y), Vec3::new(w, h, d), MaterialHint::Foliage, PieceKind::Decoration, true);
    b.piece(
        Vec3::new(at.x + ox, h * 0.45, at.y + oz),
        Vec3::new(w * 0.6, h * 0.5, d * 0.6),
        MaterialHint::Foliage,
        PieceKind::Decoration,
        true,
    );
}

/// 2 to 4 benches on a ring at 30-40 % of `extent`, kept clear of the edge.
fn bench_ring(b: &mut BlockBuilder<'_>, center: Vec2, extent: f32, inward: bool, material: MaterialHint) {
    let count = b.stream().int(2, 3);
    let inner = extent * 0.3;
    let outer = (extent * 0.4).min(extent * 0.5 - BENCH_LENGTH * 0.5 - 0.1);
    for _ in 0..count {
        let s = b.stream();
        let radius = s.range(inner, outer.max(inner));
        let angle = s.next_f32() * TAU;
        let offset = Vec2::from_angle(angle) * radius;
        bench(b, center + offset, Facing::relative_to(offset, inward), material);
    }
}

pub fn scatter_plaza(b: &mut BlockBuilder<'_>, p: &BuildParams, _: &ScatterSettings) {
    bench_ring(b, p.anchor, p.size * 0.9, false, MaterialHint::Metal);
}

pub fn scatter_park(b: &mut BlockBuilder<'_>, p: &BuildParams, scatter: &ScatterSettings) {
    let park = p.size * 0.9;
    let s = b.stream();
    let trees = s.int(1, 4) as usize;
    let bushes = if s.above(0.6) { s.int(1, 3) as usize } else { 0 };

    // trees claim the earliest samples, which grow outward from the middle
    let mut sampler = PoissonDiskSampler::new(
        p.anchor,
        Vec2::splat(park * 0.2),
        scatter.min_distance.max(2.0),
        scatter.attempts,
    );
    let mut spots = Vec::with_capacity(trees + bushes);
    while spots.len() < trees + bushes {
        match sampler.sample(b.stream()) {
            Some(spot) => spots.push(spot),
            None => break,
        }
    }
    for (i, spot) in spots.into_iter().enumerate() {
        if i < trees { tree(b, spot) } else { bush(b, spot) }
    }

    bench_ring(b, p.anchor, park, true, MaterialHint::Wood);

    let crate_at = p.anchor + Vec2::new(park * 0.15, 0.0);
    b.piece(
        Vec3::new(crate_at.x, 0.0, crate_at.y),
        Vec3::new(1.0, 0.8, 1.0),
        MaterialHint::Wood,
        PieceKind::Container,
        true,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::archetypes::{Archetype, HeightRange};
    use crate::layout::blocks::Block;
    use crate::world::core::PlacedPiece;
    use crate::world::random::SeededStream;

    fn park_block() -> Block {
        Block {
            grid_x: 0,
            grid_z: 0,
            center: Vec2::new(100.0, -50.0),
            jittered: Vec2::new(103.0, -52.0),
            size: 40.0,
            archetype: Archetype::Park,
            safe_zone: false,
        }
    }

    fn run(f: fn(&mut BlockBuilder<'_>, &BuildParams, &ScatterSettings), seed: u64) -> Vec<PlacedPiece> {
        let blk = park_block();
        let mut stream = SeededStream::new(seed);
        let params = BuildParams { anchor: blk.anchor(), size: blk.size, height: HeightRange::new(0.0, 0.0) };
        let mut b = BlockBuilder::new(&mut stream, &blk);
        f(&mut b, &params, &ScatterSettings::default());
        b.finish()
    }

    #[test]
    fn rotated_benches_swap_extents() {
        let (off, size) = Facing::East.apply(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.2, 0.5, 0.6));
        assert_eq!(off, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(size, Vec3::new(0.6, 0.5, 2.2));
        let (off, size) = Facing::South.apply(Vec3::new(1.0, 0.0, 2.0), Vec3::new(2.2, 0.5, 0.6));
        assert_eq!(off, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(size, Vec3::new(2.2, 0.5, 0.6));
    }

    #[test]
    fn benches_face_the_centre_in_parks() {
        assert_eq!(Facing::relative_to(Vec2::new(5.0, 1.0), true), Facing::West);
        assert_eq!(Facing::relative_to(Vec2::new(-5.0, 1.0), true), Facing::East);
        assert_eq!(Facing::relative_to(Vec2::new(0.0, 5.0), true), Facing::South);
        assert_eq!(Facing::relative_to(Vec2::new(0.0, -5.0), false), Facing::South);
    }

    #[test]
    fn park_gets_trees_benches_and_a_crate() {
        for seed in 0..20 {
            let pieces = run(scatter_park, seed);
            let trunks = pieces.iter().filter(|p| p.material == MaterialHint::Bark).count();
            let crates = pieces.iter().filter(|p| p.kind == PieceKind::Container).count();
            let bench_parts = pieces.iter().filter(|p| p.material == MaterialHint::Wood).count() - crates;
            assert!((1..=4).contains(&trunks), "seed {seed}: {trunks}");
            assert_eq!(crates, 1);
            assert!(bench_parts % 6 == 0 && (12..=24).contains(&bench_parts), "{bench_parts}");
        }
    }

    #[test]
    fn park_trees_keep_their_distance() {
        for seed in 0..20 {
            let trunks: Vec<Vec2> = run(scatter_park, seed)
                .iter()
                .filter(|p| p.material == MaterialHint::Bark)
                .map(|p| p.footprint.center())
                .collect();
            for (i, a) in trunks.iter().enumerate() {
                for b in &trunks[i + 1..] {
                    assert!(a.distance(*b) >= 3.0 - 1e-4);
                }
            }
        }
    }

    #[test]
    fn plaza_benches_are_metal() {
        let pieces = run(scatter_plaza, 3);
        assert!(pieces.len() >= 12);
        assert!(pieces.iter().all(|p| p.material == MaterialHint::Metal && p.kind == PieceKind::Decoration));
    }
}
