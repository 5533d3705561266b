// src/layout/handmade.rs
//! Hand-authored maps (RON). Replaces the block pipeline wholesale: the file
//! lists buildings, surfaces and cover zones directly, and the map carries
//! its own seed for the few random draws it still needs.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use crate::world::core::{MaterialHint, PieceKind, PlacedPiece};
use crate::world::random::SeededStream;
use crate::world::settings::SettingsError;

const WALL_HEIGHT: f32 = 8.0;
const WALL_THICKNESS: f32 = 2.0;
const WALL_INSET: f32 = 5.0;
const GATE_WIDTH: f32 = 12.0;
const OUTSIDE_GROUND: f32 = 30.0;
const SURFACE_HEIGHT: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: f32,
    pub depth: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingUse {
    Residential,
    Commercial,
    Industrial,
    HighRise,
    #[default]
    Generic,
}

impl BuildingUse {
    pub fn material(self) -> MaterialHint {
        match self {
            BuildingUse::Residential => MaterialHint::Residential,
            BuildingUse::Commercial => MaterialHint::Commercial,
            BuildingUse::Industrial => MaterialHint::Industrial,
            BuildingUse::HighRise => MaterialHint::Glass,
            BuildingUse::Generic => MaterialHint::Concrete,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandmadeBuilding {
    pub x: f32,
    pub z: f32,
    #[serde(default = "ten")]
    pub width: f32,
    #[serde(default = "ten")]
    pub depth: f32,
    #[serde(default = "ten")]
    pub height: f32,
    #[serde(default)]
    pub kind: BuildingUse,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadSurface {
    #[default]
    Road,
    Park,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandmadeRoad {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "ten")]
    pub width: f32,
    #[serde(default = "ten")]
    pub depth: f32,
    #[serde(default = "surface_height")]
    pub height: f32,
    #[serde(default)]
    pub surface: RoadSurface,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverType {
    #[default]
    Low,
    Medium,
}

impl CoverType {
    /// (height, side) of one cover box.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            CoverType::Low => (1.2, 2.0),
            CoverType::Medium => (2.5, 3.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverZone {
    pub x: f32,
    pub z: f32,
    pub radius: f32,
    #[serde(default = "cover_density")]
    pub density: f32,
    #[serde(default)]
    pub cover: CoverType,
}

impl CoverZone {
    /// Boxes per zone, one per 100 m² of area at density 1.
    pub fn count(&self) -> usize {
        (self.radius * self.radius * PI * self.density / 100.0).floor().max(0.0) as usize
    }
}

/// A tactical spot that may get a wooden crate, depending on `prop_density`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrateSpot {
    pub x: f32,
    pub z: f32,
}

fn ten() -> f32 { 10.0 }
fn surface_height() -> f32 { SURFACE_HEIGHT }
fn cover_density() -> f32 { 0.3 }
fn prop_density() -> f32 { 0.5 }
fn default_map_seed() -> u64 { 1234 }
fn yes() -> bool { true }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandmadeMap {
    #[serde(default = "default_map_seed")]
    pub seed: u64,
    pub bounds: MapBounds,
    #[serde(default)]
    pub buildings: Vec<HandmadeBuilding>,
    #[serde(default)]
    pub roads: Vec<HandmadeRoad>,
    #[serde(default)]
    pub cover_zones: Vec<CoverZone>,
    #[serde(default)]
    pub crate_spots: Vec<CrateSpot>,
    /// Crate odds per spot are twice this, so 0.5 fills every spot.
    #[serde(default = "prop_density")]
    pub prop_density: f32,
    #[serde(default = "yes")]
    pub boundary_walls: bool,
}

impl HandmadeMap {
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let map: HandmadeMap = ron::de::from_str(text).map_err(|e| SettingsError::Ron(e.to_string()))?;
        map.validate()?;
        Ok(map)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let bad = |field: &'static str, reason: String| Err(SettingsError::Invalid { field, reason });
        let MapBounds { width, depth } = self.bounds;
        if width <= 0.0 || depth <= 0.0 || width.is_nan() || depth.is_nan() {
            return bad("map.bounds", format!("must be positive, got {width} x {depth}"));
        }
        if let Some(z) = self.cover_zones.iter().find(|z| z.radius < 0.0 || z.density < 0.0) {
            return bad("map.cover_zones", format!("zone at ({}, {}) has a negative radius or density", z.x, z.z));
        }
        if self.prop_density < 0.0 || self.prop_density.is_nan() {
            return bad("map.prop_density", format!("must be non-negative, got {}", self.prop_density));
        }
        Ok(())
    }

    /// Side of the square the grid has to cover, walls and outside strips included.
    pub fn world_size(&self) -> f32 {
        self.bounds.width.max(self.bounds.depth) + 2.0 * OUTSIDE_GROUND
    }

    /// Every box of the map. Only cover and crate placement draw from `stream`.
    pub fn emit(&self, stream: &mut SeededStream) -> Vec<PlacedPiece> {
        let MapBounds { width, depth } = self.bounds;
        let mut out = vec![PlacedPiece::boxed(
            Vec3::new(0.0, -0.1, 0.0),
            Vec3::new(width, 0.1, depth),
            MaterialHint::Ground,
            PieceKind::Ground,
            true,
        )
        .always_active()];

        for r in &self.roads {
            let material = match r.surface {
                RoadSurface::Road => MaterialHint::Road,
                RoadSurface::Park => MaterialHint::Grass,
            };
            out.push(
                PlacedPiece::boxed(Vec3::new(r.x, 0.0, r.z), Vec3::new(r.width, r.height, r.depth), material, PieceKind::Road, true)
                    .always_active(),
            );
        }

        for b in &self.buildings {
            out.push(PlacedPiece::boxed(
                Vec3::new(b.x, 0.0, b.z),
                Vec3::new(b.width, b.height, b.depth),
                b.kind.material(),
                PieceKind::Structure,
                true,
            ));
        }

        for zone in &self.cover_zones {
            let (height, side) = zone.cover.dimensions();
            for _ in 0..zone.count() {
                let angle = stream.angle();
                let r = stream.next_f32() * zone.radius;
                let at = Vec2::new(zone.x, zone.z) + Vec2::from_angle(angle) * r;
                out.push(PlacedPiece::boxed(
                    Vec3::new(at.x, 0.0, at.y),
                    Vec3::new(side, height, side),
                    MaterialHint::Concrete,
                    PieceKind::Cover,
                    true,
                ));
            }
        }

        for spot in &self.crate_spots {
            if !stream.chance(self.prop_density * 2.0) {
                continue;
            }
            let side = 0.8 + stream.next_f32() * 0.4;
            let x = spot.x + stream.centered() * 3.0;
            let z = spot.z + stream.centered() * 3.0;
            out.push(PlacedPiece::boxed(
                Vec3::new(x, 0.0, z),
                Vec3::splat(side),
                MaterialHint::Wood,
                PieceKind::Cover,
                true,
            ));
        }

        if self.boundary_walls {
            self.emit_walls(&mut out);
        }
        out.retain(|p| !p.is_degenerate());
        out
    }

    /// Four inset walls with two gates each, plus ground strips outside them.
    fn emit_walls(&self, out: &mut Vec<PlacedPiece>) {
        let wall_x = self.bounds.width * 0.5 - WALL_INSET;
        let wall_z = self.bounds.depth * 0.5 - WALL_INSET;
        let wall = |at: Vec2, size: Vec2| {
            PlacedPiece::boxed(
                Vec3::new(at.x, 0.0, at.y),
                Vec3::new(size.x, WALL_HEIGHT, size.y),
                MaterialHint::Concrete,
                PieceKind::Wall,
                true,
            )
        };

        for (center, length) in wall_segments(wall_x) {
            for z in [-wall_z, wall_z] {
                out.push(wall(Vec2::new(center, z), Vec2::new(length, WALL_THICKNESS)));
            }
        }
        for (center, length) in wall_segments(wall_z) {
            for x in [-wall_x, wall_x] {
                out.push(wall(Vec2::new(x, center), Vec2::new(WALL_THICKNESS, length)));
            }
        }

        let strip = |at: Vec2, size: Vec2| {
            PlacedPiece::boxed(
                Vec3::new(at.x, 0.0, at.y),
                Vec3::new(size.x, SURFACE_HEIGHT, size.y),
                MaterialHint::Road,
                PieceKind::Ground,
                true,
            )
            .always_active()
        };
        let along_x = Vec2::new(self.bounds.width + OUTSIDE_GROUND * 2.0, OUTSIDE_GROUND);
        let along_z = Vec2::new(OUTSIDE_GROUND, self.bounds.depth);
        let off_x = wall_x + OUTSIDE_GROUND * 0.5;
        let off_z = wall_z + OUTSIDE_GROUND * 0.5;
        out.push(strip(Vec2::new(0.0, -off_z), along_x));
        out.push(strip(Vec2::new(0.0, off_z), along_x));
        out.push(strip(Vec2::new(-off_x, 0.0), along_z));
        out.push(strip(Vec2::new(off_x, 0.0), along_z));
    }
}

/// (centre, length) of the wall pieces spanning `[-half, half]` with gates
/// centred at `±half / 2`. Pieces squeezed to nothing are dropped.
fn wall_segments(half: f32) -> Vec<(f32, f32)> {
    let gate = half * 0.5;
    let g = GATE_WIDTH * 0.5;
    [(-half, -gate - g), (-gate + g, gate - g), (gate + g, half)]
        .into_iter()
        .filter(|(a, b)| b > a)
        .map(|(a, b)| ((a + b) * 0.5, b - a))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAZA: &str = r#"(
        seed: 99,
        bounds: (width: 200.0, depth: 200.0),
        buildings: [
            (x: -65.0, z: -65.0, width: 18.0, depth: 15.0, height: 12.0, kind: Residential),
            (x: 50.0, z: 50.0, width: 28.0, depth: 24.0, height: 25.0, kind: HighRise),
        ],
        roads: [(width: 180.0, depth: 12.0)],
        cover_zones: [(x: 25.0, z: 25.0, radius: 8.0, density: 0.5)],
    )"#;

    #[test]
    fn parses_with_defaults() {
        let map = HandmadeMap::from_ron_str(PLAZA).unwrap();
        assert_eq!(map.seed, 99);
        assert!(map.boundary_walls);
        assert_eq!(map.roads[0].height, 0.2);
        assert_eq!(map.roads[0].surface, RoadSurface::Road);
        assert_eq!(map.cover_zones[0].cover, CoverType::Low);
        assert_eq!(map.world_size(), 260.0);
    }

    #[test]
    fn rejects_empty_bounds() {
        let err = HandmadeMap::from_ron_str("(bounds: (width: 0.0, depth: 10.0))").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "map.bounds", .. }));
    }

    #[test]
    fn cover_count_follows_area() {
        let zone = CoverZone { x: 0.0, z: 0.0, radius: 8.0, density: 0.5, cover: CoverType::Low };
        // 64 * pi * 0.5 / 100 = 1.005
        assert_eq!(zone.count(), 1);
        let zone = CoverZone { radius: 20.0, ..zone };
        assert_eq!(zone.count(), 6);
    }

    #[test]
    fn walls_leave_two_gates_per_side() {
        // half = 95, gates at ±47.5, 12 m wide
        let segments = wall_segments(95.0);
        assert_eq!(segments.len(), 3);
        let covered: f32 = segments.iter().map(|(_, l)| l).sum();
        assert!((covered - (190.0 - 24.0)).abs() < 1e-3);
        assert!(wall_segments(4.0).len() < 3);
    }

    #[test]
    fn emits_every_feature() {
        let map = HandmadeMap::from_ron_str(PLAZA).unwrap();
        let pieces = map.emit(&mut SeededStream::new(map.seed));
        let count = |kind| pieces.iter().filter(|p| p.kind == kind).count();
        assert_eq!(count(PieceKind::Structure), 2);
        assert_eq!(count(PieceKind::Road), 1);
        assert_eq!(count(PieceKind::Cover), 1);
        assert_eq!(count(PieceKind::Wall), 12);
        // slab inside the bounds plus four outside strips
        assert_eq!(count(PieceKind::Ground), 5);
        assert!(pieces.iter().filter(|p| p.kind == PieceKind::Ground || p.kind == PieceKind::Road).all(|p| p.always_active));
        assert!(pieces.iter().filter(|p| p.kind == PieceKind::Wall).all(|p| !p.always_active && p.collides));

        let again = map.emit(&mut SeededStream::new(map.seed));
        assert_eq!(pieces, again);
    }

    #[test]
    fn crates_land_near_their_spots() {
        let spots = "[(x: -30.0, z: 0.0), (x: 30.0, z: 0.0), (x: 0.0, z: -30.0), (x: 0.0, z: 30.0)]";
        let map = HandmadeMap::from_ron_str(&format!(
            "(bounds: (width: 100.0, depth: 100.0), crate_spots: {spots}, boundary_walls: false)"
        ))
        .unwrap();
        assert_eq!(map.prop_density, 0.5);

        let crates: Vec<_> = map
            .emit(&mut SeededStream::new(map.seed))
            .into_iter()
            .filter(|p| p.material == MaterialHint::Wood)
            .collect();
        // odds of 2 * 0.5 fill every spot
        assert_eq!(crates.len(), 4);
        for (c, spot) in crates.iter().zip(&map.crate_spots) {
            assert_eq!(c.kind, PieceKind::Cover);
            assert!(c.collides);
            let f = c.footprint;
            assert!((f.x - spot.x).abs() <= 1.5 && (f.z - spot.z).abs() <= 1.5);
            assert!((0.4..=0.6).contains(&f.half_width));
            assert_eq!(f.half_width, f.half_depth);
        }

        let bare = HandmadeMap { prop_density: 0.0, ..map };
        let pieces = bare.emit(&mut SeededStream::new(bare.seed));
        assert!(pieces.iter().all(|p| p.material != MaterialHint::Wood));
    }

    #[test]
    fn rejects_negative_prop_density() {
        let err = HandmadeMap::from_ron_str("(bounds: (width: 10.0, depth: 10.0), prop_density: -1.0)").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "map.prop_density", .. }));
    }
}
