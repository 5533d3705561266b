// src/layout/blocks.rs
//! Block planning and the weighted archetype draw.

use bevy::math::Vec2;

use super::archetypes::Archetype;
use crate::world::random::SeededStream;
use crate::world::settings::{ArchetypeTable, LayoutSettings};

/// One cell of the coarse layout grid. Lives only for the duration of generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub grid_x: u32,
    pub grid_z: u32,
    /// Regular grid centre.
    pub center: Vec2,
    /// Centre with per-block noise applied.
    pub jittered: Vec2,
    pub size: f32,
    pub archetype: Archetype,
    pub safe_zone: bool,
}

impl Block {
    pub fn min(&self) -> Vec2 { self.center - Vec2::splat(self.size * 0.5) }
    pub fn max(&self) -> Vec2 { self.center + Vec2::splat(self.size * 0.5) }

    /// Where this block's structure stands.
    pub fn anchor(&self) -> Vec2 {
        if self.archetype.uses_grid_center() { self.center } else { self.jittered }
    }
}

/// True for the `safe` x `safe` blocks in each corner of a `grid` x `grid` layout.
pub fn in_safe_zone(x: u32, z: u32, grid: u32, safe: u32) -> bool {
    let low = |v: u32| v < safe;
    let high = |v: u32| v + safe >= grid;
    (low(x) || high(x)) && (low(z) || high(z))
}

/// Lay out every block, x-major. Draws two jitter values per block.
pub fn plan_blocks(layout: &LayoutSettings, stream: &mut SeededStream) -> Vec<Block> {
    let grid = layout.grid_size;
    let pitch = layout.pitch();
    let offset = -layout.world_size() * 0.5;
    let half = layout.block_size * 0.5;
    let noise = layout.block_size * layout.jitter;

    let mut blocks = Vec::with_capacity((grid as usize).pow(2));
    for x in 0..grid {
        for z in 0..grid {
            let center = Vec2::new(offset + x as f32 * pitch + half, offset + z as f32 * pitch + half);
            let jitter = Vec2::new(stream.centered() * noise, stream.centered() * noise);
            let safe_zone = in_safe_zone(x, z, grid, layout.safe_zone_size);
            blocks.push(Block {
                grid_x: x,
                grid_z: z,
                center,
                jittered: center + jitter,
                size: layout.block_size,
                archetype: Archetype::Empty,
                safe_zone,
            });
        }
    }
    blocks
}

/// Cumulative weighted draw. Zero weights are never chosen; a residual that
/// runs past the last bucket lands on the first selectable archetype, and a
/// table with no positive weight yields [`Archetype::Empty`] without drawing.
pub fn draw_archetype(table: &ArchetypeTable, stream: &mut SeededStream) -> Archetype {
    let total = table.total_weight();
    if total <= 0.0 {
        return Archetype::Empty;
    }
    let mut selectable = table.entries().iter().filter(|e| e.weight > 0.0);
    let first = selectable.clone().next().map_or(Archetype::Empty, |e| e.archetype);

    let mut residual = stream.next_f32() * total;
    for entry in &mut selectable {
        residual -= entry.weight;
        if residual <= 0.0 {
            return entry.archetype;
        }
    }
    first
}
