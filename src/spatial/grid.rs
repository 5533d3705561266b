// src/spatial/grid.rs
//! Uniform spatial hash over the city square. Broad-phase only: every query
//! returns whatever sits in the touched cells, callers narrow-phase themselves.

use std::collections::HashSet;

use crate::world::core::{CellKey, Footprint, ObjectArena, ObjectId};

/// Snapshot of grid occupancy, logged after every build.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridStats {
    pub total_cells: usize,
    pub occupied_cells: usize,
    /// Sum of per-cell memberships (an object spanning four cells counts four times).
    pub total_entries: usize,
    pub static_objects: usize,
    pub dynamic_objects: usize,
    pub average_per_cell: f32,
}

#[derive(Clone, Debug)]
pub struct SpatialHashGrid {
    cell_size: f32,
    world_size: f32,
    /// Lower corner of the covered square; the world is centred on the origin.
    min: f32,
    /// Cells per side.
    side: i32,
    min_block_height: f32,
    cells: Vec<Vec<ObjectId>>,
    statics: HashSet<ObjectId>,
    dynamics: HashSet<ObjectId>,
}

impl SpatialHashGrid {
    pub fn new(cell_size: f32, world_size: f32, min_block_height: f32) -> Self {
        let mut grid = Self {
            cell_size: cell_size.max(0.001),
            world_size: 0.0,
            min: 0.0,
            side: 0,
            min_block_height,
            cells: Vec::new(),
            statics: HashSet::new(),
            dynamics: HashSet::new(),
        };
        grid.resize_world(world_size);
        grid
    }

    pub fn cell_size(&self) -> f32 { self.cell_size }
    pub fn world_size(&self) -> f32 { self.world_size }
    pub fn min_block_height(&self) -> f32 { self.min_block_height }
    /// Cells per side.
    pub fn side(&self) -> i32 { self.side }

    /// Re-bound the grid to a `world_size` square around the origin.
    /// Drops every indexed object; callers re-insert afterwards.
    pub fn resize_world(&mut self, world_size: f32) {
        self.world_size = world_size.max(0.0);
        self.min = -self.world_size * 0.5;
        self.side = (self.world_size / self.cell_size).ceil() as i32;
        let count = (self.side.max(0) as usize).pow(2);
        self.cells = vec![Vec::new(); count];
        self.statics.clear();
        self.dynamics.clear();
    }

    /// Forget every object, keep the bounds.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Vec::clear);
        self.statics.clear();
        self.dynamics.clear();
    }

    // ---------- Cell math ----------

    #[inline]
    fn axis_cell(&self, v: f32) -> i32 {
        ((v - self.min) / self.cell_size).floor() as i32
    }

    #[inline]
    fn cell_index(&self, key: CellKey) -> Option<usize> {
        if key.x < 0 || key.z < 0 || key.x >= self.side || key.z >= self.side {
            return None;
        }
        Some((key.z * self.side + key.x) as usize)
    }

    /// In-bounds cells touched by a rectangle given by centre and half extents.
    fn rect_cells(&self, x: f32, z: f32, half_w: f32, half_d: f32) -> Vec<CellKey> {
        let x0 = self.axis_cell(x - half_w).max(0);
        let x1 = self.axis_cell(x + half_w).min(self.side - 1);
        let z0 = self.axis_cell(z - half_d).max(0);
        let z1 = self.axis_cell(z + half_d).min(self.side - 1);
        if x0 > x1 || z0 > z1 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (z1 - z0 + 1)) as usize);
        for cz in z0..=z1 {
            for cx in x0..=x1 {
                out.push(CellKey::new(cx, cz));
            }
        }
        out
    }

    /// Exactly the in-bounds cells a footprint overlaps.
    pub fn cells_overlapping(&self, footprint: &Footprint) -> Vec<CellKey> {
        self.rect_cells(footprint.x, footprint.z, footprint.half_width, footprint.half_depth)
    }

    // ---------- Membership ----------

    pub fn insert_static(&mut self, arena: &mut ObjectArena, id: ObjectId) {
        if self.link(arena, id) {
            self.dynamics.remove(&id);
            self.statics.insert(id);
        }
    }

    pub fn insert_dynamic(&mut self, arena: &mut ObjectArena, id: ObjectId) {
        if self.link(arena, id) {
            self.statics.remove(&id);
            self.dynamics.insert(id);
        }
    }

    /// Move a dynamic object to the cells its current footprint covers.
    pub fn update_dynamic(&mut self, arena: &mut ObjectArena, id: ObjectId) {
        if !self.dynamics.contains(&id) {
            return;
        }
        self.link(arena, id);
    }

    pub fn remove(&mut self, arena: &mut ObjectArena, id: ObjectId) {
        if let Some(object) = arena.get_mut(id) {
            let cells = std::mem::take(&mut object.cells);
            self.unlink_cells(id, &cells);
        }
        self.statics.remove(&id);
        self.dynamics.remove(&id);
    }

    /// Re-record `id` under the cells its footprint covers. False if the id is dead.
    fn link(&mut self, arena: &mut ObjectArena, id: ObjectId) -> bool {
        let Some(object) = arena.get_mut(id) else { return false };
        let stale = std::mem::take(&mut object.cells);
        let fresh = self.cells_overlapping(&object.footprint);
        object.cells = fresh.clone();

        self.unlink_cells(id, &stale);
        for key in fresh {
            if let Some(i) = self.cell_index(key) {
                self.cells[i].push(id);
            }
        }
        true
    }

    fn unlink_cells(&mut self, id: ObjectId, keys: &[CellKey]) {
        for &key in keys {
            if let Some(i) = self.cell_index(key) {
                let cell = &mut self.cells[i];
                if let Some(pos) = cell.iter().position(|&o| o == id) {
                    cell.swap_remove(pos);
                }
            }
        }
    }

    #[inline]
    pub fn is_static(&self, id: ObjectId) -> bool { self.statics.contains(&id) }
    #[inline]
    pub fn is_dynamic(&self, id: ObjectId) -> bool { self.dynamics.contains(&id) }
    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool { self.is_static(id) || self.is_dynamic(id) }

    /// Ids recorded in one cell; empty when the key is out of bounds.
    pub fn cell(&self, key: CellKey) -> &[ObjectId] {
        match self.cell_index(key) {
            Some(i) => &self.cells[i],
            None => &[],
        }
    }

    // ---------- Queries ----------

    /// Union of every object in the cells touched by a `width` x `depth` rectangle.
    /// Sorted by id, no duplicates.
    pub fn query_footprint(&self, x: f32, z: f32, width: f32, depth: f32) -> Vec<ObjectId> {
        let mut out: Vec<ObjectId> = self
            .rect_cells(x, z, width * 0.5, depth * 0.5)
            .into_iter()
            .filter_map(|key| self.cell_index(key))
            .flat_map(|i| self.cells[i].iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Static objects in the cells touched by a square of side `2 * radius`.
    pub fn query_static_near(&self, x: f32, z: f32, radius: f32) -> Vec<ObjectId> {
        let mut out = self.query_footprint(x, z, radius * 2.0, radius * 2.0);
        out.retain(|id| self.statics.contains(id));
        out
    }

    /// True if a static object other than `exclude` taller than the blocking
    /// height overlaps the rectangle.
    pub fn check_static_collision(
        &self,
        arena: &ObjectArena,
        x: f32,
        z: f32,
        width: f32,
        depth: f32,
        exclude: Option<ObjectId>,
    ) -> bool {
        let probe = Footprint::from_extents(x, z, width, depth, 0.0);
        self.rect_cells(x, z, width * 0.5, depth * 0.5)
            .into_iter()
            .filter_map(|key| self.cell_index(key))
            .flat_map(|i| self.cells[i].iter().copied())
            .filter(|&id| Some(id) != exclude && self.statics.contains(&id))
            .filter_map(|id| arena.get(id))
            .any(|o| o.footprint.height > self.min_block_height && o.footprint.overlaps(&probe))
    }

    pub fn stats(&self) -> GridStats {
        let (occupied, entries) = self
            .cells
            .iter()
            .filter(|c| !c.is_empty())
            .fold((0usize, 0usize), |(n, e), c| (n + 1, e + c.len()));
        GridStats {
            total_cells: self.cells.len(),
            occupied_cells: occupied,
            total_entries: entries,
            static_objects: self.statics.len(),
            dynamic_objects: self.dynamics.len(),
            average_per_cell: if occupied > 0 { entries as f32 / occupied as f32 } else { 0.0 },
        }
    }
}
