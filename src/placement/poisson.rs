// src/placement/poisson.rs
//! Lazy Bridson Poisson-disc sampling over a rectangle (deterministic given the stream).

use bevy::prelude::*;

use crate::world::random::SeededStream;

/// Grows a point set one sample per call until the active list runs dry.
#[derive(Clone, Debug)]
pub struct PoissonDiskSampler {
    center: Vec2,
    min: Vec2,
    max: Vec2,
    radius: f32,
    attempts: u32,
    /// Background grid cell side (= radius / sqrt(2), so at most one point per cell).
    cell: f32,
    gx: i32,
    gz: i32,
    grid: Vec<Option<usize>>,
    samples: Vec<Vec2>,
    active: Vec<usize>,
    seeded: bool,
}

impl PoissonDiskSampler {
    pub fn new(center: Vec2, half_extents: Vec2, min_distance: f32, attempts: u32) -> Self {
        let radius = min_distance.max(0.001);
        let half = half_extents.max(Vec2::ZERO);
        let cell = radius * std::f32::consts::FRAC_1_SQRT_2;
        let size = half * 2.0;
        let gx = (size.x / cell).ceil().max(1.0) as i32;
        let gz = (size.y / cell).ceil().max(1.0) as i32;
        Self {
            center,
            min: center - half,
            max: center + half,
            radius,
            attempts: attempts.max(1),
            cell,
            gx,
            gz,
            grid: vec![None; (gx * gz) as usize],
            samples: Vec::new(),
            active: Vec::new(),
            seeded: false,
        }
    }

    /// Every accepted point so far, in acceptance order.
    pub fn samples(&self) -> &[Vec2] { &self.samples }

    pub fn is_exhausted(&self) -> bool { self.seeded && self.active.is_empty() }

    /// Next accepted point, or `None` once no active point can grow further.
    /// The first call returns the seed point, drawn near the middle of the region.
    pub fn sample(&mut self, stream: &mut SeededStream) -> Option<Vec2> {
        if !self.seeded {
            self.seeded = true;
            let spread = (self.max - self.min) * 0.3;
            let p = self.center + Vec2::new(stream.centered() * spread.x, stream.centered() * spread.y);
            self.add(p);
            return Some(p);
        }

        while !self.active.is_empty() {
            let pick = stream.index(self.active.len());
            let base = self.samples[self.active[pick]];

            for _ in 0..self.attempts {
                // candidate in the annulus [r, 2r]
                let angle = stream.angle();
                let dist = self.radius * (1.0 + stream.next_f32());
                let p = base + Vec2::from_angle(angle) * dist;
                if self.fits(p) {
                    self.add(p);
                    return Some(p);
                }
            }

            // retire this active sample; it stays in the set
            self.active.swap_remove(pick);
        }
        None
    }

    #[inline]
    fn cell_of(&self, p: Vec2) -> (i32, i32) {
        (((p.x - self.min.x) / self.cell).floor() as i32, ((p.y - self.min.y) / self.cell).floor() as i32)
    }

    fn fits(&self, p: Vec2) -> bool {
        if p.x < self.min.x || p.y < self.min.y || p.x > self.max.x || p.y > self.max.y {
            return false;
        }
        let r2 = self.radius * self.radius;
        let (ix, iz) = self.cell_of(p);
        // ±2 cells covers every point closer than r
        for dz in -2..=2 {
            for dx in -2..=2 {
                let (nx, nz) = (ix + dx, iz + dz);
                if nx < 0 || nz < 0 || nx >= self.gx || nz >= self.gz {
                    continue;
                }
                if let Some(si) = self.grid[(nz * self.gx + nx) as usize] {
                    if self.samples[si].distance_squared(p) < r2 {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn add(&mut self, p: Vec2) {
        let i = self.samples.len();
        self.samples.push(p);
        self.active.push(i);
        let (ix, iz) = self.cell_of(p);
        let ix = ix.clamp(0, self.gx - 1);
        let iz = iz.clamp(0, self.gz - 1);
        self.grid[(iz * self.gx + ix) as usize] = Some(i);
    }
}
