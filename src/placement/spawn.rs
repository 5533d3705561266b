// src/placement/spawn.rs
//! Collision-validated spawn points: a uniform grid walk over the city, a
//! strided agent subset with one jitter each, and the request side that hands
//! them out.

use bevy::prelude::*;
use rand::Rng;
use std::collections::HashSet;
use std::f32::consts::TAU;

use crate::spatial::SpatialHashGrid;
use crate::world::core::ObjectArena;
use crate::world::random::SeededStream;
use crate::world::settings::SpawnSettings;

/// Answers "is this spot clear" against the static index.
pub struct SafePositionSampler<'a> {
    grid: &'a SpatialHashGrid,
    arena: &'a ObjectArena,
    /// Half-side of the probe square.
    buffer: f32,
}

impl<'a> SafePositionSampler<'a> {
    pub fn new(grid: &'a SpatialHashGrid, arena: &'a ObjectArena, buffer: f32) -> Self {
        Self { grid, arena, buffer }
    }

    #[inline]
    pub fn is_safe(&self, p: Vec2) -> bool {
        let side = self.buffer * 2.0;
        !self.grid.check_static_collision(self.arena, p.x, p.y, side, side, None)
    }

    /// Every clear point of a `step` lattice over the `world_size` square, x-major.
    pub fn sample_grid(&self, world_size: f32, step: f32) -> Vec<Vec2> {
        let half = world_size * 0.5;
        let n = (world_size / step).floor().max(0.0) as u32;
        let mut out = Vec::new();
        for i in 0..=n {
            let x = -half + i as f32 * step;
            for j in 0..=n {
                let p = Vec2::new(x, -half + j as f32 * step);
                if self.is_safe(p) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Up to `attempts` random offsets within `radius`; the first clear one wins,
    /// otherwise the original point is kept.
    pub fn jitter<R: Rng + ?Sized>(&self, p: Vec2, radius: f32, attempts: u32, rng: &mut R) -> Vec2 {
        for _ in 0..attempts {
            let angle = rng.random::<f32>() * TAU;
            let r = rng.random::<f32>() * radius;
            let candidate = p + Vec2::from_angle(angle) * r;
            if self.is_safe(candidate) {
                return candidate;
            }
        }
        p
    }
}

/// One frozen agent spawn location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpawn {
    /// Index of the pool point it was derived from.
    pub pool_index: usize,
    pub position: Vec2,
}

/// The session's spawn points plus the used-marker set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnPool {
    points: Vec<Vec2>,
    agents: Vec<AgentSpawn>,
    used: HashSet<usize>,
}

impl SpawnPool {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points, ..Default::default() }
    }

    /// Walk the city and keep every clear lattice point.
    pub fn sample(sampler: &SafePositionSampler<'_>, world_size: f32, settings: &SpawnSettings) -> Self {
        Self::new(sampler.sample_grid(world_size, settings.step_for(world_size)))
    }

    pub fn points(&self) -> &[Vec2] { &self.points }
    pub fn agent_spawns(&self) -> &[AgentSpawn] { &self.agents }
    pub fn len(&self) -> usize { self.points.len() }
    pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// Stride through the pool with a random phase and freeze `count` agent
    /// spawns, each jittered once and re-validated.
    pub fn preselect_agent_spawns<R: Rng + ?Sized>(
        &mut self,
        sampler: &SafePositionSampler<'_>,
        settings: &SpawnSettings,
        rng: &mut R,
    ) {
        self.agents.clear();
        let total = self.points.len();
        let desired = settings.agent_spawn_count.min(total);
        if desired == 0 {
            return;
        }
        let stride = total as f32 / desired as f32;
        let phase = rng.random::<f32>() * stride;

        for i in 0..desired {
            let index = (phase + i as f32 * stride).floor() as usize;
            let Some(&base) = self.points.get(index) else { continue };
            let position = sampler.jitter(base, settings.jitter_radius, settings.jitter_attempts, rng);
            self.agents.push(AgentSpawn { pool_index: index, position });
        }
    }

    /// A random pool point within `radius` of the origin, drawn from the world
    /// stream; the origin itself when none qualifies.
    pub fn player_spawn(&self, radius: f32, stream: &mut SeededStream) -> Vec2 {
        let r2 = radius * radius;
        let central: Vec<Vec2> = self.points.iter().copied().filter(|p| p.length_squared() <= r2).collect();
        match stream.pick(&central) {
            Some(p) => p,
            None => {
                warn!("no spawn point within {radius} m of the centre; spawning player at the origin");
                Vec2::ZERO
            }
        }
    }

    /// First unused agent spawn whose distance to `player` lies in `[min, max]`.
    /// Marks it used.
    pub fn take_agent_spawn(&mut self, player: Vec2, min: f32, max: f32) -> Option<Vec2> {
        let (min2, max2) = (min * min, max * max);
        let found = self.agents.iter().find(|s| {
            let d2 = s.position.distance_squared(player);
            !self.used.contains(&s.pool_index) && d2 >= min2 && d2 <= max2
        })?;
        let (index, position) = (found.pool_index, found.position);
        self.used.insert(index);
        Some(position)
    }

    /// Wider placement when no agent spawn qualifies: a random pool point at
    /// least `min` away from the player, or any pool point if none is that far.
    pub fn fallback_spawn<R: Rng + ?Sized>(&self, player: Vec2, min: f32, rng: &mut R) -> Option<Vec2> {
        if self.points.is_empty() {
            return None;
        }
        let min2 = min * min;
        let far: Vec<Vec2> =
            self.points.iter().copied().filter(|p| p.distance_squared(player) >= min2).collect();
        let pool = if far.is_empty() { &self.points } else { &far };
        Some(pool[rng.random_range(0..pool.len())])
    }

    pub fn is_used(&self, pool_index: usize) -> bool { self.used.contains(&pool_index) }
    pub fn used_count(&self) -> usize { self.used.len() }

    pub fn reset_used(&mut self) { self.used.clear(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::core::{Footprint, MaterialHint, PieceKind, PlacedPiece, WorldObject};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world_with_tower() -> (SpatialHashGrid, ObjectArena) {
        let mut grid = SpatialHashGrid::new(10.0, 100.0, 1.5);
        let mut arena = ObjectArena::new();
        let id = arena.push(WorldObject::from_piece(&PlacedPiece {
            footprint: Footprint::from_extents(0.0, 0.0, 20.0, 20.0, 30.0),
            base_y: 0.0,
            material: MaterialHint::Concrete,
            kind: PieceKind::Structure,
            collides: true,
            always_active: false,
        }));
        grid.insert_static(&mut arena, id);
        (grid, arena)
    }

    #[test]
    fn grid_walk_skips_blocked_points() {
        let (grid, arena) = world_with_tower();
        let sampler = SafePositionSampler::new(&grid, &arena, 3.0);
        let points = sampler.sample_grid(100.0, 10.0);
        // 11 x 11 lattice minus the 3 x 3 under and around the tower
        assert_eq!(points.len(), 121 - 9);
        assert!(points.iter().all(|&p| sampler.is_safe(p)));
        assert!(!points.contains(&Vec2::ZERO));
    }

    #[test]
    fn agent_spawns_are_strided_and_safe() {
        let (grid, arena) = world_with_tower();
        let sampler = SafePositionSampler::new(&grid, &arena, 3.0);
        let settings = SpawnSettings { agent_spawn_count: 10, jitter_attempts: 4, ..Default::default() };
        let mut pool = SpawnPool::new(sampler.sample_grid(100.0, 10.0));
        pool.preselect_agent_spawns(&sampler, &settings, &mut ChaCha8Rng::seed_from_u64(1));

        assert_eq!(pool.agent_spawns().len(), 10);
        let indices: Vec<usize> = pool.agent_spawns().iter().map(|s| s.pool_index).collect();
        assert!(indices.windows(2).all(|w| w[1] > w[0] && w[1] - w[0] >= 11));
        for s in pool.agent_spawns() {
            assert!(sampler.is_safe(s.position));
            assert!(s.position.distance(pool.points()[s.pool_index]) <= settings.jitter_radius + 1e-4);
        }
    }

    #[test]
    fn fewer_points_than_requested_uses_all() {
        let (grid, arena) = world_with_tower();
        let sampler = SafePositionSampler::new(&grid, &arena, 3.0);
        let mut pool = SpawnPool::new(vec![Vec2::new(40.0, 40.0), Vec2::new(-40.0, 40.0)]);
        pool.preselect_agent_spawns(&sampler, &SpawnSettings::default(), &mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(pool.agent_spawns().len(), 2);
    }

    #[test]
    fn agent_requests_respect_ring_and_used_set() {
        let mut pool = SpawnPool::new(Vec::new());
        pool.agents = vec![
            AgentSpawn { pool_index: 0, position: Vec2::new(10.0, 0.0) },
            AgentSpawn { pool_index: 1, position: Vec2::new(50.0, 0.0) },
            AgentSpawn { pool_index: 2, position: Vec2::new(80.0, 0.0) },
            AgentSpawn { pool_index: 3, position: Vec2::new(500.0, 0.0) },
        ];
        assert_eq!(pool.take_agent_spawn(Vec2::ZERO, 30.0, 200.0), Some(Vec2::new(50.0, 0.0)));
        assert_eq!(pool.take_agent_spawn(Vec2::ZERO, 30.0, 200.0), Some(Vec2::new(80.0, 0.0)));
        assert_eq!(pool.take_agent_spawn(Vec2::ZERO, 30.0, 200.0), None);
        assert!(pool.is_used(1) && pool.is_used(2) && !pool.is_used(0));

        pool.reset_used();
        assert_eq!(pool.used_count(), 0);
        assert_eq!(pool.take_agent_spawn(Vec2::ZERO, 30.0, 200.0), Some(Vec2::new(50.0, 0.0)));
    }

    #[test]
    fn fallback_prefers_distant_points() {
        let pool = SpawnPool::new(vec![Vec2::new(1.0, 0.0), Vec2::new(100.0, 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(pool.fallback_spawn(Vec2::ZERO, 30.0, &mut rng), Some(Vec2::new(100.0, 0.0)));
        }
        assert_eq!(SpawnPool::default().fallback_spawn(Vec2::ZERO, 30.0, &mut rng), None);
    }

    #[test]
    fn player_spawn_stays_central_or_falls_back() {
        let pool = SpawnPool::new(vec![Vec2::new(500.0, 0.0), Vec2::new(20.0, 20.0)]);
        let mut stream = SeededStream::new(4);
        assert_eq!(pool.player_spawn(80.0, &mut stream), Vec2::new(20.0, 20.0));
        let far = SpawnPool::new(vec![Vec2::new(500.0, 0.0)]);
        assert_eq!(far.player_spawn(80.0, &mut stream), Vec2::ZERO);
    }
}
