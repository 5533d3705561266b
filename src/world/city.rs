// src/world/city.rs
//! The world context: one stream, one arena, one grid, one sweep, owned together
//! and rebuilt together.

use bevy::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::core::{BodyHandle, Footprint, ObjectArena, ObjectId, WorldObject, WorldSeed};
use super::random::{substream, SeededStream};
use super::settings::{CitySettings, LayoutSource};
use crate::activation::{ActivationManager, PhysicsService, RenderService, SweepReport};
use crate::layout::{generate, Archetype};
use crate::placement::{SafePositionSampler, SpawnPool};
use crate::spatial::{GridStats, SpatialHashGrid};

const AGENT_SPAWN_SALT: u64 = 0xA6E7;
const FALLBACK_SALT: u64 = 0xFA11;

/// Which seed a build actually uses. A hand-authored map pins its own.
pub fn resolve_seed(source: &LayoutSource, requested: WorldSeed) -> WorldSeed {
    match source {
        LayoutSource::Procedural => requested,
        LayoutSource::Handmade(map) => WorldSeed(map.seed),
    }
}

#[derive(Resource)]
pub struct CityWorld {
    settings: CitySettings,
    source: LayoutSource,
    seed: WorldSeed,
    stream: SeededStream,
    arena: ObjectArena,
    grid: SpatialHashGrid,
    block_archetypes: Vec<Archetype>,
    spawns: SpawnPool,
    player_spawn: Vec2,
    activation: ActivationManager,
    fallback_rng: ChaCha8Rng,
}

impl CityWorld {
    /// Generate, index and sample spawns. Colliding pieces get static bodies;
    /// always-active ones enter the simulation right away.
    pub fn build<P>(settings: CitySettings, source: LayoutSource, seed: WorldSeed, physics: &mut P) -> Self
    where
        P: PhysicsService + ?Sized,
    {
        let seed = resolve_seed(&source, seed);
        let grid = SpatialHashGrid::new(
            settings.grid.cell_size,
            settings.layout.world_size(),
            settings.grid.min_block_height,
        );
        let mut world = Self {
            activation: ActivationManager::new(settings.activation.clone()),
            stream: SeededStream::from_seed(seed),
            fallback_rng: substream(seed, FALLBACK_SALT),
            settings,
            source,
            seed,
            arena: ObjectArena::new(),
            grid,
            block_archetypes: Vec::new(),
            spawns: SpawnPool::default(),
            player_spawn: Vec2::ZERO,
        };
        world.populate(physics);
        world
    }

    /// Throw the whole population away and generate again from `seed`.
    pub fn rebuild<P>(&mut self, seed: WorldSeed, physics: &mut P)
    where
        P: PhysicsService + ?Sized,
    {
        physics.reset();
        self.arena.clear();
        self.grid.clear();
        self.activation.reset();
        self.seed = resolve_seed(&self.source, seed);
        self.fallback_rng = substream(self.seed, FALLBACK_SALT);
        self.populate(physics);
    }

    fn populate<P>(&mut self, physics: &mut P)
    where
        P: PhysicsService + ?Sized,
    {
        self.stream.reseed(self.seed.0);
        let layout = generate(&self.settings, &self.source, &mut self.stream);
        self.grid.resize_world(layout.world_size);

        let mut bodies = 0usize;
        for piece in &layout.pieces {
            let mut object = WorldObject::from_piece(piece);
            if piece.collides {
                let body = physics.create_static_body(&piece.footprint, piece.base_y);
                if piece.always_active {
                    physics.add_body_to_world(body);
                }
                object.body = Some(body);
                bodies += 1;
            }
            let id = self.arena.push(object);
            // visual-only pieces stay out of the index
            if piece.collides {
                self.grid.insert_static(&mut self.arena, id);
            }
        }
        self.block_archetypes = layout.block_archetypes;

        let spawn = &self.settings.spawn;
        let sampler = SafePositionSampler::new(&self.grid, &self.arena, spawn.buffer);
        let mut spawns = SpawnPool::sample(&sampler, layout.world_size, spawn);
        spawns.preselect_agent_spawns(&sampler, spawn, &mut substream(self.seed, AGENT_SPAWN_SALT));
        self.player_spawn = spawns.player_spawn(spawn.player_center_radius, &mut self.stream);
        self.spawns = spawns;

        let stats = self.grid.stats();
        info!(
            "city built: seed {}, {} objects ({bodies} bodies), {} spawn points, {} agent spawns",
            self.seed.0,
            self.arena.len(),
            self.spawns.len(),
            self.spawns.agent_spawns().len(),
        );
        info!(
            "grid: {}/{} cells occupied, {} entries, {:.2} per occupied cell",
            stats.occupied_cells, stats.total_cells, stats.total_entries, stats.average_per_cell
        );
    }

    // ---------- Accessors ----------

    pub fn settings(&self) -> &CitySettings { &self.settings }
    pub fn seed(&self) -> WorldSeed { self.seed }
    pub fn arena(&self) -> &ObjectArena { &self.arena }
    pub fn grid(&self) -> &SpatialHashGrid { &self.grid }
    pub fn object(&self, id: ObjectId) -> Option<&WorldObject> { self.arena.get(id) }
    pub fn block_archetypes(&self) -> &[Archetype] { &self.block_archetypes }
    pub fn spawns(&self) -> &SpawnPool { &self.spawns }
    pub fn player_spawn(&self) -> Vec2 { self.player_spawn }
    pub fn activation(&self) -> &ActivationManager { &self.activation }
    pub fn stats(&self) -> GridStats { self.grid.stats() }

    // ---------- Queries ----------

    pub fn query_static_near(&self, x: f32, z: f32, radius: f32) -> Vec<ObjectId> {
        self.grid.query_static_near(x, z, radius)
    }

    pub fn check_static_collision(&self, x: f32, z: f32, width: f32, depth: f32, exclude: Option<ObjectId>) -> bool {
        self.grid.check_static_collision(&self.arena, x, z, width, depth, exclude)
    }

    /// Broad-phase candidates for hit-testing and line of sight: whatever the
    /// grid returns around the point, narrowed to query-active objects.
    pub fn query_candidates(&self, x: f32, z: f32, radius: f32) -> Vec<ObjectId> {
        let mut out = self.grid.query_footprint(x, z, radius * 2.0, radius * 2.0);
        out.retain(|&id| self.arena.get(id).is_some_and(|o| o.activation.query));
        out
    }

    // ---------- Dynamic agents ----------

    pub fn register_dynamic(&mut self, footprint: Footprint, body: Option<BodyHandle>, now: f32) -> ObjectId {
        let id = self.arena.push(WorldObject::dynamic(footprint, body, now));
        self.grid.insert_dynamic(&mut self.arena, id);
        id
    }

    /// Move a registered agent; no-op for unknown or static ids.
    pub fn move_dynamic(&mut self, id: ObjectId, x: f32, z: f32) {
        let Some(object) = self.arena.get_mut(id) else { return };
        if object.is_static() {
            return;
        }
        object.footprint = object.footprint.with_center(x, z);
        self.grid.update_dynamic(&mut self.arena, id);
    }

    /// Drop an agent from the grid and the arena. Its body is stopped, taken
    /// out of the simulation and freed. `None` for unknown or static ids.
    pub fn unregister_dynamic<P>(&mut self, id: ObjectId, physics: &mut P) -> Option<WorldObject>
    where
        P: PhysicsService + ?Sized,
    {
        if self.arena.get(id).is_none_or(WorldObject::is_static) {
            return None;
        }
        self.grid.remove(&mut self.arena, id);
        let object = self.arena.remove(id)?;
        if let Some(body) = object.body {
            physics.set_velocity(body, Vec3::ZERO);
            physics.remove_body_from_world(body);
            physics.destroy_body(body);
        }
        Some(object)
    }

    // ---------- Activation ----------

    /// Advance the sweep by one frame's worth of time around the tracked agent.
    pub fn tick<P, R>(&mut self, dt: f32, agent: Vec2, now: f32, physics: &mut P, render: &mut R) -> Option<SweepReport>
    where
        P: PhysicsService + ?Sized,
        R: RenderService + ?Sized,
    {
        self.activation.advance(dt, &mut self.arena, agent, now, physics, render)
    }

    /// Run one slice immediately, ignoring the interval.
    pub fn sweep_now<P, R>(&mut self, agent: Vec2, now: f32, physics: &mut P, render: &mut R) -> SweepReport
    where
        P: PhysicsService + ?Sized,
        R: RenderService + ?Sized,
    {
        self.activation.run_slice(&mut self.arena, agent, now, physics, render)
    }

    // ---------- Spawns ----------

    /// A preselected agent spawn in the ring around `player`, or a wider
    /// random pool point when none qualifies.
    pub fn take_agent_spawn(&mut self, player: Vec2) -> Option<Vec2> {
        let s = &self.settings.spawn;
        self.spawns
            .take_agent_spawn(player, s.agent_min_distance, s.agent_max_distance)
            .or_else(|| self.spawns.fallback_spawn(player, s.agent_min_distance, &mut self.fallback_rng))
    }

    pub fn reset_used_spawns(&mut self) { self.spawns.reset_used(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{BodyTable, RenderQueue};
    use crate::world::core::ActivationState;
    use crate::world::settings::LayoutSettings;

    fn small() -> CitySettings {
        CitySettings { layout: LayoutSettings { grid_size: 6, ..Default::default() }, ..Default::default() }
    }

    fn city(seed: u64) -> (CityWorld, BodyTable) {
        let mut bodies = BodyTable::default();
        let world = CityWorld::build(small(), LayoutSource::Procedural, WorldSeed(seed), &mut bodies);
        (world, bodies)
    }

    #[test]
    fn only_colliders_are_indexed() {
        let (world, bodies) = city(5);
        let colliders = world.arena().iter().filter(|(_, o)| o.body.is_some()).count();
        assert_eq!(world.stats().static_objects, colliders);
        assert_eq!(bodies.len(), colliders);
        assert!(world.arena().len() > colliders);
        for (id, o) in world.arena().iter() {
            assert_eq!(world.grid().is_static(id), o.body.is_some());
        }
    }

    #[test]
    fn always_active_bodies_start_simulated() {
        let (world, bodies) = city(5);
        let simulated = world.arena().iter().filter(|(_, o)| o.always_active).count();
        assert_eq!(bodies.in_world_count(), simulated);
    }

    #[test]
    fn rebuild_replaces_everything() {
        let (mut world, mut bodies) = city(42);
        let first = world.block_archetypes().to_vec();
        let count = world.arena().len();

        world.rebuild(WorldSeed(7), &mut bodies);
        assert_eq!(world.seed(), WorldSeed(7));
        world.rebuild(WorldSeed(42), &mut bodies);
        assert_eq!(world.block_archetypes(), &first[..]);
        assert_eq!(world.arena().len(), count);
        assert_eq!(bodies.len(), world.arena().iter().filter(|(_, o)| o.body.is_some()).count());
        assert!(!world.activation().first_sweep_done());
    }

    #[test]
    fn agents_follow_the_grid() {
        let (mut world, mut bodies) = city(5);
        let fp = Footprint::new(0.0, 0.0, 0.5, 0.5, 1.8);
        let body = bodies.create_dynamic_body(&fp);
        let id = world.register_dynamic(fp, Some(body), 0.0);
        assert!(world.grid().is_dynamic(id));

        world.move_dynamic(id, 50.0, -30.0);
        let object = world.object(id).unwrap();
        assert_eq!(object.footprint.center(), Vec2::new(50.0, -30.0));
        assert_eq!(object.cells, world.grid().cells_overlapping(&object.footprint));

        assert!(world.unregister_dynamic(id, &mut bodies).is_some());
        assert!(!world.grid().contains(id));
        assert!(bodies.get(body).is_none());
        assert!(world.unregister_dynamic(id, &mut bodies).is_none());
        // statics cannot be unregistered through the agent path
        let stat = world.arena().static_ids()[0];
        let stat_body = world.object(stat).and_then(|o| o.body);
        assert!(world.unregister_dynamic(stat, &mut bodies).is_none());
        if let Some(b) = stat_body {
            assert!(bodies.get(b).is_some());
        }
    }

    #[test]
    fn candidates_are_query_active() {
        let (mut world, mut bodies) = city(5);
        let mut queue = RenderQueue::default();
        world.sweep_now(Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        let near = world.query_candidates(0.0, 0.0, 50.0);
        assert!(!near.is_empty());
        for id in near {
            assert!(world.object(id).unwrap().activation.query);
        }
        // roads and ground are always active
        assert!(world
            .arena()
            .iter()
            .filter(|(_, o)| o.always_active)
            .all(|(_, o)| o.activation == ActivationState::ALL));
    }

    #[test]
    fn agent_spawns_fall_back_when_ring_is_empty() {
        let (mut world, _) = city(5);
        let far_away = Vec2::splat(100_000.0);
        let spot = world.take_agent_spawn(far_away);
        assert!(spot.is_some());
        assert_eq!(world.spawns().used_count(), 0);
    }
}
