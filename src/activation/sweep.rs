// src/activation/sweep.rs
//! Distance-driven activation, time-sliced over the static population.
//!
//! A persistent cursor walks the arena's static ids in insertion order, a
//! bounded batch per slice, so one full pass takes roughly `full_cycle`
//! seconds no matter how many objects exist. The first slice after a build
//! covers everything. Dynamic agents are few and get re-evaluated every slice.

use bevy::prelude::*;

use super::services::{PhysicsService, RenderService};
use crate::world::core::{ActivationState, BodyHandle, ObjectArena, ObjectId, WorldObject};
use crate::world::settings::ActivationSettings;

/// What one slice did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub batch_size: usize,
    /// The cursor reached the end of the population and went back to 0.
    pub wrapped: bool,
    /// This was the post-build slice over the whole population.
    pub full_pass: bool,
}

#[derive(Clone, Debug)]
pub struct ActivationManager {
    settings: ActivationSettings,
    cursor: usize,
    accum: f32,
    first_sweep_done: bool,
    active_static: Vec<ObjectId>,
    active_dynamic: Vec<ObjectId>,
}

impl ActivationManager {
    pub fn new(settings: ActivationSettings) -> Self {
        Self {
            settings,
            cursor: 0,
            accum: 0.0,
            first_sweep_done: false,
            active_static: Vec::new(),
            active_dynamic: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ActivationSettings { &self.settings }

    /// Forget all progress; the next slice is a full pass again.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.accum = 0.0;
        self.first_sweep_done = false;
        self.active_static.clear();
        self.active_dynamic.clear();
    }

    pub fn cursor(&self) -> usize { self.cursor }
    pub fn first_sweep_done(&self) -> bool { self.first_sweep_done }

    /// Objects visited by the next slice for a population of `population`.
    pub fn batch_size(&self, population: usize) -> usize {
        if population == 0 {
            return 0;
        }
        if !self.first_sweep_done {
            return population;
        }
        let s = &self.settings;
        let adaptive = (population as f32 * s.slice_interval / s.full_cycle).ceil() as usize;
        adaptive.max(s.min_batch.min(population)).clamp(1, population)
    }

    /// Feed frame time. Runs at most one slice once a full interval has built up.
    pub fn advance<P, R>(
        &mut self,
        dt: f32,
        arena: &mut ObjectArena,
        agent: Vec2,
        now: f32,
        physics: &mut P,
        render: &mut R,
    ) -> Option<SweepReport>
    where
        P: PhysicsService + ?Sized,
        R: RenderService + ?Sized,
    {
        self.accum += dt.max(0.0);
        let interval = self.settings.slice_interval;
        if self.accum < interval {
            return None;
        }
        // carry the remainder, but never bank more than one extra slice
        self.accum = (self.accum - interval).min(interval);
        Some(self.run_slice(arena, agent, now, physics, render))
    }

    /// One batch from the cursor plus every dynamic object, then republish the
    /// query-active sets.
    pub fn run_slice<P, R>(
        &mut self,
        arena: &mut ObjectArena,
        agent: Vec2,
        now: f32,
        physics: &mut P,
        render: &mut R,
    ) -> SweepReport
    where
        P: PhysicsService + ?Sized,
        R: RenderService + ?Sized,
    {
        let population = arena.static_ids().len();
        if self.cursor >= population {
            self.cursor = 0;
        }
        let full_pass = !self.first_sweep_done;
        let batch = self.batch_size(population);
        // stop at the end of the population so each pass visits every object once
        let take = batch.min(population - self.cursor);

        for i in self.cursor..self.cursor + take {
            let id = arena.static_ids()[i];
            if let Some(object) = arena.get_mut(id) {
                self.update_static(id, object, agent, physics, render);
            }
        }
        self.cursor += take;
        let wrapped = population > 0 && self.cursor >= population;
        if wrapped {
            self.cursor = 0;
        }
        self.first_sweep_done = true;

        for i in 0..arena.dynamic_ids().len() {
            let id = arena.dynamic_ids()[i];
            if let Some(object) = arena.get_mut(id) {
                self.update_dynamic(object, agent, now, physics);
            }
        }

        self.active_static = query_active(arena, arena.static_ids());
        self.active_dynamic = query_active(arena, arena.dynamic_ids());

        debug!(
            "activation slice: {take}/{population} statics from cursor, {} query-active, {} agents{}",
            self.active_static.len(),
            self.active_dynamic.len(),
            if wrapped { ", wrapped" } else { "" },
        );
        SweepReport { processed: take, batch_size: batch, wrapped, full_pass }
    }

    fn update_static<P, R>(
        &self,
        id: ObjectId,
        object: &mut WorldObject,
        agent: Vec2,
        physics: &mut P,
        render: &mut R,
    ) where
        P: PhysicsService + ?Sized,
        R: RenderService + ?Sized,
    {
        if object.always_active {
            object.activation = ActivationState::ALL;
            return;
        }
        let s = &self.settings;
        let d2 = object.footprint.distance_squared(agent);
        let prev = object.activation;
        let next = ActivationState {
            physics: object.body.is_some() && d2 <= s.physics_radius * s.physics_radius,
            render: d2 <= s.render_radius * s.render_radius,
            shadow: d2 <= s.shadow_radius * s.shadow_radius,
            query: d2 <= s.query_radius * s.query_radius,
        };

        if next.render != prev.render {
            if next.render { render.add_to_scene(id) } else { render.remove_from_scene(id) }
        }
        if next.shadow != prev.shadow {
            render.set_shadow_casting(id, next.shadow);
        }
        if next.physics != prev.physics {
            if let Some(body) = object.body {
                toggle_body(physics, body, next.physics);
            }
        }
        object.activation = next;
    }

    fn update_dynamic<P>(&self, object: &mut WorldObject, agent: Vec2, now: f32, physics: &mut P)
    where
        P: PhysicsService + ?Sized,
    {
        let s = &self.settings;
        let d2 = object.footprint.distance_squared(agent);
        let fresh = now - object.registered_at <= s.spawn_grace;
        let physics_on = object.body.is_some()
            && (fresh || d2 <= s.agent_physics_radius * s.agent_physics_radius);

        if physics_on != object.activation.physics {
            if let Some(body) = object.body {
                toggle_body(physics, body, physics_on);
            }
        }
        object.activation.physics = physics_on;
        // a simulated agent is always hit-testable
        object.activation.query = physics_on || d2 <= s.agent_query_radius * s.agent_query_radius;
    }

    /// Static ids that were query-active after the last slice.
    pub fn query_active_static(&self) -> &[ObjectId] { &self.active_static }

    /// Dynamic ids that were query-active after the last slice.
    pub fn query_active_dynamic(&self) -> &[ObjectId] { &self.active_dynamic }
}

fn toggle_body<P: PhysicsService + ?Sized>(physics: &mut P, body: BodyHandle, on: bool) {
    if on {
        physics.add_body_to_world(body);
    } else {
        physics.set_velocity(body, Vec3::ZERO);
        physics.remove_body_from_world(body);
    }
}

fn query_active(arena: &ObjectArena, ids: &[ObjectId]) -> Vec<ObjectId> {
    ids.iter()
        .copied()
        .filter(|&id| arena.get(id).is_some_and(|o| o.activation.query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::services::{BodyTable, RenderOp, RenderQueue};
    use crate::world::core::{Footprint, MaterialHint, PieceKind, PlacedPiece};

    fn row(count: usize, spacing: f32, bodies: &mut BodyTable) -> ObjectArena {
        let mut arena = ObjectArena::new();
        for i in 0..count {
            let piece = PlacedPiece {
                footprint: Footprint::from_extents(i as f32 * spacing, 0.0, 2.0, 2.0, 4.0),
                base_y: 0.0,
                material: MaterialHint::Concrete,
                kind: PieceKind::Structure,
                collides: true,
                always_active: false,
            };
            let mut object = WorldObject::from_piece(&piece);
            object.body = Some(bodies.create_static_body(&piece.footprint, 0.0));
            arena.push(object);
        }
        arena
    }

    #[test]
    fn batch_sizes() {
        let mut m = ActivationManager::new(ActivationSettings::default());
        assert_eq!(m.batch_size(0), 0);
        assert_eq!(m.batch_size(10_000), 10_000);
        m.first_sweep_done = true;
        // ceil(10000 * 0.1 / 2) = 500 beats the floor of 200
        assert_eq!(m.batch_size(10_000), 500);
        assert_eq!(m.batch_size(1000), 200);
        assert_eq!(m.batch_size(50), 50);
    }

    #[test]
    fn first_slice_covers_everything() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = row(1000, 1.0, &mut bodies);
        let mut m = ActivationManager::new(ActivationSettings::default());

        let report = m.run_slice(&mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        assert!(report.full_pass && report.wrapped);
        assert_eq!(report.processed, 1000);
        assert_eq!(m.cursor(), 0);
        // x <= 100 is simulated
        assert_eq!(bodies.in_world_count(), 101);
        assert_eq!(m.query_active_static().len(), 201);

        let report = m.run_slice(&mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        assert!(!report.full_pass);
        assert_eq!(report.processed, 200);
        assert_eq!(m.cursor(), 200);
    }

    #[test]
    fn advance_waits_for_the_interval() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = row(10, 1.0, &mut bodies);
        let mut m = ActivationManager::new(ActivationSettings::default());

        assert!(m.advance(0.05, &mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue).is_none());
        assert!(m.advance(0.06, &mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue).is_some());
        // a long hitch runs one slice and banks at most one more
        assert!(m.advance(5.0, &mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue).is_some());
        assert!(m.advance(0.0, &mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue).is_some());
        assert!(m.advance(0.0, &mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue).is_none());
    }

    #[test]
    fn leaving_the_radius_zeroes_velocity_and_hides() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = row(1, 1.0, &mut bodies);
        let id = arena.static_ids()[0];
        let body = arena.get(id).and_then(|o| o.body).unwrap();
        let mut m = ActivationManager::new(ActivationSettings::default());

        m.run_slice(&mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        assert!(queue.ops.is_empty());
        bodies.set_velocity(body, Vec3::X);

        m.run_slice(&mut arena, Vec2::new(150.0, 0.0), 0.0, &mut bodies, &mut queue);
        assert!(!bodies.get(body).unwrap().in_world);
        assert_eq!(bodies.get(body).unwrap().velocity, Vec3::ZERO);
        assert!(queue.ops.is_empty(), "still within render range");

        m.run_slice(&mut arena, Vec2::new(500.0, 0.0), 0.0, &mut bodies, &mut queue);
        assert_eq!(queue.ops, vec![RenderOp::Hide(id), RenderOp::Shadows(id, false)]);
        assert_eq!(arena.get(id).unwrap().activation, ActivationState::default());
        assert!(m.query_active_static().is_empty());
    }

    #[test]
    fn always_active_ignores_distance() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = row(1, 1.0, &mut bodies);
        let id = arena.static_ids()[0];
        arena.get_mut(id).unwrap().always_active = true;
        let mut m = ActivationManager::new(ActivationSettings::default());

        m.run_slice(&mut arena, Vec2::splat(f32::INFINITY), 0.0, &mut bodies, &mut queue);
        assert_eq!(arena.get(id).unwrap().activation, ActivationState::ALL);
        assert!(queue.ops.is_empty());
    }

    #[test]
    fn agents_keep_physics_during_grace() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = ObjectArena::new();
        let fp = Footprint::new(1000.0, 0.0, 0.5, 0.5, 2.0);
        let body = bodies.create_dynamic_body(&fp);
        let id = arena.push(WorldObject::dynamic(fp, Some(body), 10.0));
        let mut m = ActivationManager::new(ActivationSettings::default());

        m.run_slice(&mut arena, Vec2::ZERO, 11.0, &mut bodies, &mut queue);
        assert!(arena.get(id).unwrap().activation.physics);
        assert!(arena.get(id).unwrap().activation.query);
        assert_eq!(m.query_active_dynamic(), &[id]);

        m.run_slice(&mut arena, Vec2::ZERO, 12.0, &mut bodies, &mut queue);
        assert!(!arena.get(id).unwrap().activation.physics);
        assert!(!bodies.get(body).unwrap().in_world);
        assert!(m.query_active_dynamic().is_empty());
    }

    #[test]
    fn reset_restores_the_full_pass() {
        let mut bodies = BodyTable::default();
        let mut queue = RenderQueue::default();
        let mut arena = row(500, 1.0, &mut bodies);
        let mut m = ActivationManager::new(ActivationSettings::default());
        m.run_slice(&mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        m.run_slice(&mut arena, Vec2::ZERO, 0.0, &mut bodies, &mut queue);
        assert_eq!(m.cursor(), 200);

        m.reset();
        assert_eq!(m.cursor(), 0);
        assert!(!m.first_sweep_done());
        assert_eq!(m.batch_size(500), 500);
    }
}
