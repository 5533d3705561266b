// src/activation/services.rs
//! Seams to the rigid-body and render engines, plus the in-crate stand-ins
//! the Bevy glue uses: a body table and a queue of render ops.

use bevy::prelude::*;

use crate::world::core::{BodyHandle, Footprint, ObjectId};

/// What the activation sweep and world build ask of a rigid-body engine.
pub trait PhysicsService {
    /// Create a static box body for a footprint standing on `base_y`. Not yet simulated.
    fn create_static_body(&mut self, footprint: &Footprint, base_y: f32) -> BodyHandle;
    fn add_body_to_world(&mut self, body: BodyHandle);
    fn remove_body_from_world(&mut self, body: BodyHandle);
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3);
    /// Free a body that will never be simulated again. The handle is dead afterwards.
    fn destroy_body(&mut self, _body: BodyHandle) {}
    /// Drop every body. Called before a rebuild repopulates the world.
    fn reset(&mut self) {}
}

/// What the activation sweep asks of a renderer.
pub trait RenderService {
    fn add_to_scene(&mut self, object: ObjectId);
    fn remove_from_scene(&mut self, object: ObjectId);
    fn set_shadow_casting(&mut self, object: ObjectId, enabled: bool);
}

// ---------- Body table ----------

#[derive(Clone, Debug, PartialEq)]
pub struct BodyRecord {
    pub footprint: Footprint,
    pub base_y: f32,
    pub dynamic: bool,
    pub in_world: bool,
    pub velocity: Vec3,
}

/// In-memory rigid-body bookkeeping standing in for a physics engine.
/// Destroyed bodies leave an empty slot; handles are never reused before a reset.
#[derive(Resource, Default, Clone, Debug)]
pub struct BodyTable {
    bodies: Vec<Option<BodyRecord>>,
}

impl BodyTable {
    fn push(&mut self, record: BodyRecord) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Some(record));
        handle
    }

    fn slot_mut(&mut self, body: BodyHandle) -> Option<&mut BodyRecord> {
        self.bodies.get_mut(body.0 as usize).and_then(Option::as_mut)
    }

    /// Body for an agent; starts inside the simulation.
    pub fn create_dynamic_body(&mut self, footprint: &Footprint) -> BodyHandle {
        self.push(BodyRecord {
            footprint: *footprint,
            base_y: 0.0,
            dynamic: true,
            in_world: true,
            velocity: Vec3::ZERO,
        })
    }

    pub fn get(&self, body: BodyHandle) -> Option<&BodyRecord> {
        self.bodies.get(body.0 as usize).and_then(Option::as_ref)
    }

    pub fn sync_footprint(&mut self, body: BodyHandle, footprint: &Footprint) {
        if let Some(record) = self.slot_mut(body) {
            record.footprint = *footprint;
        }
    }

    /// Live bodies, simulated or not.
    pub fn len(&self) -> usize { self.bodies.iter().flatten().count() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Bodies currently simulated.
    pub fn in_world_count(&self) -> usize {
        self.bodies.iter().flatten().filter(|b| b.in_world).count()
    }
}

impl PhysicsService for BodyTable {
    fn create_static_body(&mut self, footprint: &Footprint, base_y: f32) -> BodyHandle {
        self.push(BodyRecord { footprint: *footprint, base_y, dynamic: false, in_world: false, velocity: Vec3::ZERO })
    }

    fn add_body_to_world(&mut self, body: BodyHandle) {
        if let Some(record) = self.slot_mut(body) {
            record.in_world = true;
        }
    }

    fn remove_body_from_world(&mut self, body: BodyHandle) {
        if let Some(record) = self.slot_mut(body) {
            record.in_world = false;
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(record) = self.slot_mut(body) {
            record.velocity = velocity;
        }
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(body.0 as usize) {
            *slot = None;
        }
    }

    fn reset(&mut self) {
        self.bodies.clear();
    }
}

// ---------- Render ops ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOp {
    Show(ObjectId),
    Hide(ObjectId),
    Shadows(ObjectId, bool),
}

/// Render changes recorded by the sweep, drained by the render glue each frame.
#[derive(Resource, Default, Clone, Debug)]
pub struct RenderQueue {
    pub ops: Vec<RenderOp>,
}

impl RenderService for RenderQueue {
    fn add_to_scene(&mut self, object: ObjectId) { self.ops.push(RenderOp::Show(object)); }
    fn remove_from_scene(&mut self, object: ObjectId) { self.ops.push(RenderOp::Hide(object)); }
    fn set_shadow_casting(&mut self, object: ObjectId, enabled: bool) {
        self.ops.push(RenderOp::Shadows(object, enabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_start_outside_the_world() {
        let mut table = BodyTable::default();
        let fp = Footprint::new(0.0, 0.0, 1.0, 1.0, 3.0);
        let s = table.create_static_body(&fp, 0.0);
        let d = table.create_dynamic_body(&fp);
        assert!(!table.get(s).unwrap().in_world);
        assert!(table.get(d).unwrap().in_world);

        table.add_body_to_world(s);
        table.set_velocity(s, Vec3::X);
        assert_eq!(table.in_world_count(), 2);
        assert_eq!(table.get(s).unwrap().velocity, Vec3::X);

        table.reset();
        assert!(table.is_empty());
        assert!(table.get(s).is_none());
    }

    #[test]
    fn destroyed_bodies_are_gone() {
        let mut table = BodyTable::default();
        let fp = Footprint::new(0.0, 0.0, 0.5, 0.5, 1.8);
        let a = table.create_dynamic_body(&fp);
        let b = table.create_dynamic_body(&fp);
        table.destroy_body(a);
        assert!(table.get(a).is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.in_world_count(), 1);

        // stale handles stay harmless
        table.add_body_to_world(a);
        table.destroy_body(a);
        assert_eq!(table.in_world_count(), 1);
        let c = table.create_dynamic_body(&fp);
        assert_ne!(c, a);
        assert!(table.get(b).is_some());
    }

    #[test]
    fn render_queue_records_in_order() {
        let mut queue = RenderQueue::default();
        queue.remove_from_scene(ObjectId(3));
        queue.set_shadow_casting(ObjectId(3), false);
        queue.add_to_scene(ObjectId(1));
        assert_eq!(
            queue.ops,
            vec![RenderOp::Hide(ObjectId(3)), RenderOp::Shadows(ObjectId(3), false), RenderOp::Show(ObjectId(1))]
        );
    }
}
