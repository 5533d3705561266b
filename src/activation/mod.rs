// src/activation/mod.rs
//! Distance-driven activation of physics, rendering and hit-testing.

pub mod services;
pub mod sweep;

pub use services::{BodyTable, PhysicsService, RenderOp, RenderQueue, RenderService};
pub use sweep::{ActivationManager, SweepReport};
