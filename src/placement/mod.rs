// src/placement/mod.rs
//! Point placement: Poisson scatter for decoration, validated spawn pools for actors.

pub mod poisson;
pub mod spawn;

pub use poisson::PoissonDiskSampler;
pub use spawn::{AgentSpawn, SafePositionSampler, SpawnPool};
