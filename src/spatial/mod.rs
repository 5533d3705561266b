// src/spatial/mod.rs
pub mod grid;

pub use grid::{GridStats, SpatialHashGrid};
