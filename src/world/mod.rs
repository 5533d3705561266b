// src/world/mod.rs
//! World context and the types everything else shares.

pub mod city;
pub mod core;
pub mod random;
pub mod settings;

pub use city::CityWorld;
pub use core::{
    ActivationState, BodyHandle, CellKey, Classification, Footprint, MaterialHint, ObjectArena, ObjectId,
    PieceKind, PlacedPiece, WorldObject, WorldSeed,
};
pub use random::SeededStream;
pub use settings::{CitySettings, LayoutSource, MapSource, SettingsError};
