//! gridlock: a seeded procedural city, the spatial hash grid that indexes it,
//! and the distance-driven sweep that decides what is simulated, drawn and
//! hit-testable around the player.

pub mod activation;
pub mod layout;
pub mod placement;
pub mod plugin;
pub mod render;
pub mod spatial;
pub mod world;

pub use plugin::{CityBuilt, CityPlugin, RebuildCity};
pub use render::CityRenderPlugin;
pub use world::{CitySettings, CityWorld};
