// src/world/settings.rs
//! Session configuration, loaded from RON. Every section falls back to the
//! stock city so partial files are valid.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::core::WorldSeed;
use super::random::random_seed;
use crate::layout::archetypes::{Archetype, HeightRange};
use crate::layout::handmade::HandmadeMap;

pub const DEFAULT_SETTINGS_PATH: &str = "assets/city.settings.ron";

// ---------- Errors ----------

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("I/O while reading settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid { field, reason: reason.into() }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

// ---------- Sections ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SeedSetting {
    Fixed(u64),
    #[default]
    Random,
}

impl SeedSetting {
    pub fn resolve(self) -> WorldSeed {
        match self {
            SeedSetting::Fixed(seed) => WorldSeed(seed),
            SeedSetting::Random => random_seed(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub block_size: f32,
    pub road_width: f32,
    /// Blocks per side.
    pub grid_size: u32,
    /// Blocks per side of each corner safe zone.
    pub safe_zone_size: u32,
    /// Block-centre jitter as a fraction of block size.
    pub jitter: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self { block_size: 40.0, road_width: 10.0, grid_size: 70, safe_zone_size: 2, jitter: 0.2 }
    }
}

impl LayoutSettings {
    /// Side length of the whole city, edge block to edge block.
    pub fn world_size(&self) -> f32 {
        self.grid_size as f32 * self.pitch() - self.road_width
    }

    /// Distance between neighbouring block centres.
    #[inline]
    pub fn pitch(&self) -> f32 { self.block_size + self.road_width }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeEntry {
    pub archetype: Archetype,
    pub weight: f32,
    #[serde(default)]
    pub height: Option<HeightRange>,
}

impl ArchetypeEntry {
    pub fn new(archetype: Archetype, weight: f32) -> Self {
        Self { archetype, weight, height: None }
    }

    pub fn height(&self) -> HeightRange {
        self.height.unwrap_or_else(|| self.archetype.default_height())
    }
}

/// Ordered weight table. Order matters for the cumulative draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeTable(pub Vec<ArchetypeEntry>);

impl Default for ArchetypeTable {
    fn default() -> Self {
        Self(vec![
            ArchetypeEntry::new(Archetype::Empty, 0.0),
            ArchetypeEntry::new(Archetype::LowRise, 25.0),
            ArchetypeEntry::new(Archetype::MidRise, 20.0),
            ArchetypeEntry::new(Archetype::HighRise, 15.0),
            ArchetypeEntry::new(Archetype::Industrial, 10.0),
            ArchetypeEntry::new(Archetype::Plaza, 8.0),
            ArchetypeEntry::new(Archetype::Park, 22.0),
        ])
    }
}

impl ArchetypeTable {
    pub fn entries(&self) -> &[ArchetypeEntry] { &self.0 }

    pub fn total_weight(&self) -> f32 {
        self.0.iter().map(|e| e.weight.max(0.0)).sum()
    }

    pub fn height_for(&self, archetype: Archetype) -> HeightRange {
        self.0
            .iter()
            .find(|e| e.archetype == archetype)
            .map(ArchetypeEntry::height)
            .unwrap_or_else(|| archetype.default_height())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterSettings {
    pub min_distance: f32,
    /// Candidate attempts per active point before it retires.
    pub attempts: u32,
}

impl Default for ScatterSettings {
    fn default() -> Self { Self { min_distance: 3.0, attempts: 30 } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub cell_size: f32,
    /// Objects at or below this height never block placement.
    pub min_block_height: f32,
}

impl Default for GridSettings {
    fn default() -> Self { Self { cell_size: 20.0, min_block_height: 1.5 } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    pub physics_radius: f32,
    pub query_radius: f32,
    pub render_radius: f32,
    pub shadow_radius: f32,
    /// Seconds between sweep slices.
    pub slice_interval: f32,
    /// Target seconds for one pass over every static object.
    pub full_cycle: f32,
    pub min_batch: usize,
    pub agent_physics_radius: f32,
    pub agent_query_radius: f32,
    /// Seconds a freshly registered agent stays simulated regardless of distance.
    pub spawn_grace: f32,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            physics_radius: 100.0,
            query_radius: 200.0,
            render_radius: 200.0,
            shadow_radius: 200.0,
            slice_interval: 0.1,
            full_cycle: 2.0,
            min_batch: 200,
            agent_physics_radius: 100.0,
            agent_query_radius: 200.0,
            spawn_grace: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Desired sample count along one axis of the city.
    pub samples_per_axis: u32,
    /// Reference step the clamp bounds derive from.
    pub base_step: f32,
    /// Half-side of the probe square checked at each sample.
    pub buffer: f32,
    pub agent_spawn_count: usize,
    pub jitter_radius: f32,
    pub jitter_attempts: u32,
    pub player_center_radius: f32,
    pub agent_min_distance: f32,
    pub agent_max_distance: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            samples_per_axis: 300,
            base_step: 30.0,
            buffer: 3.0,
            agent_spawn_count: 500,
            jitter_radius: 8.0,
            jitter_attempts: 1,
            player_center_radius: 80.0,
            agent_min_distance: 30.0,
            agent_max_distance: 200.0,
        }
    }
}

impl SpawnSettings {
    /// Grid step for a city of `world_size`, clamped around the base step.
    pub fn step_for(&self, world_size: f32) -> f32 {
        let lo = (0.2 * self.base_step).max(5.0);
        let hi = (2.0 * self.base_step).max(20.0);
        (world_size / self.samples_per_axis.max(1) as f32).clamp(lo, hi)
    }
}

/// Where the layout comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MapSource {
    #[default]
    Procedural,
    Handmade(String),
}

/// A resolved [`MapSource`], ready to generate from.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum LayoutSource {
    #[default]
    Procedural,
    Handmade(HandmadeMap),
}

impl MapSource {
    pub fn resolve(&self) -> Result<LayoutSource, SettingsError> {
        match self {
            MapSource::Procedural => Ok(LayoutSource::Procedural),
            MapSource::Handmade(path) => HandmadeMap::load(path).map(LayoutSource::Handmade),
        }
    }
}

// ---------- Root ----------

#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitySettings {
    pub seed: SeedSetting,
    pub layout: LayoutSettings,
    pub archetypes: ArchetypeTable,
    pub scatter: ScatterSettings,
    pub grid: GridSettings,
    pub activation: ActivationSettings,
    pub spawn: SpawnSettings,
    pub map: MapSource,
}

impl CitySettings {
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let settings: CitySettings =
            ron::de::from_str(text).map_err(|e| SettingsError::Ron(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Load, or fall back to the stock city with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("city settings {} unusable ({err}); using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let l = &self.layout;
        require_positive("layout.block_size", l.block_size)?;
        if l.road_width < 0.0 || l.road_width.is_nan() {
            return Err(invalid("layout.road_width", "must not be negative"));
        }
        if l.grid_size == 0 {
            return Err(invalid("layout.grid_size", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&l.jitter) {
            return Err(invalid("layout.jitter", format!("must lie in [0, 1), got {}", l.jitter)));
        }

        if let Some(bad) = self.archetypes.0.iter().find(|e| e.weight < 0.0 || e.weight.is_nan()) {
            return Err(invalid(
                "archetypes",
                format!("{:?} has negative weight {}", bad.archetype, bad.weight),
            ));
        }
        if let Some(bad) = self.archetypes.0.iter().find(|e| e.height().min > e.height().max) {
            return Err(invalid("archetypes", format!("{:?} height range is inverted", bad.archetype)));
        }

        require_positive("scatter.min_distance", self.scatter.min_distance)?;
        if self.scatter.attempts == 0 {
            return Err(invalid("scatter.attempts", "must be at least 1"));
        }

        require_positive("grid.cell_size", self.grid.cell_size)?;

        let a = &self.activation;
        require_positive("activation.physics_radius", a.physics_radius)?;
        require_positive("activation.query_radius", a.query_radius)?;
        require_positive("activation.render_radius", a.render_radius)?;
        require_positive("activation.shadow_radius", a.shadow_radius)?;
        require_positive("activation.slice_interval", a.slice_interval)?;
        if a.slice_interval >= a.full_cycle {
            return Err(invalid(
                "activation.full_cycle",
                format!("must exceed slice_interval ({} >= {})", a.slice_interval, a.full_cycle),
            ));
        }
        if a.min_batch == 0 {
            return Err(invalid("activation.min_batch", "must be at least 1"));
        }

        let s = &self.spawn;
        require_positive("spawn.base_step", s.base_step)?;
        require_positive("spawn.buffer", s.buffer)?;
        if s.samples_per_axis == 0 {
            return Err(invalid("spawn.samples_per_axis", "must be at least 1"));
        }
        if s.agent_min_distance > s.agent_max_distance {
            return Err(invalid("spawn.agent_min_distance", "exceeds agent_max_distance"));
        }
        Ok(())
    }
}
