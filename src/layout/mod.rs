// src/layout/mod.rs
//! Staged city generation.
//!
//! `PlanBlocks -> AssignArchetypes -> EmitRoads -> EmitStructures -> EmitScatter -> Done`,
//! strictly forward. Every random draw goes through the one world stream, so a
//! seed reproduces the same piece list.

use bevy::prelude::*;

pub mod archetypes;
pub mod blocks;
pub mod handmade;
pub mod scatter;

pub use archetypes::{Archetype, BlockBuilder, BuildParams, HeightRange};
pub use blocks::Block;
pub use handmade::HandmadeMap;

use archetypes::{scatter_builder, structure_builder};
use blocks::{draw_archetype, plan_blocks};
use crate::world::core::{MaterialHint, PieceKind, PlacedPiece};
use crate::world::random::SeededStream;
use crate::world::settings::{CitySettings, LayoutSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenerationStage {
    PlanBlocks,
    AssignArchetypes,
    EmitRoads,
    EmitStructures,
    EmitScatter,
    Done,
}

impl GenerationStage {
    pub fn next(self) -> Self {
        match self {
            GenerationStage::PlanBlocks => GenerationStage::AssignArchetypes,
            GenerationStage::AssignArchetypes => GenerationStage::EmitRoads,
            GenerationStage::EmitRoads => GenerationStage::EmitStructures,
            GenerationStage::EmitStructures => GenerationStage::EmitScatter,
            GenerationStage::EmitScatter | GenerationStage::Done => GenerationStage::Done,
        }
    }
}

/// Output of one generation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeneratedLayout {
    /// Side of the square the spatial grid must cover.
    pub world_size: f32,
    pub pieces: Vec<PlacedPiece>,
    /// Archetype per block, x-major. Empty for hand-authored maps.
    pub block_archetypes: Vec<Archetype>,
    /// Blocks that produced at least one piece.
    pub structures: usize,
    pub roads: usize,
}

pub struct LayoutGenerator<'a> {
    settings: &'a CitySettings,
    stream: &'a mut SeededStream,
    stage: GenerationStage,
    blocks: Vec<Block>,
    layout: GeneratedLayout,
}

impl<'a> LayoutGenerator<'a> {
    pub fn new(settings: &'a CitySettings, stream: &'a mut SeededStream) -> Self {
        Self {
            settings,
            stream,
            stage: GenerationStage::PlanBlocks,
            blocks: Vec::new(),
            layout: GeneratedLayout { world_size: settings.layout.world_size(), ..Default::default() },
        }
    }

    pub fn stage(&self) -> GenerationStage { self.stage }

    pub fn blocks(&self) -> &[Block] { &self.blocks }

    /// Run the current stage and move to the next. Returns the new stage.
    pub fn step(&mut self) -> GenerationStage {
        match self.stage {
            GenerationStage::PlanBlocks => {
                self.blocks = plan_blocks(&self.settings.layout, self.stream);
                let safe = self.blocks.iter().filter(|b| b.safe_zone).count();
                info!("layout: planned {} blocks ({safe} in safe zones)", self.blocks.len());
            }
            GenerationStage::AssignArchetypes => self.assign_archetypes(),
            GenerationStage::EmitRoads => self.emit_roads(),
            GenerationStage::EmitStructures => self.emit_structures(),
            GenerationStage::EmitScatter => self.emit_scatter(),
            GenerationStage::Done => {}
        }
        self.stage = self.stage.next();
        self.stage
    }

    pub fn run(mut self) -> GeneratedLayout {
        while self.stage != GenerationStage::Done {
            self.step();
        }
        self.layout
    }

    fn assign_archetypes(&mut self) {
        let table = &self.settings.archetypes;
        if table.total_weight() <= 0.0 {
            warn!("layout: archetype table has no positive weight; every block stays empty");
        }
        for block in &mut self.blocks {
            block.archetype =
                if block.safe_zone { Archetype::Empty } else { draw_archetype(table, self.stream) };
        }
        self.layout.block_archetypes = self.blocks.iter().map(|b| b.archetype).collect();
    }

    /// Ground slab plus one road strip per block boundary along each axis.
    fn emit_roads(&mut self) {
        let l = &self.settings.layout;
        let total = l.world_size();
        let offset = -total * 0.5;
        let pieces = &mut self.layout.pieces;

        pieces.push(
            PlacedPiece::boxed(
                Vec3::new(0.0, -0.1, 0.0),
                Vec3::new(total, 0.1, total),
                MaterialHint::Ground,
                PieceKind::Ground,
                true,
            )
            .always_active(),
        );

        let mut roads = 0;
        for i in 0..=l.grid_size {
            let pos = offset + i as f32 * l.pitch() - l.road_width * 0.5;
            // staggered bases keep crossing strips from z-fighting
            let along_x = PlacedPiece::boxed(
                Vec3::new(0.0, -0.08, pos),
                Vec3::new(total, 0.2, l.road_width),
                MaterialHint::Road,
                PieceKind::Road,
                true,
            );
            let along_z = PlacedPiece::boxed(
                Vec3::new(pos, -0.06, 0.0),
                Vec3::new(l.road_width, 0.2, total),
                MaterialHint::Road,
                PieceKind::Road,
                true,
            );
            for road in [along_x, along_z] {
                if !road.is_degenerate() {
                    pieces.push(road.always_active());
                    roads += 1;
                }
            }
        }
        self.layout.roads = roads;
        info!("layout: {roads} road strips over a {total} m city");
    }

    fn emit_structures(&mut self) {
        let before = self.layout.pieces.len();
        for block in &self.blocks {
            if block.archetype == Archetype::Empty {
                continue;
            }
            let params = BuildParams {
                anchor: block.anchor(),
                size: block.size,
                height: self.settings.archetypes.height_for(block.archetype),
            };
            let mut builder = BlockBuilder::new(self.stream, block);
            structure_builder(block.archetype)(&mut builder, &params);
            let pieces = builder.finish();
            if !pieces.is_empty() {
                self.layout.structures += 1;
            }
            self.layout.pieces.extend(pieces);
        }
        info!(
            "layout: {} structures, {} pieces",
            self.layout.structures,
            self.layout.pieces.len() - before
        );
    }

    fn emit_scatter(&mut self) {
        let before = self.layout.pieces.len();
        for block in &self.blocks {
            let Some(scatter) = scatter_builder(block.archetype) else { continue };
            let params = BuildParams {
                anchor: block.anchor(),
                size: block.size,
                height: self.settings.archetypes.height_for(block.archetype),
            };
            let mut builder = BlockBuilder::new(self.stream, block);
            scatter(&mut builder, &params, &self.settings.scatter);
            self.layout.pieces.extend(builder.finish());
        }
        info!("layout: {} scatter pieces", self.layout.pieces.len() - before);
    }
}

/// Generate from whichever source the session resolved.
pub fn generate(settings: &CitySettings, source: &LayoutSource, stream: &mut SeededStream) -> GeneratedLayout {
    match source {
        LayoutSource::Procedural => LayoutGenerator::new(settings, stream).run(),
        LayoutSource::Handmade(map) => {
            let pieces = map.emit(stream);
            let count = |kind| pieces.iter().filter(|p| p.kind == kind).count();
            let layout = GeneratedLayout {
                world_size: map.world_size(),
                structures: count(PieceKind::Structure),
                roads: count(PieceKind::Road),
                block_archetypes: Vec::new(),
                pieces,
            };
            info!(
                "layout: hand-authored map, {} buildings, {} pieces",
                layout.structures,
                layout.pieces.len()
            );
            layout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::settings::{ArchetypeEntry, ArchetypeTable, LayoutSettings};

    fn small() -> CitySettings {
        CitySettings {
            layout: LayoutSettings { grid_size: 8, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn stages_run_in_order() {
        let settings = small();
        let mut stream = SeededStream::new(1);
        let mut generator = LayoutGenerator::new(&settings, &mut stream);
        let mut seen = vec![generator.stage()];
        while generator.stage() != GenerationStage::Done {
            seen.push(generator.step());
        }
        assert_eq!(
            seen,
            vec![
                GenerationStage::PlanBlocks,
                GenerationStage::AssignArchetypes,
                GenerationStage::EmitRoads,
                GenerationStage::EmitStructures,
                GenerationStage::EmitScatter,
                GenerationStage::Done,
            ]
        );
        assert_eq!(generator.step(), GenerationStage::Done);
    }

    #[test]
    fn safe_zones_stay_empty() {
        let settings = small();
        let layout = LayoutGenerator::new(&settings, &mut SeededStream::new(3)).run();
        assert_eq!(layout.block_archetypes.len(), 64);
        for (i, a) in layout.block_archetypes.iter().enumerate() {
            let (x, z) = (i as u32 / 8, i as u32 % 8);
            if blocks::in_safe_zone(x, z, 8, 2) {
                assert_eq!(*a, Archetype::Empty);
            }
        }
        assert!(layout.structures > 0);
    }

    #[test]
    fn roads_cover_every_boundary() {
        let settings = small();
        let layout = LayoutGenerator::new(&settings, &mut SeededStream::new(3)).run();
        assert_eq!(layout.roads, 18);
        let ground: Vec<_> = layout.pieces.iter().filter(|p| p.kind == PieceKind::Ground).collect();
        assert_eq!(ground.len(), 1);
        assert_eq!(ground[0].footprint.width(), 390.0);
        assert!(layout
            .pieces
            .iter()
            .filter(|p| matches!(p.kind, PieceKind::Road | PieceKind::Ground))
            .all(|p| p.always_active && p.collides));
    }

    #[test]
    fn zero_table_builds_only_roads() {
        let settings = CitySettings {
            archetypes: ArchetypeTable(vec![ArchetypeEntry::new(Archetype::Park, 0.0)]),
            ..small()
        };
        let layout = LayoutGenerator::new(&settings, &mut SeededStream::new(3)).run();
        assert!(layout.block_archetypes.iter().all(|a| *a == Archetype::Empty));
        assert_eq!(layout.structures, 0);
        assert_eq!(layout.pieces.len(), 1 + layout.roads);
    }

    #[test]
    fn same_seed_same_layout() {
        let settings = small();
        let a = generate(&settings, &LayoutSource::Procedural, &mut SeededStream::new(42));
        let b = generate(&settings, &LayoutSource::Procedural, &mut SeededStream::new(42));
        let c = generate(&settings, &LayoutSource::Procedural, &mut SeededStream::new(7));
        assert_eq!(a, b);
        assert_ne!(a.block_archetypes, c.block_archetypes);
    }
}
