//! # Terrain Pipeline
//!
//! Runs the stages in a fixed order over one exclusively owned grid:
//!
//! ```text
//! Heightmap -> Fill -> Caves -> Waterways -> Overhangs -> Validation
//! ```
//!
//! The configuration is validated in [`TerrainPipeline::new`], before any
//! grid exists. Callers may stop a run between stages, never inside one.

use std::ops::ControlFlow;

use crate::caves::{CaveCarver, CaveReport};
use crate::config::GeneratorConfig;
use crate::error::{TerrainError, TerrainResult};
use crate::grid::VoxelGrid;
use crate::heightmap::{HeightmapGenerator, HeightmapStats};
use crate::overhang::{OverhangGenerator, OverhangReport};
use crate::validator::{StructuralValidator, ValidationReport};
use crate::waterway::{WaterSource, WaterwayCarver, WaterwayOutcome};

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Layered noise heightmap.
    Heightmap,
    /// Column fill from the heightmap.
    Fill,
    /// Worm tunnels and caverns.
    Caves,
    /// River channels and water sources.
    Waterways,
    /// Cliff overhangs.
    Overhangs,
    /// Support-chain cleanup.
    Validation,
}

impl PipelineStage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 6] = [
        Self::Heightmap,
        Self::Fill,
        Self::Caves,
        Self::Waterways,
        Self::Overhangs,
        Self::Validation,
    ];

    /// Short lowercase name, used in log spans.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Heightmap => "heightmap",
            Self::Fill => "fill",
            Self::Caves => "caves",
            Self::Waterways => "waterways",
            Self::Overhangs => "overhangs",
            Self::Validation => "validation",
        }
    }
}

/// Per-stage statistics of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationReport {
    /// Heightmap shape.
    pub heightmap: HeightmapStats,
    /// Solid voxels after the column fill.
    pub solid_after_fill: usize,
    /// Cave removals.
    pub caves: CaveReport,
    /// Solid voxels after caves.
    pub solid_after_caves: usize,
    /// Waterways generated.
    pub waterways: usize,
    /// Waterways skipped.
    pub waterways_failed: usize,
    /// Solid voxels after waterways.
    pub solid_after_waterways: usize,
    /// Overhang additions.
    pub overhangs: OverhangReport,
    /// Solid voxels after overhangs.
    pub solid_after_overhangs: usize,
    /// Validation removals.
    pub validation: ValidationReport,
    /// Solid voxels in the finished grid.
    pub final_solid: usize,
}

/// Finished terrain, ready for entity placement and export.
#[derive(Clone, Debug)]
pub struct GeneratedTerrain {
    /// The voxel grid.
    pub grid: VoxelGrid,
    /// Waterways and their water sources.
    pub waterways: WaterwayOutcome,
    /// Run statistics.
    pub report: GenerationReport,
}

impl GeneratedTerrain {
    /// Water source anchors, in generation order.
    pub fn water_sources(&self) -> impl Iterator<Item = &WaterSource> {
        self.waterways.sources()
    }
}

/// Drives a full generation run.
///
/// # Example
///
/// ```rust
/// use lodge_terrain::{GeneratorConfig, TerrainPipeline};
///
/// let config = GeneratorConfig {
///     map_size: 32,
///     seed: 42,
///     ..GeneratorConfig::default()
/// };
/// let terrain = TerrainPipeline::new(config)?.generate()?;
/// assert_eq!(terrain.grid.width(), 32);
/// # Ok::<(), lodge_terrain::TerrainError>(())
/// ```
#[derive(Clone, Debug)]
pub struct TerrainPipeline {
    config: GeneratorConfig,
}

impl TerrainPipeline {
    /// Validates `config` and creates the pipeline.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if any value is out of range.
    pub fn new(config: GeneratorConfig) -> TerrainResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// None in practice; shares the signature of
    /// [`generate_with_progress`](Self::generate_with_progress).
    pub fn generate(&self) -> TerrainResult<GeneratedTerrain> {
        self.generate_with_progress(|_| ControlFlow::Continue(()))
    }

    /// Runs every stage, calling `on_stage` before each one.
    ///
    /// # Errors
    ///
    /// `Cancelled` when `on_stage` returns `Break`; the stage it was called
    /// for does not run.
    pub fn generate_with_progress(
        &self,
        mut on_stage: impl FnMut(PipelineStage) -> ControlFlow<()>,
    ) -> TerrainResult<GeneratedTerrain> {
        let config = &self.config;
        let mut enter = |stage: PipelineStage| {
            if on_stage(stage).is_break() {
                tracing::warn!("Generation cancelled before {}", stage.name());
                return Err(TerrainError::Cancelled { stage });
            }
            Ok(tracing::info_span!("terrain_stage", stage = stage.name()).entered())
        };

        tracing::info!(
            "Generating {}x{}x{} terrain, seed {}",
            config.map_size,
            config.grid_height,
            config.map_size,
            config.seed
        );

        let span = enter(PipelineStage::Heightmap)?;
        let heightmap = HeightmapGenerator::new(config).generate();
        let heightmap_stats = heightmap.stats(config.max_height);
        drop(span);

        let span = enter(PipelineStage::Fill)?;
        let mut grid = VoxelGrid::new(config.map_size, config.grid_height, config.map_size);
        grid.fill_columns_from_heightmap(&heightmap);
        drop(heightmap);
        let solid_after_fill = grid.solid_count();
        tracing::debug!("Filled {} solid voxels", solid_after_fill);
        drop(span);

        let span = enter(PipelineStage::Caves)?;
        let caves = CaveCarver::new(config).carve(&mut grid);
        let solid_after_caves = grid.solid_count();
        drop(span);

        let span = enter(PipelineStage::Waterways)?;
        let waterways = WaterwayCarver::new(config).carve(&mut grid);
        let solid_after_waterways = grid.solid_count();
        drop(span);

        let span = enter(PipelineStage::Overhangs)?;
        let overhangs = OverhangGenerator::new(config).generate(&mut grid);
        let solid_after_overhangs = grid.solid_count();
        drop(span);

        let span = enter(PipelineStage::Validation)?;
        let validation = if config.validation.enabled {
            StructuralValidator::new(config).validate(&mut grid)
        } else {
            tracing::debug!("Structural validation disabled");
            ValidationReport::default()
        };
        drop(span);

        let report = GenerationReport {
            heightmap: heightmap_stats,
            solid_after_fill,
            caves,
            solid_after_caves,
            waterways: waterways.waterways.len(),
            waterways_failed: waterways.failures.len(),
            solid_after_waterways,
            overhangs,
            solid_after_overhangs,
            validation,
            final_solid: grid.solid_count(),
        };
        tracing::info!(
            "Terrain complete: {} solid voxels, {} water sources",
            report.final_solid,
            waterways.sources().count()
        );

        Ok(GeneratedTerrain {
            grid,
            waterways,
            report,
        })
    }
}

/// Validates `config` and runs the full pipeline.
///
/// # Errors
///
/// `InvalidConfig` if any value is out of range.
pub fn generate_terrain(config: GeneratorConfig) -> TerrainResult<GeneratedTerrain> {
    TerrainPipeline::new(config)?.generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            map_size: 24,
            seed: 42,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_before_generation() {
        let mut config = small_config();
        config.caves.worm_radius_min = -2.0;
        let err = TerrainPipeline::new(config).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidConfig(_)));
    }

    #[test]
    fn test_stages_run_in_order() {
        let pipeline = TerrainPipeline::new(small_config()).unwrap();
        let mut seen = Vec::new();
        pipeline
            .generate_with_progress(|stage| {
                seen.push(stage);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen, PipelineStage::ALL.to_vec());
    }

    #[test]
    fn test_cancel_between_stages() {
        let pipeline = TerrainPipeline::new(small_config()).unwrap();
        let mut seen = Vec::new();
        let result = pipeline.generate_with_progress(|stage| {
            seen.push(stage);
            if stage == PipelineStage::Caves {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(
            result.unwrap_err(),
            TerrainError::Cancelled {
                stage: PipelineStage::Caves
            }
        );
        assert_eq!(
            seen,
            vec![PipelineStage::Heightmap, PipelineStage::Fill, PipelineStage::Caves]
        );
    }

    #[test]
    fn test_report_counts_are_consistent() {
        let mut config = small_config();
        config.overhangs.enabled = true;
        let terrain = generate_terrain(config).unwrap();
        let r = &terrain.report;

        assert!(r.solid_after_caves <= r.solid_after_fill);
        assert!(r.solid_after_waterways <= r.solid_after_caves);
        assert!(r.solid_after_overhangs >= r.solid_after_waterways);
        assert_eq!(r.final_solid, r.solid_after_overhangs - r.validation.removed);
        assert_eq!(r.final_solid, terrain.grid.solid_count());
        assert_eq!(r.solid_after_fill - r.solid_after_caves, r.caves.total_removed());
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<&str> = PipelineStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["heightmap", "fill", "caves", "waterways", "overhangs", "validation"]
        );
    }
}
