//! # Cliff Overhangs
//!
//! Grows short ledges out of cliff tops toward the lower side. Ledges longer
//! than the support limit are trimmed again by structural validation.

use rand::Rng;

use crate::config::{GeneratorConfig, OverhangSettings};
use crate::grid::{VoxelGrid, VoxelPos, VoxelState};
use crate::noise::{stage, WorldSeed};

/// Directions a ledge may grow in, first wins on ties.
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// What the overhang stage added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverhangReport {
    /// Columns that qualified as cliffs.
    pub cliffs: usize,
    /// Ledges grown.
    pub overhangs: usize,
    /// Voxels turned solid.
    pub added_voxels: usize,
}

/// Adds overhangs at cliff edges.
pub struct OverhangGenerator {
    seed: WorldSeed,
    settings: OverhangSettings,
}

impl OverhangGenerator {
    /// Creates a generator for the map described by `config`.
    #[must_use]
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_settings(WorldSeed::new(config.seed), config.overhangs.clone())
    }

    /// Creates a generator from explicit parts.
    #[must_use]
    pub const fn with_settings(seed: WorldSeed, settings: OverhangSettings) -> Self {
        Self { seed, settings }
    }

    /// Grows overhangs. A disabled stage leaves the grid untouched.
    pub fn generate(&self, grid: &mut VoxelGrid) -> OverhangReport {
        if !self.settings.enabled {
            tracing::debug!("Overhangs disabled");
            return OverhangReport::default();
        }

        let mut rng = self.seed.stage_rng(stage::OVERHANGS);
        let cliffs = self.find_cliffs(grid);
        let mut report = OverhangReport {
            cliffs: cliffs.len(),
            ..OverhangReport::default()
        };

        for cliff in cliffs {
            if rng.gen::<f64>() >= self.settings.chance {
                continue;
            }
            let length = rng.gen_range(1..=self.settings.max_length) as i32;
            let (dx, dz) = lowest_direction(grid, cliff);

            for step in 1..=length {
                let pos = cliff.offset(dx * step, 0, dz * step);
                if !grid.is_in_bounds(pos) {
                    break;
                }
                report.added_voxels += place(grid, pos);
                if step < length && rng.gen_bool(0.5) {
                    report.added_voxels += place(grid, pos.below());
                }
            }
            report.overhangs += 1;
        }

        tracing::info!(
            "Overhangs: {} grown from {} cliffs, {} voxels added",
            report.overhangs,
            report.cliffs,
            report.added_voxels
        );
        report
    }

    /// Interior columns that stand at least `min_cliff_height` above one of
    /// their four neighbours. `y` of each result is the column surface.
    #[must_use]
    pub fn find_cliffs(&self, grid: &VoxelGrid) -> Vec<VoxelPos> {
        let min_drop = self.settings.min_cliff_height as i32;
        let mut cliffs = Vec::new();

        for z in 1..grid.depth() as i32 - 1 {
            for x in 1..grid.width() as i32 - 1 {
                let height = grid.surface_height(x, z);
                let is_cliff = DIRECTIONS
                    .iter()
                    .any(|&(dx, dz)| height - grid.surface_height(x + dx, z + dz) >= min_drop);
                if is_cliff {
                    cliffs.push(VoxelPos::new(x, height, z));
                }
            }
        }
        cliffs
    }
}

/// Direction toward the lowest of the four neighbours.
fn lowest_direction(grid: &VoxelGrid, cliff: VoxelPos) -> (i32, i32) {
    DIRECTIONS
        .iter()
        .copied()
        .min_by_key(|&(dx, dz)| grid.surface_height(cliff.x + dx, cliff.z + dz))
        .unwrap_or(DIRECTIONS[0])
}

/// Sets a voxel solid, returning 1 if it was air.
fn place(grid: &mut VoxelGrid, pos: VoxelPos) -> usize {
    if !grid.is_in_bounds(pos) || grid.is_solid(pos) {
        return 0;
    }
    grid.set(pos, VoxelState::Solid);
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plateau of height 12 for `x < 5`, ground at height 2 beyond.
    fn cliff_grid() -> VoxelGrid {
        let mut grid = VoxelGrid::new(10, 23, 10);
        for z in 0..10 {
            for x in 0..10 {
                let top = if x < 5 { 12 } else { 2 };
                for y in 0..=top {
                    grid.set(VoxelPos::new(x, y, z), VoxelState::Solid);
                }
            }
        }
        grid
    }

    fn generator(chance: f64) -> OverhangGenerator {
        OverhangGenerator::with_settings(
            WorldSeed::new(42),
            OverhangSettings {
                enabled: true,
                chance,
                min_cliff_height: 4,
                max_length: 3,
            },
        )
    }

    #[test]
    fn test_finds_cliff_edge() {
        let grid = cliff_grid();
        let cliffs = generator(1.0).find_cliffs(&grid);

        // Interior rows z = 1..9 along x = 4
        assert_eq!(cliffs.len(), 8);
        assert!(cliffs.iter().all(|c| c.x == 4 && c.y == 12));
    }

    #[test]
    fn test_overhangs_grow_toward_low_side() {
        let mut grid = cliff_grid();
        let before = grid.clone();
        let report = generator(1.0).generate(&mut grid);

        assert_eq!(report.overhangs, 8);
        assert!(report.added_voxels >= 8);
        assert_eq!(grid.solid_count(), before.solid_count() + report.added_voxels);

        for z in 1..9 {
            // First ledge voxel always sits beside the cliff top
            assert!(grid.is_solid(VoxelPos::new(5, 12, z)));
            // Nothing grows back over the plateau
            assert_eq!(grid.surface_height(3, z), 12);
        }
        // Ledges never exceed max_length
        for z in 0..10 {
            assert!(!grid.is_solid(VoxelPos::new(8, 12, z)));
        }
    }

    #[test]
    fn test_zero_chance_adds_nothing() {
        let mut grid = cliff_grid();
        let before = grid.clone();
        let report = generator(0.0).generate(&mut grid);
        assert_eq!(report.overhangs, 0);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut grid = cliff_grid();
        let before = grid.clone();
        let generator = OverhangGenerator::with_settings(WorldSeed::new(1), OverhangSettings::default());
        assert_eq!(generator.generate(&mut grid), OverhangReport::default());
        assert_eq!(grid, before);
    }
}
