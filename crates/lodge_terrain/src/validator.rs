//! # Structural Validation
//!
//! Removes solid voxels with no support chain to the ground.
//!
//! ## Support
//!
//! - `y = 0` is always supported.
//! - Stepping down onto a solid voxel resets the overhang counter.
//! - Stepping to one of the 8 horizontal neighbours at the same height adds
//!   one. A chain may take at most `max_overhang` such steps in a row.
//!
//! ## Passes
//!
//! Each pass classifies every solid voxel bottom-up against an unmodified
//! grid, then removes the unsupported ones. Passes repeat until one removes
//! nothing. The solid count never grows, so this terminates.

use std::collections::HashMap;

use crate::config::GeneratorConfig;
use crate::grid::{VoxelGrid, VoxelPos, VoxelState};

/// Horizontal neighbour offsets `(dx, dz)`, lateral then diagonal.
const HORIZONTAL: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Outcome of a validation run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Passes executed, including the final pass that removed nothing.
    pub passes: u32,
    /// Voxels removed over all passes.
    pub removed: usize,
    /// Removals of each productive pass.
    pub removed_per_pass: Vec<usize>,
}

/// Per-pass support classification.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Support {
    Unknown,
    Supported,
    Unsupported,
}

/// Dense classification table, indexed like the grid.
struct SupportMemo {
    width: usize,
    depth: usize,
    states: Vec<Support>,
}

impl SupportMemo {
    fn new(grid: &VoxelGrid) -> Self {
        Self {
            width: grid.width(),
            depth: grid.depth(),
            states: vec![Support::Unknown; grid.width() * grid.height() * grid.depth()],
        }
    }

    /// Callers only pass in-bounds positions.
    #[inline]
    fn index(&self, pos: VoxelPos) -> usize {
        (pos.y as usize * self.depth + pos.z as usize) * self.width + pos.x as usize
    }

    #[inline]
    fn get(&self, pos: VoxelPos) -> Support {
        self.states[self.index(pos)]
    }

    #[inline]
    fn set(&mut self, pos: VoxelPos, support: Support) {
        let index = self.index(pos);
        self.states[index] = support;
    }
}

/// Search state reused by every search of a pass.
#[derive(Default)]
struct SearchScratch {
    best: HashMap<VoxelPos, u32>,
    stack: Vec<(VoxelPos, u32)>,
    grounded_visits: Vec<VoxelPos>,
}

impl SearchScratch {
    fn clear(&mut self) {
        self.best.clear();
        self.stack.clear();
        self.grounded_visits.clear();
    }
}

/// Removes unsupported voxels until the grid is stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructuralValidator {
    max_overhang: u32,
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::with_max_overhang(3)
    }
}

impl StructuralValidator {
    /// Creates a validator for the map described by `config`.
    #[must_use]
    pub const fn new(config: &GeneratorConfig) -> Self {
        Self::with_max_overhang(config.validation.max_overhang)
    }

    /// Creates a validator with an explicit overhang limit.
    #[must_use]
    pub const fn with_max_overhang(max_overhang: u32) -> Self {
        Self { max_overhang }
    }

    /// Runs passes until one removes nothing.
    pub fn validate(&self, grid: &mut VoxelGrid) -> ValidationReport {
        let mut report = ValidationReport::default();
        let max_passes = grid.solid_count() + 1;

        loop {
            if report.passes as usize >= max_passes {
                tracing::warn!("Structural validation stopped after {} passes", report.passes);
                break;
            }

            let before = grid.solid_count();
            let removed = self.run_pass(grid);
            report.passes += 1;
            debug_assert!(grid.solid_count() <= before, "validation pass added voxels");

            tracing::debug!("Validation pass {}: {} removed", report.passes, removed);
            if removed == 0 {
                break;
            }
            report.removed += removed;
            report.removed_per_pass.push(removed);
        }

        tracing::info!(
            "Structural validation: {} voxels removed in {} passes",
            report.removed,
            report.passes
        );
        report
    }

    /// One classification pass. Returns the number of voxels removed.
    pub fn run_pass(&self, grid: &mut VoxelGrid) -> usize {
        let mut memo = SupportMemo::new(grid);
        let mut scratch = SearchScratch::default();
        let unsupported: Vec<VoxelPos> = grid
            .iter_solid()
            .filter(|&pos| !self.search(grid, pos, &mut memo, &mut scratch))
            .collect();

        for &pos in &unsupported {
            grid.set(pos, VoxelState::Air);
        }
        unsupported.len()
    }

    /// Returns true if the solid voxel at `pos` has a support chain.
    #[must_use]
    pub fn is_supported(&self, grid: &VoxelGrid, pos: VoxelPos) -> bool {
        grid.is_solid(pos)
            && self.search(grid, pos, &mut SupportMemo::new(grid), &mut SearchScratch::default())
    }

    /// Depth-first support search with an explicit stack.
    ///
    /// `best` keeps the lowest counter seen per voxel; a voxel is only
    /// revisited with a strictly lower counter.
    fn search(
        &self,
        grid: &VoxelGrid,
        start: VoxelPos,
        memo: &mut SupportMemo,
        scratch: &mut SearchScratch,
    ) -> bool {
        if start.y == 0 {
            memo.set(start, Support::Supported);
            return true;
        }
        match memo.get(start) {
            Support::Supported => return true,
            Support::Unsupported => return false,
            Support::Unknown => {}
        }

        // Resting on a known-supported voxel
        let below = start.below();
        if grid.is_solid(below) && (below.y == 0 || memo.get(below) == Support::Supported) {
            memo.set(start, Support::Supported);
            return true;
        }

        scratch.clear();
        let SearchScratch {
            best,
            stack,
            grounded_visits,
        } = scratch;
        best.insert(start, 0);
        stack.push((start, 0));

        while let Some((pos, count)) = stack.pop() {
            if best.get(&pos).is_some_and(|&b| b < count) {
                continue;
            }
            if count == 0 {
                grounded_visits.push(pos);
            }

            let below = pos.below();
            if grid.is_solid(below) {
                if below.y == 0 || memo.get(below) == Support::Supported {
                    memo.set(start, Support::Supported);
                    return true;
                }
                if memo.get(below) == Support::Unknown {
                    push_if_better(stack, best, below, 0);
                }
            }

            if count >= self.max_overhang {
                continue;
            }
            for (dx, dz) in HORIZONTAL {
                let next = pos.offset(dx, 0, dz);
                if grid.is_solid(next) && memo.get(next) != Support::Unsupported {
                    push_if_better(stack, best, next, count + 1);
                }
            }
        }

        // Every voxel entered with a fresh counter had its whole reachable
        // space explored without finding ground.
        for pos in grounded_visits.drain(..) {
            memo.set(pos, Support::Unsupported);
        }
        false
    }
}

fn push_if_better(stack: &mut Vec<(VoxelPos, u32)>, best: &mut HashMap<VoxelPos, u32>, pos: VoxelPos, count: u32) {
    let improved = best.get(&pos).map_or(true, |&b| count < b);
    if improved {
        best.insert(pos, count);
        stack.push((pos, count));
    }
}
