//! # Waterways
//!
//! Rivers that run from high ground to a low map edge.
//!
//! ## Per waterway
//!
//! 1. Pick a start column whose surface is in the upper part of the map.
//! 2. Pick the lowest edge column far enough from the start.
//! 3. Trace a path: every step scores the 8 neighbours on drop, progress
//!    and a random meander term, then picks randomly among the best few.
//! 4. Carve a rounded channel along the finished path.
//! 5. Emit water sources at a fixed spacing on the carved surface.
//!
//! A waterway whose start or end cannot be found is skipped and logged.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::config::{GeneratorConfig, WaterwaySettings};
use crate::grid::{VoxelGrid, VoxelPos, VoxelState};
use crate::noise::{stage, WorldSeed};

/// Horizontal neighbour offsets `(dx, dz)`.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Tracing stops once the Manhattan distance to the end drops below this.
const ARRIVAL_DISTANCE: i32 = 3;

/// Path steps allowed per unit of map size.
const STEPS_PER_MAP_SIZE: usize = 3;

/// Anchor for a water source entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterSource {
    /// One voxel above the carved channel floor.
    pub position: VoxelPos,
    /// Source strength.
    pub strength: f64,
}

/// One carved cross-section of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSection {
    /// Path point; `y` is the surface height recorded while tracing.
    pub center: VoxelPos,
    /// Horizontal radius.
    pub half_width: i32,
    /// Layers carved downward from `center.y`.
    pub depth: i32,
}

impl ChannelSection {
    /// Iterates every in-section coordinate, in bounds or not.
    pub fn voxels(&self) -> impl Iterator<Item = VoxelPos> + '_ {
        let w = self.half_width;
        (0..self.depth).flat_map(move |dy| {
            (-w..=w).flat_map(move |dz| {
                (-w..=w)
                    .filter(move |dx| dx * dx + dz * dz <= w * w)
                    .map(move |dx| self.center.offset(dx, -dy, dz))
            })
        })
    }
}

/// Why a waterway was skipped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterwayFailure {
    /// No column was high enough within the attempt budget.
    #[error("no start above height {min_height} after {attempts} attempts")]
    NoStart {
        /// Required surface height.
        min_height: i32,
        /// Attempts made.
        attempts: u32,
    },
    /// No edge column was far enough from the start.
    #[error("no edge point far enough from start {start:?}")]
    NoEnd {
        /// Chosen start.
        start: VoxelPos,
    },
}

/// Result of one successful waterway.
#[derive(Clone, Debug, PartialEq)]
pub struct WaterwayReport {
    /// Start column, `y` is its surface.
    pub start: VoxelPos,
    /// Target edge column, `y` is its surface.
    pub end: VoxelPos,
    /// Traced path points.
    pub path_length: usize,
    /// Voxels removed by the channel.
    pub carved_voxels: usize,
    /// Carved sections, one per path point.
    pub sections: Vec<ChannelSection>,
    /// Emitted water sources.
    pub sources: Vec<WaterSource>,
}

/// Everything the waterway stage produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaterwayOutcome {
    /// Successful waterways, in generation order.
    pub waterways: Vec<WaterwayReport>,
    /// Skipped waterways.
    pub failures: Vec<WaterwayFailure>,
}

impl WaterwayOutcome {
    /// All water sources, in generation order.
    pub fn sources(&self) -> impl Iterator<Item = &WaterSource> {
        self.waterways.iter().flat_map(|w| w.sources.iter())
    }

    /// Total voxels removed.
    #[must_use]
    pub fn carved_voxels(&self) -> usize {
        self.waterways.iter().map(|w| w.carved_voxels).sum()
    }
}

/// Traces and carves waterways.
pub struct WaterwayCarver {
    seed: WorldSeed,
    settings: WaterwaySettings,
}

impl WaterwayCarver {
    /// Creates a carver for the map described by `config`.
    #[must_use]
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_settings(WorldSeed::new(config.seed), config.waterways.clone())
    }

    /// Creates a carver from explicit parts.
    #[must_use]
    pub const fn with_settings(seed: WorldSeed, settings: WaterwaySettings) -> Self {
        Self { seed, settings }
    }

    /// Generates every waterway. A disabled stage leaves the grid untouched.
    pub fn carve(&self, grid: &mut VoxelGrid) -> WaterwayOutcome {
        let mut outcome = WaterwayOutcome::default();
        if !self.settings.enabled {
            tracing::debug!("Waterways disabled");
            return outcome;
        }

        let mut rng = self.seed.stage_rng(stage::WATERWAYS);
        for index in 0..self.settings.count {
            match self.carve_one(grid, &mut rng) {
                Ok(report) => {
                    tracing::debug!(
                        "Waterway {}: {:?} -> {:?}, {} points, {} voxels",
                        index + 1,
                        report.start,
                        report.end,
                        report.path_length,
                        report.carved_voxels
                    );
                    outcome.waterways.push(report);
                }
                Err(failure) => {
                    tracing::warn!("Waterway {} skipped: {}", index + 1, failure);
                    outcome.failures.push(failure);
                }
            }
        }

        tracing::info!(
            "Waterways: {} of {} generated, {} sources, {} voxels carved",
            outcome.waterways.len(),
            self.settings.count,
            outcome.sources().count(),
            outcome.carved_voxels()
        );
        outcome
    }

    fn carve_one(&self, grid: &mut VoxelGrid, rng: &mut ChaCha8Rng) -> Result<WaterwayReport, WaterwayFailure> {
        let start = self.find_start(grid, rng)?;
        let end = self
            .find_end(grid, start)
            .ok_or(WaterwayFailure::NoEnd { start })?;

        // The whole path is traced before any voxel is removed
        let path = self.trace_path(grid, start, end, rng);
        let (sections, carved_voxels) = self.carve_channel(grid, &path, rng);
        let sources = self.emit_sources(grid, &path, rng);

        Ok(WaterwayReport {
            start,
            end,
            path_length: path.len(),
            carved_voxels,
            sections,
            sources,
        })
    }

    /// Samples random columns until one is high enough.
    ///
    /// # Errors
    ///
    /// `NoStart` when the attempt budget runs out.
    pub fn find_start(&self, grid: &VoxelGrid, rng: &mut ChaCha8Rng) -> Result<VoxelPos, WaterwayFailure> {
        let top_layer = grid.height().saturating_sub(1) as f64;
        let min_height = (top_layer * self.settings.start_height_fraction).ceil() as i32;

        for _ in 0..self.settings.start_attempts {
            let x = rng.gen_range(0..grid.width()) as i32;
            let z = rng.gen_range(0..grid.depth()) as i32;
            let surface = grid.surface_height(x, z);
            if surface >= min_height {
                return Ok(VoxelPos::new(x, surface, z));
            }
        }
        Err(WaterwayFailure::NoStart {
            min_height,
            attempts: self.settings.start_attempts,
        })
    }

    /// Lowest edge column whose Manhattan distance from `start` exceeds
    /// half the map size. Ties keep the first candidate sampled.
    #[must_use]
    pub fn find_end(&self, grid: &VoxelGrid, start: VoxelPos) -> Option<VoxelPos> {
        let width = grid.width() as i32;
        let depth = grid.depth() as i32;
        let samples = self.settings.edge_samples;
        let min_distance = grid.width().max(grid.depth()) as f64 * 0.5;

        (0..samples)
            .flat_map(|i| {
                let t = f64::from(i) / f64::from(samples);
                let along_x = (t * f64::from(width)) as i32;
                let along_z = (t * f64::from(depth)) as i32;
                [
                    (0, along_z),
                    (width - 1, along_z),
                    (along_x, 0),
                    (along_x, depth - 1),
                ]
            })
            .filter(|&(x, z)| f64::from(manhattan(x, z, start)) > min_distance)
            .map(|(x, z)| VoxelPos::new(x, grid.surface_height(x, z), z))
            .min_by_key(|p| p.y)
    }

    /// Traces a meandering downhill path from `start` toward `end`.
    ///
    /// Each point's `y` is the surface height when it was visited.
    #[must_use]
    pub fn trace_path(&self, grid: &VoxelGrid, start: VoxelPos, end: VoxelPos, rng: &mut ChaCha8Rng) -> Vec<VoxelPos> {
        let max_steps = grid.width().max(grid.depth()) * STEPS_PER_MAP_SIZE;
        let mut path = Vec::new();
        let mut current = start;

        for _ in 0..max_steps {
            path.push(current);
            if manhattan(current.x, current.z, end) < ARRIVAL_DISTANCE {
                break;
            }
            match self.next_step(grid, current, end, rng) {
                Some(next) => current = next,
                None => break,
            }
        }
        path
    }

    fn next_step(&self, grid: &VoxelGrid, current: VoxelPos, end: VoxelPos, rng: &mut ChaCha8Rng) -> Option<VoxelPos> {
        let current_height = grid.surface_height(current.x, current.z);
        let current_distance = manhattan(current.x, current.z, end);

        let mut candidates: Vec<(f64, VoxelPos)> = NEIGHBOURS
            .iter()
            .map(|&(dx, dz)| (current.x + dx, current.z + dz))
            .filter(|&(x, z)| x >= 0 && z >= 0 && (x as usize) < grid.width() && (z as usize) < grid.depth())
            .map(|(x, z)| {
                let height = grid.surface_height(x, z);
                let drop = f64::from(current_height - height) * 3.0;
                let progress = f64::from(current_distance - manhattan(x, z, end)) * 0.5;
                let meander = (rng.gen::<f64>() - 0.5) * self.settings.meandering * 4.0;
                (drop + progress + meander, VoxelPos::new(x, height, z))
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        let top = self.settings.top_k.min(candidates.len());
        Some(candidates[rng.gen_range(0..top)].1)
    }

    /// Carves a rounded channel of varying width and depth along `path`.
    /// Returns the carved sections and the number of voxels removed.
    pub fn carve_channel(
        &self,
        grid: &mut VoxelGrid,
        path: &[VoxelPos],
        rng: &mut ChaCha8Rng,
    ) -> (Vec<ChannelSection>, usize) {
        let mut sections = Vec::with_capacity(path.len());
        let mut removed = 0;

        for (i, &point) in path.iter().enumerate() {
            let progress = i as f64 / path.len() as f64;
            let wave = (progress * std::f64::consts::PI * 3.0).sin() * 0.3;
            let width_scale = 0.8 + wave + rng.gen::<f64>() * 0.4;
            let depth_scale = 0.7 + rng.gen::<f64>() * 0.6;

            let section = ChannelSection {
                center: point,
                half_width: ((self.settings.width * width_scale).floor() as i32).max(1),
                depth: ((self.settings.depth * depth_scale).floor() as i32).max(1),
            };
            for pos in section.voxels() {
                if grid.is_solid(pos) {
                    grid.set(pos, VoxelState::Air);
                    removed += 1;
                }
            }
            sections.push(section);
        }
        (sections, removed)
    }

    /// Emits a source every `max(source_spacing, min_source_spacing)` path
    /// points, one voxel above the carved surface.
    pub fn emit_sources(&self, grid: &VoxelGrid, path: &[VoxelPos], rng: &mut ChaCha8Rng) -> Vec<WaterSource> {
        let spacing = self.settings.source_spacing.max(self.settings.min_source_spacing).max(1);
        let top_layer = grid.height().saturating_sub(1) as i32;
        let (min_strength, max_strength) = (self.settings.source_min_strength, self.settings.source_max_strength);

        path.iter()
            .step_by(spacing)
            .map(|point| {
                let y = (grid.surface_height(point.x, point.z) + 1).min(top_layer);
                let strength = if max_strength > min_strength {
                    rng.gen_range(min_strength..=max_strength)
                } else {
                    min_strength
                };
                WaterSource {
                    position: VoxelPos::new(point.x, y, point.z),
                    strength,
                }
            })
            .collect()
    }
}

fn manhattan(x: i32, z: i32, target: VoxelPos) -> i32 {
    (x - target.x).abs() + (z - target.z).abs()
}
