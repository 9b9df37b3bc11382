//! # Cave Carving
//!
//! Two passes over the filled grid, in order:
//!
//! 1. **Worm tunnels**: random walks that carve a sphere per segment. The
//!    walk favours horizontal movement so tunnels read as passages.
//! 2. **Caverns**: solid voxels in an underground band are carved wherever
//!    3D noise exceeds a threshold.
//!
//! Optionally a third pass opens cave ceilings toward the surface.
//! Every pass only removes voxels.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::{CaveSettings, GeneratorConfig};
use crate::grid::{VoxelGrid, VoxelPos, VoxelState};
use crate::noise::{stage, NoiseField, NoiseSettings, WorldSeed};

/// What the cave stage removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaveReport {
    /// Tunnels walked.
    pub tunnels: u32,
    /// Voxels removed by tunnels.
    pub tunnel_voxels: usize,
    /// Voxels removed by cavern noise.
    pub cavern_voxels: usize,
    /// Ceiling voxels removed to open entrances.
    pub entrance_voxels: usize,
}

impl CaveReport {
    /// Total voxels removed by the stage.
    #[must_use]
    pub const fn total_removed(&self) -> usize {
        self.tunnel_voxels + self.cavern_voxels + self.entrance_voxels
    }
}

/// Carves worm tunnels and noise caverns.
pub struct CaveCarver {
    seed: WorldSeed,
    max_height: usize,
    settings: CaveSettings,
    cavern_noise: NoiseField,
}

impl CaveCarver {
    /// Creates a carver for the map described by `config`.
    #[must_use]
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_settings(WorldSeed::new(config.seed), config.max_height, config.caves.clone())
    }

    /// Creates a carver from explicit parts.
    #[must_use]
    pub fn with_settings(seed: WorldSeed, max_height: usize, settings: CaveSettings) -> Self {
        let cavern_noise = NoiseField::new(
            seed.offset(stage::CAVERN_NOISE),
            NoiseSettings::single(settings.cavern_frequency),
        );
        Self {
            seed,
            max_height,
            settings,
            cavern_noise,
        }
    }

    /// Runs every enabled pass. A disabled stage leaves the grid untouched.
    pub fn carve(&self, grid: &mut VoxelGrid) -> CaveReport {
        if !self.settings.enabled {
            tracing::debug!("Cave carving disabled");
            return CaveReport::default();
        }

        let mut report = CaveReport::default();
        (report.tunnels, report.tunnel_voxels) = self.carve_worm_tunnels(grid);
        if self.settings.cavern_enabled {
            report.cavern_voxels = self.carve_caverns(grid);
        }
        if self.settings.open_entrances {
            report.entrance_voxels = open_entrances(grid);
        }

        tracing::info!(
            "Caves: {} tunnels removed {} voxels, caverns removed {}, entrances removed {}",
            report.tunnels,
            report.tunnel_voxels,
            report.cavern_voxels,
            report.entrance_voxels
        );
        report
    }

    /// Walks `worm_count` tunnels. Returns `(tunnels, voxels removed)`.
    pub fn carve_worm_tunnels(&self, grid: &mut VoxelGrid) -> (u32, usize) {
        let mut rng = self.seed.stage_rng(stage::WORM_TUNNELS);
        let Some((min_y, max_y)) = self.vertical_band(grid) else {
            tracing::warn!("Grid too shallow for worm tunnels, skipping");
            return (0, 0);
        };

        let mut removed = 0;
        for _ in 0..self.settings.worm_count {
            removed += self.carve_worm(grid, &mut rng, min_y, max_y);
        }
        (self.settings.worm_count, removed)
    }

    /// Carves every solid voxel in the underground band whose noise value
    /// exceeds the threshold. Returns the number removed.
    pub fn carve_caverns(&self, grid: &mut VoxelGrid) -> usize {
        let band_top = self.max_height as f64 * self.settings.cavern_max_height_fraction;
        let min_y = self.settings.min_y as i32;

        let carved: Vec<VoxelPos> = grid
            .iter_solid()
            .skip_while(|p| p.y < min_y)
            .take_while(|p| f64::from(p.y) < band_top)
            .filter(|p| {
                self.cavern_noise.sample_3d(f64::from(p.x), f64::from(p.y), f64::from(p.z))
                    > self.settings.cavern_threshold
            })
            .collect();

        for &pos in &carved {
            grid.set(pos, VoxelState::Air);
        }
        carved.len()
    }

    /// Usable `y` range for tunnel centres, `None` if empty.
    fn vertical_band(&self, grid: &VoxelGrid) -> Option<(f64, f64)> {
        let min_y = self.settings.min_y as f64;
        let ceiling = grid.height() as f64 - 2.0;
        let band_top = (self.max_height as f64 * self.settings.cavern_max_height_fraction).min(ceiling);
        (ceiling >= min_y).then_some((min_y, band_top.max(min_y)))
    }

    fn carve_worm(&self, grid: &mut VoxelGrid, rng: &mut ChaCha8Rng, min_y: f64, band_top: f64) -> usize {
        let s = &self.settings;
        let max_x = (grid.width() as f64 - 2.0).max(1.0);
        let max_z = (grid.depth() as f64 - 2.0).max(1.0);
        let max_y = grid.height() as f64 - 2.0;

        // sqrt pushes starts toward the top of the band
        let mut pos = [
            (rng.gen_range(0..grid.width()) as f64).clamp(1.0, max_x),
            min_y + rng.gen::<f64>().sqrt() * (band_top - min_y),
            (rng.gen_range(0..grid.depth()) as f64).clamp(1.0, max_z),
        ];
        let segments = rng.gen_range(s.worm_segments_min..=s.worm_segments_max);
        let radius = rng.gen_range(s.worm_radius_min..=s.worm_radius_max);

        let mut dir = normalize([
            rng.gen::<f64>() * 2.0 - 1.0,
            (rng.gen::<f64>() * 2.0 - 1.0) * 0.5,
            rng.gen::<f64>() * 2.0 - 1.0,
        ]);

        let mut removed = 0;
        for _ in 0..segments {
            removed += carve_sphere(grid, pos, radius);

            dir[0] += (rng.gen::<f64>() - 0.5) * 0.5;
            dir[1] = (dir[1] + (rng.gen::<f64>() - 0.5) * 0.3) * (1.0 - s.worm_vertical_damping);
            dir[2] += (rng.gen::<f64>() - 0.5) * 0.5;
            dir = normalize(dir);

            pos[0] = (pos[0] + dir[0] * s.worm_step_length).clamp(1.0, max_x);
            pos[1] = (pos[1] + dir[1] * s.worm_step_length).clamp(min_y, max_y);
            pos[2] = (pos[2] + dir[2] * s.worm_step_length).clamp(1.0, max_z);
        }
        removed
    }
}

/// Sets every solid voxel within `radius` of `center` to air.
/// Returns the number removed.
pub fn carve_sphere(grid: &mut VoxelGrid, center: [f64; 3], radius: f64) -> usize {
    let reach = radius.ceil() as i32;
    let radius_sq = radius * radius;
    let origin = VoxelPos::new(
        center[0].round() as i32,
        center[1].round() as i32,
        center[2].round() as i32,
    );

    // Offsets clipped to the grid
    let span = |c: i32, size: usize| {
        (-reach).max(c.saturating_neg())..=reach.min((size as i32 - 1).saturating_sub(c))
    };

    let mut removed = 0;
    for dy in span(origin.y, grid.height()) {
        for dz in span(origin.z, grid.depth()) {
            for dx in span(origin.x, grid.width()) {
                if f64::from(dx * dx + dy * dy + dz * dz) > radius_sq {
                    continue;
                }
                let pos = origin.offset(dx, dy, dz);
                if grid.is_solid(pos) {
                    grid.set(pos, VoxelState::Air);
                    removed += 1;
                }
            }
        }
    }
    removed
}

/// Scanning each column top-down, removes the first solid voxel that has
/// air directly below it. Returns the number removed.
pub fn open_entrances(grid: &mut VoxelGrid) -> usize {
    let mut removed = 0;
    for z in 0..grid.depth() as i32 {
        for x in 0..grid.width() as i32 {
            let Some(top) = grid.column_top(x, z) else {
                continue;
            };
            let ceiling = (1..=top)
                .rev()
                .map(|y| VoxelPos::new(x, y, z))
                .find(|&pos| grid.is_solid(pos) && !grid.is_solid(pos.below()));
            if let Some(pos) = ceiling {
                grid.set(pos, VoxelState::Air);
                removed += 1;
            }
        }
    }
    removed
}

fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > f64::EPSILON {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [1.0, 0.0, 0.0]
    }
}
