//! # Heightmap Generation
//!
//! Column heights from up to three noise layers:
//!
//! | Layer  | Kind   | Default frequency | Octaves | Shaping  | Weight |
//! |--------|--------|-------------------|---------|----------|--------|
//! | base   | plain  | 0.015             | 3       | `v^1.2`  | 0.6    |
//! | peaks  | ridged | 0.03              | 4       | `v^2`    | 0.3    |
//! | detail | plain  | 0.08              | 1       | none     | 0.1    |
//!
//! Weights are renormalized over the enabled layers. The blend is optionally
//! lowered toward the edges, then terraced, then mapped onto
//! `[min_height, max_height]` and clamped to the grid.

use crate::config::{GeneratorConfig, TerrainSettings};
use crate::noise::{stage, FractalKind, NoiseField, NoiseSettings, WorldSeed};

/// Column heights for a map, indexed `[z][x]`.
///
/// Produced once per run and consumed by
/// [`VoxelGrid::fill_columns_from_heightmap`](crate::grid::VoxelGrid::fill_columns_from_heightmap).
#[derive(Clone, Debug, PartialEq)]
pub struct Heightmap {
    width: usize,
    depth: usize,
    values: Vec<f32>,
}

impl Heightmap {
    /// Creates a flat heightmap at height 0.
    #[must_use]
    pub fn new(width: usize, depth: usize) -> Self {
        Self {
            width,
            depth,
            values: vec![0.0; width * depth],
        }
    }

    /// Builds a heightmap from a per-column function `f(x, z)`.
    pub fn from_fn(width: usize, depth: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut values = Vec::with_capacity(width * depth);
        for z in 0..depth {
            for x in 0..width {
                values.push(f(x, z));
            }
        }
        Self { width, depth, values }
    }

    /// Width (x extent).
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Depth (z extent).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Height of column `(x, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the column is outside the heightmap.
    #[must_use]
    pub fn get(&self, x: usize, z: usize) -> f32 {
        assert!(x < self.width && z < self.depth, "column ({x}, {z}) out of range");
        self.values[z * self.width + x]
    }

    /// Sets the height of column `(x, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the column is outside the heightmap.
    pub fn set(&mut self, x: usize, z: usize, height: f32) {
        assert!(x < self.width && z < self.depth, "column ({x}, {z}) out of range");
        self.values[z * self.width + x] = height;
    }

    /// All heights, row by row (`z` outer).
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterates rows of constant `z`.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks(self.width.max(1))
    }

    /// Computes summary statistics relative to `max_height`.
    #[must_use]
    pub fn stats(&self, max_height: usize) -> HeightmapStats {
        HeightmapStats::compute(self, max_height)
    }
}

/// Shape statistics of a heightmap, logged after generation.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightmapStats {
    /// Lowest column.
    pub min: f32,
    /// Highest column.
    pub max: f32,
    /// Mean column height.
    pub mean: f64,
    /// Number of distinct integer heights.
    pub unique_levels: usize,
    /// Mean absolute height difference to the `+x` and `+z` neighbours.
    pub mean_local_variation: f64,
    /// Mean of range %, unique-level % (both of `max_height`) and
    /// 10x local variation. Higher reads as more varied terrain.
    pub interest_score: f64,
}

impl HeightmapStats {
    fn compute(heightmap: &Heightmap, max_height: usize) -> Self {
        let values = heightmap.values();
        if values.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                unique_levels: 0,
                mean_local_variation: 0.0,
                interest_score: 0.0,
            };
        }

        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;

        let mut levels: Vec<i64> = values.iter().map(|v| v.floor() as i64).collect();
        levels.sort_unstable();
        levels.dedup();
        let unique_levels = levels.len();

        let mut variation = 0.0;
        let mut pairs = 0usize;
        for z in 0..heightmap.depth() {
            for x in 0..heightmap.width() {
                let h = f64::from(heightmap.get(x, z));
                if x + 1 < heightmap.width() {
                    variation += (h - f64::from(heightmap.get(x + 1, z))).abs();
                    pairs += 1;
                }
                if z + 1 < heightmap.depth() {
                    variation += (h - f64::from(heightmap.get(x, z + 1))).abs();
                    pairs += 1;
                }
            }
        }
        let mean_local_variation = if pairs == 0 { 0.0 } else { variation / pairs as f64 };

        let max_height = max_height.max(1) as f64;
        let range_score = f64::from(max - min) / max_height * 100.0;
        let level_score = unique_levels as f64 / max_height * 100.0;
        let interest_score = (range_score + level_score + mean_local_variation * 10.0) / 3.0;

        Self {
            min,
            max,
            mean,
            unique_levels,
            mean_local_variation,
            interest_score,
        }
    }
}

/// Generates heightmaps from layered noise.
///
/// Each layer owns its noise field, seeded from the top-level seed plus the
/// layer's stage offset.
pub struct HeightmapGenerator {
    size: usize,
    max_height: usize,
    grid_height: usize,
    settings: TerrainSettings,
    base: NoiseField,
    peaks: Option<NoiseField>,
    detail: Option<NoiseField>,
}

impl HeightmapGenerator {
    /// Creates a generator for the map described by `config`.
    #[must_use]
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_settings(
            WorldSeed::new(config.seed),
            config.map_size,
            config.max_height,
            config.grid_height,
            config.terrain.clone(),
        )
    }

    /// Creates a generator from explicit parts.
    #[must_use]
    pub fn with_settings(
        seed: WorldSeed,
        size: usize,
        max_height: usize,
        grid_height: usize,
        settings: TerrainSettings,
    ) -> Self {
        let base = NoiseField::new(
            seed.offset(stage::HEIGHTMAP_BASE),
            NoiseSettings::fractal(
                FractalKind::Plain,
                settings.base_octaves,
                settings.base_scale,
                settings.persistence,
                settings.lacunarity,
            ),
        );
        let peaks = settings.peaks_enabled.then(|| {
            NoiseField::new(
                seed.offset(stage::HEIGHTMAP_PEAKS),
                NoiseSettings::fractal(
                    FractalKind::Ridged,
                    settings.peaks_octaves,
                    settings.peaks_scale,
                    settings.persistence,
                    settings.lacunarity,
                ),
            )
        });
        let detail = settings.detail_enabled.then(|| {
            NoiseField::new(
                seed.offset(stage::HEIGHTMAP_DETAIL),
                NoiseSettings::single(settings.detail_scale),
            )
        });

        Self {
            size,
            max_height,
            grid_height,
            settings,
            base,
            peaks,
            detail,
        }
    }

    /// Generates the full heightmap. Every value is an integer in
    /// `[0, grid_height - 1]`.
    #[must_use]
    pub fn generate(&self) -> Heightmap {
        tracing::debug!("Generating {}x{} heightmap", self.size, self.size);
        let heightmap = Heightmap::from_fn(self.size, self.size, |x, z| self.column_height(x, z));

        let stats = heightmap.stats(self.max_height);
        tracing::info!(
            "Heightmap: heights {}..={}, mean {:.2}, {} levels, interest {:.1}",
            stats.min,
            stats.max,
            stats.mean,
            stats.unique_levels,
            stats.interest_score
        );
        heightmap
    }

    /// Final height of column `(x, z)`.
    #[must_use]
    pub fn column_height(&self, x: usize, z: usize) -> f32 {
        let value = self.shaped_value(x, z);
        let max_height = self.max_height as f64;
        let min_height = max_height * self.settings.min_height_fraction;
        let height = (min_height + value * (max_height - min_height)).floor();
        let ceiling = self.grid_height.saturating_sub(1) as f64;
        height.clamp(0.0, ceiling) as f32
    }

    /// Blended, falloff-adjusted and terraced value in `[0, 1]`.
    #[must_use]
    pub fn shaped_value(&self, x: usize, z: usize) -> f64 {
        let mut value = self.blended_value(x, z);
        if self.settings.gradient_falloff {
            value *= self.falloff(x, z);
        }
        if self.settings.terrace_enabled {
            value = self.terrace(value);
        }
        value.clamp(0.0, 1.0)
    }

    /// Weighted blend of the enabled layers in `[0, 1]`.
    fn blended_value(&self, x: usize, z: usize) -> f64 {
        let (fx, fz) = (x as f64, z as f64);
        let s = &self.settings;

        let mut total = self.base.sample_2d_unit(fx, fz).powf(s.base_exponent) * s.base_weight;
        let mut weight = s.base_weight;

        if let Some(peaks) = &self.peaks {
            total += peaks.sample_2d_unit(fx, fz).powf(s.peaks_exponent) * s.peaks_weight;
            weight += s.peaks_weight;
        }
        if let Some(detail) = &self.detail {
            total += detail.sample_2d_unit(fx, fz) * s.detail_weight;
            weight += s.detail_weight;
        }

        if weight > 0.0 { total / weight } else { 0.0 }
    }

    /// Edge falloff multiplier in `[0.5, 1]`.
    fn falloff(&self, x: usize, z: usize) -> f64 {
        let center = (self.size as f64 - 1.0) * 0.5;
        let max_distance = (self.size as f64 * 0.5).max(1.0);
        let dx = x as f64 - center;
        let dz = z as f64 - center;
        let t = ((dx * dx + dz * dz).sqrt() / max_distance).min(1.0);
        0.5 + 0.5 * (1.0 - t * t)
    }

    fn terrace(&self, value: f64) -> f64 {
        let steps = f64::from(self.settings.terrace_steps);
        let stepped = (value * steps).floor() / steps;
        value + (stepped - value) * self.settings.terrace_strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64, size: usize) -> GeneratorConfig {
        GeneratorConfig {
            map_size: size,
            seed,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_heightmap_determinism() {
        let a = HeightmapGenerator::new(&config(42, 32)).generate();
        let b = HeightmapGenerator::new(&config(42, 32)).generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = HeightmapGenerator::new(&config(1, 32)).generate();
        let b = HeightmapGenerator::new(&config(2, 32)).generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_heights_are_integral_and_in_range() {
        let cfg = config(99, 48);
        let heightmap = HeightmapGenerator::new(&cfg).generate();
        assert_eq!(heightmap.width(), 48);
        assert_eq!(heightmap.depth(), 48);
        assert_eq!(heightmap.rows().count(), 48);

        let min_height = (cfg.max_height as f64 * cfg.terrain.min_height_fraction).floor() as f32;
        for &h in heightmap.values() {
            assert_eq!(h, h.floor());
            assert!((min_height..=(cfg.grid_height - 1) as f32).contains(&h), "height {h}");
        }
    }

    /// A max height above the grid must clamp, never overflow.
    #[test]
    fn test_tall_terrain_clamps_to_grid() {
        let cfg = GeneratorConfig {
            max_height: 200,
            ..config(5, 32)
        };
        let heightmap = HeightmapGenerator::new(&cfg).generate();
        let ceiling = (cfg.grid_height - 1) as f32;
        assert!(heightmap.values().iter().all(|&h| h <= ceiling));
        assert!(heightmap.values().iter().any(|&h| h == ceiling));
    }

    #[test]
    fn test_full_terrace_quantizes() {
        let mut cfg = config(11, 24);
        cfg.terrain.terrace_strength = 1.0;
        cfg.terrain.terrace_steps = 4;
        let generator = HeightmapGenerator::new(&cfg);

        for z in 0..24 {
            for x in 0..24 {
                let v = generator.shaped_value(x, z) * 4.0;
                assert!((v - v.round()).abs() < 1e-9, "value {v} not on a step");
            }
        }
    }

    #[test]
    fn test_falloff_lowers_edges() {
        let mut flat = config(3, 40);
        flat.terrain.gradient_falloff = false;
        let mut falloff = flat.clone();
        falloff.terrain.gradient_falloff = true;

        let plain = HeightmapGenerator::new(&flat);
        let lowered = HeightmapGenerator::new(&falloff);

        for z in 0..40 {
            for x in 0..40 {
                assert!(lowered.shaped_value(x, z) <= plain.shaped_value(x, z) + 1e-12);
            }
        }
        // Corners drop to half
        let corner = lowered.shaped_value(0, 0);
        assert!(corner <= plain.shaped_value(0, 0) * 0.5 + 1.0 / 6.0);
    }

    #[test]
    fn test_base_layer_only() {
        let mut cfg = config(8, 16);
        cfg.terrain.peaks_enabled = false;
        cfg.terrain.detail_enabled = false;
        cfg.terrain.terrace_enabled = false;
        let generator = HeightmapGenerator::new(&cfg);

        for z in 0..16 {
            for x in 0..16 {
                let v = generator.shaped_value(x, z);
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_stats_on_known_heightmap() {
        // Columns: 2 3 / 4 5
        let heightmap = Heightmap::from_fn(2, 2, |x, z| (2 + x + z * 2) as f32);
        let stats = heightmap.stats(10);

        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.mean - 3.5).abs() < 1e-9);
        assert_eq!(stats.unique_levels, 4);
        // |2-3| + |2-4| + |3-5| + |4-5| over four pairs
        assert!((stats.mean_local_variation - 1.5).abs() < 1e-9);
        let expected = (30.0 + 40.0 + 15.0) / 3.0;
        assert!((stats.interest_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_heightmap_set_get() {
        let mut heightmap = Heightmap::new(3, 2);
        heightmap.set(2, 1, 7.5);
        assert_eq!(heightmap.get(2, 1), 7.5);
        assert_eq!(heightmap.values()[5], 7.5);
        assert_eq!(heightmap.get(0, 0), 0.0);
    }
}
