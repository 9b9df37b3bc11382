//! # Generator Configuration
//!
//! Every tunable of the pipeline, loadable from TOML. All sections use
//! `#[serde(default)]` so a file only needs to name what it changes:
//!
//! ```toml
//! map_size = 128
//! seed = 42
//!
//! [caves]
//! worm_count = 20
//!
//! [waterways]
//! enabled = false
//! ```
//!
//! [`GeneratorConfig::validate`] rejects out-of-range values before any grid
//! is allocated.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::grid::MAP_LAYERS;

/// Largest accepted `map_size`.
pub const MAX_MAP_SIZE: usize = 4096;

/// Largest accepted `grid_height`.
pub const MAX_GRID_HEIGHT: usize = 256;

/// Top-level generator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Width and depth of the square map.
    pub map_size: usize,
    /// Target maximum terrain height.
    pub max_height: usize,
    /// Vertical extent of the voxel grid.
    pub grid_height: usize,
    /// Top-level seed. Every stage derives its own seed from it.
    pub seed: u64,
    /// Heightmap shaping.
    pub terrain: TerrainSettings,
    /// Worm tunnels and cavern noise.
    pub caves: CaveSettings,
    /// Waterway tracing and channel carving.
    pub waterways: WaterwaySettings,
    /// Cliff overhangs.
    pub overhangs: OverhangSettings,
    /// Structural validation.
    pub validation: ValidationSettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            map_size: 128,
            max_height: 20,
            grid_height: MAP_LAYERS,
            seed: 12345,
            terrain: TerrainSettings::default(),
            caves: CaveSettings::default(),
            waterways: WaterwaySettings::default(),
            overhangs: OverhangSettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

/// Heightmap layer and shaping parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Base layer frequency.
    pub base_scale: f64,
    /// Base layer octaves.
    pub base_octaves: u32,
    /// Exponent applied to the normalized base value.
    pub base_exponent: f64,
    /// Amplitude falloff per octave, shared by all layers.
    pub persistence: f64,
    /// Frequency growth per octave, shared by all layers.
    pub lacunarity: f64,
    /// Enables the ridged peak layer.
    pub peaks_enabled: bool,
    /// Peak layer frequency.
    pub peaks_scale: f64,
    /// Peak layer octaves.
    pub peaks_octaves: u32,
    /// Exponent applied to the normalized peak value.
    pub peaks_exponent: f64,
    /// Enables the single-octave detail layer.
    pub detail_enabled: bool,
    /// Detail layer frequency.
    pub detail_scale: f64,
    /// Blend weight of the base layer.
    pub base_weight: f64,
    /// Blend weight of the peak layer.
    pub peaks_weight: f64,
    /// Blend weight of the detail layer.
    pub detail_weight: f64,
    /// Lowest terrain height as a fraction of `max_height`.
    pub min_height_fraction: f64,
    /// Enables plateau quantization.
    pub terrace_enabled: bool,
    /// Number of terrace steps.
    pub terrace_steps: u32,
    /// Blend between raw (0) and fully quantized (1) heights.
    pub terrace_strength: f64,
    /// Lowers terrain toward the map edges.
    pub gradient_falloff: bool,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            base_scale: 0.015,
            base_octaves: 3,
            base_exponent: 1.2,
            persistence: 0.5,
            lacunarity: 2.0,
            peaks_enabled: true,
            peaks_scale: 0.03,
            peaks_octaves: 4,
            peaks_exponent: 2.0,
            detail_enabled: true,
            detail_scale: 0.08,
            base_weight: 0.6,
            peaks_weight: 0.3,
            detail_weight: 0.1,
            min_height_fraction: 0.2,
            terrace_enabled: true,
            terrace_steps: 6,
            terrace_strength: 0.3,
            gradient_falloff: false,
        }
    }
}

/// Cave carving parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveSettings {
    /// Master switch. When off the stage leaves the grid untouched.
    pub enabled: bool,
    /// Number of worm tunnels.
    pub worm_count: u32,
    /// Smallest tunnel radius.
    pub worm_radius_min: f64,
    /// Largest tunnel radius.
    pub worm_radius_max: f64,
    /// Fewest segments per tunnel.
    pub worm_segments_min: u32,
    /// Most segments per tunnel.
    pub worm_segments_max: u32,
    /// Distance advanced per segment.
    pub worm_step_length: f64,
    /// Extra damping on vertical direction changes, in `[0, 1]`. 0 keeps the
    /// default bias, 1 makes tunnels strictly level after the first step.
    pub worm_vertical_damping: f64,
    /// Lowest carvable `y`.
    pub min_y: usize,
    /// Enables 3D noise chamber carving.
    pub cavern_enabled: bool,
    /// Cavern noise frequency.
    pub cavern_frequency: f64,
    /// Noise value above which solid voxels are carved.
    pub cavern_threshold: f64,
    /// Upper bound of the cavern band as a fraction of `max_height`.
    pub cavern_max_height_fraction: f64,
    /// Breaks cave ceilings open to the surface.
    pub open_entrances: bool,
}

impl Default for CaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            worm_count: 15,
            worm_radius_min: 2.0,
            worm_radius_max: 3.0,
            worm_segments_min: 50,
            worm_segments_max: 100,
            worm_step_length: 1.5,
            worm_vertical_damping: 0.0,
            min_y: 3,
            cavern_enabled: true,
            cavern_frequency: 0.1,
            cavern_threshold: 0.6,
            cavern_max_height_fraction: 0.7,
            open_entrances: false,
        }
    }
}

/// Waterway parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterwaySettings {
    /// Master switch. When off the stage leaves the grid untouched.
    pub enabled: bool,
    /// Waterways to attempt.
    pub count: u32,
    /// Minimum start surface as a fraction of the top usable layer.
    pub start_height_fraction: f64,
    /// Random samples tried before giving up on a start point.
    pub start_attempts: u32,
    /// Candidate end points sampled per map edge.
    pub edge_samples: u32,
    /// Strength of the random term in neighbour scoring.
    pub meandering: f64,
    /// Neighbours kept for the random pick at each step.
    pub top_k: usize,
    /// Base channel half-width.
    pub width: f64,
    /// Base channel depth.
    pub depth: f64,
    /// Requested spacing between water sources along a path.
    pub source_spacing: usize,
    /// Spacing floor. The effective spacing is the larger of the two.
    pub min_source_spacing: usize,
    /// Weakest emitted source.
    pub source_min_strength: f64,
    /// Strongest emitted source.
    pub source_max_strength: f64,
}

impl Default for WaterwaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 2,
            start_height_fraction: 0.5,
            start_attempts: 100,
            edge_samples: 20,
            meandering: 0.5,
            top_k: 3,
            width: 3.0,
            depth: 2.0,
            source_spacing: 30,
            min_source_spacing: 30,
            source_min_strength: 1.0,
            source_max_strength: 1.0,
        }
    }
}

/// Cliff overhang parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverhangSettings {
    /// Master switch.
    pub enabled: bool,
    /// Probability that a qualifying cliff grows an overhang.
    pub chance: f64,
    /// Minimum drop to a neighbour for a column to count as a cliff.
    pub min_cliff_height: usize,
    /// Longest overhang in voxels.
    pub max_length: usize,
}

impl Default for OverhangSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            chance: 0.3,
            min_cliff_height: 4,
            max_length: 3,
        }
    }
}

/// Structural validation parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Master switch.
    pub enabled: bool,
    /// Lateral steps allowed before a support chain must go down again.
    pub max_overhang: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_overhang: 3,
        }
    }
}

impl GeneratorConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigParse` on malformed TOML or wrong value types.
    pub fn from_toml_str(text: &str) -> TerrainResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `ConfigParse` if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| TerrainError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// `ConfigParse` if serialization fails.
    pub fn to_toml_string(&self) -> TerrainResult<String> {
        toml::to_string(self).map_err(|err| TerrainError::ConfigParse(err.to_string()))
    }

    /// Checks every value against its valid range.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> TerrainResult<()> {
        ensure(
            (4..=MAX_MAP_SIZE).contains(&self.map_size),
            "map_size must be in [4, 4096]",
        )?;
        ensure(
            (2..=MAX_GRID_HEIGHT).contains(&self.grid_height),
            "grid_height must be in [2, 256]",
        )?;
        ensure(self.max_height >= 1, "max_height must be >= 1")?;
        self.terrain.validate()?;
        self.caves.validate(self.map_size)?;
        self.waterways.validate(self.map_size, self.grid_height)?;
        self.overhangs.validate()?;
        self.validation.validate()
    }
}

impl TerrainSettings {
    fn validate(&self) -> TerrainResult<()> {
        ensure_finite(&[
            (self.base_scale, "terrain.base_scale"),
            (self.base_exponent, "terrain.base_exponent"),
            (self.persistence, "terrain.persistence"),
            (self.lacunarity, "terrain.lacunarity"),
            (self.peaks_scale, "terrain.peaks_scale"),
            (self.peaks_exponent, "terrain.peaks_exponent"),
            (self.detail_scale, "terrain.detail_scale"),
            (self.base_weight, "terrain.base_weight"),
            (self.peaks_weight, "terrain.peaks_weight"),
            (self.detail_weight, "terrain.detail_weight"),
            (self.min_height_fraction, "terrain.min_height_fraction"),
            (self.terrace_strength, "terrain.terrace_strength"),
        ])?;
        ensure(self.base_octaves >= 1, "terrain.base_octaves must be >= 1")?;
        ensure(self.peaks_octaves >= 1, "terrain.peaks_octaves must be >= 1")?;
        ensure(self.base_scale > 0.0, "terrain.base_scale must be > 0")?;
        ensure(self.peaks_scale > 0.0, "terrain.peaks_scale must be > 0")?;
        ensure(self.detail_scale > 0.0, "terrain.detail_scale must be > 0")?;
        ensure(
            self.persistence > 0.0 && self.persistence <= 1.0,
            "terrain.persistence must be in (0, 1]",
        )?;
        ensure(self.lacunarity >= 1.0, "terrain.lacunarity must be >= 1")?;
        ensure(self.base_exponent > 0.0, "terrain.base_exponent must be > 0")?;
        ensure(self.peaks_exponent > 0.0, "terrain.peaks_exponent must be > 0")?;
        ensure(self.base_weight > 0.0, "terrain.base_weight must be > 0")?;
        ensure(
            self.peaks_weight >= 0.0 && self.detail_weight >= 0.0,
            "terrain layer weights must be >= 0",
        )?;
        ensure(
            self.min_height_fraction > 0.0 && self.min_height_fraction < 1.0,
            "terrain.min_height_fraction must be in (0, 1)",
        )?;
        ensure(self.terrace_steps >= 1, "terrain.terrace_steps must be >= 1")?;
        ensure(
            (0.0..=1.0).contains(&self.terrace_strength),
            "terrain.terrace_strength must be in [0, 1]",
        )
    }
}

impl CaveSettings {
    fn validate(&self, map_size: usize) -> TerrainResult<()> {
        ensure_finite(&[
            (self.worm_radius_min, "caves.worm_radius_min"),
            (self.worm_radius_max, "caves.worm_radius_max"),
            (self.worm_step_length, "caves.worm_step_length"),
            (self.worm_vertical_damping, "caves.worm_vertical_damping"),
            (self.cavern_frequency, "caves.cavern_frequency"),
            (self.cavern_threshold, "caves.cavern_threshold"),
            (self.cavern_max_height_fraction, "caves.cavern_max_height_fraction"),
        ])?;
        let limit = map_size as f64;
        ensure(self.worm_radius_min > 0.0, "caves.worm_radius_min must be > 0")?;
        ensure(
            self.worm_radius_max <= limit,
            "caves.worm_radius_max must be <= map_size",
        )?;
        ensure(
            self.worm_radius_min <= self.worm_radius_max,
            "caves.worm_radius_min must be <= caves.worm_radius_max",
        )?;
        ensure(
            self.worm_segments_min <= self.worm_segments_max,
            "caves.worm_segments_min must be <= caves.worm_segments_max",
        )?;
        ensure(
            self.worm_step_length > 0.0 && self.worm_step_length <= limit,
            "caves.worm_step_length must be in (0, map_size]",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.worm_vertical_damping),
            "caves.worm_vertical_damping must be in [0, 1]",
        )?;
        ensure(self.cavern_frequency > 0.0, "caves.cavern_frequency must be > 0")?;
        ensure(
            (-1.0..=1.0).contains(&self.cavern_threshold),
            "caves.cavern_threshold must be in [-1, 1]",
        )?;
        ensure(
            self.cavern_max_height_fraction > 0.0 && self.cavern_max_height_fraction <= 1.0,
            "caves.cavern_max_height_fraction must be in (0, 1]",
        )
    }
}

impl WaterwaySettings {
    fn validate(&self, map_size: usize, grid_height: usize) -> TerrainResult<()> {
        ensure_finite(&[
            (self.start_height_fraction, "waterways.start_height_fraction"),
            (self.meandering, "waterways.meandering"),
            (self.width, "waterways.width"),
            (self.depth, "waterways.depth"),
            (self.source_min_strength, "waterways.source_min_strength"),
            (self.source_max_strength, "waterways.source_max_strength"),
        ])?;
        let limit = map_size as f64;
        ensure(
            self.start_height_fraction > 0.0 && self.start_height_fraction < 1.0,
            "waterways.start_height_fraction must be in (0, 1)",
        )?;
        ensure(self.start_attempts >= 1, "waterways.start_attempts must be >= 1")?;
        ensure(self.edge_samples >= 1, "waterways.edge_samples must be >= 1")?;
        ensure(self.meandering >= 0.0, "waterways.meandering must be >= 0")?;
        ensure(self.top_k >= 1, "waterways.top_k must be >= 1")?;
        ensure(
            self.width > 0.0 && self.width <= limit,
            "waterways.width must be in (0, map_size]",
        )?;
        ensure(
            self.depth > 0.0 && self.depth <= grid_height as f64,
            "waterways.depth must be in (0, grid_height]",
        )?;
        ensure(
            self.source_spacing.max(self.min_source_spacing) >= 1,
            "waterways source spacing must be >= 1",
        )?;
        ensure(
            self.source_min_strength >= 0.0,
            "waterways.source_min_strength must be >= 0",
        )?;
        ensure(
            self.source_min_strength <= self.source_max_strength,
            "waterways.source_min_strength must be <= waterways.source_max_strength",
        )
    }
}

impl OverhangSettings {
    fn validate(&self) -> TerrainResult<()> {
        ensure_finite(&[(self.chance, "overhangs.chance")])?;
        ensure(
            (0.0..=1.0).contains(&self.chance),
            "overhangs.chance must be in [0, 1]",
        )?;
        ensure(
            self.min_cliff_height >= 1,
            "overhangs.min_cliff_height must be >= 1",
        )?;
        ensure(self.max_length >= 1, "overhangs.max_length must be >= 1")
    }
}

impl ValidationSettings {
    fn validate(&self) -> TerrainResult<()> {
        ensure(self.max_overhang >= 1, "validation.max_overhang must be >= 1")
    }
}

fn ensure_finite(values: &[(f64, &str)]) -> TerrainResult<()> {
    match values.iter().find(|(value, _)| !value.is_finite()) {
        Some((_, field)) => Err(TerrainError::InvalidConfig(format!("{field} must be finite"))),
        None => Ok(()),
    }
}

fn ensure(condition: bool, message: &str) -> TerrainResult<()> {
    if condition {
        Ok(())
    } else {
        Err(TerrainError::InvalidConfig(message.to_string()))
    }
}
