//! # LODGE Terrain
//!
//! Procedural voxel terrain for fixed-grid city-building maps.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and config always produce the same grid
//! 2. **Staged**: One grid, mutated by one stage at a time, in a fixed order
//! 3. **Fail fast**: Bad configuration is rejected before any voxel exists
//! 4. **Forgiving edges**: Out-of-bounds reads are air, writes are ignored
//!
//! ## Core Components
//!
//! - `VoxelGrid`: Bit-packed solid/air storage with a column height index
//! - `NoiseField`: Seeded 2D/3D simplex noise with fractal octaves
//! - `HeightmapGenerator`: Layered, terraced column heights
//! - `CaveCarver`: Worm tunnels and noise caverns
//! - `WaterwayCarver`: Meandering river channels and water sources
//! - `OverhangGenerator`: Cliff ledges
//! - `StructuralValidator`: Removes voxels with no support chain
//! - `TerrainPipeline`: Runs all of the above
//!
//! ## Example
//!
//! ```rust
//! use lodge_terrain::{GeneratorConfig, TerrainPipeline, MAP_LAYERS};
//!
//! let mut config = GeneratorConfig::default();
//! config.map_size = 32;
//! config.seed = 12345;
//!
//! let terrain = TerrainPipeline::new(config)?.generate()?;
//! let layers = terrain.grid.export_layers(MAP_LAYERS);
//! assert_eq!(layers.len(), 32 * 32 * MAP_LAYERS);
//! # Ok::<(), lodge_terrain::TerrainError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod caves;
pub mod config;
pub mod error;
pub mod grid;
pub mod heightmap;
pub mod noise;
pub mod overhang;
pub mod pipeline;
pub mod validator;
pub mod waterway;

pub use caves::{CaveCarver, CaveReport};
pub use config::{
    CaveSettings, GeneratorConfig, OverhangSettings, TerrainSettings, ValidationSettings,
    WaterwaySettings, MAX_GRID_HEIGHT, MAX_MAP_SIZE,
};
pub use error::{TerrainError, TerrainResult};
pub use grid::{TerrainView, VoxelGrid, VoxelPos, VoxelState, MAP_LAYERS};
pub use heightmap::{Heightmap, HeightmapGenerator, HeightmapStats};
pub use noise::{FractalKind, NoiseField, NoiseSettings, SimplexNoise, WorldSeed};
pub use overhang::{OverhangGenerator, OverhangReport};
pub use pipeline::{generate_terrain, GeneratedTerrain, GenerationReport, PipelineStage, TerrainPipeline};
pub use validator::{StructuralValidator, ValidationReport};
pub use waterway::{ChannelSection, WaterSource, WaterwayCarver, WaterwayFailure, WaterwayOutcome, WaterwayReport};
