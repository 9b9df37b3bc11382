//! # Simplex Noise
//!
//! Deterministic 2D/3D simplex noise plus a fractal sampler (`NoiseField`).
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed` and `NoiseSettings`, a `NoiseField` returns
//! exactly the same value for the same coordinate, on any platform.
//!
//! ## Stage Seeds
//!
//! Every stage draws from `seed + offset` with a fixed offset from [`stage`],
//! so stages stay independent but reproducible from one top-level seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Fixed seed offsets, one per generator stage.
pub mod stage {
    /// Broad base-terrain heightmap layer.
    pub const HEIGHTMAP_BASE: u64 = 0;
    /// Ridged "peak" heightmap layer.
    pub const HEIGHTMAP_PEAKS: u64 = 1000;
    /// Fine detail heightmap layer.
    pub const HEIGHTMAP_DETAIL: u64 = 2000;
    /// 3D cavern noise.
    pub const CAVERN_NOISE: u64 = 3000;
    /// Worm tunnel random walk.
    pub const WORM_TUNNELS: u64 = 4000;
    /// Waterway start/end selection, meander and channel variation.
    pub const WATERWAYS: u64 = 5000;
    /// Cliff overhang placement.
    pub const OVERHANGS: u64 = 6000;
}

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `seed + offset` (wrapping), the seed of one stage.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Creates the random stream for the stage at `offset`.
    #[must_use]
    pub fn stage_rng(self, offset: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.offset(offset).value())
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// 12 gradient vectors for 2D simplex.
const GRAD2: [[i8; 2]; 12] = [
    [1, 0], [1, 1], [0, 1], [-1, 1],
    [-1, 0], [-1, -1], [0, -1], [1, -1],
    [1, 0], [0, 1], [-1, 0], [0, -1],
];

/// Cube edge midpoints for 3D simplex.
const GRAD3: [[i8; 3]; 12] = [
    [1, 1, 0], [-1, 1, 0], [1, -1, 0], [-1, -1, 0],
    [1, 0, 1], [-1, 0, 1], [1, 0, -1], [-1, 0, -1],
    [0, 1, 1], [0, -1, 1], [0, 1, -1], [0, -1, -1],
];

/// Pre-computed permutation table for noise.
///
/// This is computed once from the seed and reused.
#[derive(Clone)]
struct PermutationTable {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
}

impl PermutationTable {
    /// Creates a new permutation table from a seed.
    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];

        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // xorshift64 has a fixed point at zero, so mix the seed first
        let mut rng_state = (seed.value() ^ 0x9E37_79B9_7F4A_7C15).wrapping_mul(0x517c_c1b7_2722_0a95);
        if rng_state == 0 {
            rng_state = 0x9E37_79B9_7F4A_7C15;
        }

        // Fisher-Yates shuffle
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        // Double the table to avoid index wrapping
        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    /// Gets a permutation value (with automatic wrapping).
    #[inline]
    fn get(&self, index: usize) -> usize {
        usize::from(self.perm[index & 511])
    }
}

/// Seeded simplex noise generator.
///
/// Produces smooth, continuous values in roughly [-1, 1].
#[derive(Clone)]
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex grid.
    const F2: f64 = 0.366_025_403_784_439; // (sqrt(3) - 1) / 2
    /// Unskewing factor for 2D simplex grid.
    const G2: f64 = 0.211_324_865_405_187; // (3 - sqrt(3)) / 6
    /// Skewing factor for 3D simplex grid.
    const F3: f64 = 1.0 / 3.0;
    /// Unskewing factor for 3D simplex grid.
    const G3: f64 = 1.0 / 6.0;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise at the given coordinates.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        // Skew input coordinates to simplex grid
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i + j) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        // Upper or lower triangle
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + Self::G2;
        let y1 = y0 - j1 as f64 + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj));
        let gi1 = p.get(ii + i1 + p.get(jj + j1));
        let gi2 = p.get(ii + 1 + p.get(jj + 1));

        let n0 = Self::contribution_2d(x0, y0, gi0);
        let n1 = Self::contribution_2d(x1, y1, gi1);
        let n2 = Self::contribution_2d(x2, y2, gi2);

        // 70.0 scales the sum to [-1, 1]
        70.0 * (n0 + n1 + n2)
    }

    /// Samples 3D simplex noise at the given coordinates.
    #[must_use]
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let skew = (x + y + z) * Self::F3;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);
        let k = fast_floor(z + skew);

        let unskew = f64::from(i + j + k) * Self::G3;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);
        let z0 = z - (f64::from(k) - unskew);

        // Which of the six tetrahedra we are in
        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as f64 + Self::G3;
        let y1 = y0 - j1 as f64 + Self::G3;
        let z1 = z0 - k1 as f64 + Self::G3;
        let x2 = x0 - i2 as f64 + 2.0 * Self::G3;
        let y2 = y0 - j2 as f64 + 2.0 * Self::G3;
        let z2 = z0 - k2 as f64 + 2.0 * Self::G3;
        let x3 = x0 - 1.0 + 3.0 * Self::G3;
        let y3 = y0 - 1.0 + 3.0 * Self::G3;
        let z3 = z0 - 1.0 + 3.0 * Self::G3;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let kk = (k & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj + p.get(kk)));
        let gi1 = p.get(ii + i1 + p.get(jj + j1 + p.get(kk + k1)));
        let gi2 = p.get(ii + i2 + p.get(jj + j2 + p.get(kk + k2)));
        let gi3 = p.get(ii + 1 + p.get(jj + 1 + p.get(kk + 1)));

        let n0 = Self::contribution_3d(x0, y0, z0, gi0);
        let n1 = Self::contribution_3d(x1, y1, z1, gi1);
        let n2 = Self::contribution_3d(x2, y2, z2, gi2);
        let n3 = Self::contribution_3d(x3, y3, z3, gi3);

        32.0 * (n0 + n1 + n2 + n3)
    }

    /// Calculates the contribution from one corner of a 2D simplex.
    #[inline]
    fn contribution_2d(x: f64, y: f64, hash: usize) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let grad = GRAD2[hash % 12];
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
        }
    }

    /// Calculates the contribution from one corner of a 3D simplex.
    #[inline]
    fn contribution_3d(x: f64, y: f64, z: f64, hash: usize) -> f64 {
        let t = 0.6 - x * x - y * y - z * z;
        if t < 0.0 {
            0.0
        } else {
            let grad = GRAD3[hash % 12];
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]) + z * f64::from(grad[2]))
        }
    }
}

/// Fractal combination applied per octave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FractalKind {
    /// Plain fractal Brownian motion.
    #[default]
    Plain,
    /// Ridged: `1 - |n|`, squared, remapped to [-1, 1]. Good for mountains.
    Ridged,
}

/// Parameters of one fractal noise layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseSettings {
    /// Fractal combination.
    pub kind: FractalKind,
    /// Number of octaves (at least 1).
    pub octaves: u32,
    /// Frequency of the first octave.
    pub frequency: f64,
    /// Amplitude multiplier per octave.
    pub persistence: f64,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
}

impl NoiseSettings {
    /// A single plain octave at `frequency`.
    #[must_use]
    pub const fn single(frequency: f64) -> Self {
        Self {
            kind: FractalKind::Plain,
            octaves: 1,
            frequency,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }

    /// Multi-octave settings.
    #[must_use]
    pub const fn fractal(kind: FractalKind, octaves: u32, frequency: f64, persistence: f64, lacunarity: f64) -> Self {
        Self {
            kind,
            octaves,
            frequency,
            persistence,
            lacunarity,
        }
    }
}

/// A seeded, owned fractal noise sampler.
///
/// Each stage constructs its own `NoiseField`; there is no shared noise state.
///
/// # Example
///
/// ```rust
/// use lodge_terrain::noise::{stage, NoiseField, NoiseSettings, WorldSeed};
///
/// let seed = WorldSeed::new(42).offset(stage::CAVERN_NOISE);
/// let field = NoiseField::new(seed, NoiseSettings::single(0.1));
/// let v = field.sample_3d(10.0, 4.0, 7.0);
/// assert!((-1.1..=1.1).contains(&v));
/// ```
#[derive(Clone)]
pub struct NoiseField {
    noise: SimplexNoise,
    settings: NoiseSettings,
}

impl NoiseField {
    /// Creates a field from a (stage) seed and layer settings.
    #[must_use]
    pub fn new(seed: WorldSeed, settings: NoiseSettings) -> Self {
        Self {
            noise: SimplexNoise::new(seed),
            settings,
        }
    }

    /// Returns the layer settings.
    #[must_use]
    pub const fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Samples the 2D field. Roughly in [-1, 1].
    #[must_use]
    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        self.fractal(|f| self.noise.sample(x * f, z * f))
    }

    /// Samples the 3D field. Roughly in [-1, 1].
    #[must_use]
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        self.fractal(|f| self.noise.sample_3d(x * f, y * f, z * f))
    }

    /// Samples the 2D field remapped to [0, 1].
    #[must_use]
    pub fn sample_2d_unit(&self, x: f64, z: f64) -> f64 {
        ((self.sample_2d(x, z) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Sums octaves and normalizes by the total amplitude actually used.
    fn fractal(&self, sample: impl Fn(f64) -> f64) -> f64 {
        let s = &self.settings;
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = s.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..s.octaves {
            let n = sample(frequency);
            let value = match s.kind {
                FractalKind::Plain => n,
                FractalKind::Ridged => {
                    let ridge = 1.0 - n.abs();
                    ridge * ridge * 2.0 - 1.0
                }
            };
            total += value * amplitude;
            max_amplitude += amplitude;
            amplitude *= s.persistence;
            frequency *= s.lacunarity;
        }

        if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            0.0
        }
    }
}

/// Fast floor function.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) { xi - 1 } else { xi }
}
