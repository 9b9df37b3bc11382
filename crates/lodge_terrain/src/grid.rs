//! # Voxel Grid
//!
//! Solid/air storage over a fixed bounding box.
//!
//! ## Layout
//!
//! One bit per voxel, indexed `[y][z][x]` (height, depth, width), which is
//! also the order the map format serializes voxels in. A per-column index
//! keeps the topmost solid voxel so `surface_height` is a single lookup.
//!
//! ## Bounds
//!
//! Out-of-bounds reads return `Air`, out-of-bounds writes are ignored. Carving
//! code relies on this and overshoots the edges freely.

use std::fmt;

use crate::heightmap::Heightmap;

/// Vertical layer count expected by the map format.
pub const MAP_LAYERS: usize = 23;

/// Bits per storage word.
const WORD_BITS: usize = 64;

/// Integer voxel coordinate. `x`/`z` are horizontal, `y` is vertical.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelPos {
    /// Width axis.
    pub x: i32,
    /// Height axis.
    pub y: i32,
    /// Depth axis.
    pub z: i32,
}

impl VoxelPos {
    /// Creates a new voxel coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this coordinate shifted by the given deltas.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// The voxel directly below.
    #[inline]
    #[must_use]
    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }
}

/// State of a single voxel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VoxelState {
    /// Empty space.
    #[default]
    Air,
    /// Terrain.
    Solid,
}

impl VoxelState {
    /// Returns true for `Solid`.
    #[inline]
    #[must_use]
    pub const fn is_solid(self) -> bool {
        matches!(self, Self::Solid)
    }
}

impl From<bool> for VoxelState {
    fn from(solid: bool) -> Self {
        if solid { Self::Solid } else { Self::Air }
    }
}

/// Read-only terrain queries for entity placement.
///
/// Placement code receives a `&impl TerrainView` and can never mutate the grid.
pub trait TerrainView {
    /// Returns `(width, height, depth)`.
    fn dimensions(&self) -> (usize, usize, usize);

    /// Returns true if the coordinate lies inside the grid.
    fn is_in_bounds(&self, pos: VoxelPos) -> bool;

    /// Returns true if the voxel is solid. Out of bounds is never solid.
    fn is_solid(&self, pos: VoxelPos) -> bool;

    /// Highest solid `y` in the column, or 0 for an empty column.
    fn surface_height(&self, x: i32, z: i32) -> i32;
}

/// Fixed-size voxel grid.
///
/// # Example
///
/// ```rust
/// use lodge_terrain::grid::{VoxelGrid, VoxelPos, VoxelState};
///
/// let mut grid = VoxelGrid::new(8, 23, 8);
/// grid.set(VoxelPos::new(1, 4, 2), VoxelState::Solid);
/// assert_eq!(grid.surface_height(1, 2), 4);
/// assert!(!grid.is_solid(VoxelPos::new(-1, 4, 2)));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    width: usize,
    height: usize,
    depth: usize,
    /// Voxel bits, indexed `[y][z][x]`.
    words: Vec<u64>,
    /// Per column (indexed `[z][x]`): topmost solid `y + 1`, or 0 if empty.
    column_tops: Vec<u32>,
    /// Set bits in `words`.
    solid: usize,
}

impl VoxelGrid {
    /// Creates an all-air grid.
    #[must_use]
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        let volume = width * height * depth;
        Self {
            width,
            height,
            depth,
            words: vec![0; volume.div_ceil(WORD_BITS)],
            column_tops: vec![0; width * depth],
            solid: 0,
        }
    }

    /// Grid width (x extent).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height (y extent).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Grid depth (z extent).
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if the coordinate lies inside the grid.
    #[inline]
    #[must_use]
    pub fn is_in_bounds(&self, pos: VoxelPos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height
            && (pos.z as usize) < self.depth
    }

    /// Gets the voxel state. Air for any out-of-bounds position.
    #[inline]
    #[must_use]
    pub fn get(&self, pos: VoxelPos) -> VoxelState {
        match self.index(pos) {
            Some(index) => VoxelState::from(self.bit(index)),
            None => VoxelState::Air,
        }
    }

    /// Returns true if the voxel is solid.
    #[inline]
    #[must_use]
    pub fn is_solid(&self, pos: VoxelPos) -> bool {
        self.get(pos).is_solid()
    }

    /// Sets the voxel state. No-op for out-of-bounds positions.
    pub fn set(&mut self, pos: VoxelPos, state: VoxelState) {
        let Some(index) = self.index(pos) else {
            return;
        };
        let column = self.column_index(pos.x as usize, pos.z as usize);
        let word = index / WORD_BITS;
        let mask = 1u64 << (index % WORD_BITS);
        let top = pos.y as u32 + 1;

        match state {
            VoxelState::Solid => {
                if self.words[word] & mask == 0 {
                    self.words[word] |= mask;
                    self.solid += 1;
                }
                if top > self.column_tops[column] {
                    self.column_tops[column] = top;
                }
            }
            VoxelState::Air => {
                if self.words[word] & mask == 0 {
                    return;
                }
                self.words[word] &= !mask;
                self.solid -= 1;
                if self.column_tops[column] == top {
                    self.column_tops[column] = self.scan_column_top(pos.x as usize, pos.z as usize, pos.y as usize);
                }
            }
        }
    }

    /// Number of solid voxels. O(1); the count is kept by `set` and fills.
    #[must_use]
    pub const fn solid_count(&self) -> usize {
        self.solid
    }

    /// Iterates solid voxels in `[y][z][x]` order.
    ///
    /// Each call re-scans the current state.
    #[must_use]
    pub fn iter_solid(&self) -> SolidVoxels<'_> {
        SolidVoxels {
            grid: self,
            word: 0,
            bits: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Highest solid `y` in the column, or 0 if the column is empty or outside the grid.
    #[inline]
    #[must_use]
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        self.column_top(x, z).unwrap_or(0)
    }

    /// Highest solid `y` in the column, `None` if the column holds no solid voxel.
    #[inline]
    #[must_use]
    pub fn column_top(&self, x: i32, z: i32) -> Option<i32> {
        if x < 0 || z < 0 || x as usize >= self.width || z as usize >= self.depth {
            return None;
        }
        match self.column_tops[self.column_index(x as usize, z as usize)] {
            0 => None,
            top => Some(top as i32 - 1),
        }
    }

    /// Fills every column from `y = 0` up to `floor(height)` inclusive.
    ///
    /// Heights are clamped to `height - 1`. Columns outside the heightmap
    /// and negative heights are left untouched.
    pub fn fill_columns_from_heightmap(&mut self, heightmap: &Heightmap) {
        if self.height == 0 {
            return;
        }
        let max_y = self.height - 1;
        for z in 0..self.depth.min(heightmap.depth()) {
            for x in 0..self.width.min(heightmap.width()) {
                let h = heightmap.get(x, z).floor();
                if h < 0.0 || h.is_nan() {
                    continue;
                }
                let top = (h as usize).min(max_y);
                for y in 0..=top {
                    let index = self.raw_index(x, y, z);
                    let (word, mask) = (index / WORD_BITS, 1u64 << (index % WORD_BITS));
                    if self.words[word] & mask == 0 {
                        self.words[word] |= mask;
                        self.solid += 1;
                    }
                }
                let column = self.column_index(x, z);
                self.column_tops[column] = self.column_tops[column].max(top as u32 + 1);
            }
        }
    }

    /// Streams every voxel state as `layers x depth x width` booleans,
    /// outer loop height, then depth, then width.
    ///
    /// Layers past the grid's own height read as air.
    pub fn ordered_states(&self, layers: usize) -> impl Iterator<Item = bool> + '_ {
        let plane = self.width * self.depth;
        (0..layers * plane).map(move |i| {
            let y = i / plane;
            y < self.height && self.bit(y * plane + i % plane)
        })
    }

    /// Collects [`ordered_states`](Self::ordered_states) into a vector.
    #[must_use]
    pub fn export_layers(&self, layers: usize) -> Vec<bool> {
        self.ordered_states(layers).collect()
    }

    /// Flat bit index for an in-bounds position.
    #[inline]
    fn index(&self, pos: VoxelPos) -> Option<usize> {
        self.is_in_bounds(pos)
            .then(|| self.raw_index(pos.x as usize, pos.y as usize, pos.z as usize))
    }

    #[inline]
    const fn raw_index(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.depth + z) * self.width + x
    }

    #[inline]
    const fn column_index(&self, x: usize, z: usize) -> usize {
        z * self.width + x
    }

    #[inline]
    fn bit(&self, index: usize) -> bool {
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Decodes a flat bit index back into a coordinate.
    #[inline]
    fn position_of(&self, index: usize) -> VoxelPos {
        let x = index % self.width;
        let rest = index / self.width;
        VoxelPos::new(x as i32, (rest / self.depth) as i32, (rest % self.depth) as i32)
    }

    /// Finds the new column top below `below_y` after that voxel was cleared.
    fn scan_column_top(&self, x: usize, z: usize, below_y: usize) -> u32 {
        (0..below_y)
            .rev()
            .find(|&y| self.bit(self.raw_index(x, y, z)))
            .map_or(0, |y| y as u32 + 1)
    }
}

impl TerrainView for VoxelGrid {
    fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    fn is_in_bounds(&self, pos: VoxelPos) -> bool {
        VoxelGrid::is_in_bounds(self, pos)
    }

    fn is_solid(&self, pos: VoxelPos) -> bool {
        VoxelGrid::is_solid(self, pos)
    }

    fn surface_height(&self, x: i32, z: i32) -> i32 {
        VoxelGrid::surface_height(self, x, z)
    }
}

impl fmt::Debug for VoxelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoxelGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("solid", &self.solid_count())
            .finish()
    }
}

/// Iterator over solid voxels, see [`VoxelGrid::iter_solid`].
pub struct SolidVoxels<'a> {
    grid: &'a VoxelGrid,
    word: usize,
    bits: u64,
}

impl Iterator for SolidVoxels<'_> {
    type Item = VoxelPos;

    fn next(&mut self) -> Option<VoxelPos> {
        loop {
            if self.bits != 0 {
                let bit = self.bits.trailing_zeros() as usize;
                self.bits &= self.bits - 1;
                return Some(self.grid.position_of(self.word * WORD_BITS + bit));
            }
            self.word += 1;
            self.bits = *self.grid.words.get(self.word)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    #[test]
    fn test_out_of_bounds_reads_are_air() {
        let mut grid = VoxelGrid::new(4, 5, 6);
        for y in 0..5 {
            for z in 0..6 {
                for x in 0..4 {
                    grid.set(VoxelPos::new(x, y, z), VoxelState::Solid);
                }
            }
        }

        let outside = [
            VoxelPos::new(-1, 0, 0),
            VoxelPos::new(0, -1, 0),
            VoxelPos::new(0, 0, -1),
            VoxelPos::new(4, 0, 0),
            VoxelPos::new(0, 5, 0),
            VoxelPos::new(0, 0, 6),
            VoxelPos::new(i32::MAX, i32::MIN, 3),
        ];
        for pos in outside {
            assert_eq!(grid.get(pos), VoxelState::Air, "{pos:?}");
            assert!(!grid.is_in_bounds(pos));
        }
    }

    #[test]
    fn test_out_of_bounds_writes_are_ignored() {
        let mut grid = VoxelGrid::new(4, 4, 4);
        grid.set(VoxelPos::new(-1, 0, 0), VoxelState::Solid);
        grid.set(VoxelPos::new(0, 4, 0), VoxelState::Solid);
        grid.set(VoxelPos::new(0, 0, 99), VoxelState::Solid);
        assert_eq!(grid.solid_count(), 0);
        assert_eq!(grid.iter_solid().count(), 0);
    }

    #[test]
    fn test_set_air_removes_entry() {
        let mut grid = VoxelGrid::new(3, 3, 3);
        let pos = VoxelPos::new(1, 1, 1);
        grid.set(pos, VoxelState::Solid);
        grid.set(pos, VoxelState::Solid);
        assert_eq!(grid.solid_count(), 1);
        grid.set(pos, VoxelState::Air);
        assert_eq!(grid.solid_count(), 0);
        assert!(!grid.is_solid(pos));
    }

    /// Random set sequences against a map model: count, membership and
    /// column tops must always agree with the most recent write.
    #[test]
    fn test_sparse_invariant_matches_model() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut grid = VoxelGrid::new(9, 7, 5);
        let mut model: HashMap<VoxelPos, bool> = HashMap::new();

        for _ in 0..5000 {
            let pos = VoxelPos::new(rng.gen_range(-2..11), rng.gen_range(-2..9), rng.gen_range(-2..7));
            let solid = rng.gen_bool(0.6);
            grid.set(pos, VoxelState::from(solid));
            if grid.is_in_bounds(pos) {
                model.insert(pos, solid);
            }
        }

        let expected = model.values().filter(|s| **s).count();
        assert_eq!(grid.solid_count(), expected);
        let packed: usize = grid.words.iter().map(|w| w.count_ones() as usize).sum();
        assert_eq!(packed, expected);
        assert_eq!(grid.iter_solid().count(), expected);
        for pos in grid.iter_solid() {
            assert_eq!(model.get(&pos), Some(&true));
        }

        for z in 0..5 {
            for x in 0..9 {
                let top = (0..7)
                    .rev()
                    .find(|&y| model.get(&VoxelPos::new(x, y, z)) == Some(&true));
                assert_eq!(grid.column_top(x, z), top, "column ({x}, {z})");
                assert_eq!(grid.surface_height(x, z), top.unwrap_or(0));
            }
        }
    }

    #[test]
    fn test_surface_height_tracks_removals() {
        let mut grid = VoxelGrid::new(2, 10, 2);
        for y in [0, 1, 2, 6] {
            grid.set(VoxelPos::new(0, y, 0), VoxelState::Solid);
        }
        assert_eq!(grid.surface_height(0, 0), 6);

        grid.set(VoxelPos::new(0, 6, 0), VoxelState::Air);
        assert_eq!(grid.surface_height(0, 0), 2);

        // Removing a voxel below the top leaves the top unchanged
        grid.set(VoxelPos::new(0, 1, 0), VoxelState::Air);
        assert_eq!(grid.surface_height(0, 0), 2);

        grid.set(VoxelPos::new(0, 2, 0), VoxelState::Air);
        grid.set(VoxelPos::new(0, 0, 0), VoxelState::Air);
        assert_eq!(grid.column_top(0, 0), None);
        assert_eq!(grid.surface_height(0, 0), 0);
        assert_eq!(grid.surface_height(-5, 0), 0);
    }

    #[test]
    fn test_fill_from_heightmap_round_trip() {
        let heightmap = Heightmap::from_fn(6, 4, |x, z| (x * 3 + z) as f32 + 0.7);
        let mut grid = VoxelGrid::new(6, 10, 4);
        grid.fill_columns_from_heightmap(&heightmap);

        for z in 0..4 {
            for x in 0..6 {
                let expected = (heightmap.get(x, z).floor() as i32).min(9);
                assert_eq!(grid.surface_height(x as i32, z as i32), expected);
                // Column is solid all the way down
                for y in 0..=expected {
                    assert!(grid.is_solid(VoxelPos::new(x as i32, y, z as i32)));
                }
                assert!(!grid.is_solid(VoxelPos::new(x as i32, expected + 1, z as i32)));
            }
        }
    }

    #[test]
    fn test_solid_count_ignores_repeated_writes() {
        let heightmap = Heightmap::from_fn(4, 4, |x, _| x as f32);
        let mut grid = VoxelGrid::new(4, 6, 4);
        grid.fill_columns_from_heightmap(&heightmap);
        grid.fill_columns_from_heightmap(&heightmap);
        assert_eq!(grid.solid_count(), 4 * (1 + 2 + 3 + 4));

        let pos = VoxelPos::new(3, 2, 1);
        grid.set(pos, VoxelState::Solid);
        assert_eq!(grid.solid_count(), 40);
        grid.set(pos, VoxelState::Air);
        grid.set(pos, VoxelState::Air);
        assert_eq!(grid.solid_count(), 39);
        assert_eq!(grid.iter_solid().count(), 39);
    }

    #[test]
    fn test_fill_skips_negative_heights() {
        let heightmap = Heightmap::from_fn(2, 2, |x, _| if x == 0 { -3.0 } else { 0.2 });
        let mut grid = VoxelGrid::new(2, 5, 2);
        grid.fill_columns_from_heightmap(&heightmap);
        assert_eq!(grid.column_top(0, 0), None);
        assert_eq!(grid.column_top(1, 0), Some(0));
        assert_eq!(grid.solid_count(), 2);
    }

    #[test]
    fn test_export_order_and_padding() {
        let mut grid = VoxelGrid::new(3, 2, 2);
        grid.set(VoxelPos::new(2, 0, 0), VoxelState::Solid);
        grid.set(VoxelPos::new(0, 0, 1), VoxelState::Solid);
        grid.set(VoxelPos::new(1, 1, 1), VoxelState::Solid);

        let states = grid.export_layers(4);
        assert_eq!(states.len(), 4 * 2 * 3);

        let solid_indices: Vec<usize> = states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.then_some(i))
            .collect();
        // y * 6 + z * 3 + x
        assert_eq!(solid_indices, vec![2, 3, 10]);

        // Padding layers past the native height are air
        assert!(states[12..].iter().all(|s| !s));
    }

    #[test]
    fn test_iter_solid_follows_export_order() {
        let heightmap = Heightmap::from_fn(5, 5, |x, z| ((x * 7 + z * 3) % 4) as f32);
        let mut grid = VoxelGrid::new(5, 6, 5);
        grid.fill_columns_from_heightmap(&heightmap);

        let from_iter: Vec<VoxelPos> = grid.iter_solid().collect();
        let mut sorted = from_iter.clone();
        sorted.sort_by_key(|p| (p.y, p.z, p.x));
        assert_eq!(from_iter, sorted);

        // Restartable
        assert_eq!(grid.iter_solid().count(), from_iter.len());
    }

    #[test]
    fn test_terrain_view_matches_grid() {
        fn probe(view: &impl TerrainView) -> (usize, i32, bool) {
            let (w, _, _) = view.dimensions();
            (w, view.surface_height(1, 1), view.is_solid(VoxelPos::new(1, 0, 1)))
        }

        let mut grid = VoxelGrid::new(3, 4, 3);
        grid.set(VoxelPos::new(1, 0, 1), VoxelState::Solid);
        grid.set(VoxelPos::new(1, 2, 1), VoxelState::Solid);
        assert_eq!(probe(&grid), (3, 2, true));
    }
}
