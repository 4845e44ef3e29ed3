//! Spiral chunk loading with incremental load/unload diffs.
//!
//! The footprint around a center is the square of render chunks within
//! `load_radius` (Chebyshev), ordered closest-first by Euclidean distance.
//! Moving the center yields only the set difference against what is already
//! loaded, and chunks are released only once they leave the larger
//! `unload_radius` square, giving a hysteresis band between the two radii.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::chunk::ChunkCoord;

/// Offsets covering the square of `radius` around the origin, closest first.
///
/// Ties on squared distance are broken by ring, then by `(dy, dx)`, so the
/// order is fully deterministic.
pub fn spiral_offsets(radius: u32) -> Vec<(i64, i64)> {
    let r = i64::from(radius);
    let mut offsets: Vec<(i64, i64)> = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            offsets.push((dx, dy));
        }
    }
    offsets.sort_by_key(|&(dx, dy)| (dx * dx + dy * dy, dx.abs().max(dy.abs()), dy, dx));
    offsets
}

/// Result of moving the loader's center.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpiralUpdate {
    /// Chunks entering the load footprint, closest first.
    pub to_load: Vec<ChunkCoord>,
    /// Previously loaded chunks now beyond the unload radius.
    pub to_unload: Vec<ChunkCoord>,
}

/// Tracks the current center and the set of chunks it has handed out.
#[derive(Debug)]
pub struct SpiralChunkLoader {
    load_radius: u32,
    unload_radius: u32,
    current_center: ChunkCoord,
    loaded: FxHashSet<ChunkCoord>,
    offset_cache: FxHashMap<u32, Vec<(i64, i64)>>,
}

impl SpiralChunkLoader {
    /// `unload_radius` is raised to `load_radius` if smaller.
    pub fn new(load_radius: u32, unload_radius: u32) -> Self {
        Self {
            load_radius,
            unload_radius: Self::checked_unload_radius(load_radius, unload_radius),
            current_center: ChunkCoord::default(),
            loaded: FxHashSet::default(),
            offset_cache: FxHashMap::default(),
        }
    }

    fn checked_unload_radius(load_radius: u32, unload_radius: u32) -> u32 {
        if unload_radius < load_radius {
            warn!(
                load_radius,
                unload_radius, "Unload radius below load radius; using load radius"
            );
            load_radius
        } else {
            unload_radius
        }
    }

    pub fn load_radius(&self) -> u32 {
        self.load_radius
    }

    pub fn unload_radius(&self) -> u32 {
        self.unload_radius
    }

    pub fn current_center(&self) -> ChunkCoord {
        self.current_center
    }

    pub fn loaded_chunks(&self) -> &FxHashSet<ChunkCoord> {
        &self.loaded
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains(&coord)
    }

    /// Drops `coord` from the loaded set so a later update requests it again.
    pub fn forget(&mut self, coord: ChunkCoord) -> bool {
        self.loaded.remove(&coord)
    }

    /// Number of radii with a cached offset template.
    pub fn cached_templates(&self) -> usize {
        self.offset_cache.len()
    }

    /// Every chunk within `radius` of `center`, closest first.
    ///
    /// The offset template for each radius is computed once and translated.
    pub fn spiral(&mut self, center: ChunkCoord, radius: u32) -> Vec<ChunkCoord> {
        self.offset_cache
            .entry(radius)
            .or_insert_with(|| spiral_offsets(radius))
            .iter()
            .map(|&(dx, dy)| center.offset(dx, dy))
            .collect()
    }

    /// Resets the loaded set to the full footprint around `center`.
    pub fn get_initial_chunks(&mut self, center: ChunkCoord) -> Vec<ChunkCoord> {
        self.current_center = center;
        let chunks = self.spiral(center, self.load_radius);
        self.loaded = chunks.iter().copied().collect();
        chunks
    }

    /// Chunks of `spiral(new, radius)` absent from `spiral(old, radius)`, in
    /// spiral order around `new`.
    pub fn new_chunks_for_movement(
        &mut self,
        old_center: ChunkCoord,
        new_center: ChunkCoord,
        radius: u32,
    ) -> Vec<ChunkCoord> {
        if old_center == new_center {
            return Vec::new();
        }
        let r = i64::from(radius);
        self.spiral(new_center, radius)
            .into_iter()
            .filter(|c| old_center.ring_distance(*c) > r)
            .collect()
    }

    /// Chunks of `spiral(old, radius)` that fall outside `spiral(new, unload_radius)`.
    pub fn chunks_to_unload(
        &mut self,
        old_center: ChunkCoord,
        new_center: ChunkCoord,
        radius: u32,
        unload_radius: u32,
    ) -> Vec<ChunkCoord> {
        if old_center == new_center {
            return Vec::new();
        }
        let keep = i64::from(unload_radius);
        self.spiral(old_center, radius)
            .into_iter()
            .filter(|c| new_center.ring_distance(*c) > keep)
            .collect()
    }

    /// Moves the center and returns the diff against the loaded set.
    ///
    /// Chunks that stay inside both footprints are never re-requested.
    pub fn update_for_position(&mut self, new_center: ChunkCoord) -> SpiralUpdate {
        let keep = i64::from(self.unload_radius);
        let mut to_unload: Vec<ChunkCoord> = self
            .loaded
            .iter()
            .copied()
            .filter(|c| new_center.ring_distance(*c) > keep)
            .collect();
        to_unload.sort_by_key(|c| (std::cmp::Reverse(new_center.distance_sq(*c)), c.y, c.x));
        for coord in &to_unload {
            self.loaded.remove(coord);
        }

        let to_load: Vec<ChunkCoord> = self
            .spiral(new_center, self.load_radius)
            .into_iter()
            .filter(|c| !self.loaded.contains(c))
            .collect();
        self.loaded.extend(to_load.iter().copied());

        if new_center != self.current_center {
            debug!(
                from = %self.current_center,
                to = %new_center,
                load = to_load.len(),
                unload = to_unload.len(),
                "Spiral loader moved"
            );
        }
        self.current_center = new_center;

        SpiralUpdate { to_load, to_unload }
    }

    /// Euclidean distance from the current center; lower is more urgent.
    pub fn generation_priority(&self, coord: ChunkCoord) -> f64 {
        self.current_center.distance(coord)
    }

    /// Changes both radii and clears the loaded set; the next update requests
    /// the whole new footprint.
    pub fn reset(&mut self, load_radius: u32, unload_radius: u32) {
        self.load_radius = load_radius;
        self.unload_radius = Self::checked_unload_radius(load_radius, unload_radius);
        self.loaded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn c(x: i64, y: i64) -> ChunkCoord {
        ChunkCoord::new(x, y)
    }

    #[test]
    fn test_offsets_are_closest_first() {
        let offsets = spiral_offsets(3);
        assert_eq!(offsets.len(), 49);
        assert_eq!(offsets[0], (0, 0));
        let dists: Vec<i64> = offsets.iter().map(|(x, y)| x * x + y * y).collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
        // Four edge neighbours come before any diagonal.
        assert!(offsets[1..5].iter().all(|(x, y)| x.abs() + y.abs() == 1));
    }

    #[test]
    fn test_radius_zero_is_center_only() {
        assert_eq!(spiral_offsets(0), vec![(0, 0)]);
    }

    #[test]
    fn test_spiral_translates_cached_template() {
        let mut loader = SpiralChunkLoader::new(2, 4);
        let at_origin = loader.spiral(c(0, 0), 2);
        let shifted = loader.spiral(c(10, -5), 2);
        assert_eq!(loader.cached_templates(), 1);
        for (a, b) in at_origin.iter().zip(&shifted) {
            assert_eq!(b.x - a.x, 10);
            assert_eq!(b.y - a.y, -5);
        }
    }

    #[test]
    fn test_initial_chunks_fill_loaded_set() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        let chunks = loader.get_initial_chunks(c(2, 2));
        assert_eq!(chunks.len(), 49);
        assert_eq!(chunks[0], c(2, 2));
        assert_eq!(loader.loaded_chunks().len(), 49);
        assert_eq!(loader.current_center(), c(2, 2));
    }

    #[test]
    fn test_move_one_chunk_requests_leading_edge_only() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        loader.get_initial_chunks(c(0, 0));
        let update = loader.update_for_position(c(1, 0));

        assert_eq!(update.to_load.len(), 7);
        assert!(update.to_load.iter().all(|chunk| chunk.x == 4));
        assert_eq!(update.to_load[0], c(4, 0));
        // Everything old is within 5 of (1, 0).
        assert!(update.to_unload.is_empty());
        assert_eq!(loader.loaded_chunks().len(), 56);
    }

    #[test]
    fn test_unload_beyond_unload_radius() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        loader.get_initial_chunks(c(0, 0));
        let update = loader.update_for_position(c(3, 0));
        // Old x range -3..=3, new keep range -2..=8: only x = -3 leaves.
        assert_eq!(update.to_unload.len(), 7);
        assert!(update.to_unload.iter().all(|chunk| chunk.x == -3));
        assert!(update.to_load.iter().all(|chunk| (4..=6).contains(&chunk.x)));
        assert_eq!(update.to_load.len(), 21);
    }

    #[test]
    fn test_hysteresis_moving_back_requests_nothing() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        loader.get_initial_chunks(c(0, 0));
        loader.update_for_position(c(1, 0));
        let back = loader.update_for_position(c(0, 0));
        assert!(back.to_load.is_empty());
        assert!(back.to_unload.is_empty());
    }

    #[test]
    fn test_no_movement_is_empty_diff() {
        let mut loader = SpiralChunkLoader::new(2, 4);
        loader.get_initial_chunks(c(5, 5));
        assert_eq!(loader.update_for_position(c(5, 5)), SpiralUpdate::default());
        assert!(loader.new_chunks_for_movement(c(5, 5), c(5, 5), 2).is_empty());
    }

    #[test]
    fn test_forget_allows_rerequest() {
        let mut loader = SpiralChunkLoader::new(1, 2);
        loader.get_initial_chunks(c(0, 0));
        assert!(loader.forget(c(1, 1)));
        let update = loader.update_for_position(c(0, 0));
        assert_eq!(update.to_load, vec![c(1, 1)]);
    }

    #[test]
    fn test_movement_diff_properties_over_random_centers() {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let mut loader = SpiralChunkLoader::new(4, 6);
        for _ in 0..200 {
            let a = c(rng.random_range(-20..20), rng.random_range(-20..20));
            let b = a.offset(rng.random_range(-6..=6), rng.random_range(-6..=6));
            let radius = rng.random_range(0..5u32);

            let spiral_a: FxHashSet<_> = loader.spiral(a, radius).into_iter().collect();
            let spiral_b: FxHashSet<_> = loader.spiral(b, radius).into_iter().collect();
            let fresh: FxHashSet<_> = loader
                .new_chunks_for_movement(a, b, radius)
                .into_iter()
                .collect();
            let kept: FxHashSet<_> = spiral_a.intersection(&spiral_b).copied().collect();

            let union: FxHashSet<_> = fresh.union(&kept).copied().collect();
            if a == b {
                assert!(fresh.is_empty());
            } else {
                assert_eq!(union, spiral_b, "diff from {a} to {b} r={radius}");
            }
            assert!(fresh.is_disjoint(&kept));
        }
    }

    #[test]
    fn test_chunks_to_unload_matches_set_difference() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        let unload = loader.chunks_to_unload(c(0, 0), c(4, 0), 3, 5);
        let expected: FxHashSet<_> = loader
            .spiral(c(0, 0), 3)
            .into_iter()
            .filter(|chunk| chunk.x < -1)
            .collect();
        assert_eq!(unload.into_iter().collect::<FxHashSet<_>>(), expected);
    }

    #[test]
    fn test_generation_priority_is_euclidean() {
        let mut loader = SpiralChunkLoader::new(3, 5);
        loader.get_initial_chunks(c(1, 1));
        assert_eq!(loader.generation_priority(c(1, 1)), 0.0);
        assert_eq!(loader.generation_priority(c(4, 5)), 5.0);
    }

    #[test]
    fn test_unload_radius_clamped_to_load_radius() {
        let loader = SpiralChunkLoader::new(4, 2);
        assert_eq!(loader.unload_radius(), 4);
    }
}
