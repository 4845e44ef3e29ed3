//! Dual chunk addressing: conversions between world tiles, generation chunks
//! and render chunks, plus aggregation of generation chunks into a render chunk.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::cache::BoundedCache;
use crate::chunk::{ChunkCoord, GenerationChunk, RenderChunk, RenderChunkMetadata, WorldBounds};
use crate::tile::TilePos;

/// Floor division of a world position onto a chunk grid of `chunk_size` tiles.
///
/// `chunk_size` must be non-zero.
pub fn world_to_chunk(x: i64, y: i64, chunk_size: u32) -> ChunkCoord {
    let size = i64::from(chunk_size);
    ChunkCoord::new(x.div_euclid(size), y.div_euclid(size))
}

/// Generation chunk size after running `layers` from `initial_size`.
///
/// Every `"zoom"` entry divides the size by `subdivision_factor`; the result
/// never drops below one tile.
pub fn final_generation_chunk_size<S: AsRef<str>>(
    initial_size: u32,
    layers: &[S],
    subdivision_factor: u32,
) -> u32 {
    let factor = subdivision_factor.max(1);
    layers
        .iter()
        .filter(|name| name.as_ref() == "zoom")
        .fold(initial_size.max(1), |size, _| (size / factor).max(1))
}

/// Coordinate-cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AddressingStats {
    pub render_chunk_size: u32,
    pub coord_cache_size: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl AddressingStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Relates the generation-chunk grid to the fixed render-chunk grid.
///
/// Conversions are memoized in a bounded LRU keyed by `(x, y, grid size)`.
#[derive(Debug)]
pub struct DualChunkAddressing {
    render_chunk_size: u32,
    coord_cache: BoundedCache<(i64, i64, u32), ChunkCoord>,
    hits: u64,
    misses: u64,
}

impl DualChunkAddressing {
    /// `render_chunk_size` of zero is treated as one.
    pub fn new(render_chunk_size: u32, coord_cache_capacity: usize) -> Self {
        Self {
            render_chunk_size: render_chunk_size.max(1),
            coord_cache: BoundedCache::new(coord_cache_capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn render_chunk_size(&self) -> u32 {
        self.render_chunk_size
    }

    pub fn world_to_render_chunk(&mut self, x: i64, y: i64) -> ChunkCoord {
        self.memoized(x, y, self.render_chunk_size)
    }

    pub fn world_to_generation_chunk(&mut self, x: i64, y: i64, generation_chunk_size: u32) -> ChunkCoord {
        self.memoized(x, y, generation_chunk_size.max(1))
    }

    fn memoized(&mut self, x: i64, y: i64, size: u32) -> ChunkCoord {
        let key = (x, y, size);
        if let Some(coord) = self.coord_cache.get(&key) {
            self.hits += 1;
            return *coord;
        }
        self.misses += 1;
        let coord = world_to_chunk(x, y, size);
        self.coord_cache.insert(key, coord);
        coord
    }

    pub fn render_chunk_bounds(&self, coord: ChunkCoord) -> WorldBounds {
        WorldBounds::of_chunk(coord, self.render_chunk_size)
    }

    /// Every generation chunk whose world bounds overlap the render chunk.
    ///
    /// Ordered column by column (x outer, y inner).
    pub fn generation_chunks_for_render_chunk(
        &self,
        render_coord: ChunkCoord,
        generation_chunk_size: u32,
    ) -> Vec<ChunkCoord> {
        let bounds = self.render_chunk_bounds(render_coord);
        let size = generation_chunk_size.max(1);
        let min = world_to_chunk(bounds.min_x, bounds.min_y, size);
        let max = world_to_chunk(bounds.max_x, bounds.max_y, size);

        let mut coords =
            Vec::with_capacity(((max.x - min.x + 1) * (max.y - min.y + 1)).max(0) as usize);
        for gx in min.x..=max.x {
            for gy in min.y..=max.y {
                coords.push(ChunkCoord::new(gx, gy));
            }
        }
        coords
    }

    /// Merges the tiles of `generation_chunks` that fall inside the render
    /// chunk's exact bounds. Tiles outside are dropped, so a generation chunk
    /// straddling the border contributes only partially.
    pub fn aggregate(
        &self,
        generation_chunks: &[GenerationChunk],
        render_coord: ChunkCoord,
    ) -> RenderChunk {
        let bounds = self.render_chunk_bounds(render_coord);
        let mut aggregated_tiles = FxHashMap::default();
        aggregated_tiles.reserve(bounds.tile_count());

        for chunk in generation_chunks {
            for (&(x, y), &tile_type) in &chunk.tiles {
                if bounds.contains(x, y) {
                    aggregated_tiles.insert((x, y), tile_type);
                }
            }
        }

        trace!(
            render_chunk = %render_coord,
            generation_chunks = generation_chunks.len(),
            tiles = aggregated_tiles.len(),
            "Aggregated render chunk"
        );

        RenderChunk {
            coord: render_coord,
            chunk_size: self.render_chunk_size,
            metadata: RenderChunkMetadata {
                generation_chunk_count: generation_chunks.len(),
                generation_chunk_sizes: generation_chunks.iter().map(|c| c.chunk_size).collect(),
                tile_count: aggregated_tiles.len(),
                world_bounds: bounds,
            },
            aggregated_tiles,
        }
    }

    /// Render chunks overlapping the inclusive world rectangle `min..=max`.
    pub fn render_chunks_for_area(&self, min: TilePos, max: TilePos) -> Vec<ChunkCoord> {
        let lo = world_to_chunk(min.0.min(max.0), min.1.min(max.1), self.render_chunk_size);
        let hi = world_to_chunk(min.0.max(max.0), min.1.max(max.1), self.render_chunk_size);
        let mut coords = Vec::new();
        for rx in lo.x..=hi.x {
            for ry in lo.y..=hi.y {
                coords.push(ChunkCoord::new(rx, ry));
            }
        }
        coords
    }

    pub fn stats(&self) -> AddressingStats {
        AddressingStats {
            render_chunk_size: self.render_chunk_size,
            coord_cache_size: self.coord_cache.len(),
            cache_hits: self.hits,
            cache_misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileType;

    #[test]
    fn test_floor_division_for_negative_coordinates() {
        assert_eq!(world_to_chunk(-1, -1, 64), ChunkCoord::new(-1, -1));
        assert_eq!(world_to_chunk(-64, 63, 64), ChunkCoord::new(-1, 0));
        assert_eq!(world_to_chunk(-65, 64, 64), ChunkCoord::new(-2, 1));
        assert_eq!(world_to_chunk(0, 0, 16), ChunkCoord::new(0, 0));
    }

    #[test]
    fn test_memoized_conversion_counts_hits() {
        let mut addressing = DualChunkAddressing::new(64, 16);
        assert_eq!(addressing.world_to_render_chunk(100, -3), ChunkCoord::new(1, -1));
        assert_eq!(addressing.world_to_render_chunk(100, -3), ChunkCoord::new(1, -1));
        assert_eq!(addressing.world_to_generation_chunk(100, -3, 16), ChunkCoord::new(6, -1));
        let stats = addressing.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.coord_cache_size, 2);
        assert!((stats.hit_ratio() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_coord_cache_is_bounded() {
        let mut addressing = DualChunkAddressing::new(8, 4);
        for x in 0..100 {
            addressing.world_to_render_chunk(x, 0);
        }
        assert_eq!(addressing.stats().coord_cache_size, 4);
    }

    #[test]
    fn test_generation_chunks_for_render_chunk_counts() {
        let addressing = DualChunkAddressing::new(64, 16);
        assert_eq!(
            addressing.generation_chunks_for_render_chunk(ChunkCoord::new(0, 0), 64),
            vec![ChunkCoord::new(0, 0)]
        );
        let small = addressing.generation_chunks_for_render_chunk(ChunkCoord::new(-1, 2), 16);
        assert_eq!(small.len(), 16);
        assert_eq!(small[0], ChunkCoord::new(-4, 8));
        assert_eq!(small[15], ChunkCoord::new(-1, 11));
    }

    #[test]
    fn test_straddling_generation_chunk_overlaps_two_render_chunks() {
        // 48-tile generation chunks do not align with 64-tile render chunks.
        let addressing = DualChunkAddressing::new(64, 16);
        let coords = addressing.generation_chunks_for_render_chunk(ChunkCoord::new(1, 0), 48);
        // Render chunk 1 spans x 64..=127 -> gen chunks 1 and 2 on x; y 0..=63 -> 0 and 1.
        assert_eq!(
            coords,
            vec![
                ChunkCoord::new(1, 0),
                ChunkCoord::new(1, 1),
                ChunkCoord::new(2, 0),
                ChunkCoord::new(2, 1)
            ]
        );
    }

    #[test]
    fn test_aggregate_covers_exact_bounds() {
        let addressing = DualChunkAddressing::new(64, 16);
        let render = ChunkCoord::new(1, -1);
        let gen_chunks: Vec<_> = addressing
            .generation_chunks_for_render_chunk(render, 48)
            .into_iter()
            .map(|c| GenerationChunk::filled(c, 48, TileType::Land, Vec::new()))
            .collect();
        let chunk = addressing.aggregate(&gen_chunks, render);
        assert!(chunk.is_complete());
        assert_eq!(chunk.aggregated_tiles.len(), 64 * 64);
        assert_eq!(chunk.metadata.generation_chunk_count, 4);
        assert_eq!(chunk.metadata.generation_chunk_sizes, vec![48; 4]);
        assert_eq!(chunk.tile(64, -64), Some(TileType::Land));
        assert_eq!(chunk.tile(63, -64), None);
        assert_eq!(chunk.tile(127, -1), Some(TileType::Land));
    }

    #[test]
    fn test_render_chunks_for_area() {
        let addressing = DualChunkAddressing::new(64, 16);
        let coords = addressing.render_chunks_for_area((-1, 0), (64, 63));
        assert_eq!(
            coords,
            vec![ChunkCoord::new(-1, 0), ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]
        );
    }

    #[test]
    fn test_final_generation_chunk_size() {
        assert_eq!(final_generation_chunk_size(64, &["lands_and_seas", "zoom", "zoom"], 2), 16);
        assert_eq!(final_generation_chunk_size(64, &["lands_and_seas"], 2), 64);
        assert_eq!(final_generation_chunk_size(4, &["zoom", "zoom", "zoom", "zoom"], 2), 1);
        assert_eq!(final_generation_chunk_size(81, &["zoom", "zoom"], 3), 9);
    }
}
