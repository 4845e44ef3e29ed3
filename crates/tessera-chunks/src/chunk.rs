//! Chunk coordinates and the two chunk kinds.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::tile::{TilePos, TileType};

/// Integer chunk-grid coordinate.
///
/// Generation-chunk and render-chunk coordinates share this type but live in
/// distinct grids, related only through world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkCoord {
    pub x: i64,
    pub y: i64,
}

impl ChunkCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the coordinate offset by `(dx, dy)`.
    pub fn offset(self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Squared Euclidean distance in chunk units.
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance in chunk units.
    pub fn distance(self, other: ChunkCoord) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }

    /// Chebyshev (ring) distance: the square footprint radius that contains `other`.
    pub fn ring_distance(self, other: ChunkCoord) -> i64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i64, i64)> for ChunkCoord {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

/// Inclusive world-tile rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl WorldBounds {
    /// Bounds of the chunk at `coord` on a grid of `chunk_size` tiles.
    pub fn of_chunk(coord: ChunkCoord, chunk_size: u32) -> Self {
        let size = i64::from(chunk_size);
        let min_x = coord.x * size;
        let min_y = coord.y * size;
        Self {
            min_x,
            min_y,
            max_x: min_x + size - 1,
            max_y: min_y + size - 1,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    pub fn tile_count(&self) -> usize {
        (self.width() * self.height()).max(0) as usize
    }

    /// Every tile position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| (self.min_x..=self.max_x).map(move |x| (x, y)))
    }
}

/// Descriptive data attached to a generation chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationChunkMetadata {
    pub world_bounds: WorldBounds,
    pub tile_type_counts: BTreeMap<TileType, usize>,
    pub pipeline_layers: Vec<String>,
}

/// Small chunk produced by the terrain pipeline. Its size shrinks with every
/// zoom layer; it is discarded once aggregated into a render chunk.
#[derive(Clone, Debug)]
pub struct GenerationChunk {
    pub coord: ChunkCoord,
    pub chunk_size: u32,
    pub tiles: FxHashMap<TilePos, TileType>,
    pub metadata: GenerationChunkMetadata,
}

impl GenerationChunk {
    /// Builds a chunk and derives its metadata from the tile map.
    pub fn new(
        coord: ChunkCoord,
        chunk_size: u32,
        tiles: FxHashMap<TilePos, TileType>,
        pipeline_layers: Vec<String>,
    ) -> Self {
        let mut tile_type_counts = BTreeMap::new();
        for tile_type in tiles.values() {
            *tile_type_counts.entry(*tile_type).or_insert(0) += 1;
        }
        Self {
            coord,
            chunk_size,
            tiles,
            metadata: GenerationChunkMetadata {
                world_bounds: WorldBounds::of_chunk(coord, chunk_size),
                tile_type_counts,
                pipeline_layers,
            },
        }
    }

    /// A chunk whose every tile carries the same tag.
    pub fn filled(
        coord: ChunkCoord,
        chunk_size: u32,
        tile_type: TileType,
        pipeline_layers: Vec<String>,
    ) -> Self {
        let bounds = WorldBounds::of_chunk(coord, chunk_size);
        let tiles = bounds.positions().map(|pos| (pos, tile_type)).collect();
        Self::new(coord, chunk_size, tiles, pipeline_layers)
    }

    pub fn world_bounds(&self) -> WorldBounds {
        self.metadata.world_bounds
    }
}

/// Summary of how a render chunk was assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderChunkMetadata {
    pub generation_chunk_count: usize,
    pub generation_chunk_sizes: Vec<u32>,
    pub tile_count: usize,
    pub world_bounds: WorldBounds,
}

/// Large fixed-size chunk; the unit of caching, eviction and streaming.
#[derive(Clone, Debug)]
pub struct RenderChunk {
    pub coord: ChunkCoord,
    pub chunk_size: u32,
    pub aggregated_tiles: FxHashMap<TilePos, TileType>,
    pub metadata: RenderChunkMetadata,
}

impl RenderChunk {
    /// Tag at the given world position, if it lies inside this chunk.
    pub fn tile(&self, x: i64, y: i64) -> Option<TileType> {
        self.aggregated_tiles.get(&(x, y)).copied()
    }

    pub fn world_bounds(&self) -> WorldBounds {
        self.metadata.world_bounds
    }

    /// True when the tile set exactly covers the chunk's world bounds.
    pub fn is_complete(&self) -> bool {
        let bounds = self.world_bounds();
        self.aggregated_tiles.len() == bounds.tile_count()
            && self
                .aggregated_tiles
                .keys()
                .all(|&(x, y)| bounds.contains(x, y))
    }
}
