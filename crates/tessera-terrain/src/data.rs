//! Data threaded through the pipeline for one generation request.

use std::collections::BTreeMap;

use tessera_chunks::{ChunkCoord, TileType};

use crate::error::GenerationError;

/// Inclusive chunk-coordinate rectangle in a layer's input space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl ChunkBounds {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Bounds covering exactly one chunk.
    pub fn single(coord: ChunkCoord) -> Self {
        Self::new(coord.x, coord.y, coord.x, coord.y)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// The same area expressed on a grid `factor` times finer.
    pub fn subdivided(&self, factor: u32) -> Self {
        let f = i64::from(factor.max(1));
        Self {
            min_x: self.min_x * f,
            min_y: self.min_y * f,
            max_x: self.max_x * f + f - 1,
            max_y: self.max_y * f + f - 1,
        }
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    /// Coordinates in x-major order (x outer, y inner).
    pub fn coords(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.min_x..=self.max_x).flat_map(move |x| (self.min_y..=self.max_y).map(move |y| (x, y)))
    }
}

/// Open-ended per-chunk metadata a layer may attach.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// One chunk's accumulated properties.
///
/// The core fields are typed; anything else a layer wants to record goes in
/// `extensions`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub chunk_x: i64,
    pub chunk_y: i64,
    pub chunk_size: u32,
    pub land_type: Option<TileType>,
    /// Coordinate of the chunk this one was subdivided from.
    pub parent: Option<ChunkCoord>,
    /// Number of zoom layers that produced this chunk.
    pub subdivision_level: u32,
    /// Size of the root ancestor before any subdivision.
    pub original_chunk_size: u32,
    pub extensions: BTreeMap<String, MetaValue>,
}

impl ChunkRecord {
    pub fn new(chunk_x: i64, chunk_y: i64, chunk_size: u32) -> Self {
        Self {
            chunk_x,
            chunk_y,
            chunk_size,
            land_type: None,
            parent: None,
            subdivision_level: 0,
            original_chunk_size: chunk_size,
            extensions: BTreeMap::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_y)
    }

    pub fn is_land(&self) -> bool {
        self.land_type == Some(TileType::Land)
    }
}

/// Pipeline state for one generation request.
///
/// Owned by exactly one pipeline invocation and discarded once tiles have
/// been extracted.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationData {
    pub seed: u64,
    /// Size of the chunks currently in `chunks`; shrinks with every zoom.
    pub chunk_size: u32,
    pub chunks: BTreeMap<(i64, i64), ChunkRecord>,
    pub processed_layers: Vec<String>,
}

impl GenerationData {
    pub fn new(seed: u64, chunk_size: u32) -> Self {
        Self {
            seed,
            chunk_size,
            chunks: BTreeMap::new(),
            processed_layers: Vec::new(),
        }
    }

    /// Record at `(x, y)`, created with the current chunk size if absent.
    pub fn record_mut(&mut self, x: i64, y: i64) -> &mut ChunkRecord {
        let chunk_size = self.chunk_size;
        self.chunks
            .entry((x, y))
            .or_insert_with(|| ChunkRecord::new(x, y, chunk_size))
    }

    pub fn set_land_type(&mut self, x: i64, y: i64, land_type: TileType) {
        self.record_mut(x, y).land_type = Some(land_type);
    }

    /// Sets an extension property, creating the chunk if it does not exist.
    pub fn set_chunk_property(&mut self, x: i64, y: i64, key: &str, value: MetaValue) {
        self.record_mut(x, y).extensions.insert(key.to_string(), value);
    }

    /// Record at `(x, y)`; a missing chunk is an error, never a default.
    pub fn chunk(&self, x: i64, y: i64) -> Result<&ChunkRecord, GenerationError> {
        self.chunks
            .get(&(x, y))
            .ok_or(GenerationError::MissingChunk { x, y })
    }

    /// Appends `layer` to `processed_layers` unless already recorded, so a
    /// layer name appears once no matter how often it runs.
    pub fn mark_processed(&mut self, layer: &str) {
        if !self.processed_layers.iter().any(|name| name == layer) {
            self.processed_layers.push(layer.to_string());
        }
    }

    /// Number of chunks tagged land.
    pub fn land_count(&self) -> usize {
        self.chunks.values().filter(|r| r.is_land()).count()
    }
}
