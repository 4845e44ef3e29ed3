//! Tile and chunk primitives for the Tessera tile world.
//!
//! Two chunk grids cover the same tile space: small, dynamically sized
//! *generation chunks* produced by the terrain pipeline, and large fixed-size
//! *render chunks* that are the unit of caching and streaming. This crate holds
//! both chunk kinds, the addressing math between them, a bounded LRU cache and
//! the spiral loader that decides which render chunks to request or release.

pub mod addressing;
pub mod cache;
pub mod chunk;
pub mod spiral;
pub mod tile;

pub use addressing::{AddressingStats, DualChunkAddressing, final_generation_chunk_size, world_to_chunk};
pub use cache::BoundedCache;
pub use chunk::{
    ChunkCoord, GenerationChunk, GenerationChunkMetadata, RenderChunk, RenderChunkMetadata,
    WorldBounds,
};
pub use spiral::{SpiralChunkLoader, SpiralUpdate, spiral_offsets};
pub use tile::{Tile, TilePos, TileType};
