//! Procedural 2D terrain: a pipeline of deterministic layers that classifies
//! coarse base chunks as land or water and then refines them into smaller
//! generation chunks, plus the generator that turns render-chunk requests into
//! tiles.

mod data;
mod error;
mod generator;
mod pipeline;
mod tier;

pub mod layers;
pub mod seed;

pub use data::{ChunkBounds, ChunkRecord, GenerationData, MetaValue};
pub use error::{ConfigurationError, GenerationError};
pub use generator::ChunkGenerator;
pub use layers::{GenerationLayer, LandsAndSeasAlgorithm, LandsAndSeasLayer, ZoomLayer};
pub use pipeline::{LayerParams, LayerSpec, Pipeline};
pub use tier::{TierCoordinator, TierInfo};
