//! Turns a render-chunk request into tiles by running the world tier.

use std::collections::BTreeMap;

use tessera_chunks::{ChunkCoord, DualChunkAddressing, GenerationChunk, RenderChunk};
use tessera_config::WorldConfig;
use tracing::{debug, trace};

use crate::data::{ChunkBounds, GenerationData};
use crate::error::{ConfigurationError, GenerationError};
use crate::pipeline::LayerSpec;
use crate::tier::TierCoordinator;

/// Everything needed to produce a [`RenderChunk`] from a coordinate.
///
/// The pipeline always runs over whole base chunks. Each generation chunk is
/// taken from the run of its base ancestor, so a tile's value never depends on
/// which render chunk asked for it.
#[derive(Debug)]
pub struct ChunkGenerator {
    seed: u64,
    base_chunk_size: u32,
    generation_chunk_size: u32,
    scale: i64,
    coordinator: TierCoordinator,
    addressing: DualChunkAddressing,
    layer_names: Vec<String>,
}

impl ChunkGenerator {
    pub fn new(
        seed: u64,
        base_chunk_size: u32,
        coordinator: TierCoordinator,
        addressing: DualChunkAddressing,
    ) -> Result<Self, ConfigurationError> {
        let generation_chunk_size = coordinator.final_generation_chunk_size(base_chunk_size)?;
        let scale = i64::from(base_chunk_size / generation_chunk_size);
        let layer_names = coordinator.world_tier_info().layer_names;
        debug!(
            "Chunk generator ready: base {} -> generation {} (render {})",
            base_chunk_size,
            generation_chunk_size,
            addressing.render_chunk_size()
        );
        Ok(Self {
            seed,
            base_chunk_size,
            generation_chunk_size,
            scale,
            coordinator,
            addressing,
            layer_names,
        })
    }

    /// Configures the world tier from `world.pipeline_layers`.
    pub fn from_config(
        world: &WorldConfig,
        render_chunk_size: u32,
        coord_cache_capacity: usize,
    ) -> Result<Self, ConfigurationError> {
        if render_chunk_size == 0 {
            return Err(ConfigurationError::InvalidChunkSize(render_chunk_size));
        }
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&LayerSpec::from_world_config(world)?)?;
        Self::new(
            world.seed,
            world.base_chunk_size,
            coordinator,
            DualChunkAddressing::new(render_chunk_size, coord_cache_capacity),
        )
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn base_chunk_size(&self) -> u32 {
        self.base_chunk_size
    }

    pub fn generation_chunk_size(&self) -> u32 {
        self.generation_chunk_size
    }

    pub fn render_chunk_size(&self) -> u32 {
        self.addressing.render_chunk_size()
    }

    pub fn coordinator(&self) -> &TierCoordinator {
        &self.coordinator
    }

    /// Runs the world tier over one base chunk.
    pub fn run_pipeline(&self, base: ChunkCoord) -> Result<GenerationData, GenerationError> {
        let data = GenerationData::new(self.seed, self.base_chunk_size);
        self.coordinator.process_tiers(data, ChunkBounds::single(base))
    }

    /// Base chunk a generation chunk was subdivided from.
    pub fn ancestor_of(&self, coord: ChunkCoord) -> ChunkCoord {
        ChunkCoord::new(coord.x.div_euclid(self.scale), coord.y.div_euclid(self.scale))
    }

    /// Generates the requested generation chunks, running the pipeline once
    /// per distinct base ancestor.
    pub fn generate_generation_chunks(
        &self,
        coords: &[ChunkCoord],
    ) -> Result<Vec<GenerationChunk>, GenerationError> {
        let mut by_ancestor: BTreeMap<ChunkCoord, Vec<ChunkCoord>> = BTreeMap::new();
        for &coord in coords {
            by_ancestor.entry(self.ancestor_of(coord)).or_default().push(coord);
        }

        let mut chunks = Vec::with_capacity(coords.len());
        for (ancestor, members) in by_ancestor {
            let data = self.run_pipeline(ancestor)?;
            for coord in members {
                let land_type = data
                    .chunk(coord.x, coord.y)?
                    .land_type
                    .ok_or(GenerationError::MissingLandType {
                        x: coord.x,
                        y: coord.y,
                    })?;
                chunks.push(GenerationChunk::filled(
                    coord,
                    self.generation_chunk_size,
                    land_type,
                    self.layer_names.clone(),
                ));
            }
        }
        Ok(chunks)
    }

    pub fn generation_chunk(&self, coord: ChunkCoord) -> Result<GenerationChunk, GenerationError> {
        let mut chunks = self.generate_generation_chunks(&[coord])?;
        chunks
            .pop()
            .ok_or(GenerationError::MissingChunk { x: coord.x, y: coord.y })
    }

    /// Generates and aggregates every generation chunk overlapping `coord`.
    pub fn generate_render_chunk(&self, coord: ChunkCoord) -> Result<RenderChunk, GenerationError> {
        let coords = self
            .addressing
            .generation_chunks_for_render_chunk(coord, self.generation_chunk_size);
        let chunks = self.generate_generation_chunks(&coords)?;
        let render_chunk = self.addressing.aggregate(&chunks, coord);
        trace!(
            "Generated render chunk {} from {} generation chunks",
            coord,
            chunks.len()
        );
        Ok(render_chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use tessera_chunks::TileType;
    use tessera_config::{LandsAndSeasConfig, ZoomConfig};

    fn world(seed: u64) -> WorldConfig {
        WorldConfig {
            seed,
            base_chunk_size: 64,
            pipeline_layers: vec!["lands_and_seas".into(), "zoom".into(), "zoom".into()],
            lands_and_seas: LandsAndSeasConfig {
                land_ratio: 4,
                algorithm: "random_chunks".to_string(),
                ..Default::default()
            },
            zoom: ZoomConfig {
                subdivision_factor: 2,
                iterations: 2,
                ..Default::default()
            },
        }
    }

    fn tiles_sorted(chunk: &RenderChunk) -> Vec<((i64, i64), TileType)> {
        let mut tiles: Vec<_> = chunk.aggregated_tiles.iter().map(|(k, v)| (*k, *v)).collect();
        tiles.sort();
        tiles
    }

    #[test]
    fn test_example_render_chunk_is_reproducible() {
        let generator = ChunkGenerator::from_config(&world(12345), 64, 1024).unwrap();
        assert_eq!(generator.generation_chunk_size(), 16);

        let first = generator.generate_render_chunk(ChunkCoord::new(0, 0)).unwrap();
        let second = generator.generate_render_chunk(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(first.aggregated_tiles.len(), 4096);
        assert!(first.is_complete());
        assert_eq!(first.metadata.generation_chunk_count, 16);
        assert_eq!(tiles_sorted(&first), tiles_sorted(&second));
        assert!(first
            .aggregated_tiles
            .values()
            .all(|t| matches!(t, TileType::Land | TileType::Water)));
    }

    #[test]
    fn test_separate_generators_agree() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..8 {
            let seed: u64 = rng.random();
            let coord = ChunkCoord::new(rng.random_range(-50..50), rng.random_range(-50..50));
            let a = ChunkGenerator::from_config(&world(seed), 64, 64).unwrap();
            let b = ChunkGenerator::from_config(&world(seed), 64, 64).unwrap();
            assert_eq!(
                tiles_sorted(&a.generate_render_chunk(coord).unwrap()),
                tiles_sorted(&b.generate_render_chunk(coord).unwrap())
            );
        }
    }

    #[test]
    fn test_tiles_independent_of_render_chunk_size() {
        let large = ChunkGenerator::from_config(&world(99), 64, 64).unwrap();
        let small = ChunkGenerator::from_config(&world(99), 24, 64).unwrap();
        let big_chunk = large.generate_render_chunk(ChunkCoord::new(-1, 0)).unwrap();
        for coord in [ChunkCoord::new(-3, 0), ChunkCoord::new(-2, 1), ChunkCoord::new(-1, 2)] {
            let piece = small.generate_render_chunk(coord).unwrap();
            assert!(piece.is_complete());
            for (&(x, y), tile) in &piece.aggregated_tiles {
                if let Some(expected) = big_chunk.tile(x, y) {
                    assert_eq!(*tile, expected, "tile ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_render_chunk_straddling_generation_chunks() {
        let generator = ChunkGenerator::from_config(&world(5), 24, 64).unwrap();
        let chunk = generator.generate_render_chunk(ChunkCoord::new(1, -1)).unwrap();
        // x 24..=47 spans generation columns 1..=2, y -24..=-1 spans -2..=-1
        assert_eq!(chunk.metadata.generation_chunk_count, 4);
        assert_eq!(chunk.aggregated_tiles.len(), 24 * 24);
        assert!(chunk.is_complete());
    }

    #[test]
    fn test_generation_chunk_is_uniform() {
        let generator = ChunkGenerator::from_config(&world(12345), 64, 64).unwrap();
        let chunk = generator.generation_chunk(ChunkCoord::new(-5, 3)).unwrap();
        assert_eq!(chunk.tiles.len(), 256);
        assert_eq!(chunk.metadata.tile_type_counts.len(), 1);
        assert_eq!(chunk.metadata.pipeline_layers, vec!["lands_and_seas", "zoom", "zoom"]);
        assert_eq!(generator.ancestor_of(ChunkCoord::new(-5, 3)), ChunkCoord::new(-2, 0));
    }

    #[test]
    fn test_unconfigured_generator_fails_requests() {
        let generator = ChunkGenerator::new(
            1,
            64,
            TierCoordinator::new(),
            DualChunkAddressing::new(64, 16),
        )
        .unwrap();
        assert_eq!(
            generator.generate_render_chunk(ChunkCoord::new(0, 0)).unwrap_err(),
            GenerationError::TierNotConfigured
        );
    }

    #[test]
    fn test_bad_base_size_rejected() {
        let mut config = world(1);
        config.base_chunk_size = 30;
        assert!(matches!(
            ChunkGenerator::from_config(&config, 64, 16),
            Err(ConfigurationError::IndivisibleChunkSize { base: 30, scale: 4 })
        ));
        assert!(matches!(
            ChunkGenerator::from_config(&world(1), 0, 16),
            Err(ConfigurationError::InvalidChunkSize(0))
        ));
    }
}
