//! The tier coordinator: owns the configured world pipeline.

use tracing::info;

use crate::data::{ChunkBounds, GenerationData};
use crate::error::{ConfigurationError, GenerationError};
use crate::pipeline::{LayerSpec, Pipeline};

/// Snapshot of the world tier's configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TierInfo {
    pub configured: bool,
    pub layer_count: usize,
    pub layer_names: Vec<String>,
}

/// Holds the world tier and runs generation through it.
///
/// No chunk can be generated until [`TierCoordinator::set_world_tier`] has
/// succeeded.
#[derive(Debug, Default)]
pub struct TierCoordinator {
    world_tier: Option<Pipeline>,
}

impl TierCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every layer from `specs`. On error the previous tier is kept.
    pub fn set_world_tier(&mut self, specs: &[LayerSpec]) -> Result<(), ConfigurationError> {
        if specs.is_empty() {
            return Err(ConfigurationError::EmptyPipeline);
        }
        let mut pipeline = Pipeline::new("world");
        for spec in specs {
            pipeline.add_layer(spec.build()?);
        }
        for layer in pipeline.layers() {
            info!("World tier layer: {}", layer.config_summary());
        }
        info!(
            "World tier configured with {} layers (scale {})",
            pipeline.len(),
            pipeline.subdivision_scale()
        );
        self.world_tier = Some(pipeline);
        Ok(())
    }

    pub fn process_tiers(
        &self,
        data: GenerationData,
        bounds: ChunkBounds,
    ) -> Result<GenerationData, GenerationError> {
        self.world_tier
            .as_ref()
            .ok_or(GenerationError::TierNotConfigured)?
            .process(data, bounds)
    }

    pub fn is_configured(&self) -> bool {
        self.world_tier.is_some()
    }

    pub fn world_tier_info(&self) -> TierInfo {
        match &self.world_tier {
            Some(pipeline) => TierInfo {
                configured: true,
                layer_count: pipeline.len(),
                layer_names: pipeline.layer_names().into_iter().map(String::from).collect(),
            },
            None => TierInfo::default(),
        }
    }

    pub fn clear(&mut self) {
        self.world_tier = None;
    }

    /// Generation chunks per base chunk, per axis. One when unconfigured.
    pub fn subdivision_scale(&self) -> u64 {
        self.world_tier
            .as_ref()
            .map_or(1, Pipeline::subdivision_scale)
    }

    /// Size of the chunks the pipeline emits for a given base chunk size.
    ///
    /// The base size must split evenly into whole tiles at the final scale.
    pub fn final_generation_chunk_size(&self, base_chunk_size: u32) -> Result<u32, ConfigurationError> {
        if base_chunk_size == 0 {
            return Err(ConfigurationError::InvalidChunkSize(base_chunk_size));
        }
        let scale = self.subdivision_scale();
        let base = u64::from(base_chunk_size);
        if scale > base {
            return Err(ConfigurationError::SubdivisionBelowTile {
                base: base_chunk_size,
                scale,
            });
        }
        if base % scale != 0 {
            return Err(ConfigurationError::IndivisibleChunkSize {
                base: base_chunk_size,
                scale,
            });
        }
        // scale <= base, so the quotient fits in u32
        Ok((base / scale) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chunks::{ChunkCoord, final_generation_chunk_size};
    use tessera_config::{LandsAndSeasConfig, ZoomConfig};

    fn specs(zooms: usize) -> Vec<LayerSpec> {
        let mut specs = vec![LayerSpec::lands_and_seas(LandsAndSeasConfig {
            algorithm: "random_chunks".to_string(),
            ..Default::default()
        })];
        specs.extend((0..zooms).map(|_| LayerSpec::zoom(ZoomConfig::default())));
        specs
    }

    #[test]
    fn test_unconfigured_processing_fails() {
        let coordinator = TierCoordinator::new();
        assert!(!coordinator.is_configured());
        assert_eq!(
            coordinator
                .process_tiers(GenerationData::new(1, 64), ChunkBounds::single(ChunkCoord::new(0, 0)))
                .unwrap_err(),
            GenerationError::TierNotConfigured
        );
        assert_eq!(coordinator.world_tier_info(), TierInfo::default());
    }

    #[test]
    fn test_set_world_tier_reports_info() {
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&specs(2)).unwrap();
        let info = coordinator.world_tier_info();
        assert!(info.configured);
        assert_eq!(info.layer_count, 3);
        assert_eq!(info.layer_names, vec!["lands_and_seas", "zoom", "zoom"]);
        assert_eq!(coordinator.subdivision_scale(), 4);
    }

    #[test]
    fn test_empty_tier_rejected() {
        let mut coordinator = TierCoordinator::new();
        assert_eq!(
            coordinator.set_world_tier(&[]),
            Err(ConfigurationError::EmptyPipeline)
        );
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_tier() {
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&specs(1)).unwrap();
        let bad = vec![LayerSpec::zoom(ZoomConfig {
            subdivision_factor: 1,
            ..Default::default()
        })];
        assert!(coordinator.set_world_tier(&bad).is_err());
        assert_eq!(coordinator.world_tier_info().layer_count, 2);
    }

    #[test]
    fn test_clear_unconfigures() {
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&specs(1)).unwrap();
        coordinator.clear();
        assert!(!coordinator.is_configured());
        assert_eq!(coordinator.subdivision_scale(), 1);
    }

    #[test]
    fn test_final_chunk_size_matches_layer_names() {
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&specs(2)).unwrap();
        let names = coordinator.world_tier_info().layer_names;
        assert_eq!(coordinator.final_generation_chunk_size(64), Ok(16));
        assert_eq!(final_generation_chunk_size(64, &names, 2), 16);
    }

    #[test]
    fn test_final_chunk_size_rejects_bad_bases() {
        let mut coordinator = TierCoordinator::new();
        coordinator.set_world_tier(&specs(3)).unwrap();
        assert_eq!(
            coordinator.final_generation_chunk_size(0),
            Err(ConfigurationError::InvalidChunkSize(0))
        );
        assert_eq!(
            coordinator.final_generation_chunk_size(4),
            Err(ConfigurationError::SubdivisionBelowTile { base: 4, scale: 8 })
        );
        assert_eq!(
            coordinator.final_generation_chunk_size(12),
            Err(ConfigurationError::IndivisibleChunkSize { base: 12, scale: 8 })
        );
        assert_eq!(coordinator.final_generation_chunk_size(8), Ok(1));
    }
}
