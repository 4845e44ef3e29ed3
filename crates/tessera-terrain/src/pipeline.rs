//! Ordered layer pipelines and the specs they are built from.

use tessera_config::{LandsAndSeasConfig, WorldConfig, ZoomConfig};

use crate::data::{ChunkBounds, GenerationData};
use crate::error::{ConfigurationError, GenerationError};
use crate::layers::{GenerationLayer, LandsAndSeasLayer, ZoomLayer};

/// Ordered list of layers applied to one [`GenerationData`].
///
/// Each layer sees bounds in its own input space: after a layer that
/// subdivides by `f`, the bounds handed to the next layer are `f` times finer.
pub struct Pipeline {
    name: String,
    layers: Vec<Box<dyn GenerationLayer>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    pub fn add_layer(&mut self, layer: Box<dyn GenerationLayer>) {
        self.layers.push(layer);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn layers(&self) -> impl Iterator<Item = &dyn GenerationLayer> {
        self.layers.iter().map(|l| l.as_ref())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Product of every layer's subdivision factor.
    pub fn subdivision_scale(&self) -> u64 {
        self.layers
            .iter()
            .map(|l| u64::from(l.subdivision_factor().max(1)))
            .product()
    }

    /// Runs every layer once, in order.
    pub fn process(
        &self,
        mut data: GenerationData,
        bounds: ChunkBounds,
    ) -> Result<GenerationData, GenerationError> {
        if self.layers.is_empty() {
            return Err(GenerationError::EmptyPipeline);
        }
        let mut bounds = bounds;
        for layer in &self.layers {
            data = layer.process(data, bounds)?;
            bounds = bounds.subdivided(layer.subdivision_factor());
        }
        Ok(data)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("layers", &self.layer_names())
            .finish()
    }
}

/// Parameters for one pipeline entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerParams {
    LandsAndSeas(LandsAndSeasConfig),
    Zoom(ZoomConfig),
}

impl LayerParams {
    fn kind(&self) -> &'static str {
        match self {
            LayerParams::LandsAndSeas(_) => "lands_and_seas",
            LayerParams::Zoom(_) => "zoom",
        }
    }
}

/// A `(layer name, parameters)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub params: LayerParams,
}

impl LayerSpec {
    pub fn lands_and_seas(config: LandsAndSeasConfig) -> Self {
        Self {
            name: "lands_and_seas".to_string(),
            params: LayerParams::LandsAndSeas(config),
        }
    }

    pub fn zoom(config: ZoomConfig) -> Self {
        Self {
            name: "zoom".to_string(),
            params: LayerParams::Zoom(config),
        }
    }

    /// One spec per entry of `world.pipeline_layers`, each taking its
    /// parameters from the matching table.
    pub fn from_world_config(world: &WorldConfig) -> Result<Vec<LayerSpec>, ConfigurationError> {
        world
            .pipeline_layers
            .iter()
            .map(|name| match name.as_str() {
                "lands_and_seas" => Ok(Self::lands_and_seas(world.lands_and_seas.clone())),
                "zoom" => Ok(Self::zoom(world.zoom.clone())),
                other => Err(ConfigurationError::UnknownLayer(other.to_string())),
            })
            .collect()
    }

    /// Constructs and validates the layer.
    pub fn build(&self) -> Result<Box<dyn GenerationLayer>, ConfigurationError> {
        match (self.name.as_str(), &self.params) {
            ("lands_and_seas", LayerParams::LandsAndSeas(config)) => {
                Ok(Box::new(LandsAndSeasLayer::new(config)?))
            }
            ("zoom", LayerParams::Zoom(config)) => Ok(Box::new(ZoomLayer::new(config)?)),
            ("lands_and_seas" | "zoom", params) => Err(ConfigurationError::LayerParamsMismatch {
                name: self.name.clone(),
                params: params.kind(),
            }),
            (other, _) => Err(ConfigurationError::UnknownLayer(other.to_string())),
        }
    }
}
