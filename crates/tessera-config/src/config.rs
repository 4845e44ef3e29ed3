//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain generation settings.
    pub world: WorldConfig,
    /// Chunk streaming and caching settings.
    pub streaming: StreamingConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Terrain generation configuration: seed, base chunk size and the ordered
/// pipeline with its per-layer parameter tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. Identical seed + config always reproduce identical terrain.
    pub seed: u64,
    /// Size in tiles of the coarse chunks classified by the first layer.
    pub base_chunk_size: u32,
    /// Ordered pipeline layer names (`"lands_and_seas"`, `"zoom"`).
    pub pipeline_layers: Vec<String>,
    /// Parameters for every `lands_and_seas` entry in the pipeline.
    pub lands_and_seas: LandsAndSeasConfig,
    /// Parameters for every `zoom` entry in the pipeline.
    pub zoom: ZoomConfig,
}

/// Parameters of the land/water classification layer.
///
/// Values are validated when the layer is constructed, not here, so that an
/// out-of-range ratio or unknown algorithm surfaces as a fatal construction
/// error instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LandsAndSeasConfig {
    /// Land share in tenths (1-10).
    pub land_ratio: i32,
    /// One of `random_chunks`, `perlin_noise`, `cellular_automata`.
    pub algorithm: String,
    /// Settings used by the `perlin_noise` algorithm.
    pub perlin_noise: PerlinNoiseConfig,
    /// Settings used by the `cellular_automata` algorithm.
    pub cellular_automata: CellularAutomataConfig,
}

/// Multi-octave noise settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerlinNoiseConfig {
    /// Chunk coordinate multiplier for the first octave.
    pub scale: f64,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
}

/// Birth/death automaton settings for coarse classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellularAutomataConfig {
    /// Probability that a neighbourhood cell starts as land.
    pub initial_land_probability: f64,
    /// Number of automaton steps.
    pub iterations: u32,
    /// Water becomes land when its land-neighbour count exceeds this.
    pub birth_limit: u32,
    /// Land dies when its land-neighbour count falls below this.
    pub death_limit: u32,
}

/// Parameters of the subdivide-and-refine layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZoomConfig {
    /// Children per axis for every parent chunk (>= 2).
    pub subdivision_factor: u32,
    /// Single-pass land-neighbour count that turns water into land.
    pub land_expansion_threshold: u32,
    /// Single-pass probability that coastal land erodes.
    pub erosion_probability: f64,
    /// Single-pass iteration count.
    pub iterations: u32,
    /// Run a rough-shape pass followed by a detail pass.
    pub use_multi_pass: bool,
    /// Iterations of the rough-shape pass.
    pub pass_1_iterations: u32,
    /// Expansion threshold of the rough-shape pass.
    pub pass_1_expansion_threshold: u32,
    /// Erosion probability of the rough-shape pass.
    pub pass_1_erosion_probability: f64,
    /// Iterations of the detail pass.
    pub pass_2_iterations: u32,
    /// Expansion threshold of the detail pass.
    pub pass_2_expansion_threshold: u32,
    /// Erosion probability of the detail pass.
    pub pass_2_erosion_probability: f64,
    /// Keep land whose in-bounds neighbours are all land.
    pub protect_interior: bool,
    /// Minimum neighbour count for interior protection to apply.
    pub interior_threshold: u32,
    /// 8-neighbour (Moore) adjacency when true, 4-neighbour (Von Neumann) otherwise.
    pub use_moore_neighborhood: bool,
    /// Restore small land regions after refinement.
    pub preserve_islands: bool,
    /// Regions with fewer chunks than this are restored.
    pub min_island_size: u32,
    /// Random tag flips during refinement.
    pub add_noise: bool,
    /// Flip probability for interior chunks.
    pub noise_probability: f64,
    /// Use a separate flip probability at land/water boundaries.
    pub edge_noise_boost: bool,
    /// Flip probability for boundary chunks.
    pub edge_noise_probability: f64,
    /// Noise-driven tag perturbation before refinement.
    pub fractal_perturbation: bool,
    /// Per-chunk probability that perturbation is attempted.
    pub perturbation_strength: f64,
}

/// Chunk streaming configuration: render chunk grid, load/unload distances,
/// cache capacities and message bus limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Fixed side length in tiles of render chunks.
    pub render_chunk_size: u32,
    /// Minimum load radius in render chunks.
    pub render_distance: u32,
    /// Minimum unload radius in render chunks.
    pub unload_distance: u32,
    /// Extra rings requested beyond the visible viewport.
    pub preload_margin: u32,
    /// Rings kept beyond the preload distance before a chunk is unloaded.
    pub unload_safety_margin: u32,
    /// Render chunks cached by the generation worker.
    pub render_cache_capacity: usize,
    /// Render chunks held ready by the front end.
    pub ready_chunk_capacity: usize,
    /// Tiles held in the front end tile cache.
    pub tile_cache_capacity: usize,
    /// Memoized world-to-chunk coordinate conversions.
    pub coord_cache_capacity: usize,
    /// Capacity of each message bus queue.
    pub queue_capacity: usize,
    /// Worker responses drained per front end tick.
    pub max_messages_per_tick: usize,
    /// Idle interval after which the worker reports status, in milliseconds.
    pub status_interval_ms: u64,
    /// The worker reports status after this many processed requests.
    pub status_every_requests: u64,
    /// How long shutdown waits for the worker to exit, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            base_chunk_size: 64,
            pipeline_layers: vec![
                "lands_and_seas".to_string(),
                "zoom".to_string(),
                "zoom".to_string(),
            ],
            lands_and_seas: LandsAndSeasConfig::default(),
            zoom: ZoomConfig::default(),
        }
    }
}

impl Default for LandsAndSeasConfig {
    fn default() -> Self {
        Self {
            land_ratio: 4,
            algorithm: "cellular_automata".to_string(),
            perlin_noise: PerlinNoiseConfig::default(),
            cellular_automata: CellularAutomataConfig::default(),
        }
    }
}

impl Default for PerlinNoiseConfig {
    fn default() -> Self {
        Self {
            scale: 0.1,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

impl Default for CellularAutomataConfig {
    fn default() -> Self {
        Self {
            initial_land_probability: 0.4,
            iterations: 5,
            birth_limit: 4,
            death_limit: 3,
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            subdivision_factor: 2,
            land_expansion_threshold: 3,
            erosion_probability: 0.25,
            iterations: 6,
            use_multi_pass: true,
            pass_1_iterations: 3,
            pass_1_expansion_threshold: 2,
            pass_1_erosion_probability: 0.1,
            pass_2_iterations: 3,
            pass_2_expansion_threshold: 4,
            pass_2_erosion_probability: 0.3,
            protect_interior: false,
            interior_threshold: 8,
            use_moore_neighborhood: true,
            preserve_islands: true,
            min_island_size: 1,
            add_noise: true,
            noise_probability: 0.15,
            edge_noise_boost: true,
            edge_noise_probability: 0.25,
            fractal_perturbation: true,
            perturbation_strength: 0.3,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_chunk_size: 64,
            render_distance: 3,
            unload_distance: 5,
            preload_margin: 2,
            unload_safety_margin: 3,
            render_cache_capacity: 256,
            ready_chunk_capacity: 256,
            tile_cache_capacity: 50_000,
            coord_cache_capacity: 4096,
            queue_capacity: 1000,
            max_messages_per_tick: 10,
            status_interval_ms: 1000,
            status_every_requests: 10,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl StreamingConfig {
    /// Rejects settings the chunk streamer cannot honour as written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_chunk_size == 0 {
            return Err(ConfigError::InvalidStreaming {
                field: "render_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.unload_distance < self.render_distance {
            return Err(ConfigError::InvalidStreaming {
                field: "unload_distance",
                reason: format!(
                    "{} is below render_distance {}",
                    self.unload_distance, self.render_distance
                ),
            });
        }
        if self.max_messages_per_tick == 0 {
            return Err(ConfigError::InvalidStreaming {
                field: "max_messages_per_tick",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Platform config directory for Tessera (`<config_dir>/tessera`), if the
/// platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tessera"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    ///
    /// World parameters only take effect for a newly constructed world manager;
    /// the running pipeline is never swapped underneath in-flight requests.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
