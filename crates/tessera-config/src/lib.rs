//! Configuration system for the Tessera tile world.
//!
//! Provides startup settings for terrain generation and chunk streaming that
//! persist to disk as RON files. Supports CLI overrides via clap, hot-reload
//! detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CellularAutomataConfig, Config, DebugConfig, LandsAndSeasConfig, PerlinNoiseConfig,
    StreamingConfig, WorldConfig, ZoomConfig, default_config_dir,
};
pub use error::ConfigError;
