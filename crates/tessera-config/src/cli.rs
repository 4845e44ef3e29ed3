//! Command-line argument parsing for Tessera.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Tessera command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "tessera", about = "Tessera tile world")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load radius in render chunks.
    #[arg(long)]
    pub render_distance: Option<u32>,

    /// Unload radius in render chunks.
    #[arg(long)]
    pub unload_distance: Option<u32>,

    /// Render chunk side length in tiles.
    #[arg(long)]
    pub render_chunk_size: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of camera steps the headless walk performs.
    #[arg(long, default_value_t = 8)]
    pub steps: u32,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(rd) = args.render_distance {
            self.streaming.render_distance = rd;
        }
        if let Some(ud) = args.unload_distance {
            self.streaming.unload_distance = ud;
        }
        if let Some(size) = args.render_chunk_size {
            self.streaming.render_chunk_size = size;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
