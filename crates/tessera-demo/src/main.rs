//! Headless demo that streams a Tessera world around a moving camera.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p tessera-demo -- --seed 7 --steps 16`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tessera_chunks::TileType;
use tessera_config::{CliArgs, Config, default_config_dir};
use tessera_streaming::{WorldManager, WorldStatistics};
use tracing::{error, info, warn};

/// Viewport in tiles, roughly a terminal screen.
const VIEWPORT_WIDTH: u32 = 80;
const VIEWPORT_HEIGHT: u32 = 50;
/// Frame pacing for the simulated tick loop.
const TICK: Duration = Duration::from_millis(16);
/// Ticks to wait for the viewport at each camera position.
const MAX_TICKS_PER_STEP: u32 = 120;

#[derive(Debug, Default, Clone, Copy)]
struct ViewportSample {
    land: usize,
    water: usize,
    loading: usize,
}

impl ViewportSample {
    fn total(&self) -> usize {
        self.land + self.water + self.loading
    }
}

fn sample_viewport(world: &mut WorldManager, center: (i64, i64)) -> ViewportSample {
    let half_w = i64::from(VIEWPORT_WIDTH / 2);
    let half_h = i64::from(VIEWPORT_HEIGHT / 2);
    let mut sample = ViewportSample::default();
    for y in center.1 - half_h..center.1 + half_h {
        for x in center.0 - half_w..center.0 + half_w {
            match world.get_tile(x, y).tile_type {
                TileType::Land => sample.land += 1,
                TileType::Water => sample.water += 1,
                TileType::Loading => sample.loading += 1,
            }
        }
    }
    sample
}

fn print_statistics(stats: &WorldStatistics) {
    println!("--- world statistics ---");
    println!(
        "render chunks: {} ready, {} loading, {} failed",
        stats.available_chunks, stats.loading_chunks, stats.failed_chunks
    );
    println!(
        "chunk sizes: render {}, generation {} (load radius {}, unload radius {})",
        stats.render_chunk_size, stats.generation_chunk_size, stats.load_radius, stats.unload_radius
    );
    println!(
        "requests: {} sent, {} received, {} cancelled, {} dropped, {} stale",
        stats.chunks_requested,
        stats.chunks_received,
        stats.chunks_cancelled,
        stats.requests_dropped,
        stats.stale_responses
    );
    println!(
        "tile cache: {} tiles, {} hits, {} misses, hit ratio {:.3}",
        stats.tile_cache_size, stats.cache_hits, stats.cache_misses, stats.cache_hit_ratio
    );
    println!(
        "bus: {} sent, {} received, {} dropped",
        stats.bus.messages_sent, stats.bus.messages_received, stats.bus.messages_dropped
    );
    if let Some(status) = &stats.worker_status {
        println!(
            "worker {}: {} generated, {} cached, {} processed, {:?} generating",
            status.worker_id,
            status.chunks_generated,
            status.cache_size,
            status.requests_processed,
            status.total_generation_time
        );
    }
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    tessera_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        "Starting world: seed {}, pipeline {:?}",
        config.world.seed, config.world.pipeline_layers
    );

    let mut world = match WorldManager::new(&config) {
        Ok(world) => world,
        Err(e) => {
            error!("Failed to start world: {e}");
            std::process::exit(1);
        }
    };

    let step_size = i64::from(config.streaming.render_chunk_size);
    let started = Instant::now();
    let mut camera = (0_i64, 0_i64);

    for step in 0..args.steps {
        world.update_chunks(camera, VIEWPORT_WIDTH, VIEWPORT_HEIGHT);

        let mut ticks = 0;
        let sample = loop {
            world.process_worker_messages();
            let sample = sample_viewport(&mut world, camera);
            ticks += 1;
            if sample.loading == 0 || ticks >= MAX_TICKS_PER_STEP {
                break sample;
            }
            std::thread::sleep(TICK);
        };

        if sample.loading > 0 {
            warn!(
                "Step {}: {} of {} viewport tiles still loading",
                step,
                sample.loading,
                sample.total()
            );
        }
        info!(
            "Step {} at {:?}: {} land, {} water after {} ticks",
            step, camera, sample.land, sample.water, ticks
        );

        camera.0 += step_size;
    }

    print_statistics(&world.get_statistics());
    println!("walked {} steps in {:?}", args.steps, started.elapsed());

    if let Some(worker) = world.shutdown() {
        println!(
            "worker exited: {} chunks generated, {} requests, {} cancelled, {} failed, avg {:?}",
            worker.chunks_generated,
            worker.requests_processed,
            worker.requests_cancelled,
            worker.failures,
            worker.average_generation_time()
        );
    }
}
