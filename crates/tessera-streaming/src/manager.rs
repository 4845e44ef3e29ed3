//! The world manager: the only surface a consumer touches.
//!
//! Every call returns immediately. Tiles come from the tile cache or from a
//! ready render chunk; anything else yields a `Loading` placeholder and, if
//! needed, a request to the worker. [`WorldManager::process_worker_messages`]
//! is the only place results cross over from the worker.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use tessera_chunks::{
    BoundedCache, ChunkCoord, DualChunkAddressing, RenderChunk, SpiralChunkLoader, Tile, TilePos,
};
use tessera_config::{Config, ConfigError, StreamingConfig, WorldConfig};
use tessera_terrain::{ChunkGenerator, ConfigurationError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bus::{BusStats, MessageBus};
use crate::messages::{ChunkCancel, ChunkRequest, Priority, StatusUpdate, WorkerEvent, WorkerMessage};
use crate::worker::{GenerationWorker, WorkerHandle, WorkerSettings, WorkerStats};

/// Startup failure.
#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("invalid world configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invalid streaming configuration: {0}")]
    Streaming(#[from] ConfigError),

    #[error("failed to spawn generation worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Settings fixed at startup, handed to every component that needs them.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldContext {
    pub world: WorldConfig,
    pub streaming: StreamingConfig,
}

impl WorldContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            world: config.world.clone(),
            streaming: config.streaming.clone(),
        }
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            worker_id: "worker_1".to_string(),
            render_cache_capacity: self.streaming.render_cache_capacity,
            status_interval: Duration::from_millis(self.streaming.status_interval_ms.max(1)),
            status_every_requests: self.streaming.status_every_requests,
            completed_ticket_capacity: self.streaming.queue_capacity.max(1) * 4,
        }
    }
}

/// Where a render chunk is in its lifecycle, from the front end's view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    Ready,
    Loading,
    NotRequested,
}

/// Summary of the render chunk owning a world position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_x: i64,
    pub chunk_y: i64,
    pub is_loaded: bool,
    pub is_loading: bool,
    pub chunk_size: u32,
    /// Zero unless loaded.
    pub tile_count: usize,
}

/// Front end counters for debug overlays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldStatistics {
    pub available_chunks: usize,
    /// Current bound on ready chunks; grows to cover the unload footprint.
    pub ready_chunk_capacity: usize,
    pub loading_chunks: usize,
    pub failed_chunks: usize,
    pub tile_cache_size: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub chunks_requested: u64,
    pub chunks_received: u64,
    pub chunks_failed: u64,
    pub chunks_cancelled: u64,
    pub requests_dropped: u64,
    pub stale_responses: u64,
    pub render_chunk_size: u32,
    pub generation_chunk_size: u32,
    pub load_radius: u32,
    pub unload_radius: u32,
    pub bus: BusStats,
    /// Most recent worker report, if any has arrived.
    pub worker_status: Option<StatusUpdate>,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: u64,
    cache_misses: u64,
    chunks_requested: u64,
    chunks_received: u64,
    chunks_failed: u64,
    chunks_cancelled: u64,
    requests_dropped: u64,
    stale_responses: u64,
}

/// Non-blocking tile world backed by a background generation worker.
pub struct WorldManager {
    context: WorldContext,
    addressing: DualChunkAddressing,
    generation_chunk_size: u32,
    loader: SpiralChunkLoader,
    bus: MessageBus,
    worker: WorkerHandle,
    ready: BoundedCache<ChunkCoord, Arc<RenderChunk>>,
    /// In-flight chunks and the ticket of the request that owns them.
    loading: FxHashMap<ChunkCoord, u64>,
    failed: FxHashSet<ChunkCoord>,
    tiles: BoundedCache<TilePos, Tile>,
    next_ticket: u64,
    initial_load_done: bool,
    immediate_distance: u32,
    counters: Counters,
    last_status: Option<StatusUpdate>,
    shut_down: bool,
}

impl WorldManager {
    pub fn new(config: &Config) -> Result<Self, StreamingError> {
        Self::with_context(WorldContext::from_config(config))
    }

    /// Validates the streaming settings and the world tier, then starts the
    /// worker.
    pub fn with_context(context: WorldContext) -> Result<Self, StreamingError> {
        let streaming = &context.streaming;
        streaming.validate()?;
        let generator = ChunkGenerator::from_config(
            &context.world,
            streaming.render_chunk_size,
            streaming.coord_cache_capacity,
        )?;
        let generation_chunk_size = generator.generation_chunk_size();
        let bus = MessageBus::new(streaming.queue_capacity);
        let worker = WorkerHandle::spawn(GenerationWorker::new(
            generator,
            bus.clone(),
            context.worker_settings(),
        ))?;

        info!(
            "Dual chunk system: render chunks {}x{}, generation chunks {} -> {}",
            streaming.render_chunk_size,
            streaming.render_chunk_size,
            context.world.base_chunk_size,
            generation_chunk_size
        );

        Ok(Self {
            addressing: DualChunkAddressing::new(
                streaming.render_chunk_size,
                streaming.coord_cache_capacity,
            ),
            generation_chunk_size,
            loader: SpiralChunkLoader::new(streaming.render_distance, streaming.unload_distance),
            ready: BoundedCache::new(streaming.ready_chunk_capacity),
            loading: FxHashMap::default(),
            failed: FxHashSet::default(),
            tiles: BoundedCache::new(streaming.tile_cache_capacity),
            next_ticket: 0,
            initial_load_done: false,
            immediate_distance: 1,
            counters: Counters::default(),
            last_status: None,
            shut_down: false,
            bus,
            worker,
            context,
        })
    }

    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    pub fn render_chunk_size(&self) -> u32 {
        self.addressing.render_chunk_size()
    }

    pub fn generation_chunk_size(&self) -> u32 {
        self.generation_chunk_size
    }

    pub fn world_to_render_chunk(&mut self, x: i64, y: i64) -> ChunkCoord {
        self.addressing.world_to_render_chunk(x, y)
    }

    /// Tile at a world position. Never blocks.
    ///
    /// Returns a `Loading` tile while the owning render chunk is not ready,
    /// requesting it if nobody has yet.
    pub fn get_tile(&mut self, x: i64, y: i64) -> Tile {
        if let Some(tile) = self.tiles.get(&(x, y)) {
            self.counters.cache_hits += 1;
            return *tile;
        }
        self.counters.cache_misses += 1;

        let coord = self.addressing.world_to_render_chunk(x, y);
        if let Some(chunk) = self.ready.get(&coord) {
            return match chunk.tile(x, y) {
                Some(tile_type) => {
                    let tile = Tile::new(x, y, tile_type);
                    self.tiles.insert((x, y), tile);
                    tile
                }
                None => Tile::loading(x, y),
            };
        }

        if !self.loading.contains_key(&coord) && !self.failed.contains(&coord) {
            let priority = self.priority_for(coord);
            self.request(coord, priority);
        }
        Tile::loading(x, y)
    }

    /// Recomputes the footprint around `center` for a viewport measured in
    /// tiles, requests chunks entering it and unloads chunks leaving it.
    pub fn update_chunks(&mut self, center: TilePos, viewport_width: u32, viewport_height: u32) {
        let size = self.render_chunk_size();
        let half_extent = viewport_width.max(viewport_height).div_ceil(2);
        let immediate = half_extent.div_ceil(size) + 1;
        let preload = immediate + self.context.streaming.preload_margin;
        let load_radius = self.context.streaming.render_distance.max(preload);
        let unload_radius = self
            .context
            .streaming
            .unload_distance
            .max(preload + self.context.streaming.unload_safety_margin);
        self.immediate_distance = immediate;

        if load_radius != self.loader.load_radius() || unload_radius != self.loader.unload_radius() {
            debug!(
                "Footprint radii changed to load {} / unload {}",
                load_radius, unload_radius
            );
            self.loader.reset(load_radius, unload_radius);
            self.initial_load_done = false;
        }

        // Everything inside the unload square must fit in the ready set, or
        // evictions would be re-requested forever by a resting camera.
        let side = 2 * unload_radius as usize + 1;
        let footprint = side * side;
        if self.ready.capacity() < footprint {
            info!(
                "Growing ready set from {} to {} render chunks for unload radius {}",
                self.ready.capacity(),
                footprint,
                unload_radius
            );
            self.ready.resize(footprint);
        }

        let center_chunk = self.addressing.world_to_render_chunk(center.0, center.1);
        let (to_load, to_unload) = if self.initial_load_done {
            let update = self.loader.update_for_position(center_chunk);
            (update.to_load, update.to_unload)
        } else {
            self.initial_load_done = true;
            let chunks = self.loader.get_initial_chunks(center_chunk);
            debug!("Initial spiral load: {} render chunks around {}", chunks.len(), center_chunk);
            (chunks, Vec::new())
        };

        for coord in to_load {
            if self.ready.contains(&coord) || self.loading.contains_key(&coord) {
                continue;
            }
            let priority = self.priority_for(coord);
            self.request(coord, priority);
        }
        for coord in to_unload {
            self.unload_chunk(coord);
        }
        self.sweep_beyond(center_chunk, i64::from(unload_radius));
    }

    /// Drains at most `max_messages_per_tick` worker events. Returns how many
    /// were handled.
    pub fn process_worker_messages(&mut self) -> usize {
        let events = self
            .bus
            .drain_for_main(self.context.streaming.max_messages_per_tick.max(1));
        let handled = events.len();
        for event in events {
            match event {
                WorkerEvent::Chunk(response) => {
                    if self.loading.get(&response.coord) != Some(&response.ticket) {
                        self.counters.stale_responses += 1;
                        continue;
                    }
                    self.loading.remove(&response.coord);
                    match response.chunk {
                        Some(chunk) if response.success => {
                            self.counters.chunks_received += 1;
                            if let Some((evicted, _)) = self.ready.insert(response.coord, chunk) {
                                self.clear_chunk_tiles(evicted);
                                // inside the footprint, get_tile re-requests on demand
                                let center = self.loader.current_center();
                                let load_radius = i64::from(self.loader.load_radius());
                                if center.ring_distance(evicted) > load_radius {
                                    self.loader.forget(evicted);
                                }
                            }
                        }
                        _ => {
                            self.counters.chunks_failed += 1;
                            self.failed.insert(response.coord);
                            warn!(
                                "Render chunk {} failed: {}",
                                response.coord,
                                response.error.as_deref().unwrap_or("unknown error")
                            );
                        }
                    }
                }
                WorkerEvent::Status(status) => {
                    debug!(
                        "{}: queue {}, generated {}, cache {}",
                        status.message,
                        status.chunks_in_queue,
                        status.chunks_generated,
                        status.cache_size
                    );
                    self.last_status = Some(status);
                }
            }
        }
        handled
    }

    pub fn get_chunk_info(&mut self, x: i64, y: i64) -> ChunkInfo {
        let coord = self.addressing.world_to_render_chunk(x, y);
        let tile_count = self
            .ready
            .peek(&coord)
            .map_or(0, |chunk| chunk.metadata.tile_count);
        ChunkInfo {
            chunk_x: coord.x,
            chunk_y: coord.y,
            is_loaded: self.ready.contains(&coord),
            is_loading: self.loading.contains_key(&coord),
            chunk_size: self.render_chunk_size(),
            tile_count,
        }
    }

    pub fn chunk_status(&self, chunk_x: i64, chunk_y: i64) -> ChunkStatus {
        let coord = ChunkCoord::new(chunk_x, chunk_y);
        if self.ready.contains(&coord) {
            ChunkStatus::Ready
        } else if self.loading.contains_key(&coord) {
            ChunkStatus::Loading
        } else {
            ChunkStatus::NotRequested
        }
    }

    pub fn is_chunk_loaded(&self, chunk_x: i64, chunk_y: i64) -> bool {
        self.chunk_status(chunk_x, chunk_y) == ChunkStatus::Ready
    }

    pub fn is_chunk_loading(&self, chunk_x: i64, chunk_y: i64) -> bool {
        self.chunk_status(chunk_x, chunk_y) == ChunkStatus::Loading
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.ready.len()
    }

    /// Ready render chunk, if any, without touching its recency.
    pub fn ready_chunk(&self, coord: ChunkCoord) -> Option<Arc<RenderChunk>> {
        self.ready.peek(&coord).cloned()
    }

    /// Requests chunks that are neither ready nor in flight, in the given
    /// order. Clears earlier failures. Returns the number of requests sent.
    pub fn request_chunks(&mut self, coords: &[ChunkCoord], priority: Priority) -> usize {
        let mut sent = 0;
        for &coord in coords {
            self.failed.remove(&coord);
            if self.ready.contains(&coord) || self.loading.contains_key(&coord) {
                continue;
            }
            if self.request(coord, priority) {
                sent += 1;
            }
        }
        sent
    }

    /// Cancels an in-flight chunk. The worker still finishes and caches it.
    pub fn cancel_chunk(&mut self, coord: ChunkCoord) -> bool {
        let Some(ticket) = self.loading.remove(&coord) else {
            return false;
        };
        self.loader.forget(coord);
        if self.bus.send_to_worker(WorkerMessage::Cancel(ChunkCancel::new(coord, ticket))) {
            self.counters.chunks_cancelled += 1;
        }
        true
    }

    pub fn get_statistics(&self) -> WorldStatistics {
        let c = &self.counters;
        let lookups = c.cache_hits + c.cache_misses;
        WorldStatistics {
            available_chunks: self.ready.len(),
            ready_chunk_capacity: self.ready.capacity(),
            loading_chunks: self.loading.len(),
            failed_chunks: self.failed.len(),
            tile_cache_size: self.tiles.len(),
            cache_hits: c.cache_hits,
            cache_misses: c.cache_misses,
            cache_hit_ratio: if lookups == 0 {
                0.0
            } else {
                c.cache_hits as f64 / lookups as f64
            },
            chunks_requested: c.chunks_requested,
            chunks_received: c.chunks_received,
            chunks_failed: c.chunks_failed,
            chunks_cancelled: c.chunks_cancelled,
            requests_dropped: c.requests_dropped,
            stale_responses: c.stale_responses,
            render_chunk_size: self.render_chunk_size(),
            generation_chunk_size: self.generation_chunk_size,
            load_radius: self.loader.load_radius(),
            unload_radius: self.loader.unload_radius(),
            bus: self.bus.stats(),
            worker_status: self.last_status.clone(),
        }
    }

    /// Stops the worker, waiting up to `shutdown_timeout_ms`. Idempotent.
    pub fn shutdown(&mut self) -> Option<WorkerStats> {
        if self.shut_down {
            return None;
        }
        self.shut_down = true;
        info!("Shutting down world manager");
        let timeout = Duration::from_millis(self.context.streaming.shutdown_timeout_ms);
        let stats = self.worker.shutdown("world manager shutdown", timeout);
        info!("World manager shutdown complete");
        stats
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn priority_for(&self, coord: ChunkCoord) -> Priority {
        Priority::for_distance(self.loader.generation_priority(coord), self.immediate_distance)
    }

    fn request(&mut self, coord: ChunkCoord, priority: Priority) -> bool {
        if self.shut_down {
            return false;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if self
            .bus
            .send_to_worker(WorkerMessage::Request(ChunkRequest::new(coord, priority, ticket)))
        {
            self.loading.insert(coord, ticket);
            self.counters.chunks_requested += 1;
            true
        } else {
            self.counters.requests_dropped += 1;
            self.loader.forget(coord);
            false
        }
    }

    fn unload_chunk(&mut self, coord: ChunkCoord) {
        self.ready.remove(&coord);
        self.failed.remove(&coord);
        self.clear_chunk_tiles(coord);
        self.cancel_chunk(coord);
        self.loader.forget(coord);
    }

    /// Unloads ready and in-flight chunks outside the square of `radius`
    /// around `center`, whichever path requested them.
    fn sweep_beyond(&mut self, center: ChunkCoord, radius: i64) {
        let outside = |c: &ChunkCoord| center.ring_distance(*c) > radius;
        let mut distant: Vec<ChunkCoord> = self.ready.iter().map(|(c, _)| *c).filter(outside).collect();
        distant.extend(self.loading.keys().copied().filter(outside));
        distant.extend(self.failed.iter().copied().filter(outside));
        for coord in distant {
            self.unload_chunk(coord);
        }
    }

    fn clear_chunk_tiles(&mut self, coord: ChunkCoord) {
        if self.tiles.is_empty() {
            return;
        }
        let bounds = self.addressing.render_chunk_bounds(coord);
        for pos in bounds.positions() {
            self.tiles.remove(&pos);
        }
    }
}

impl Drop for WorldManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
