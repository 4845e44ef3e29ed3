//! Background generation worker.
//!
//! One dedicated thread owns the chunk generator and the render-chunk cache.
//! It pulls requests from the bus in priority order, answers from the cache
//! when it can, and otherwise generates, caches and responds. Nothing it owns
//! is shared; finished chunks leave as immutable `Arc`s inside responses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use rustc_hash::FxHashSet;
use tessera_chunks::{BoundedCache, ChunkCoord, RenderChunk};
use tessera_terrain::ChunkGenerator;
use tracing::{debug, error, info, warn};

use crate::bus::MessageBus;
use crate::messages::{
    ChunkCancel, ChunkRequest, ChunkResponse, StatusUpdate, WorkerEvent, WorkerMessage,
};

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "world-gen-worker";

/// Worker tuning, taken from the streaming configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSettings {
    pub worker_id: String,
    pub render_cache_capacity: usize,
    /// Report status after this long without a message.
    pub status_interval: Duration,
    /// Report status after this many processed requests.
    pub status_every_requests: u64,
    /// Recently finished tickets remembered so late cancels are ignored.
    pub completed_ticket_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_id: "worker_1".to_string(),
            render_cache_capacity: 256,
            status_interval: Duration::from_millis(1000),
            status_every_requests: 10,
            completed_ticket_capacity: 1000,
        }
    }
}

/// Lifetime counters, returned when the worker exits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorkerStats {
    pub chunks_generated: u64,
    pub requests_processed: u64,
    pub requests_cancelled: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub total_generation_time: Duration,
}

impl WorkerStats {
    pub fn average_generation_time(&self) -> Duration {
        if self.chunks_generated == 0 {
            return Duration::ZERO;
        }
        self.total_generation_time.div_f64(self.chunks_generated as f64)
    }
}

/// Worker state. Lives on the worker thread once spawned.
pub struct GenerationWorker {
    settings: WorkerSettings,
    generator: ChunkGenerator,
    bus: MessageBus,
    cache: BoundedCache<ChunkCoord, Arc<RenderChunk>>,
    cancelled: FxHashSet<u64>,
    completed: BoundedCache<u64, ()>,
    stats: WorkerStats,
    running: bool,
}

impl GenerationWorker {
    pub fn new(generator: ChunkGenerator, bus: MessageBus, settings: WorkerSettings) -> Self {
        Self {
            cache: BoundedCache::new(settings.render_cache_capacity),
            completed: BoundedCache::new(settings.completed_ticket_capacity),
            cancelled: FxHashSet::default(),
            stats: WorkerStats::default(),
            running: true,
            settings,
            generator,
            bus,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, coord: ChunkCoord) -> bool {
        self.cache.contains(&coord)
    }

    /// Processes messages until shutdown, then returns the final counters.
    pub fn run(mut self, stop: &AtomicBool) -> WorkerStats {
        info!("Generation worker {} started", self.settings.worker_id);
        let mut last_status = Instant::now();

        while self.running && !stop.load(Ordering::Relaxed) {
            match self.bus.recv_for_worker_timeout(self.settings.status_interval) {
                Some(message) => {
                    let was_request = matches!(message, WorkerMessage::Request(_));
                    self.handle_message(message);
                    let every = self.settings.status_every_requests.max(1);
                    if was_request && self.stats.requests_processed % every == 0 {
                        self.send_status("active");
                        last_status = Instant::now();
                    }
                }
                None => {
                    if last_status.elapsed() >= self.settings.status_interval {
                        self.send_status("idle");
                        last_status = Instant::now();
                    }
                }
            }
        }

        info!(
            "Generation worker {} stopped: {} generated, {} processed, {} cancelled, {} failed, avg {:?}",
            self.settings.worker_id,
            self.stats.chunks_generated,
            self.stats.requests_processed,
            self.stats.requests_cancelled,
            self.stats.failures,
            self.stats.average_generation_time()
        );
        self.stats
    }

    /// Handles one message. Exposed so tests can drive the worker without a
    /// thread.
    pub fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Request(request) => self.handle_request(request),
            WorkerMessage::Cancel(cancel) => self.handle_cancel(cancel),
            WorkerMessage::Shutdown { reason } => {
                info!("Generation worker {} shutting down: {}", self.settings.worker_id, reason);
                self.running = false;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn handle_request(&mut self, request: ChunkRequest) {
        let suppressed = self.cancelled.remove(&request.ticket);

        if let Some(chunk) = self.cache.get(&request.coord) {
            let chunk = Arc::clone(chunk);
            self.stats.cache_hits += 1;
            self.finish(&request, suppressed, ChunkResponse::ready(&request, chunk, Duration::ZERO));
            return;
        }

        let start = Instant::now();
        let response = match self.generator.generate_render_chunk(request.coord) {
            Ok(chunk) => {
                let elapsed = start.elapsed();
                let chunk = Arc::new(chunk);
                self.cache.insert(request.coord, Arc::clone(&chunk));
                self.stats.chunks_generated += 1;
                self.stats.total_generation_time += elapsed;
                debug!(
                    "Generated render chunk {} ({:?}, {:?})",
                    request.coord, request.priority, elapsed
                );
                ChunkResponse::ready(&request, chunk, elapsed)
            }
            Err(e) => {
                self.stats.failures += 1;
                let message = format!("failed to generate chunk {}: {e}", request.coord);
                warn!("Generation worker {}: {}", self.settings.worker_id, message);
                ChunkResponse::failed(&request, message, start.elapsed())
            }
        };
        self.finish(&request, suppressed, response);
    }

    fn finish(&mut self, request: &ChunkRequest, suppressed: bool, response: ChunkResponse) {
        self.stats.requests_processed += 1;
        self.completed.insert(request.ticket, ());
        if suppressed {
            debug!("Suppressed response for cancelled {}", request.request_id);
            return;
        }
        self.bus.send_to_main(WorkerEvent::Chunk(response));
    }

    fn handle_cancel(&mut self, cancel: ChunkCancel) {
        // Too late: the response has already been sent.
        if self.completed.contains(&cancel.ticket) {
            return;
        }
        if self.cancelled.insert(cancel.ticket) {
            self.stats.requests_cancelled += 1;
            debug!("Cancelled {} (ticket {})", cancel.request_id, cancel.ticket);
        }
    }

    fn send_status(&self, message: &str) {
        self.bus.send_to_main(WorkerEvent::Status(StatusUpdate {
            message: format!("Worker {} {}", self.settings.worker_id, message),
            worker_id: self.settings.worker_id.clone(),
            chunks_in_queue: self.bus.pending_for_worker(),
            chunks_generated: self.stats.chunks_generated,
            cache_size: self.cache.len(),
            requests_processed: self.stats.requests_processed,
            requests_cancelled: self.stats.requests_cancelled,
            total_generation_time: self.stats.total_generation_time,
        }));
    }
}

/// Owner-side handle to the running worker thread.
pub struct WorkerHandle {
    thread: Option<JoinHandle<WorkerStats>>,
    done: Receiver<()>,
    stop: Arc<AtomicBool>,
    bus: MessageBus,
}

impl WorkerHandle {
    /// Starts `worker` on a named thread.
    pub fn spawn(worker: GenerationWorker) -> std::io::Result<Self> {
        let bus = worker.bus.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = bounded::<()>(1);
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                let stats = worker.run(&thread_stop);
                let _ = done_tx.send(());
                stats
            })?;

        Ok(Self {
            thread: Some(thread),
            done,
            stop,
            bus,
        })
    }

    /// True until the thread has been joined.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Sends a shutdown message and waits up to `timeout` for the thread.
    ///
    /// Returns the worker's counters if it exited in time. A thread that does
    /// not exit in time is detached. Later calls return `None`.
    pub fn shutdown(&mut self, reason: &str, timeout: Duration) -> Option<WorkerStats> {
        let thread = self.thread.take()?;
        if !self.bus.send_to_worker(WorkerMessage::Shutdown {
            reason: reason.to_string(),
        }) {
            warn!("Could not queue shutdown message; signalling stop flag only");
        }
        self.stop.store(true, Ordering::Relaxed);

        if self.done.recv_timeout(timeout).is_err() {
            warn!(
                "Generation worker did not stop within {:?}; detaching thread",
                timeout
            );
            return None;
        }
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Generation worker thread panicked");
                None
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown("handle dropped", Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Priority;
    use tessera_chunks::DualChunkAddressing;
    use tessera_config::WorldConfig;
    use tessera_terrain::TierCoordinator;

    fn generator() -> ChunkGenerator {
        let mut world = WorldConfig::default();
        world.lands_and_seas.algorithm = "random_chunks".to_string();
        ChunkGenerator::from_config(&world, 32, 64).unwrap()
    }

    fn worker(bus: &MessageBus) -> GenerationWorker {
        GenerationWorker::new(
            generator(),
            bus.clone(),
            WorkerSettings {
                status_every_requests: 1000,
                ..Default::default()
            },
        )
    }

    fn request(x: i64, ticket: u64) -> WorkerMessage {
        WorkerMessage::Request(ChunkRequest::new(ChunkCoord::new(x, 0), Priority::Normal, ticket))
    }

    fn responses(bus: &MessageBus) -> Vec<ChunkResponse> {
        bus.drain_for_main(usize::MAX)
            .into_iter()
            .filter_map(|e| match e {
                WorkerEvent::Chunk(r) => Some(r),
                WorkerEvent::Status(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_request_generates_caches_and_responds() {
        let bus = MessageBus::new(16);
        let mut worker = worker(&bus);
        worker.handle_message(request(2, 1));

        let out = responses(&bus);
        assert_eq!(out.len(), 1);
        assert!(out[0].success);
        assert_eq!(out[0].ticket, 1);
        let chunk = out[0].chunk.as_ref().unwrap();
        assert!(chunk.is_complete());
        assert!(worker.is_cached(ChunkCoord::new(2, 0)));
        assert_eq!(worker.stats().chunks_generated, 1);
    }

    #[test]
    fn test_cached_chunk_served_without_regeneration() {
        let bus = MessageBus::new(16);
        let mut worker = worker(&bus);
        worker.handle_message(request(0, 1));
        worker.handle_message(request(0, 2));

        let out = responses(&bus);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].generation_time, Duration::ZERO);
        assert!(Arc::ptr_eq(out[0].chunk.as_ref().unwrap(), out[1].chunk.as_ref().unwrap()));
        let stats = worker.stats();
        assert_eq!(stats.chunks_generated, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.requests_processed, 2);
    }

    #[test]
    fn test_cancel_suppresses_response_but_still_caches() {
        let bus = MessageBus::new(16);
        let mut worker = worker(&bus);
        worker.handle_message(WorkerMessage::Cancel(ChunkCancel::new(ChunkCoord::new(5, 0), 3)));
        worker.handle_message(request(5, 3));

        assert!(responses(&bus).is_empty());
        assert!(worker.is_cached(ChunkCoord::new(5, 0)));
        assert_eq!(worker.stats().requests_cancelled, 1);

        // a fresh ticket for the same chunk is answered from the cache
        worker.handle_message(request(5, 4));
        let out = responses(&bus);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ticket, 4);
    }

    #[test]
    fn test_late_cancel_is_ignored() {
        let bus = MessageBus::new(16);
        let mut worker = worker(&bus);
        worker.handle_message(request(1, 1));
        worker.handle_message(WorkerMessage::Cancel(ChunkCancel::new(ChunkCoord::new(1, 0), 1)));
        assert_eq!(worker.stats().requests_cancelled, 0);
        assert_eq!(responses(&bus).len(), 1);
    }

    #[test]
    fn test_generation_error_becomes_failed_response() {
        let bus = MessageBus::new(16);
        let broken = ChunkGenerator::new(
            1,
            64,
            TierCoordinator::new(),
            DualChunkAddressing::new(64, 16),
        )
        .unwrap();
        let mut worker = GenerationWorker::new(broken, bus.clone(), WorkerSettings::default());
        worker.handle_message(request(0, 1));
        worker.handle_message(request(1, 2));

        let out = responses(&bus);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| !r.success && r.chunk.is_none()));
        assert!(out[0].error.as_deref().unwrap().contains("configured"));
        assert_eq!(worker.stats().failures, 2);
        assert!(worker.is_running());
    }

    #[test]
    fn test_render_cache_is_bounded() {
        let bus = MessageBus::new(64);
        let mut worker = GenerationWorker::new(
            generator(),
            bus.clone(),
            WorkerSettings {
                render_cache_capacity: 3,
                ..Default::default()
            },
        );
        for x in 0..6 {
            worker.handle_message(request(x, x as u64));
        }
        assert_eq!(worker.cache_len(), 3);
        assert!(worker.is_cached(ChunkCoord::new(5, 0)));
        assert!(!worker.is_cached(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_shutdown_message_stops_loop() {
        let bus = MessageBus::new(16);
        let mut worker = worker(&bus);
        worker.handle_message(WorkerMessage::Shutdown {
            reason: "done".into(),
        });
        assert!(!worker.is_running());
    }

    #[test]
    fn test_spawned_worker_shuts_down_within_timeout() {
        let bus = MessageBus::new(16);
        let mut handle = WorkerHandle::spawn(worker(&bus)).unwrap();
        assert!(bus.send_to_worker(request(0, 1)));

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut got = Vec::new();
        while got.is_empty() && Instant::now() < deadline {
            got = responses(&bus);
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got.len(), 1);

        let stats = handle.shutdown("test", Duration::from_secs(5)).unwrap();
        assert_eq!(stats.requests_processed, 1);
        assert!(!handle.is_running());
        assert!(handle.shutdown("again", Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_average_generation_time() {
        let stats = WorkerStats {
            chunks_generated: 4,
            total_generation_time: Duration::from_millis(40),
            ..Default::default()
        };
        assert_eq!(stats.average_generation_time(), Duration::from_millis(10));
        assert_eq!(WorkerStats::default().average_generation_time(), Duration::ZERO);
    }
}
