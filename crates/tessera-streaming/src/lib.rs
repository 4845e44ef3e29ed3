//! Asynchronous chunk streaming for the Tessera tile world.
//!
//! A [`WorldManager`] on the consumer's thread talks to a single background
//! [`GenerationWorker`] over a priority [`MessageBus`]. The consumer never
//! blocks: missing tiles come back as `Loading` placeholders until the
//! worker's response is drained by [`WorldManager::process_worker_messages`].

mod bus;
mod manager;
mod messages;
mod worker;

pub use bus::{BusStats, Lane, MessageBus};
pub use manager::{
    ChunkInfo, ChunkStatus, StreamingError, WorldContext, WorldManager, WorldStatistics,
};
pub use messages::{
    ChunkCancel, ChunkRequest, ChunkResponse, Priority, RequestId, StatusUpdate, WorkerEvent,
    WorkerMessage,
};
pub use worker::{GenerationWorker, WORKER_THREAD_NAME, WorkerHandle, WorkerSettings, WorkerStats};
