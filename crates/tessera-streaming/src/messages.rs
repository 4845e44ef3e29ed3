//! Messages exchanged between the front end and the generation worker.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tessera_chunks::{ChunkCoord, RenderChunk};

/// Request urgency. Higher variants are served first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Maps a Euclidean chunk distance from the camera to a priority.
    ///
    /// Within one chunk is urgent, within `immediate_distance` is high,
    /// everything further out is normal.
    pub fn for_distance(distance: f64, immediate_distance: u32) -> Self {
        if distance <= 1.0 {
            Priority::Urgent
        } else if distance <= f64::from(immediate_distance) {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

/// Identifier derived from a render chunk coordinate.
///
/// Two requests for the same chunk share a `RequestId`; use the ticket to
/// tell them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(ChunkCoord);

impl RequestId {
    pub fn for_chunk(coord: ChunkCoord) -> Self {
        Self(coord)
    }

    pub fn coord(self) -> ChunkCoord {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk_{}_{}", self.0.x, self.0.y)
    }
}

/// Ask the worker for one render chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRequest {
    pub coord: ChunkCoord,
    pub priority: Priority,
    pub request_id: RequestId,
    /// Unique per send; monotonically increasing.
    pub ticket: u64,
}

impl ChunkRequest {
    pub fn new(coord: ChunkCoord, priority: Priority, ticket: u64) -> Self {
        Self {
            coord,
            priority,
            request_id: RequestId::for_chunk(coord),
            ticket,
        }
    }
}

/// Suppress the response to the request that carried `ticket`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkCancel {
    pub coord: ChunkCoord,
    pub request_id: RequestId,
    pub ticket: u64,
}

impl ChunkCancel {
    pub fn new(coord: ChunkCoord, ticket: u64) -> Self {
        Self {
            coord,
            request_id: RequestId::for_chunk(coord),
            ticket,
        }
    }
}

/// Front end to worker.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerMessage {
    Request(ChunkRequest),
    Cancel(ChunkCancel),
    Shutdown { reason: String },
}

/// Outcome of one chunk request.
///
/// A successful response carries the finished chunk. It is immutable from
/// the moment the worker publishes it.
#[derive(Clone, Debug)]
pub struct ChunkResponse {
    pub coord: ChunkCoord,
    pub request_id: RequestId,
    pub ticket: u64,
    pub success: bool,
    pub error: Option<String>,
    pub generation_time: Duration,
    pub chunk: Option<Arc<RenderChunk>>,
}

impl ChunkResponse {
    pub fn ready(request: &ChunkRequest, chunk: Arc<RenderChunk>, generation_time: Duration) -> Self {
        Self {
            coord: request.coord,
            request_id: request.request_id,
            ticket: request.ticket,
            success: true,
            error: None,
            generation_time,
            chunk: Some(chunk),
        }
    }

    pub fn failed(request: &ChunkRequest, error: String, generation_time: Duration) -> Self {
        Self {
            coord: request.coord,
            request_id: request.request_id,
            ticket: request.ticket,
            success: false,
            error: Some(error),
            generation_time,
            chunk: None,
        }
    }
}

/// Periodic worker health report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusUpdate {
    pub message: String,
    pub worker_id: String,
    pub chunks_in_queue: usize,
    pub chunks_generated: u64,
    pub cache_size: usize,
    pub requests_processed: u64,
    pub requests_cancelled: u64,
    pub total_generation_time: Duration,
}

/// Worker to front end.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    Chunk(ChunkResponse),
    Status(StatusUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_derived_from_coordinates() {
        let a = ChunkRequest::new(ChunkCoord::new(-3, 7), Priority::High, 1);
        let b = ChunkRequest::new(ChunkCoord::new(-3, 7), Priority::Low, 2);
        assert_eq!(a.request_id, b.request_id);
        assert_eq!(a.request_id.to_string(), "chunk_-3_7");
        assert_ne!(a.ticket, b.ticket);
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_for_distance() {
        assert_eq!(Priority::for_distance(0.0, 2), Priority::Urgent);
        assert_eq!(Priority::for_distance(1.0, 2), Priority::Urgent);
        assert_eq!(Priority::for_distance(std::f64::consts::SQRT_2, 2), Priority::High);
        assert_eq!(Priority::for_distance(2.0, 2), Priority::High);
        assert_eq!(Priority::for_distance(2.3, 2), Priority::Normal);
    }

    #[test]
    fn test_failed_response_has_no_chunk() {
        let request = ChunkRequest::new(ChunkCoord::new(0, 0), Priority::Normal, 9);
        let response = ChunkResponse::failed(&request, "boom".into(), Duration::ZERO);
        assert!(!response.success);
        assert!(response.chunk.is_none());
        assert_eq!(response.ticket, 9);
        assert_eq!(response.error.as_deref(), Some("boom"));
    }
}
