//! Priority message bus between the front end and the generation worker.
//!
//! Requests travel over one bounded channel per priority lane and are always
//! taken from the most important non-empty lane. Worker events travel back
//! over a single bounded FIFO channel. Every send is non-blocking: a full
//! queue drops the message, logs it and bumps a counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, TrySendError, bounded};
use tracing::warn;

use crate::messages::{Priority, WorkerEvent, WorkerMessage};

/// Request lanes, most important first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lane {
    Shutdown,
    Cancel,
    Urgent,
    High,
    Normal,
    Low,
}

impl Lane {
    pub const ALL: [Lane; 6] = [
        Lane::Shutdown,
        Lane::Cancel,
        Lane::Urgent,
        Lane::High,
        Lane::Normal,
        Lane::Low,
    ];

    pub fn of(message: &WorkerMessage) -> Self {
        match message {
            WorkerMessage::Shutdown { .. } => Lane::Shutdown,
            WorkerMessage::Cancel(_) => Lane::Cancel,
            WorkerMessage::Request(request) => match request.priority {
                Priority::Urgent => Lane::Urgent,
                Priority::High => Lane::High,
                Priority::Normal => Lane::Normal,
                Priority::Low => Lane::Low,
            },
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

/// Counters and queue depths at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub to_worker_len: usize,
    pub to_main_len: usize,
}

/// Both directions of the bus. Cloning yields another handle to the same
/// queues; the front end and the worker each hold one.
#[derive(Clone, Debug)]
pub struct MessageBus {
    lanes: Vec<(Sender<WorkerMessage>, Receiver<WorkerMessage>)>,
    to_main: (Sender<WorkerEvent>, Receiver<WorkerEvent>),
    counters: Arc<Counters>,
}

impl MessageBus {
    /// `capacity` bounds each lane and the response queue; zero becomes one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lanes: Lane::ALL.iter().map(|_| bounded(capacity)).collect(),
            to_main: bounded(capacity),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Queues a message for the worker. Returns `false` if its lane is full.
    pub fn send_to_worker(&self, message: WorkerMessage) -> bool {
        let lane = Lane::of(&message);
        match self.lanes[lane.index()].0.try_send(message) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Worker queue full; dropped {:?} message", lane);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Queues an event for the front end. Returns `false` if the queue is full.
    pub fn send_to_main(&self, event: WorkerEvent) -> bool {
        match self.to_main.0.try_send(event) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Response queue full; dropped worker event");
                false
            }
        }
    }

    /// Highest-priority pending message, without waiting.
    pub fn try_recv_for_worker(&self) -> Option<WorkerMessage> {
        let message = self.lanes.iter().find_map(|(_, rx)| rx.try_recv().ok())?;
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        Some(message)
    }

    /// Waits up to `timeout` for any lane, then returns the highest-priority
    /// pending message.
    pub fn recv_for_worker_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        if let Some(message) = self.try_recv_for_worker() {
            return Some(message);
        }
        let mut select = Select::new();
        for (_, rx) in &self.lanes {
            select.recv(rx);
        }
        select.ready_timeout(timeout).ok()?;
        self.try_recv_for_worker()
    }

    /// Next worker event, without waiting.
    pub fn try_recv_for_main(&self) -> Option<WorkerEvent> {
        let event = self.to_main.1.try_recv().ok()?;
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    /// Up to `max` worker events in arrival order.
    pub fn drain_for_main(&self, max: usize) -> Vec<WorkerEvent> {
        std::iter::from_fn(|| self.try_recv_for_main()).take(max).collect()
    }

    /// Messages waiting for the worker across all lanes.
    pub fn pending_for_worker(&self) -> usize {
        self.lanes.iter().map(|(_, rx)| rx.len()).sum()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            messages_sent: self.counters.sent.load(Ordering::Relaxed),
            messages_received: self.counters.received.load(Ordering::Relaxed),
            messages_dropped: self.counters.dropped.load(Ordering::Relaxed),
            to_worker_len: self.pending_for_worker(),
            to_main_len: self.to_main.1.len(),
        }
    }
}
