//! ProgressBus service for the ordered orchestration progress stream.
//!
//! Broadcast-based, with sequence numbering. Every record carries the
//! running metrics totals at the moment it was published.

use chrono::Utc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::domain::models::{ProgressEvent, ProgressPayload};

use super::metrics::OperationMetrics;

/// Default capacity of the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Publishes [`ProgressEvent`]s to any number of subscribers.
#[derive(Debug)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
    sequence: AtomicU64,
    step: AtomicU32,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
            step: AtomicU32::new(0),
        }
    }

    /// Pipeline step stamped on subsequent records.
    pub fn set_step(&self, step: u32) {
        self.step.store(step, Ordering::SeqCst);
    }

    pub fn step(&self) -> u32 {
        self.step.load(Ordering::SeqCst)
    }

    /// Publish a payload with the given running totals.
    pub fn publish(&self, payload: ProgressPayload, totals: OperationMetrics) -> ProgressEvent {
        let event = ProgressEvent {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            step: self.step(),
            usage: totals.usage,
            tally: totals.tally,
            payload,
        };

        // No subscribers is not an error.
        let _ = self.sender.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Number of records published so far.
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
