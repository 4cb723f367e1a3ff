//! Inbound event queue.
//!
//! Events are produced by:
//! - The device transport (status, pings, keepalives)
//! - The parameter host (set requests)
//! - The binary (shutdown)
//!
//! and consumed by the node loop, one at a time, in arrival order.  Every
//! handler runs to completion before the next event is taken, so device
//! state is never mutated concurrently.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Transport   │────▶│              │     │              │
//! │ Param host  │────▶│  EventQueue  │────▶│  Dispatcher  │
//! │ Binary      │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::device::{Reading, StatusSample};
use crate::params::ParamChange;

/// Maximum number of pending events.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Largest set request carried intact.  Anything with more than one change
/// is refused anyway; the capacity only keeps the refusal accurate.
pub const MAX_BATCH: usize = 4;

/// Node input events.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Externally requested parameter change(s).
    SetParameters(heapless::Vec<ParamChange, MAX_BATCH>),
    /// Periodic device status.
    Status(StatusSample),
    /// One decoded ping.
    Reading(Box<Reading>),
    /// The device is idle (keepalive or dummy message).
    Keepalive,
    /// Stop the node loop.
    Shutdown,
}

impl NodeEvent {
    /// Wrap a set request.  Changes past [`MAX_BATCH`] are dropped; the
    /// request still counts as a batch.
    pub fn set_parameters(changes: &[ParamChange]) -> Self {
        let mut batch = heapless::Vec::new();
        for c in changes.iter().take(MAX_BATCH) {
            // Bounded by take().
            let _ = batch.push(*c);
        }
        Self::SetParameters(batch)
    }

    pub fn reading(reading: Reading) -> Self {
        Self::Reading(Box::new(reading))
    }
}

/// Bounded multi-producer queue in front of the node loop.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, NodeEvent, EVENT_QUEUE_DEPTH>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue without blocking.
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: NodeEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Event queue full, event dropped ({n} total)");
                false
            }
        }
    }

    /// Take the next event, if any.
    pub fn pop(&self) -> Option<NodeEvent> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> NodeEvent {
        self.channel.receive().await
    }

    /// Drain all pending events into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(NodeEvent)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Events lost to a full queue since start-up.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
