//! Mirror-write completion events.
//!
//! Secondary-backend writes run as background tasks. Their outcome is never
//! swallowed: every task publishes exactly one [`MirrorEvent`] on the
//! [`MirrorEvents`] bus, built on [`tokio::sync::broadcast`] so any number of
//! observers (logs, tests, the CLI) can follow along.

use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Outcome of one background mirror write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    Completed {
        backend: String,
        name: String,
        bytes: usize,
    },
    Failed {
        backend: String,
        name: String,
        reason: String,
    },
}

impl MirrorEvent {
    pub fn backend(&self) -> &str {
        match self {
            MirrorEvent::Completed { backend, .. } | MirrorEvent::Failed { backend, .. } => backend,
        }
    }
}

/// Shared mirror event bus. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct MirrorEvents {
    sender: broadcast::Sender<MirrorEvent>,
}

impl MirrorEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`, returning the number of receivers handed the event.
    ///
    /// Having no subscribers is a normal condition and yields `0`.
    pub fn publish(&self, event: MirrorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> MirrorSubscriber {
        MirrorSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for MirrorEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Async receiver of [`MirrorEvent`]s.
pub struct MirrorSubscriber {
    receiver: broadcast::Receiver<MirrorEvent>,
}

impl MirrorSubscriber {
    /// Wait for the next event. Returns `None` once the bus is dropped.
    ///
    /// A lagging subscriber skips the dropped events and keeps going.
    pub async fn recv(&mut self) -> Option<MirrorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "MirrorSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
