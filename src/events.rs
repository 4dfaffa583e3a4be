//! Loading-progress notifications.
//!
//! Progress consumers (a UI loading bar, tests waiting for a state) register
//! a channel rather than an observer object; the cache stays decoupled from
//! any UI dispatch mechanism.

use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;

/// Loading-state tag delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    /// A chunk finished loading into the resident window.
    ChunkLoaded,
    /// A chunk was evicted from the resident window.
    ChunkUnloaded,
    /// The initial window load has drained.
    FullyLoaded,
}

/// Fan-out of [`LoadEvent`]s to any number of subscriber channels.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<LoadEvent>>>,
}

impl EventBus {
    /// A bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber; events emitted after this call are
    /// delivered to the returned receiver.
    pub fn subscribe(&self) -> Receiver<LoadEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to all live subscribers, dropping hung-up ones.
    pub fn emit(&self, event: LoadEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(event).is_ok());
    }
}
