//! Id minting for synthetic routing nodes.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::model::NodeId;

/// Allocates ids for dummy nodes from the negative half of the id space.
///
/// Store ids are non-negative, so a counter that starts at `-1` and only
/// ever decreases can never collide with a real node for the lifetime of
/// an open graph.
#[derive(Debug)]
pub struct DummyIds {
    next: AtomicI64,
}

impl Default for DummyIds {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyIds {
    /// A fresh allocator, established at graph-open time.
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(-1),
        }
    }

    /// Mint the next dummy id.
    pub fn next_id(&self) -> NodeId {
        self.next.fetch_sub(1, Ordering::Relaxed)
    }
}
