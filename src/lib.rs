//! Strata is the paging core of a layered genome variation graph viewer.
//!
//! Very large variation graphs do not fit in memory, so the viewer keeps only
//! the subgraph near the user's viewport resident. This crate owns that
//! sliding window: it decides which storage chunks are loaded, pages them in
//! and out as the viewport moves, and keeps the auxiliary per-node structures
//! (vertical rows, synthetic routing nodes for long edges) consistent while
//! chunks come and go. Rendering, storage formats, and UI live elsewhere and
//! talk to this crate through the [`store::GraphStore`] trait and the
//! [`viewport::Viewport`] facade.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod interval;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod viewport;

pub use cache::WindowedCache;
pub use config::ViewConfig;
pub use error::{Result, StrataError};
pub use events::LoadEvent;
pub use interval::LayerInterval;
pub use model::{Edge, Node, NodeId, GENOME_TAG};
pub use store::{Chunk, ChunkId, GraphStore, MemoryStore, MemoryStoreBuilder};
pub use viewport::{MoveDirection, Viewport, ZoomDirection};
