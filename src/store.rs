//! Boundary to the chunked graph store.
//!
//! The on-disk format, its indexes, and the builder that produces them are
//! owned by the storage layer; the cache only ever asks "which chunks touch
//! this layer" and "give me this node". [`MemoryStore`] is the in-process
//! implementation used by tests and the batch CLI.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Result, StrataError};
use crate::model::{Edge, Node, NodeId};

/// Identifier of a chunk within one open graph.
pub type ChunkId = u32;

/// A contiguous-layer-interval unit of graph data, loaded and unloaded
/// atomically by the cache.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Index of this chunk in the store.
    pub index: ChunkId,
    /// Lowest layer covered by this chunk.
    pub min_layer: u32,
    /// Highest layer covered by this chunk.
    pub max_layer: u32,
    /// The chunk's subgraph; edges ride on their endpoint nodes.
    pub nodes: Vec<Node>,
}

/// Read contract the cache consumes. Implementations must tolerate
/// concurrent calls from the load workers and the foreground thread.
pub trait GraphStore: Send + Sync {
    /// All chunks whose layer interval contains `layer`.
    fn chunks_in_layer(&self, layer: u32) -> Result<Vec<Arc<Chunk>>>;

    /// Look up one node by store id.
    fn node_by_id(&self, id: NodeId) -> Result<Node>;

    /// Highest layer present in the graph.
    fn max_layer(&self) -> u32;

    /// Request a semantic zoom level; returns the level actually applied
    /// after clamping to what the store has materialized.
    fn set_zoom_level(&self, zoom: u32) -> u32;

    /// Graph-level headers (genome list and friends).
    fn headers(&self) -> BTreeMap<String, String>;

    /// Human-readable name of the open graph.
    fn graph_name(&self) -> String;
}

/// In-memory [`GraphStore`] with a fixed chunking, plus failure injection
/// so tests can exercise the corrupt-chunk path.
pub struct MemoryStore {
    name: String,
    chunks: Vec<Arc<Chunk>>,
    node_locations: FxHashMap<NodeId, (usize, usize)>,
    headers: BTreeMap<String, String>,
    max_layer: u32,
    max_zoom: u32,
    zoom: AtomicU32,
    poisoned: Mutex<FxHashSet<ChunkId>>,
}

impl MemoryStore {
    /// Mark `chunk` so that any layer query touching it reports corruption.
    pub fn poison_chunk(&self, chunk: ChunkId) {
        self.poisoned.lock().insert(chunk);
    }

    /// Clear a previous [`Self::poison_chunk`] mark.
    pub fn heal_chunk(&self, chunk: ChunkId) {
        self.poisoned.lock().remove(&chunk);
    }

    /// Number of chunks in the store.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl GraphStore for MemoryStore {
    fn chunks_in_layer(&self, layer: u32) -> Result<Vec<Arc<Chunk>>> {
        let poisoned = self.poisoned.lock();
        let mut hits = Vec::new();
        for chunk in &self.chunks {
            if chunk.min_layer <= layer && layer <= chunk.max_layer {
                if poisoned.contains(&chunk.index) {
                    return Err(StrataError::Corruption(format!(
                        "chunk {} failed to decode",
                        chunk.index
                    )));
                }
                hits.push(Arc::clone(chunk));
            }
        }
        Ok(hits)
    }

    fn node_by_id(&self, id: NodeId) -> Result<Node> {
        let (chunk, offset) = self
            .node_locations
            .get(&id)
            .copied()
            .ok_or(StrataError::NotFound("node"))?;
        Ok(self.chunks[chunk].nodes[offset].clone())
    }

    fn max_layer(&self) -> u32 {
        self.max_layer
    }

    fn set_zoom_level(&self, zoom: u32) -> u32 {
        let applied = zoom.min(self.max_zoom);
        self.zoom.store(applied, Ordering::Relaxed);
        applied
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn graph_name(&self) -> String {
        self.name.clone()
    }
}

/// Builder assembling a [`MemoryStore`] from parsed nodes and edges.
pub struct MemoryStoreBuilder {
    name: String,
    chunk_span: u32,
    max_zoom: u32,
    nodes: FxHashMap<NodeId, Node>,
    edges: Vec<(NodeId, NodeId)>,
    headers: BTreeMap<String, String>,
}

impl MemoryStoreBuilder {
    /// Start a store named `name` whose chunks each span `chunk_span`
    /// layers.
    pub fn new(name: impl Into<String>, chunk_span: u32) -> Self {
        Self {
            name: name.into(),
            chunk_span: chunk_span.max(1),
            max_zoom: 0,
            nodes: FxHashMap::default(),
            edges: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a node. Ids must be unique and non-negative.
    pub fn node(&mut self, node: Node) -> Result<&mut Self> {
        if node.id < 0 {
            return Err(StrataError::InvalidArgument(format!(
                "store node id {} must be non-negative",
                node.id
            )));
        }
        if self.nodes.insert(node.id, node).is_some() {
            return Err(StrataError::InvalidArgument("duplicate node id".into()));
        }
        Ok(self)
    }

    /// Add a directed edge between two previously added nodes.
    pub fn edge(&mut self, from: NodeId, to: NodeId) -> Result<&mut Self> {
        let from_layer = self
            .nodes
            .get(&from)
            .ok_or(StrataError::NotFound("edge source node"))?
            .layer;
        let to_layer = self
            .nodes
            .get(&to)
            .ok_or(StrataError::NotFound("edge target node"))?
            .layer;
        if to_layer <= from_layer {
            return Err(StrataError::InvalidArgument(format!(
                "edge {from}->{to} must point toward a higher layer"
            )));
        }
        self.edges.push((from, to));
        Ok(self)
    }

    /// Set a graph header.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Highest semantic zoom level the store pretends to materialize.
    pub fn max_zoom(&mut self, max_zoom: u32) -> &mut Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Attach edges to endpoints, partition nodes into layer-span chunks,
    /// and freeze the store.
    pub fn build(mut self) -> Result<MemoryStore> {
        for (from, to) in std::mem::take(&mut self.edges) {
            let edge = Edge::new(from, to);
            if let Some(node) = self.nodes.get_mut(&from) {
                node.outgoing.push(edge.clone());
            }
            if let Some(node) = self.nodes.get_mut(&to) {
                node.incoming.push(edge);
            }
        }

        let max_layer = self.nodes.values().map(|n| n.layer).max().unwrap_or(0);

        let mut buckets: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
        for node in self.nodes.into_values() {
            buckets
                .entry(node.layer / self.chunk_span)
                .or_default()
                .push(node);
        }

        let mut chunks = Vec::new();
        let mut node_locations = FxHashMap::default();
        for (index, (_, mut nodes)) in buckets.into_iter().enumerate() {
            nodes.sort_by_key(|n| (n.layer, n.id));
            let min_layer = nodes.first().map(|n| n.layer).unwrap_or(0);
            let max_layer = nodes.last().map(|n| n.layer).unwrap_or(0);
            for (offset, node) in nodes.iter().enumerate() {
                node_locations.insert(node.id, (index, offset));
            }
            chunks.push(Arc::new(Chunk {
                index: index as ChunkId,
                min_layer,
                max_layer,
                nodes,
            }));
        }

        debug!(
            name = %self.name,
            chunks = chunks.len(),
            max_layer,
            "memory store built"
        );
        Ok(MemoryStore {
            name: self.name,
            chunks,
            node_locations,
            headers: self.headers,
            max_layer,
            max_zoom: self.max_zoom,
            zoom: AtomicU32::new(0),
            poisoned: Mutex::new(FxHashSet::default()),
        })
    }
}
