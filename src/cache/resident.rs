//! The resident subgraph: arena-owned nodes plus the layer and vertical maps.
//!
//! Every resident node is owned by exactly one arena slot and reachable
//! through its layer's id set. Edges refer to endpoints by id, so removing
//! a node never leaves a dangling handle, only an id that stops resolving.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Edge, Node, NodeId};

/// Mutable resident state shared between the expander, the vertical
/// assigner, and the windowed cache. Callers hold the cache lock.
#[derive(Debug, Default)]
pub struct ResidentGraph {
    nodes: FxHashMap<NodeId, Node>,
    layers: FxHashMap<u32, FxHashSet<NodeId>>,
    rows: FxHashMap<NodeId, u32>,
    max_row_seen: u32,
}

impl ResidentGraph {
    /// An empty resident graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node`, registering it in its layer. Returns false when the
    /// id was already resident (the insert is then ignored).
    pub fn insert(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.layers.entry(node.layer).or_default().insert(node.id);
        self.nodes.insert(node.id, node);
        true
    }

    /// Drop `id` from the arena, its layer set, and the vertical map.
    /// Layers left empty are pruned, never kept as empty entries.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.rows.remove(&id);
        if let Some(ids) = self.layers.get_mut(&node.layer) {
            ids.remove(&id);
            if ids.is_empty() {
                self.layers.remove(&node.layer);
            }
        }
        Some(node)
    }

    /// Whether `id` is resident.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Borrow a resident node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutably borrow a resident node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Whether any node is resident at `layer`.
    pub fn has_layer(&self, layer: u32) -> bool {
        self.layers.contains_key(&layer)
    }

    /// Ids resident at `layer`, in ascending id order for determinism.
    pub fn layer_ids(&self, layer: u32) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .layers
            .get(&layer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Snapshot copies of the nodes at `layer`.
    pub fn nodes_in_layer(&self, layer: u32) -> Vec<Node> {
        self.layer_ids(layer)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect()
    }

    /// All layers with at least one resident node.
    pub fn layer_set(&self) -> Vec<u32> {
        let mut layers: Vec<u32> = self.layers.keys().copied().collect();
        layers.sort_unstable();
        layers
    }

    /// Number of resident nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The vertical row assigned to `id`, if any.
    pub fn row_of(&self, id: NodeId) -> Option<u32> {
        self.rows.get(&id).copied()
    }

    /// Assign a vertical row, tracking the highest row ever handed out.
    pub fn set_row(&mut self, id: NodeId, row: u32) {
        self.max_row_seen = self.max_row_seen.max(row);
        self.rows.insert(id, row);
    }

    /// Highest row assigned over the lifetime of this graph.
    pub fn max_row_seen(&self) -> u32 {
        self.max_row_seen
    }

    /// Attach `edge` to both endpoints' adjacency lists where resident,
    /// skipping endpoints that already carry an identical edge.
    pub fn attach_edge(&mut self, edge: Edge) {
        if let Some(from) = self.nodes.get_mut(&edge.from) {
            if !from.outgoing.contains(&edge) {
                from.outgoing.push(edge.clone());
            }
        }
        if let Some(to) = self.nodes.get_mut(&edge.to) {
            if !to.incoming.contains(&edge) {
                to.incoming.push(edge);
            }
        }
    }

    /// Strip `edge` from both endpoints' adjacency lists. Endpoints that
    /// are not resident or do not carry the edge are left alone.
    pub fn detach_edge(&mut self, edge: &Edge) {
        if let Some(from) = self.nodes.get_mut(&edge.from) {
            from.outgoing.retain(|e| e != edge);
        }
        if let Some(to) = self.nodes.get_mut(&edge.to) {
            to.incoming.retain(|e| e != edge);
        }
    }
}
