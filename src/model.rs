//! In-memory node and edge representations.
//!
//! Edges reference their endpoints by id, never by handle: the layer map is
//! the sole owner of every resident node, so the structure carries no
//! reference cycles and a node can be dropped by removing one map entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::SmallVec;

/// Node identity. Non-negative ids come from the backing store; negative
/// ids are minted for synthetic routing (dummy) nodes and never collide
/// with store ids.
pub type NodeId = i64;

/// Header key whose value lists the genome samples in the graph,
/// `;`-separated. Nodes carry the same key in their options to record
/// which samples pass through them.
pub const GENOME_TAG: &str = "ORI";

/// A directed edge between two layers.
///
/// A dummy edge is one fragment of a long edge that was expanded into a
/// chain; every fragment shares one `origin` so that querying any of them
/// resolves to the single real edge's data.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Id of the source node.
    pub from: NodeId,
    /// Id of the target node.
    pub to: NodeId,
    /// The real edge this fragment stands in for, `None` for real edges.
    pub origin: Option<Arc<Edge>>,
}

impl Edge {
    /// A real edge between two store nodes.
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            origin: None,
        }
    }

    /// A dummy fragment of `origin`.
    pub fn dummy(from: NodeId, to: NodeId, origin: Arc<Edge>) -> Self {
        debug_assert!(origin.origin.is_none(), "origin of a dummy must be real");
        Self {
            from,
            to,
            origin: Some(origin),
        }
    }

    /// Whether this edge is a synthetic fragment.
    pub fn is_dummy(&self) -> bool {
        self.origin.is_some()
    }

    /// The other endpoint relative to `id`.
    pub fn opposite(&self, id: NodeId) -> NodeId {
        if self.to == id {
            self.from
        } else {
            self.to
        }
    }
}

/// Adjacency list storage; nearly all variation-graph nodes have degree
/// one or two, so spill to the heap only past four edges.
pub type EdgeList = SmallVec<[Edge; 4]>;

/// A graph node, either loaded from the store or synthesized by the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique id; negative for dummy nodes.
    pub id: NodeId,
    /// Layer coordinate along the primary graph axis.
    pub layer: u32,
    /// Sequence payload; empty for dummy nodes.
    pub content: String,
    /// Edges arriving from lower layers.
    pub incoming: EdgeList,
    /// Edges departing toward higher layers.
    pub outgoing: EdgeList,
    /// String-keyed metadata, notably the genome membership tag.
    pub options: BTreeMap<String, String>,
}

impl Node {
    /// A real node as loaded from the store.
    pub fn new(id: NodeId, layer: u32, content: impl Into<String>) -> Self {
        Self {
            id,
            layer,
            content: content.into(),
            incoming: EdgeList::new(),
            outgoing: EdgeList::new(),
            options: BTreeMap::new(),
        }
    }

    /// A synthetic routing node at `layer`.
    pub fn dummy(id: NodeId, layer: u32) -> Self {
        debug_assert!(id < 0, "dummy ids are negative");
        Self::new(id, layer, "")
    }

    /// Whether this node is a synthetic routing node.
    pub fn is_dummy(&self) -> bool {
        self.id < 0
    }

    /// The genome samples recorded on this node, if any.
    pub fn genome_tags(&self) -> Option<Vec<&str>> {
        self.options
            .get(GENOME_TAG)
            .map(|v| v.split(';').filter(|s| !s.is_empty()).collect())
    }
}
