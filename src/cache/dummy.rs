//! Expansion of multi-layer edges into dummy-node chains, and its reversal.
//!
//! After a range has been expanded, every edge with both endpoints resident
//! inside it spans exactly one layer step, which is what the renderer
//! assumes when routing lines. Edges whose far endpoint is not resident are
//! left long; they get expanded by a later pass once that layer loads.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{Result, StrataError};
use crate::ids::DummyIds;
use crate::model::{Edge, Node, NodeId};

use super::resident::ResidentGraph;

/// Scan `[min_layer, max_layer]` and replace every resident-to-resident
/// edge spanning more than one layer with a chain of dummy nodes, one per
/// intermediate layer. Returns the dummy ids created, oldest first, for
/// the caller's per-chunk bookkeeping.
pub fn expand_layers(
    graph: &mut ResidentGraph,
    ids: &DummyIds,
    min_layer: u32,
    max_layer: u32,
) -> Result<Vec<NodeId>> {
    let mut created = Vec::new();
    for layer in min_layer..=max_layer {
        for node_id in graph.layer_ids(layer) {
            let node = match graph.node(node_id) {
                Some(n) if !n.is_dummy() => n,
                _ => continue,
            };
            let outgoing: Vec<Edge> = node
                .outgoing
                .iter()
                .filter(|e| !e.is_dummy())
                .cloned()
                .collect();
            for edge in outgoing {
                let to_layer = match graph.node(edge.to) {
                    Some(to) => to.layer,
                    None => continue,
                };
                if to_layer <= layer {
                    return Err(StrataError::InvariantViolation(format!(
                        "edge {}->{} runs backwards ({} -> {})",
                        edge.from, edge.to, layer, to_layer
                    )));
                }
                if to_layer - layer > 1 {
                    expand_edge(graph, ids, &edge, layer, to_layer, &mut created);
                }
            }
        }
    }
    Ok(created)
}

/// Replace one long edge with a dummy chain covering its intermediate
/// layers. All chain fragments share the original edge as their origin.
fn expand_edge(
    graph: &mut ResidentGraph,
    ids: &DummyIds,
    edge: &Edge,
    from_layer: u32,
    to_layer: u32,
    created: &mut Vec<NodeId>,
) {
    trace!(
        from = edge.from,
        to = edge.to,
        span = to_layer - from_layer,
        "expanding long edge"
    );
    graph.detach_edge(edge);
    let origin = Arc::new(edge.clone());

    let mut previous = edge.from;
    for layer in (from_layer + 1)..to_layer {
        let dummy_id = ids.next_id();
        graph.insert(Node::dummy(dummy_id, layer));
        graph.attach_edge(Edge::dummy(previous, dummy_id, Arc::clone(&origin)));
        created.push(dummy_id);
        previous = dummy_id;
    }
    graph.attach_edge(Edge::dummy(previous, edge.to, Arc::clone(&origin)));
}

/// Remove a chunk's dummy nodes and restore the long edges they stood in
/// for. Each origin edge is re-attached to whichever of its real endpoints
/// is still resident, so a load-then-unload round trip leaves surviving
/// neighbors exactly as they were.
pub fn remove_dummies(graph: &mut ResidentGraph, dummies: &[NodeId]) {
    let mut origins: FxHashMap<(NodeId, NodeId), Arc<Edge>> = FxHashMap::default();

    for &dummy_id in dummies {
        let node = match graph.remove(dummy_id) {
            Some(node) => node,
            None => continue,
        };
        for edge in node.incoming.iter().chain(node.outgoing.iter()) {
            if let Some(origin) = &edge.origin {
                origins.insert((origin.from, origin.to), Arc::clone(origin));
            }
            strip_mirror(graph, dummy_id, edge);
        }
    }

    for origin in origins.into_values() {
        graph.attach_edge(Edge::clone(&origin));
    }
}

/// Remove the copy of `edge` held by the endpoint opposite `removed`.
fn strip_mirror(graph: &mut ResidentGraph, removed: NodeId, edge: &Edge) {
    let other = edge.opposite(removed);
    if let Some(node) = graph.node_mut(other) {
        if edge.to == removed {
            node.outgoing.retain(|e| e != edge);
        } else {
            node.incoming.retain(|e| e != edge);
        }
    }
}
