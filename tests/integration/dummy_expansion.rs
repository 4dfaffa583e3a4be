#![allow(missing_docs)]

use std::sync::Arc;

use strata::{Edge, GraphStore, MemoryStoreBuilder, Node, NodeId, Result, ViewConfig, Viewport};

fn open_all(store: strata::MemoryStore) -> Result<Viewport> {
    // Buffer wide enough to keep the whole graph resident.
    let config = ViewConfig {
        buffer_layers: 1_000,
        ..ViewConfig::small()
    };
    let viewport = Viewport::open(Arc::new(store), config);
    viewport.wait_until_loaded()?;
    Ok(viewport)
}

/// Layer 3 and layer 7 nodes joined by one long edge.
fn long_edge_store() -> Result<strata::MemoryStore> {
    let mut builder = MemoryStoreBuilder::new("long-edge", 16);
    builder.node(Node::new(3, 3, "AAA"))?;
    builder.node(Node::new(7, 7, "TTT"))?;
    builder.edge(3, 7)?;
    builder.build()
}

#[test]
fn long_edge_becomes_a_three_dummy_chain() -> Result<()> {
    let viewport = open_all(long_edge_store()?)?;

    // Exactly one dummy per intermediate layer.
    for layer in 4..=6 {
        let nodes = viewport.nodes_in_layer(layer);
        assert_eq!(nodes.len(), 1, "layer {layer}");
        assert!(nodes[0].is_dummy());
    }

    // Walk the chain: four dummy edges, every origin the original 3->7.
    let mut hops = 0;
    let mut current = viewport.cache().node_snapshot(3).unwrap();
    while current.id != 7 {
        assert_eq!(current.outgoing.len(), 1);
        let edge = current.outgoing[0].clone();
        assert!(edge.is_dummy());
        let origin = edge.origin.as_ref().unwrap();
        assert_eq!((origin.from, origin.to), (3, 7));
        hops += 1;
        current = viewport.cache().node_snapshot(edge.to).unwrap();
    }
    assert_eq!(hops, 4);
    Ok(())
}

#[test]
fn dummy_ids_stay_out_of_the_store_id_space() -> Result<()> {
    let viewport = open_all(long_edge_store()?)?;
    for layer in viewport.layer_set() {
        for node in viewport.nodes_in_layer(layer) {
            if node.is_dummy() {
                assert!(node.id < 0);
                assert!(viewport.layer_of(node.id).is_err());
            } else {
                assert!(node.id >= 0);
            }
        }
    }
    Ok(())
}

/// Every resident edge between two resident endpoints spans exactly one
/// layer step once expansion has covered the whole graph.
#[test]
fn resident_edges_span_one_layer() -> Result<()> {
    let mut builder = MemoryStoreBuilder::new("braid", 16);
    for layer in 0..12 {
        builder.node(Node::new(layer as NodeId * 10, layer, "A"))?;
        if layer % 3 == 0 {
            builder.node(Node::new(layer as NodeId * 10 + 1, layer, "C"))?;
        }
    }
    for layer in 1..12u32 {
        builder.edge((NodeId::from(layer) - 1) * 10, NodeId::from(layer) * 10)?;
    }
    // Long skips of varying span.
    builder.edge(1, 30)?;
    builder.edge(31, 91)?;
    builder.edge(20, 61)?;
    let viewport = open_all(builder.build()?)?;

    for layer in viewport.layer_set() {
        for node in viewport.nodes_in_layer(layer) {
            for edge in node.outgoing.iter() {
                if let Some(target) = viewport.cache().node_snapshot(edge.to) {
                    assert_eq!(
                        target.layer,
                        node.layer + 1,
                        "edge {}->{} spans more than one layer",
                        edge.from,
                        edge.to
                    );
                }
            }
        }
    }
    Ok(())
}

/// An edge whose far endpoint is outside the loaded window stays long and
/// is expanded once a later load scans its source with the target resident.
#[test]
fn seam_edges_expand_lazily() -> Result<()> {
    let mut builder = MemoryStoreBuilder::new("seam", 4);
    for layer in 0..12 {
        builder.node(Node::new(layer as NodeId, layer, "A"))?;
    }
    for layer in 1..12 {
        builder.edge(NodeId::from(layer) - 1, NodeId::from(layer))?;
    }
    // From the last layer of chunk 0 deep into chunk 2.
    builder.edge(3, 9)?;
    let store = Arc::new(builder.build()?);

    let config = ViewConfig {
        buffer_layers: 2,
        shown_layers_default: 8.0,
        ..ViewConfig::small()
    };
    let viewport = Viewport::open(Arc::clone(&store) as Arc<dyn GraphStore>, config);
    viewport.wait_until_loaded()?;

    // Chunk 2 is not resident yet: the long edge is untouched.
    assert!(!viewport.layer_set().contains(&9));
    let near = viewport.cache().node_snapshot(3).unwrap();
    assert!(near.outgoing.contains(&Edge::new(3, 9)));

    // Jump right so chunk 0 unloads, then come back while chunk 2 is
    // resident: chunk 0's reload scans layer 3 with layer 9 loaded.
    viewport.move_to_layer(10);
    viewport.wait_until_loaded()?;
    assert!(!viewport.layer_set().contains(&3));

    viewport.move_to_layer(5);
    viewport.wait_until_loaded()?;
    assert!(viewport.layer_set().contains(&9));

    let near = viewport.cache().node_snapshot(3).unwrap();
    assert!(
        !near.outgoing.contains(&Edge::new(3, 9)),
        "long edge should be expanded once both endpoints are resident"
    );
    let dummies: Vec<_> = (4..=8u32)
        .map(|layer| {
            viewport
                .nodes_in_layer(layer)
                .into_iter()
                .filter(Node::is_dummy)
                .count()
        })
        .collect();
    assert_eq!(dummies, vec![1, 1, 1, 1, 1]);
    Ok(())
}
