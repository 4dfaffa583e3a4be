#![allow(missing_docs)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use strata::{
    GraphStore, MemoryStoreBuilder, MoveDirection, Node, NodeId, Result, ViewConfig, Viewport,
    ZoomDirection,
};

const CHUNK_SPAN: u32 = 16;
const LAYERS: u32 = 400;

/// Layered DAG with bubbles and short skips, seeded for reproducibility.
fn stress_store(seed: u64) -> Result<strata::MemoryStore> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut builder = MemoryStoreBuilder::new("stress", CHUNK_SPAN);
    builder.max_zoom(2);
    let mut per_layer: Vec<Vec<NodeId>> = Vec::new();
    let mut next_id: NodeId = 0;
    for layer in 0..LAYERS {
        let count = rng.gen_range(1..=3);
        let mut ids = Vec::new();
        for _ in 0..count {
            builder.node(Node::new(next_id, layer, "ACGT"))?;
            ids.push(next_id);
            next_id += 1;
        }
        per_layer.push(ids);
    }
    for layer in 1..LAYERS as usize {
        for &to in &per_layer[layer] {
            let sources = &per_layer[layer - 1];
            let from = sources[rng.gen_range(0..sources.len())];
            builder.edge(from, to)?;
        }
    }
    // Skips confined to a single chunk, so each one is expanded by its own
    // chunk's scan no matter the load order.
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let chunk = rng.gen_range(0..LAYERS / CHUNK_SPAN);
        let base = (chunk * CHUNK_SPAN) as usize;
        let from_layer = base + rng.gen_range(0..(CHUNK_SPAN as usize - 2));
        let to_layer = rng.gen_range(from_layer + 2..=base + CHUNK_SPAN as usize - 1);
        let from = per_layer[from_layer][rng.gen_range(0..per_layer[from_layer].len())];
        let to = per_layer[to_layer][rng.gen_range(0..per_layer[to_layer].len())];
        if seen.insert((from, to)) {
            builder.edge(from, to)?;
        }
    }
    builder.build()
}

fn assert_invariants(viewport: &Viewport) {
    let window = viewport.cache().window();
    let allowed_min = (window.lower as u32 / CHUNK_SPAN) * CHUNK_SPAN;
    let allowed_max = ((window.upper as u32 / CHUNK_SPAN) + 1) * CHUNK_SPAN - 1;

    for layer in viewport.layer_set() {
        assert!(
            (allowed_min..=allowed_max).contains(&layer),
            "layer {layer} outside window {window:?}"
        );
        let nodes = viewport.nodes_in_layer(layer);
        let mut rows: Vec<u32> = nodes
            .iter()
            .map(|n| viewport.row_of(n.id).expect("row missing"))
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..nodes.len() as u32).collect::<Vec<_>>());

        for node in &nodes {
            if node.is_dummy() {
                assert_eq!(node.incoming.len(), 1, "dummy {} degree", node.id);
                assert_eq!(node.outgoing.len(), 1, "dummy {} degree", node.id);
            }
            for edge in &node.outgoing {
                if edge.is_dummy() {
                    continue;
                }
                // Edges confined to one chunk are expanded by that chunk's
                // own scan; check the single-step invariant on them.
                if let Some(target) = viewport.cache().node_snapshot(edge.to) {
                    if node.layer / CHUNK_SPAN == target.layer / CHUNK_SPAN {
                        assert_eq!(
                            target.layer,
                            node.layer + 1,
                            "unexpanded edge {}->{}",
                            edge.from,
                            edge.to
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn random_walk_preserves_invariants() -> Result<()> {
    let store = Arc::new(stress_store(0xB10_CACE)?);
    let config = ViewConfig {
        buffer_layers: 24,
        shown_layers_default: 8.0,
        ..ViewConfig::small()
    };
    let viewport = Viewport::open(Arc::clone(&store) as Arc<dyn GraphStore>, config);
    viewport.wait_until_loaded()?;
    assert_invariants(&viewport);

    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    for round in 0..60 {
        match rng.gen_range(0..10) {
            0..=4 => {
                viewport.move_to_layer(rng.gen_range(0..LAYERS));
            }
            5..=7 => {
                let direction = if rng.gen_bool(0.5) {
                    MoveDirection::Left
                } else {
                    MoveDirection::Right
                };
                viewport.move_by(rng.gen_range(1..80), direction);
            }
            8 => {
                viewport.set_shown_layers(rng.gen_range(4.0..40.0));
            }
            _ => {
                let direction = if rng.gen_bool(0.5) {
                    ZoomDirection::In
                } else {
                    ZoomDirection::Out
                };
                viewport.semantic_zoom(1, direction);
            }
        }
        viewport.wait_until_loaded()?;
        assert_invariants(&viewport);
        assert!(
            !viewport.layer_set().is_empty(),
            "round {round} left nothing resident"
        );
    }
    Ok(())
}

/// Loads started by rapid viewport motion may overlap in flight; the lock
/// discipline must keep the maps coherent without waiting in between.
#[test]
fn overlapping_loads_stay_coherent() -> Result<()> {
    let store = Arc::new(stress_store(7)?);
    let config = ViewConfig {
        buffer_layers: 24,
        shown_layers_default: 8.0,
        worker_threads: 4,
        ..ViewConfig::small()
    };
    let viewport = Viewport::open(Arc::clone(&store) as Arc<dyn GraphStore>, config);

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..40 {
        viewport.move_to_layer(rng.gen_range(0..LAYERS));
    }
    viewport.wait_until_loaded()?;
    assert_invariants(&viewport);
    Ok(())
}
