//! Vertical row assignment: a greedy crossing-reduction heuristic.
//!
//! Each node is pulled toward the median of its already-placed neighbors in
//! the adjacent layer, nudged to the nearest free slot, then the layer is
//! compacted to contiguous rows. This is best-effort layout, not an
//! optimality guarantee; the hard invariants are only that rows are unique
//! within a layer and non-negative.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::model::{Edge, NodeId};

use super::resident::ResidentGraph;

/// Direction of a layer sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    /// Toward higher layers, reading each node's incoming neighbors.
    Rightward,
    /// Toward lower layers, reading each node's outgoing neighbors.
    Leftward,
}

/// Assign rows over the layer span between `from` and `to`.
///
/// The `from` layer seeds the sweep: nodes there without a row get one in
/// iteration order. `from < to` sweeps rightward off incoming neighbors,
/// `from > to` sweeps leftward off outgoing neighbors. Layers swept are
/// re-rowed wholesale and end up compacted to `0..n-1`.
pub fn assign_range(graph: &mut ResidentGraph, from: u32, to: u32) {
    trace!(from, to, "assigning vertical rows");
    // Placeholder rows handed to neighbors outside the loaded window live
    // only for this pass; they steer layout at the seam without leaking
    // non-resident ids into the vertical map.
    let mut placeholders: FxHashMap<NodeId, i64> = FxHashMap::default();

    // Seed rows must dodge rows already present at the seam: nodes of an
    // adjacent chunk may have been rowed by an earlier sweep.
    let seeds = graph.layer_ids(from);
    let mut seed_taken: FxHashSet<u32> = seeds
        .iter()
        .filter_map(|id| graph.row_of(*id))
        .collect();
    for id in seeds {
        if graph.row_of(id).is_none() {
            let mut row = 0;
            while seed_taken.contains(&row) {
                row += 1;
            }
            seed_taken.insert(row);
            graph.set_row(id, row);
        }
    }

    if from < to {
        for layer in (from + 1)..=to {
            assign_layer(graph, layer, Sweep::Rightward, &mut placeholders);
        }
    } else {
        for layer in (to..from).rev() {
            assign_layer(graph, layer, Sweep::Leftward, &mut placeholders);
        }
    }
}

fn assign_layer(
    graph: &mut ResidentGraph,
    layer: u32,
    sweep: Sweep,
    placeholders: &mut FxHashMap<NodeId, i64>,
) {
    let members = graph.layer_ids(layer);
    let mut taken: FxHashSet<i64> = FxHashSet::default();
    let mut assigned: Vec<(NodeId, i64)> = Vec::with_capacity(members.len());
    // Running maximum row observed in the adjacent layer, used to park
    // neighbors that are outside the loaded window below everything seen.
    let mut next_layer_max = adjacent_layer_max(graph, layer, sweep);

    for id in members {
        let edges: Vec<Edge> = {
            let node = match graph.node(id) {
                Some(node) => node,
                None => continue,
            };
            match sweep {
                Sweep::Rightward => node.incoming.iter().cloned().collect(),
                Sweep::Leftward => node.outgoing.iter().cloned().collect(),
            }
        };

        let mut verticals: Vec<i64> = Vec::with_capacity(edges.len());
        let mut sum = 0.0;
        for edge in &edges {
            let neighbor = edge.opposite(id);
            let row = match graph.row_of(neighbor) {
                Some(row) => i64::from(row),
                None => match placeholders.get(&neighbor) {
                    Some(row) => *row,
                    None => {
                        next_layer_max += 1;
                        placeholders.insert(neighbor, next_layer_max);
                        next_layer_max
                    }
                },
            };
            verticals.push(row);
            sum += row as f64;
        }

        let row = pick_row(&mut verticals, sum, &taken);
        taken.insert(row);
        assigned.push((id, row));
    }

    // Compact to contiguous rows ordered by the value just assigned;
    // stable sort keeps assignment order as the tie-break.
    assigned.sort_by_key(|(_, row)| *row);
    for (compact, (id, _)) in assigned.into_iter().enumerate() {
        graph.set_row(id, compact as u32);
    }
}

/// Median/mean heuristic: start at the truncating integer median of the
/// neighbor rows, then probe toward the mean for the nearest free
/// non-negative slot.
fn pick_row(verticals: &mut [i64], sum: f64, taken: &FxHashSet<i64>) -> i64 {
    verticals.sort_unstable();
    let mean = if verticals.is_empty() {
        0.0
    } else {
        sum / verticals.len() as f64
    };
    let middle = verticals.len() / 2;
    let median = if verticals.is_empty() {
        0
    } else if verticals.len() % 2 == 1 {
        verticals[middle]
    } else {
        // Truncating average, matching the layout the viewer always had.
        (verticals[middle] + verticals[middle - 1]) / 2
    };

    let mut row = median;
    let mut step = if mean >= median as f64 { 1 } else { -1 };
    while taken.contains(&row) || row < 0 {
        row += step;
        if row < 0 && step == -1 {
            step = 1;
        }
    }
    row
}

fn adjacent_layer_max(graph: &ResidentGraph, layer: u32, sweep: Sweep) -> i64 {
    let adjacent = match sweep {
        Sweep::Rightward => layer.checked_sub(1),
        Sweep::Leftward => layer.checked_add(1),
    };
    adjacent
        .map(|adj| {
            graph
                .layer_ids(adj)
                .into_iter()
                .filter_map(|id| graph.row_of(id))
                .map(i64::from)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}
