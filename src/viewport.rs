//! Node-count-addressable viewport over the windowed cache.
//!
//! [`Viewport`] is the surface the renderer and controllers talk to: it
//! holds the current centre layer, the shown-layer count, and the semantic
//! zoom level, and every move or zoom triggers the cache's window
//! recomputation. All handles are passed explicitly; there is no ambient
//! "current graph" singleton.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::WindowedCache;
use crate::config::ViewConfig;
use crate::error::{Result, StrataError};
use crate::events::{EventBus, LoadEvent};
use crate::model::{Node, NodeId, GENOME_TAG};
use crate::scheduler::TaskHandle;
use crate::store::GraphStore;

/// Horizontal movement over the layer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Toward lower layers.
    Left,
    /// Toward higher layers.
    Right,
}

/// Semantic zoom adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    /// Collapse fewer motifs.
    In,
    /// Collapse more motifs.
    Out,
}

struct ViewState {
    center_layer: u32,
    shown_layers: f64,
    zoom_level: u32,
    centre_node: Option<NodeId>,
}

/// Facade combining store, cache, and viewport position.
pub struct Viewport {
    store: Arc<dyn GraphStore>,
    cache: Arc<WindowedCache>,
    events: Arc<EventBus>,
    config: ViewConfig,
    state: Mutex<ViewState>,
    fully_loaded: AtomicBool,
}

impl Viewport {
    /// Open a viewport over `store` centred on layer 0 and kick off the
    /// initial window load. The load runs in the background; call
    /// [`Self::wait_until_loaded`] to block for it.
    pub fn open(store: Arc<dyn GraphStore>, config: ViewConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let cache = WindowedCache::new(Arc::clone(&store), &config, Arc::clone(&events));
        let viewport = Self {
            store,
            cache,
            events,
            state: Mutex::new(ViewState {
                center_layer: 0,
                shown_layers: config.shown_layers_default,
                zoom_level: 0,
                centre_node: None,
            }),
            config,
            fully_loaded: AtomicBool::new(false),
        };
        info!(graph = %viewport.store.graph_name(), "opening graph");
        viewport.recompute();
        viewport
    }

    fn recompute(&self) {
        let (center, shown) = {
            let state = self.state.lock();
            (state.center_layer, state.shown_layers.ceil() as u32)
        };
        self.cache
            .recompute_window(center, shown, self.config.buffer_layers);
    }

    /// Re-pick the centre node from the centre layer when the current one
    /// no longer matches (or none was picked yet).
    fn update_centre(&self) {
        let mut state = self.state.lock();
        let stale = match state.centre_node {
            Some(id) => self
                .cache
                .node_snapshot(id)
                .map(|n| n.layer != state.center_layer)
                .unwrap_or(true),
            None => true,
        };
        if stale {
            state.centre_node = self
                .cache
                .first_node_in_layer(state.center_layer)
                .map(|n| n.id);
        }
    }

    /// Move the centre to `layer`, clamped to `[0, max_layer]`, and
    /// recompute the load window. Returns the layer actually applied.
    pub fn move_to_layer(&self, layer: u32) -> u32 {
        let applied = layer.min(self.cache.max_layer());
        debug!(requested = layer, applied, "moving to layer");
        self.state.lock().center_layer = applied;
        self.recompute();
        self.update_centre();
        applied
    }

    /// Move the centre by `steps` layers in `direction`. Returns the
    /// number of layers actually traversed after clamping.
    pub fn move_by(&self, steps: u32, direction: MoveDirection) -> u32 {
        let old = self.state.lock().center_layer;
        let target = match direction {
            MoveDirection::Left => old.saturating_sub(steps),
            MoveDirection::Right => old.saturating_add(steps),
        };
        let applied = self.move_to_layer(target);
        applied.abs_diff(old)
    }

    /// Centre the viewport on `node`. Returns the direction and number of
    /// layers moved.
    pub fn set_centre(&self, node: &Node) -> (MoveDirection, u32) {
        let old = self.state.lock().center_layer;
        let direction = if node.layer < old {
            MoveDirection::Left
        } else {
            MoveDirection::Right
        };
        let moved = self.move_by(node.layer.abs_diff(old), direction);
        self.state.lock().centre_node = Some(node.id);
        (direction, moved)
    }

    /// The node currently centred, if its layer is resident.
    pub fn centre(&self) -> Option<Node> {
        let id = self.state.lock().centre_node?;
        self.cache.node_snapshot(id)
    }

    /// Current centre layer.
    pub fn centre_layer(&self) -> u32 {
        self.state.lock().center_layer
    }

    /// Adjust the semantic zoom level by `steps`. Motif collapsing changes
    /// which nodes exist at every layer, so this clears the cache outright
    /// and reloads the window instead of diffing it. Returns the number of
    /// levels actually zoomed.
    pub fn semantic_zoom(&self, steps: u32, direction: ZoomDirection) -> u32 {
        let current = self.state.lock().zoom_level;
        let target = match direction {
            ZoomDirection::In => current.saturating_sub(steps),
            ZoomDirection::Out => current.saturating_add(steps),
        };
        if target == current {
            return 0;
        }
        self.cache.clear_all();
        let applied = self.store.set_zoom_level(target);
        self.state.lock().zoom_level = applied;
        self.recompute();
        self.update_centre();
        current.abs_diff(applied)
    }

    /// Current semantic zoom level.
    pub fn zoom_level(&self) -> u32 {
        self.state.lock().zoom_level
    }

    /// Update the number of layers shown on screen (clamped to the
    /// configured bounds) and rescale the load window accordingly.
    pub fn set_shown_layers(&self, layers: f64) {
        self.state.lock().shown_layers = self.config.clamp_shown(layers);
        self.recompute();
    }

    /// Snapshot of the nodes resident at `layer`.
    pub fn nodes_in_layer(&self, layer: u32) -> Vec<Node> {
        self.cache.nodes_in_layer(layer)
    }

    /// All layers with resident nodes.
    pub fn layer_set(&self) -> Vec<u32> {
        self.cache.layer_set()
    }

    /// Vertical row of a resident node; `NotFound` while its layout is
    /// not ready.
    pub fn row_of(&self, id: NodeId) -> Result<u32> {
        self.cache.row_of(id)
    }

    /// Highest layer in the graph.
    pub fn max_layer(&self) -> u32 {
        self.cache.max_layer()
    }

    /// Highest vertical row ever assigned.
    pub fn max_row_seen(&self) -> u32 {
        self.cache.max_row_seen()
    }

    /// Layer of a node, resolved through the store even when the node is
    /// not resident.
    pub fn layer_of(&self, id: NodeId) -> Result<u32> {
        Ok(self.store.node_by_id(id)?.layer)
    }

    /// The underlying cache, for renderers that poll it directly.
    pub fn cache(&self) -> &Arc<WindowedCache> {
        &self.cache
    }

    /// Register a loading-progress subscriber.
    pub fn subscribe(&self) -> Receiver<LoadEvent> {
        self.events.subscribe()
    }

    /// Take ownership of outstanding load handles.
    pub fn pending_loads(&self) -> Vec<TaskHandle> {
        self.cache.pending_loads()
    }

    /// Block until all pending loads drain, emitting `FullyLoaded` the
    /// first time the initial load completes. Used by tests and the batch
    /// CLI; interactive callers subscribe to events instead.
    pub fn wait_until_loaded(&self) -> Result<()> {
        self.cache.wait_quiescent()?;
        self.update_centre();
        if !self.fully_loaded.swap(true, Ordering::SeqCst) {
            info!(graph = %self.store.graph_name(), "graph finished loading");
            self.events.emit(LoadEvent::FullyLoaded);
        }
        Ok(())
    }

    /// Whether the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.fully_loaded.load(Ordering::SeqCst)
    }

    /// Graph headers as reported by the store.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.store.headers()
    }

    /// Name of the open graph.
    pub fn graph_name(&self) -> String {
        self.store.graph_name()
    }

    /// Genome samples listed in the graph headers.
    pub fn genomes(&self) -> Vec<String> {
        self.store
            .headers()
            .get(GENOME_TAG)
            .map(|value| {
                value
                    .split(';')
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All resident nodes carrying `genome`, matched either by name or by
    /// numeric index into the header genome list.
    pub fn nodes_with_genome(&self, genome: &str) -> Result<Vec<Node>> {
        let genomes = self.genomes();
        if genomes.is_empty() {
            return Err(StrataError::NotFound("genome header"));
        }
        let mut matches = Vec::new();
        for layer in self.cache.layer_set() {
            for node in self.cache.nodes_in_layer(layer) {
                let tagged = node
                    .genome_tags()
                    .map(|tags| {
                        tags.iter().any(|tag| {
                            if let Ok(index) = tag.parse::<usize>() {
                                genomes.get(index).map(String::as_str) == Some(genome)
                            } else {
                                *tag == genome
                            }
                        })
                    })
                    .unwrap_or(false);
                if tagged {
                    matches.push(node);
                }
            }
        }
        Ok(matches)
    }
}
