//! The windowed admission/eviction engine.
//!
//! [`WindowedCache`] owns all resident graph state and pages storage chunks
//! in and out as the viewport moves. The decision logic (which chunks to
//! drop, which layer span to fetch) runs synchronously on the calling
//! thread; the fetch itself is dispatched to the load worker pool. Every
//! mutation of shared state happens under one mutex, so a load never
//! observes a half-unloaded chunk and vice versa.

mod dummy;
mod resident;
mod vertical;

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::config::ViewConfig;
use crate::error::{Result, StrataError};
use crate::events::{EventBus, LoadEvent};
use crate::ids::DummyIds;
use crate::interval::LayerInterval;
use crate::model::{Node, NodeId};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::store::{Chunk, ChunkId, GraphStore};

use resident::ResidentGraph;

#[derive(Default)]
struct CacheState {
    resident: ResidentGraph,
    chunks: FxHashMap<ChunkId, Arc<Chunk>>,
    chunk_intervals: FxHashMap<ChunkId, LayerInterval>,
    dummies: FxHashMap<ChunkId, Vec<NodeId>>,
    window: LayerInterval,
    // Layer span believed fetched. Recorded optimistically when a fetch is
    // dispatched and forgotten again when it fails, so a recovered store
    // gets re-asked for the failed span.
    fetched: LayerInterval,
}

/// Chunk cache keyed on the current load window.
pub struct WindowedCache {
    store: Arc<dyn GraphStore>,
    ids: DummyIds,
    events: Arc<EventBus>,
    scheduler: Scheduler,
    state: Mutex<CacheState>,
    pending: Mutex<Vec<TaskHandle>>,
    failed: Mutex<Option<StrataError>>,
}

impl WindowedCache {
    /// Build a cache over `store` with an empty window.
    pub fn new(store: Arc<dyn GraphStore>, config: &ViewConfig, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            store,
            ids: DummyIds::new(),
            events,
            scheduler: Scheduler::new(config.worker_threads),
            state: Mutex::new(CacheState::default()),
            pending: Mutex::new(Vec::new()),
            failed: Mutex::new(None),
        })
    }

    /// Recompute the desired window around `center`, synchronously unload
    /// chunks that fell out of it, and dispatch a background fetch for the
    /// newly exposed layer span.
    pub fn recompute_window(self: &Arc<Self>, center: u32, shown: u32, buffer: u32) {
        let max_layer = i64::from(self.store.max_layer());
        let half = i64::from(shown / 2) + i64::from(buffer);
        let desired = LayerInterval::new(
            (i64::from(center) - half).max(0),
            (i64::from(center) + half).min(max_layer),
        );
        debug!(center, lower = desired.lower, upper = desired.upper, "recomputing window");

        let fetch = {
            let mut state = self.state.lock();
            let stale: Vec<ChunkId> = state
                .chunk_intervals
                .iter()
                .filter(|(_, interval)| !interval.intersects(&desired))
                .map(|(id, _)| *id)
                .collect();
            for id in stale {
                self.unload_chunk_locked(&mut state, id);
            }
            let fetch = fetch_range(state.fetched, desired);
            state.fetched = desired;
            state.window = desired;
            fetch
        };

        self.reap_finished();
        if let Some((from, to)) = fetch {
            let cache = Arc::clone(self);
            let handle = self.scheduler.schedule(move || cache.fetch_and_apply(from, to));
            self.pending.lock().push(handle);
        }
    }

    /// Fetch every chunk intersecting `[from, to]` and apply the new ones.
    /// Runs on a load worker. On failure the fetched-coverage record is
    /// reset, so the next window recompute re-requests the span.
    fn fetch_and_apply(&self, from: u32, to: u32) -> Result<()> {
        let outcome = self.apply_span(from, to);
        if outcome.is_err() {
            self.state.lock().fetched = LayerInterval::EMPTY;
        }
        outcome
    }

    /// The store is consulted outside the state lock and the chunk list is
    /// complete before anything mutates, so a corrupt chunk aborts with
    /// resident state untouched.
    fn apply_span(&self, from: u32, to: u32) -> Result<()> {
        let mut discovered: Vec<Arc<Chunk>> = Vec::new();
        let mut seen: FxHashSet<ChunkId> = FxHashSet::default();
        for layer in from..=to {
            for chunk in self.store.chunks_in_layer(layer)? {
                if seen.insert(chunk.index) {
                    discovered.push(chunk);
                }
            }
        }

        let mut state = self.state.lock();
        for chunk in discovered {
            if state.chunk_intervals.contains_key(&chunk.index) {
                continue;
            }
            let interval =
                LayerInterval::new(i64::from(chunk.min_layer), i64::from(chunk.max_layer));
            // The viewport may have moved on while this fetch was in
            // flight; chunks outside the current window must not land.
            if !interval.intersects(&state.window) {
                debug!(chunk = chunk.index, "skipping stale chunk");
                continue;
            }
            self.load_chunk_locked(&mut state, &chunk)?;
            self.events.emit(LoadEvent::ChunkLoaded);
        }
        Ok(())
    }

    /// Insert a chunk's nodes, expand long edges over the chunk span
    /// (stretched one layer into each resident seam), then assign vertical
    /// rows over the same span. Strictly this order: the expander needs
    /// the nodes resident, the assigner needs the dummies placed.
    fn load_chunk_locked(&self, state: &mut CacheState, chunk: &Arc<Chunk>) -> Result<()> {
        debug!(chunk = chunk.index, nodes = chunk.nodes.len(), "loading chunk");
        for node in &chunk.nodes {
            state.resident.insert(node.clone());
        }
        state.chunks.insert(chunk.index, Arc::clone(chunk));
        state.chunk_intervals.insert(
            chunk.index,
            LayerInterval::new(i64::from(chunk.min_layer), i64::from(chunk.max_layer)),
        );

        let left_seam = chunk.min_layer > 0 && state.resident.has_layer(chunk.min_layer - 1);
        let right_seam = state.resident.has_layer(chunk.max_layer + 1);
        let expand_from = if left_seam { chunk.min_layer - 1 } else { chunk.min_layer };
        let expand_to = if right_seam { chunk.max_layer + 1 } else { chunk.max_layer };

        let created = dummy::expand_layers(&mut state.resident, &self.ids, expand_from, expand_to)?;
        state.dummies.insert(chunk.index, created);

        // A chunk extending the window leftward is rowed right-to-left so
        // the sweep is seeded by the already-laid-out right seam.
        if right_seam && !left_seam {
            vertical::assign_range(&mut state.resident, expand_to, expand_from);
        } else {
            vertical::assign_range(&mut state.resident, expand_from, expand_to);
        }
        debug!(chunks = state.chunks.len(), "chunk loaded");
        Ok(())
    }

    /// Drop a chunk's real nodes, then its dummies. Real nodes go first so
    /// that dummy removal only restores original edges toward endpoints
    /// that actually survive this unload.
    fn unload_chunk_locked(&self, state: &mut CacheState, chunk_id: ChunkId) {
        debug!(chunk = chunk_id, "unloading chunk");
        state.chunk_intervals.remove(&chunk_id);
        let dummies = state.dummies.remove(&chunk_id).unwrap_or_default();
        if let Some(chunk) = state.chunks.remove(&chunk_id) {
            for node in &chunk.nodes {
                state.resident.remove(node.id);
            }
        }
        dummy::remove_dummies(&mut state.resident, &dummies);
        self.events.emit(LoadEvent::ChunkUnloaded);
    }

    /// Unload every chunk and reset the window. Used by semantic zoom,
    /// which changes which nodes exist at all and so invalidates the
    /// incremental window diff.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        let loaded: Vec<ChunkId> = state.chunk_intervals.keys().copied().collect();
        for id in loaded {
            self.unload_chunk_locked(&mut state, id);
        }
        state.window = LayerInterval::EMPTY;
        state.fetched = LayerInterval::EMPTY;
    }

    /// Snapshot of the nodes resident at `layer`. Always a copy; the live
    /// set keeps changing under background loads.
    pub fn nodes_in_layer(&self, layer: u32) -> Vec<Node> {
        self.state.lock().resident.nodes_in_layer(layer)
    }

    /// Snapshot of one resident node.
    pub fn node_snapshot(&self, id: NodeId) -> Option<Node> {
        self.state.lock().resident.node(id).cloned()
    }

    /// The lowest-id node at `layer`, used to re-pick a centre node.
    pub fn first_node_in_layer(&self, layer: u32) -> Option<Node> {
        let state = self.state.lock();
        let id = state.resident.layer_ids(layer).into_iter().next()?;
        state.resident.node(id).cloned()
    }

    /// Vertical row of a resident node. `NotFound` means the layout for
    /// that node is not ready yet; renderers skip the draw this frame.
    pub fn row_of(&self, id: NodeId) -> Result<u32> {
        self.state
            .lock()
            .resident
            .row_of(id)
            .ok_or(StrataError::NotFound("vertical row"))
    }

    /// All layers with resident nodes, ascending.
    pub fn layer_set(&self) -> Vec<u32> {
        self.state.lock().resident.layer_set()
    }

    /// Number of resident nodes, dummies included.
    pub fn node_count(&self) -> usize {
        self.state.lock().resident.node_count()
    }

    /// Number of currently loaded chunks.
    pub fn chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Highest vertical row ever assigned.
    pub fn max_row_seen(&self) -> u32 {
        self.state.lock().resident.max_row_seen()
    }

    /// Highest layer in the backing graph.
    pub fn max_layer(&self) -> u32 {
        self.store.max_layer()
    }

    /// The layer envelope actually covered by loaded chunks.
    pub fn loaded_envelope(&self) -> LayerInterval {
        let state = self.state.lock();
        let mut envelope = LayerInterval::EMPTY;
        for interval in state.chunk_intervals.values() {
            if envelope.is_empty() {
                envelope = *interval;
            } else {
                envelope.lower = envelope.lower.min(interval.lower);
                envelope.upper = envelope.upper.max(interval.upper);
            }
        }
        envelope
    }

    /// The window last requested, buffer included.
    pub fn window(&self) -> LayerInterval {
        self.state.lock().window
    }

    /// Take ownership of all outstanding load handles.
    pub fn pending_loads(&self) -> Vec<TaskHandle> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Block until no loads are outstanding. Returns the first load error
    /// encountered, after draining the rest. Failures already reaped by an
    /// intervening recompute are reported here too, once.
    pub fn wait_quiescent(&self) -> Result<()> {
        let mut first_err = self.failed.lock().take();
        loop {
            let handles = self.pending_loads();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(err) = handle.wait() {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drop handles of loads that already finished. The first failure
    /// reaped here is kept for the next [`Self::wait_quiescent`] caller.
    fn reap_finished(&self) {
        let mut failed = self.failed.lock();
        self.pending.lock().retain(|handle| match handle.try_wait() {
            None => true,
            Some(Ok(())) => false,
            Some(Err(err)) => {
                warn!(%err, "background load failed");
                failed.get_or_insert(err);
                false
            }
        });
    }
}

/// The layer span that actually needs fetching: nothing when `desired` is
/// already covered by `previous`, only the newly exposed part when they
/// partially overlap, the whole of `desired` when the windows are disjoint
/// or nothing was fetched yet.
fn fetch_range(previous: LayerInterval, desired: LayerInterval) -> Option<(u32, u32)> {
    if desired.is_empty() {
        return None;
    }
    if previous.contains(desired.lower) && previous.contains(desired.upper) {
        return None;
    }
    let mut from = desired.lower;
    let mut to = desired.upper;
    if previous.contains(from) {
        from = previous.upper + 1;
    }
    if previous.contains(to) {
        to = previous.lower - 1;
    }
    if from > to {
        return None;
    }
    Some((from.max(0) as u32, to.max(0) as u32))
}
