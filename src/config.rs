//! Tunables for the windowed loader.

/// Configuration for a [`crate::Viewport`] and its cache.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Layers kept resident on each side of the shown range.
    pub buffer_layers: u32,
    /// Layers shown on screen when nothing else has been requested.
    pub shown_layers_default: f64,
    /// Lower clamp for the shown-layer count.
    pub shown_layers_min: f64,
    /// Upper clamp for the shown-layer count, derived from display width
    /// by the caller.
    pub shown_layers_max: f64,
    /// Background worker threads servicing chunk loads.
    pub worker_threads: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            buffer_layers: 300,
            shown_layers_default: 50.0,
            shown_layers_min: 4.0,
            shown_layers_max: 2048.0,
            worker_threads: 2,
        }
    }
}

impl ViewConfig {
    /// Small window suitable for tests: a few layers of buffer so that
    /// eviction actually happens on graphs of a few dozen layers.
    pub fn small() -> Self {
        Self {
            buffer_layers: 2,
            shown_layers_default: 2.0,
            shown_layers_min: 1.0,
            shown_layers_max: 64.0,
            worker_threads: 1,
        }
    }

    /// Clamp a requested shown-layer count to the configured bounds.
    pub fn clamp_shown(&self, layers: f64) -> f64 {
        layers.max(self.shown_layers_min).min(self.shown_layers_max)
    }
}
