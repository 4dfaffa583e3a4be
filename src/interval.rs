//! Closed integer intervals over layer coordinates.

/// A closed interval `[lower, upper]` of layers.
///
/// Degenerate intervals with `lower > upper` are legal and mean "nothing":
/// the load window starts out that way before the first chunk arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerInterval {
    /// Inclusive lower bound.
    pub lower: i64,
    /// Inclusive upper bound.
    pub upper: i64,
}

impl Default for LayerInterval {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl LayerInterval {
    /// The canonical empty interval.
    pub const EMPTY: LayerInterval = LayerInterval { lower: 0, upper: -1 };

    /// Build an interval; `lower > upper` is allowed and yields an empty one.
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    /// Whether this interval contains no layers.
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    /// Whether `layer` falls inside this interval.
    pub fn contains(&self, layer: i64) -> bool {
        self.lower <= layer && layer <= self.upper
    }

    /// Closed-interval overlap test; touching endpoints count as overlap.
    pub fn intersects(&self, other: &LayerInterval) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.lower <= other.upper && other.lower <= self.upper
    }
}
