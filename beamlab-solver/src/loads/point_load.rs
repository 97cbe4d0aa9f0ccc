//! Point loads on the span

use serde::{Deserialize, Serialize};

/// A concentrated load on the span
///
/// Positive magnitude acts downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLoad {
    /// Distance from the left end
    pub position: f64,
    /// Load magnitude in kN
    pub magnitude: f64,
}

impl PointLoad {
    /// Create a new point load
    pub fn new(position: f64, magnitude: f64) -> Self {
        Self { position, magnitude }
    }
}
