//! Distributed loads on the span

use serde::{Deserialize, Serialize};

/// A uniformly distributed (line) load over part of the span
///
/// Positive magnitude acts downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributedLoad {
    /// Start position (distance from the left end)
    pub start: f64,
    /// End position (distance from the left end)
    pub end: f64,
    /// Intensity in kN/m
    pub magnitude: f64,
}

impl DistributedLoad {
    /// Create a new distributed load
    pub fn new(start: f64, end: f64, magnitude: f64) -> Self {
        Self { start, end, magnitude }
    }

    /// Length of span covered by the load
    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Get the total force from this load
    pub fn total_force(&self) -> f64 {
        self.magnitude * self.length()
    }

    /// Length of the covered region lying within [a, b]
    pub fn overlap(&self, a: f64, b: f64) -> f64 {
        (b.min(self.end) - a.max(self.start)).max(0.0)
    }
}
