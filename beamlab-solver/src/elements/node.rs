//! Mesh node and beam element

use serde::{Deserialize, Serialize};

/// A node of the discretized span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Index along the span, 0 at the left end
    pub index: usize,
    /// Distance from the left end
    pub position: f64,
}

impl Node {
    /// Create a new node
    pub fn new(index: usize, position: f64) -> Self {
        Self { index, position }
    }
}

/// A beam element joining two consecutive nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element index, equal to the index of its start node
    pub index: usize,
    /// Start node index
    pub i_node: usize,
    /// End node index
    pub j_node: usize,
    /// Modulus of elasticity copied from the material settings
    pub e: f64,
    /// Moment of inertia copied from the section settings
    pub i: f64,
    /// Area copied from the section settings
    pub a: f64,
}

impl Element {
    /// Flexural rigidity E·I
    pub fn ei(&self) -> f64 {
        self.e * self.i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_rigidity() {
        let el = Element { index: 0, i_node: 0, j_node: 1, e: 200e6, i: 1e-4, a: 0.01 };
        assert!((el.ei() - 2e4).abs() < 1e-9);
    }
}
