//! Node loads - net vertical forces lumped onto mesh nodes

use serde::{Deserialize, Serialize};

/// Net applied force per mesh node (positive = downward, kN)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalLoadSet {
    forces: Vec<f64>,
}

impl NodalLoadSet {
    /// Create an empty load set for a mesh with `node_count` nodes
    pub fn new(node_count: usize) -> Self {
        Self {
            forces: vec![0.0; node_count],
        }
    }

    /// Accumulate a force at a node
    ///
    /// Indices past the last node are ignored; the compiler never produces them.
    pub fn add(&mut self, node: usize, force: f64) {
        if let Some(slot) = self.forces.get_mut(node) {
            *slot += force;
        }
    }

    /// Net force at a node
    pub fn get(&self, node: usize) -> f64 {
        self.forces.get(node).copied().unwrap_or(0.0)
    }

    /// Number of nodes covered by this set
    pub fn len(&self) -> usize {
        self.forces.len()
    }

    /// Whether the set covers no nodes
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Sum of all lumped forces
    pub fn total(&self) -> f64 {
        self.forces.iter().sum()
    }

    /// Nodes carrying a non-zero force, in index order
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.forces
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, f)| *f != 0.0)
    }

    /// All forces indexed by node
    pub fn as_slice(&self) -> &[f64] {
        &self.forces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate() {
        let mut set = NodalLoadSet::new(3);
        set.add(1, 2.0);
        set.add(1, 3.0);
        set.add(2, -1.0);
        set.add(7, 100.0);
        assert_eq!(set.get(1), 5.0);
        assert_eq!(set.total(), 4.0);
        assert_eq!(set.iter_nonzero().collect::<Vec<_>>(), vec![(1, 5.0), (2, -1.0)]);
    }
}
