//! Load types and the nodal load set

mod distributed;
mod lumping;
mod node_load;
mod point_load;

pub use distributed::DistributedLoad;
pub use lumping::{conservation_error, expected_total, EquivalentLoadLumper};
pub use node_load::NodalLoadSet;
pub use point_load::PointLoad;

use serde::{Deserialize, Serialize};

/// A load placed on the span by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Load {
    /// Concentrated load
    Point(PointLoad),
    /// Uniformly distributed load over [start, end]
    Distributed(DistributedLoad),
}

impl Load {
    /// Create a point load
    pub fn point(position: f64, magnitude: f64) -> Self {
        Load::Point(PointLoad::new(position, magnitude))
    }

    /// Create a distributed load
    pub fn distributed(start: f64, end: f64, magnitude: f64) -> Self {
        Load::Distributed(DistributedLoad::new(start, end, magnitude))
    }

    /// Total downward force carried by this load
    pub fn total_force(&self) -> f64 {
        match self {
            Load::Point(p) => p.magnitude,
            Load::Distributed(d) => d.total_force(),
        }
    }

    /// Positions that define this load on the span
    pub fn positions(&self) -> Vec<f64> {
        match self {
            Load::Point(p) => vec![p.position],
            Load::Distributed(d) => vec![d.start, d.end],
        }
    }
}

impl From<PointLoad> for Load {
    fn from(load: PointLoad) -> Self {
        Load::Point(load)
    }
}

impl From<DistributedLoad> for Load {
    fn from(load: DistributedLoad) -> Self {
        Load::Distributed(load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_force() {
        assert_eq!(Load::point(3.0, 10.0).total_force(), 10.0);
        assert!((Load::distributed(0.0, 6.0, 5.0).total_force() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_tagged_json_shape() {
        let json = serde_json::to_value(Load::point(3.0, 10.0)).unwrap();
        assert_eq!(json["kind"], "point");
        assert_eq!(json["position"], 3.0);

        let parsed: Load =
            serde_json::from_str(r#"{"kind":"distributed","start":1.0,"end":2.0,"magnitude":4.0}"#)
                .unwrap();
        assert_eq!(parsed, Load::distributed(1.0, 2.0, 4.0));
    }
}
