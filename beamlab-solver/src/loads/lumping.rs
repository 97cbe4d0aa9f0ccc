//! Equivalent nodal loads from sketch loads

use log::debug;

use crate::analysis::LumpingScheme;
use crate::loads::{DistributedLoad, Load, NodalLoadSet};
use crate::mesh::{BoundaryMapping, DiscretizedMesh, LoadNodes};

/// Converts sketch loads into a nodal load set on a mesh
#[derive(Debug, Clone, Copy, Default)]
pub struct EquivalentLoadLumper {
    scheme: LumpingScheme,
}

impl EquivalentLoadLumper {
    /// Create a lumper using the given scheme
    pub fn new(scheme: LumpingScheme) -> Self {
        Self { scheme }
    }

    /// Scheme used for distributed loads
    pub fn scheme(&self) -> LumpingScheme {
        self.scheme
    }

    /// Lump every load onto the mesh nodes
    ///
    /// Point loads go whole to their mapped node. Distributed loads are cut at
    /// element boundaries and each piece is lumped according to the scheme.
    pub fn lump(
        &self,
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        loads: &[Load],
    ) -> NodalLoadSet {
        let mut set = NodalLoadSet::new(mesh.node_count());

        for (index, load) in loads.iter().enumerate() {
            match load {
                Load::Point(p) => {
                    let node = match mapping.loads.get(index) {
                        Some(LoadNodes::Point { node }) => *node,
                        _ => mesh.nearest_node(p.position),
                    };
                    set.add(node, p.magnitude);
                }
                Load::Distributed(d) => self.lump_distributed(mesh, d, &mut set),
            }
        }

        debug!(
            "Lumped {} loads onto {} loaded nodes (total {:.6})",
            loads.len(),
            set.iter_nonzero().count(),
            set.total()
        );
        set
    }

    fn lump_distributed(
        &self,
        mesh: &DiscretizedMesh,
        load: &DistributedLoad,
        set: &mut NodalLoadSet,
    ) {
        let n = mesh.element_count();
        if n == 0 || load.length() <= 0.0 {
            return;
        }

        // Only elements near [start, end] can overlap it
        let sp = mesh.spacing;
        let first = ((load.start / sp).floor() - 1.0).clamp(0.0, (n - 1) as f64) as usize;
        let last = ((load.end / sp).ceil() + 1.0).clamp(0.0, (n - 1) as f64) as usize;

        for k in first..=last {
            let (xi, xj) = mesh.element_bounds(k);
            let overlap = load.overlap(xi, xj);
            if overlap <= 0.0 {
                continue;
            }
            let force = load.magnitude * overlap;

            match self.scheme {
                LumpingScheme::EndNode => set.add(k + 1, force),
                LumpingScheme::Tributary => {
                    let centroid = 0.5 * (xi.max(load.start) + xj.min(load.end));
                    let to_j = ((centroid - xi) / (xj - xi)).clamp(0.0, 1.0);
                    set.add(k, force * (1.0 - to_j));
                    set.add(k + 1, force * to_j);
                }
            }
        }
    }
}

/// Total force the lumped set must carry for `loads` on a span of length `span`
///
/// Point loads count in full; distributed loads count over the part of
/// their extent that lies on the span.
pub fn expected_total(loads: &[Load], span: f64) -> f64 {
    loads
        .iter()
        .map(|load| match load {
            Load::Point(p) => p.magnitude,
            Load::Distributed(d) => d.magnitude * d.overlap(0.0, span),
        })
        .sum()
}

/// Absolute difference between the lumped total and the applied total
pub fn conservation_error(set: &NodalLoadSet, loads: &[Load], span: f64) -> f64 {
    (set.total() - expected_total(loads, span)).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Support;
    use crate::mesh::SketchToMeshCompiler;
    use crate::sketch::BeamSketch;
    use approx::assert_relative_eq;

    fn lump(sketch: &BeamSketch, scheme: LumpingScheme) -> (DiscretizedMesh, NodalLoadSet) {
        let (mesh, mapping) = SketchToMeshCompiler::default().compile(sketch).unwrap();
        let set = EquivalentLoadLumper::new(scheme).lump(&mesh, &mapping, &sketch.loads);
        (mesh, set)
    }

    fn mixed() -> BeamSketch {
        BeamSketch::new(7.3)
            .with_support(Support::pinned(0.0))
            .with_support(Support::roller(7.3))
            .with_load(Load::point(1.234, 12.0))
            .with_load(Load::point(5.5, -3.0))
            .with_load(Load::distributed(0.77, 4.91, 6.5))
            .with_load(Load::distributed(2.0, 7.3, 1.25))
    }

    #[test]
    fn test_conservation_both_schemes() {
        let sketch = mixed();
        for scheme in [LumpingScheme::EndNode, LumpingScheme::Tributary] {
            let (_, set) = lump(&sketch, scheme);
            assert!(conservation_error(&set, &sketch.loads, sketch.span) < 1e-9);
            assert_relative_eq!(
                set.total(),
                12.0 - 3.0 + 6.5 * 4.14 + 1.25 * 5.3,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_point_load_goes_to_mapped_node() {
        let sketch = BeamSketch::new(6.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::point(3.0, 10.0));
        let (_, set) = lump(&sketch, LumpingScheme::EndNode);
        assert_eq!(set.iter_nonzero().collect::<Vec<_>>(), vec![(60, 10.0)]);
    }

    #[test]
    fn test_end_node_lumping() {
        // 40 elements of 0.05 on a 2 m span
        let sketch = BeamSketch::new(2.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::distributed(0.25, 0.5, 4.0));
        let (mesh, set) = lump(&sketch, LumpingScheme::EndNode);
        assert_relative_eq!(mesh.spacing, 0.05);

        // Elements 5..=9 are covered entirely, each pushing w * Δ onto its end node
        for node in 6..=10 {
            assert_relative_eq!(set.get(node), 0.2, epsilon = 1e-12);
        }
        assert_eq!(set.get(5), 0.0);
        assert_eq!(set.get(11), 0.0);
    }

    #[test]
    fn test_partial_overlap_at_ends() {
        let sketch = BeamSketch::new(2.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::distributed(0.26, 0.47, 10.0));
        let (mesh, set) = lump(&sketch, LumpingScheme::EndNode);
        assert_eq!(mesh.element_count(), 40);
        // [0.26, 0.30] -> node 6, full elements -> nodes 7..9, [0.45, 0.47] -> node 10
        assert_relative_eq!(set.get(6), 0.4, epsilon = 1e-12);
        for node in 7..=9 {
            assert_relative_eq!(set.get(node), 0.5, epsilon = 1e-12);
        }
        assert_relative_eq!(set.get(10), 0.2, epsilon = 1e-12);
        assert_relative_eq!(set.total(), 2.1, epsilon = 1e-12);
    }

    #[test]
    fn test_tributary_splits_by_lever_rule() {
        let sketch = BeamSketch::new(2.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::distributed(0.0, 2.0, 3.0));
        let (mesh, set) = lump(&sketch, LumpingScheme::Tributary);
        let half = 3.0 * mesh.spacing / 2.0;
        assert_relative_eq!(set.get(0), half, epsilon = 1e-12);
        assert_relative_eq!(set.get(20), 2.0 * half, epsilon = 1e-12);
        assert_relative_eq!(set.get(mesh.node_count() - 1), half, epsilon = 1e-12);
    }

    #[test]
    fn test_expected_total_ignores_off_span_portion() {
        let loads = vec![Load::distributed(-1.0, 2.0, 2.0), Load::point(1.0, 1.0)];
        assert_relative_eq!(expected_total(&loads, 4.0), 5.0);
    }
}
