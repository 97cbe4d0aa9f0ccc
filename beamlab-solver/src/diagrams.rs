//! Shear, moment and deflection diagrams
//!
//! Shear and moment are rebuilt from equilibrium of the free body left of
//! each sample, using the support reactions and the sketch loads. They never
//! read element end forces from the kernel. Deflection is the kernel's nodal
//! vertical displacement, scaled to the display unit.
//!
//! Sign conventions: loads are downward-positive, reactions upward-positive,
//! reaction moments counter-clockwise-positive, bending moment
//! sagging-positive.

use serde::{Deserialize, Serialize};

use crate::analysis::LengthUnit;
use crate::error::{BeamError, BeamResult};
use crate::loads::Load;
use crate::mesh::{BoundaryMapping, DiscretizedMesh, LoadNodes};
use crate::results::SupportReaction;
use crate::sketch::BeamSketch;
use crate::solver::SolverOutput;

/// Largest-magnitude sample of a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub value: f64,
    pub x: f64,
}

/// Ordered (x, value) samples along the span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramSeries {
    pub x: Vec<f64>,
    pub values: Vec<f64>,
}

impl DiagramSeries {
    /// Build a series from matching sample positions and values
    pub fn new(x: Vec<f64>, values: Vec<f64>) -> BeamResult<Self> {
        if x.len() != values.len() {
            return Err(BeamError::InvalidInput(format!(
                "diagram has {} positions but {} values",
                x.len(),
                values.len()
            )));
        }
        Ok(Self { x, values })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate over (x, value) pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.values.iter().copied())
    }

    /// Sample with the largest absolute value; the first one wins on ties
    pub fn extremum(&self) -> Extremum {
        let mut best = Extremum::default();
        let mut found = false;
        for (x, value) in self.points() {
            if !found || value.abs() > best.value.abs() {
                best = Extremum { value, x };
                found = true;
            }
        }
        best
    }

    /// Linearly interpolated value at `x`, clamped to the sampled range
    pub fn value_at(&self, x: f64) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 || x <= self.x[0] {
            return self.values[0];
        }
        if x >= self.x[n - 1] {
            return self.values[n - 1];
        }

        let hi = self.x.partition_point(|&xi| xi <= x).min(n - 1);
        let lo = hi - 1;
        let (x0, x1) = (self.x[lo], self.x[hi]);
        if x1 <= x0 {
            return self.values[hi];
        }
        let t = (x - x0) / (x1 - x0);
        self.values[lo] + t * (self.values[hi] - self.values[lo])
    }

    /// Re-sample at `count` evenly spaced positions over the same range
    pub fn resample(&self, count: usize) -> DiagramSeries {
        if self.is_empty() || count == 0 {
            return DiagramSeries::default();
        }
        let count = count.max(2);
        let (start, end) = (self.x[0], self.x[self.len() - 1]);
        let x: Vec<f64> = (0..count)
            .map(|i| start + (end - start) * i as f64 / (count - 1) as f64)
            .collect();
        let values = x.iter().map(|&xi| self.value_at(xi)).collect();
        DiagramSeries { x, values }
    }
}

/// The three diagrams of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSet {
    pub shear: DiagramSeries,
    pub moment: DiagramSeries,
    pub deflection: DiagramSeries,
}

/// Builds diagrams from reactions, loads and nodal displacements
#[derive(Debug, Clone, Copy)]
pub struct DiagramSynthesizer {
    deflection_unit: LengthUnit,
}

impl DiagramSynthesizer {
    pub fn new(deflection_unit: LengthUnit) -> Self {
        Self { deflection_unit }
    }

    /// Sample all three diagrams at the mesh nodes
    ///
    /// Reactions and point loads act at their snapped nodes. At an interior
    /// node the shear includes everything at that node; at the last node it
    /// is the left-hand limit. The moment integrates the shear with the
    /// trapezoidal rule and jumps by minus the reaction moment at fixed
    /// supports, so a fixed left end starts from its reaction moment.
    pub fn synthesize(
        &self,
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        sketch: &BeamSketch,
        reactions: &[SupportReaction],
        output: &SolverOutput,
    ) -> BeamResult<DiagramSet> {
        let n = mesh.node_count();
        if n < 2 {
            return Err(BeamError::InvalidInput(
                "diagrams need at least two mesh nodes".to_string(),
            ));
        }
        if mapping.loads.len() != sketch.loads.len() {
            return Err(BeamError::InvalidInput(
                "boundary mapping does not match the sketch loads".to_string(),
            ));
        }
        let last = n - 1;
        let x: Vec<f64> = mesh.nodes.iter().map(|node| node.position).collect();

        // Net concentrated force and reaction couple per node
        let mut concentrated = vec![0.0; n];
        let mut couples = vec![0.0; n];
        for r in reactions {
            let node = r.node.min(last);
            concentrated[node] += r.force;
            couples[node] += r.moment;
        }
        for (load, nodes) in sketch.loads.iter().zip(&mapping.loads) {
            if let (Load::Point(p), LoadNodes::Point { node }) = (load, nodes) {
                concentrated[(*node).min(last)] -= p.magnitude;
            }
        }

        let distributed_left_of = |xi: f64| -> f64 {
            sketch
                .loads
                .iter()
                .filter_map(|load| match load {
                    Load::Distributed(d) => Some(d.magnitude * d.overlap(d.start, xi)),
                    Load::Point(_) => None,
                })
                .sum()
        };

        // Shear just right (<= x) and just left (< x) of every node
        let mut v_right = Vec::with_capacity(n);
        let mut v_left = Vec::with_capacity(n);
        let mut running = 0.0;
        for (i, &xi) in x.iter().enumerate() {
            let dist = distributed_left_of(xi);
            v_left.push(running - dist);
            running += concentrated[i];
            v_right.push(running - dist);
        }

        let mut shear = v_right.clone();
        shear[last] = v_left[last];

        let mut moment = vec![0.0; n];
        moment[0] = -couples[0];
        for i in 1..n {
            let dx = x[i] - x[i - 1];
            let mut m = moment[i - 1] + 0.5 * (v_right[i - 1] + v_left[i]) * dx;
            if i < last {
                m -= couples[i];
            }
            moment[i] = m;
        }

        let factor = self.deflection_unit.per_meter();
        let deflection = (0..n).map(|i| output.deflection(i) * factor).collect();

        Ok(DiagramSet {
            shear: DiagramSeries::new(x.clone(), shear)?,
            moment: DiagramSeries::new(x.clone(), moment)?,
            deflection: DiagramSeries::new(x, deflection)?,
        })
    }
}

impl Default for DiagramSynthesizer {
    fn default() -> Self {
        Self::new(LengthUnit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SolveMethod;
    use crate::elements::{Material, Section, Support, SupportKind};
    use crate::solver::{SolveTiming, SolverMetadata};
    use approx::assert_relative_eq;

    fn output(nodes: usize) -> SolverOutput {
        SolverOutput {
            displacements: (0..2 * nodes).map(|i| -(i as f64) * 1e-4).collect(),
            reactions: vec![0.0; 2 * nodes],
            metadata: SolverMetadata {
                kernel: "test".to_string(),
                method: SolveMethod::Direct,
                iterations: None,
                total_dofs: 2 * nodes,
                free_dofs: 0,
                stiffness_nnz: 0,
            },
            timing: SolveTiming::default(),
        }
    }

    fn reaction(
        support: usize,
        kind: SupportKind,
        node: usize,
        mesh: &DiscretizedMesh,
        force: f64,
        moment: f64,
    ) -> SupportReaction {
        SupportReaction {
            support,
            kind,
            position: mesh.position(node),
            node,
            force,
            moment,
        }
    }

    fn setup(sketch: &BeamSketch, elements: usize) -> (DiscretizedMesh, BoundaryMapping) {
        let (material, section) = (Material::default(), Section::default());
        let mesh = DiscretizedMesh::uniform(sketch.span, elements, &material, &section).unwrap();
        let mapping = BoundaryMapping::snap(&mesh, sketch);
        (mesh, mapping)
    }

    #[test]
    fn test_point_load_shear_step_and_moment_peak() {
        let sketch = BeamSketch::new(6.0)
            .with_support(Support::pinned(0.0))
            .with_support(Support::roller(6.0))
            .with_load(Load::point(3.0, 10.0));
        let (mesh, mapping) = setup(&sketch, 12);
        let reactions = vec![
            reaction(0, SupportKind::Pinned, 0, &mesh, 5.0, 0.0),
            reaction(1, SupportKind::Roller, 12, &mesh, 5.0, 0.0),
        ];
        let set = DiagramSynthesizer::default()
            .synthesize(&mesh, &mapping, &sketch, &reactions, &output(13))
            .unwrap();

        assert_relative_eq!(set.shear.values[0], 5.0);
        assert_relative_eq!(set.shear.values[5], 5.0);
        assert_relative_eq!(set.shear.values[6], -5.0);
        assert_relative_eq!(set.shear.values[12], -5.0);

        let peak = set.moment.extremum();
        assert_relative_eq!(peak.value, 15.0, epsilon = 1e-12);
        assert_relative_eq!(peak.x, 3.0);
        assert_relative_eq!(set.moment.values[0], 0.0);
        assert_relative_eq!(set.moment.values[12], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_load_is_linear_shear_parabolic_moment() {
        let sketch = BeamSketch::new(6.0)
            .with_support(Support::pinned(0.0))
            .with_support(Support::roller(6.0))
            .with_load(Load::distributed(0.0, 6.0, 5.0));
        let (mesh, mapping) = setup(&sketch, 60);
        let reactions = vec![
            reaction(0, SupportKind::Pinned, 0, &mesh, 15.0, 0.0),
            reaction(1, SupportKind::Roller, 60, &mesh, 15.0, 0.0),
        ];
        let set = DiagramSynthesizer::default()
            .synthesize(&mesh, &mapping, &sketch, &reactions, &output(61))
            .unwrap();

        for (x, v) in set.shear.points() {
            assert_relative_eq!(v, 15.0 - 5.0 * x, epsilon = 1e-9);
        }
        for (x, m) in set.moment.points() {
            assert_relative_eq!(m, 15.0 * x - 2.5 * x * x, epsilon = 1e-9);
        }
        assert_relative_eq!(set.moment.extremum().value, 22.5, epsilon = 1e-9);
        assert_relative_eq!(set.moment.extremum().x, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_end_starts_from_reaction_moment() {
        // Cantilever fixed at 0 with 4 kN at the free end
        let sketch = BeamSketch::new(2.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::point(2.0, 4.0));
        let (mesh, mapping) = setup(&sketch, 8);
        let reactions = vec![reaction(0, SupportKind::Fixed, 0, &mesh, 4.0, 8.0)];
        let set = DiagramSynthesizer::default()
            .synthesize(&mesh, &mapping, &sketch, &reactions, &output(9))
            .unwrap();

        assert_relative_eq!(set.moment.values[0], -8.0);
        assert_relative_eq!(set.moment.values[4], -4.0, epsilon = 1e-12);
        assert_relative_eq!(set.moment.values[8], 0.0, epsilon = 1e-12);
        // Left-hand limit at the free end still carries the tip load
        assert_relative_eq!(set.shear.values[8], 4.0);
    }

    #[test]
    fn test_deflection_unit_conversion() {
        let sketch = BeamSketch::new(1.0)
            .with_support(Support::fixed(0.0))
            .with_load(Load::point(1.0, 1.0));
        let (mesh, mapping) = setup(&sketch, 2);
        let out = output(3);
        let mm = DiagramSynthesizer::new(LengthUnit::Millimeters)
            .synthesize(&mesh, &mapping, &sketch, &[], &out)
            .unwrap();
        let m = DiagramSynthesizer::new(LengthUnit::Meters)
            .synthesize(&mesh, &mapping, &sketch, &[], &out)
            .unwrap();
        assert_relative_eq!(m.deflection.values[2], out.deflection(2));
        assert_relative_eq!(mm.deflection.values[2], out.deflection(2) * 1000.0);
    }

    #[test]
    fn test_interpolation_and_resampling() {
        let series = DiagramSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 10.0, -10.0]).unwrap();
        assert_relative_eq!(series.value_at(0.5), 5.0);
        assert_relative_eq!(series.value_at(1.0), 10.0);
        assert_relative_eq!(series.value_at(1.25), 5.0);
        assert_relative_eq!(series.value_at(-1.0), 0.0);
        assert_relative_eq!(series.value_at(9.0), -10.0);

        let resampled = series.resample(5);
        assert_eq!(resampled.len(), 5);
        assert_relative_eq!(resampled.x[1], 0.5);
        assert_relative_eq!(resampled.values[3], 0.0);

        // Ties go to the first sample
        let peak = series.extremum();
        assert_relative_eq!(peak.value, 10.0);
        assert_relative_eq!(peak.x, 1.0);
    }

    #[test]
    fn test_mismatched_series_rejected() {
        assert!(DiagramSeries::new(vec![0.0, 1.0], vec![1.0]).is_err());
    }
}
