//! Sketch to mesh compilation
//!
//! A sketch only holds a handful of supports and loads on a continuous span.
//! The compiler turns it into a uniform fine mesh of nodes and two-node beam
//! elements, then snaps every support and load onto its nearest node.
//!
//! Snapping never interpolates: a feature between two nodes moves to the
//! closer one (ties go to the lower index), so the positional error is at most
//! half an element.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisOptions, MeshOptions};
use crate::elements::{Element, Material, Node, Section};
use crate::error::{BeamError, BeamResult};
use crate::loads::Load;
use crate::sketch::BeamSketch;

/// Uniform mesh of the span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizedMesh {
    /// Span length
    pub span: f64,
    /// Uniform node spacing
    pub spacing: f64,
    /// Nodes, index order
    pub nodes: Vec<Node>,
    /// Elements, index order; element `k` joins nodes `k` and `k + 1`
    pub elements: Vec<Element>,
}

impl DiscretizedMesh {
    /// Build a uniform mesh with `element_count` elements
    pub fn uniform(
        span: f64,
        element_count: usize,
        material: &Material,
        section: &Section,
    ) -> BeamResult<Self> {
        if !span.is_finite() || span <= 0.0 {
            return Err(BeamError::InvalidSpan(span));
        }
        if element_count == 0 {
            return Err(BeamError::InvalidInput(
                "mesh needs at least one element".to_string(),
            ));
        }

        let n = element_count as f64;
        let nodes = (0..=element_count)
            .map(|i| Node::new(i, span * i as f64 / n))
            .collect();
        let elements = (0..element_count)
            .map(|k| Element {
                index: k,
                i_node: k,
                j_node: k + 1,
                e: material.e,
                i: section.i,
                a: section.a,
            })
            .collect();

        Ok(Self {
            span,
            spacing: span / n,
            nodes,
            elements,
        })
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Position of a node
    pub fn position(&self, node: usize) -> f64 {
        self.nodes
            .get(node)
            .map(|n| n.position)
            .unwrap_or(self.span)
    }

    /// Start and end position of an element
    pub fn element_bounds(&self, element: usize) -> (f64, f64) {
        (self.position(element), self.position(element + 1))
    }

    /// Index of the node nearest to `x`
    ///
    /// `x` is clamped into the span first. Exact ties resolve to the lower index.
    pub fn nearest_node(&self, x: f64) -> usize {
        let last = self.element_count();
        let t = x.clamp(0.0, self.span) / self.spacing;
        let lower = t.floor();
        let index = if t - lower > 0.5 { lower + 1.0 } else { lower };
        (index.max(0.0) as usize).min(last)
    }
}

/// Nodes that a sketch load was snapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadNodes {
    /// Point load node
    Point { node: usize },
    /// Nodes nearest the start and end of a distributed load
    Distributed { start: usize, end: usize },
}

/// Map from sketch features to mesh node indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryMapping {
    /// Node index per support, sketch order
    pub supports: Vec<usize>,
    /// Node indices per load, sketch order
    pub loads: Vec<LoadNodes>,
}

impl BoundaryMapping {
    /// Snap every support and load of `sketch` onto `mesh`
    pub fn snap(mesh: &DiscretizedMesh, sketch: &BeamSketch) -> Self {
        let supports = sketch
            .supports
            .iter()
            .map(|s| mesh.nearest_node(s.position))
            .collect();
        let loads = sketch
            .loads
            .iter()
            .map(|load| match load {
                Load::Point(p) => LoadNodes::Point {
                    node: mesh.nearest_node(p.position),
                },
                Load::Distributed(d) => LoadNodes::Distributed {
                    start: mesh.nearest_node(d.start),
                    end: mesh.nearest_node(d.end),
                },
            })
            .collect();
        Self { supports, loads }
    }
}

/// Compiles a sketch into a mesh and boundary mapping
#[derive(Debug, Clone)]
pub struct SketchToMeshCompiler {
    options: MeshOptions,
    material: Material,
    section: Section,
}

impl SketchToMeshCompiler {
    /// Create a compiler with explicit settings
    pub fn new(options: MeshOptions, material: Material, section: Section) -> Self {
        Self {
            options,
            material,
            section,
        }
    }

    /// Create a compiler from pipeline options
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self::new(options.mesh, options.material, options.section)
    }

    /// Number of elements the mesh of `sketch` gets
    ///
    /// The largest of the floor, the per-length density and the count needed to
    /// put `gap_resolution` elements between the two closest distinct features,
    /// capped at `max_elements`.
    pub fn element_count(&self, sketch: &BeamSketch) -> usize {
        let span = sketch.span;
        let opts = &self.options;
        let cap = opts.max_elements.max(1) as f64;

        let by_length = (span * opts.elements_per_unit_length).ceil();

        let mut features: Vec<f64> = vec![0.0, span];
        features.extend(sketch.supports.iter().map(|s| s.position));
        features.extend(sketch.loads.iter().flat_map(Load::positions));
        features.retain(|x| x.is_finite());
        features.iter_mut().for_each(|x| *x = x.clamp(0.0, span));
        features.sort_by(f64::total_cmp);

        let eps = span * 1e-9;
        let shortest_gap = features
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|gap| *gap > eps)
            .fold(f64::INFINITY, f64::min);
        let by_gap = if shortest_gap.is_finite() {
            (span / shortest_gap * opts.gap_resolution as f64).ceil()
        } else {
            0.0
        };

        let count = by_length.max(by_gap).max(opts.min_elements as f64).min(cap);
        count.max(1.0) as usize
    }

    /// Compile a validated sketch into a mesh and its boundary mapping
    pub fn compile(&self, sketch: &BeamSketch) -> BeamResult<(DiscretizedMesh, BoundaryMapping)> {
        if !sketch.span.is_finite() || sketch.span <= 0.0 {
            return Err(BeamError::InvalidSpan(sketch.span));
        }

        let count = self.element_count(sketch);
        let mesh = DiscretizedMesh::uniform(sketch.span, count, &self.material, &self.section)?;
        let mapping = BoundaryMapping::snap(&mesh, sketch);

        debug!(
            "Meshed span {} into {} elements (spacing {:.4})",
            sketch.span, count, mesh.spacing
        );
        Ok((mesh, mapping))
    }
}

impl Default for SketchToMeshCompiler {
    fn default() -> Self {
        Self::new(MeshOptions::default(), Material::default(), Section::default())
    }
}
