//! Result types for beam analysis

use serde::{Deserialize, Serialize};

use crate::analysis::LengthUnit;
use crate::diagrams::{DiagramSeries, DiagramSet, Extremum};
use crate::elements::SupportKind;
use crate::mesh::{BoundaryMapping, DiscretizedMesh};
use crate::sketch::BeamSketch;
use crate::solver::{SolveTiming, SolverMetadata, SolverOutput};

/// Reaction at one sketch support
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportReaction {
    /// Index of the support in the sketch
    pub support: usize,
    pub kind: SupportKind,
    /// Position of the node the support was snapped to
    pub position: f64,
    /// Mesh node carrying the support
    pub node: usize,
    /// Vertical force, upward positive
    pub force: f64,
    /// Moment, counter-clockwise positive (zero unless the support is fixed)
    pub moment: f64,
}

impl SupportReaction {
    /// Split nodal reactions between the sketch supports
    ///
    /// Supports snapped to the same node share its vertical reaction equally;
    /// its moment is shared among the ones that restrain rotation.
    pub fn distribute(
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        sketch: &BeamSketch,
        output: &SolverOutput,
    ) -> Vec<SupportReaction> {
        sketch
            .supports
            .iter()
            .zip(&mapping.supports)
            .enumerate()
            .map(|(index, (support, &node))| {
                let sharing = mapping.supports.iter().filter(|&&n| n == node).count().max(1);
                let fixed_sharing = sketch
                    .supports
                    .iter()
                    .zip(&mapping.supports)
                    .filter(|&(s, &n)| n == node && s.kind.restrains_rotation())
                    .count();

                let moment = if support.kind.restrains_rotation() && fixed_sharing > 0 {
                    output.reaction_moment(node) / fixed_sharing as f64
                } else {
                    0.0
                };

                SupportReaction {
                    support: index,
                    kind: support.kind,
                    position: mesh.position(node),
                    node,
                    force: output.reaction_force(node) / sharing as f64,
                    moment,
                }
            })
            .collect()
    }
}

/// Mesh the analysis ran on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub span: f64,
    pub node_count: usize,
    pub element_count: usize,
    pub spacing: f64,
}

impl From<&DiscretizedMesh> for MeshSummary {
    fn from(mesh: &DiscretizedMesh) -> Self {
        Self {
            span: mesh.span,
            node_count: mesh.node_count(),
            element_count: mesh.element_count(),
            spacing: mesh.spacing,
        }
    }
}

/// Where the solve actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    InProcess,
    Background,
}

/// Complete outcome of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    /// One entry per sketch support, sketch order
    pub reactions: Vec<SupportReaction>,
    pub shear: DiagramSeries,
    pub moment: DiagramSeries,
    /// Vertical deflection in `deflection_unit`
    pub deflection: DiagramSeries,
    pub max_shear: Extremum,
    pub max_moment: Extremum,
    pub max_deflection: Extremum,
    pub deflection_unit: LengthUnit,
    pub mesh: MeshSummary,
    pub solver: SolverMetadata,
    pub timing: SolveTiming,
    pub execution: ExecutionPath,
}

impl AnalysisResults {
    /// Sum of vertical reactions
    pub fn total_reaction(&self) -> f64 {
        self.reactions.iter().map(|r| r.force).sum()
    }

    /// Reaction of the support at `index` in the sketch
    pub fn reaction(&self, index: usize) -> Option<&SupportReaction> {
        self.reactions.iter().find(|r| r.support == index)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Packages reactions and diagrams into [`AnalysisResults`]
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn assemble(
        reactions: Vec<SupportReaction>,
        diagrams: DiagramSet,
        mesh: &DiscretizedMesh,
        output: SolverOutput,
        deflection_unit: LengthUnit,
        execution: ExecutionPath,
    ) -> AnalysisResults {
        let DiagramSet {
            shear,
            moment,
            deflection,
        } = diagrams;

        AnalysisResults {
            max_shear: shear.extremum(),
            max_moment: moment.extremum(),
            max_deflection: deflection.extremum(),
            reactions,
            shear,
            moment,
            deflection,
            deflection_unit,
            mesh: MeshSummary::from(mesh),
            solver: output.metadata,
            timing: output.timing,
            execution,
        }
    }
}
