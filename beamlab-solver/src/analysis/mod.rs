//! Analysis options

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::elements::{Material, Section};
use crate::error::BeamResult;

/// Where the linear solve runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// In-process for small meshes, background channel above the node threshold
    #[default]
    Auto,
    /// Always solve in-process
    Synchronous,
    /// Always solve on the background channel
    Background,
}

/// How positions outside [0, span] are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPolicy {
    /// Silently clamp into the span
    #[default]
    Clamp,
    /// Reject the sketch with a validation error
    Reject,
}

/// Distributed-to-nodal load conversion scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumpingScheme {
    /// Each element overlap is added to the element's end node
    EndNode,
    /// Each element overlap is split between both nodes by lever rule
    #[default]
    Tributary,
}

/// Linear solver selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    /// Direct solve; the banded stiffness keeps factorization linear in size
    #[default]
    Auto,
    /// Skyline Cholesky factorization
    Direct,
    /// Jacobi-preconditioned conjugate gradient
    Iterative,
}

/// Display unit for deflection series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Meters,
    #[default]
    Millimeters,
}

impl LengthUnit {
    /// Factor converting metres into this unit
    pub fn per_meter(self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Millimeters => 1000.0,
        }
    }
}

/// Mesh resolution settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Never fewer elements than this, whatever the span
    pub min_elements: usize,
    /// Elements per metre of span
    pub elements_per_unit_length: f64,
    /// Minimum number of elements between the two closest distinct features
    pub gap_resolution: usize,
    /// Upper bound on element count
    pub max_elements: usize,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            min_elements: 40,
            elements_per_unit_length: 20.0,
            gap_resolution: 4,
            max_elements: 20_000,
        }
    }
}

/// Settings forwarded to the solver kernel with each request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver selection
    pub method: SolveMethod,
    /// Relative residual tolerance for the iterative solver
    pub tolerance: f64,
    /// Iteration cap for the iterative solver (0 = ten times the free DOF count)
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolveMethod::Auto,
            tolerance: 1e-10,
            max_iterations: 0,
        }
    }
}

/// Options for the whole analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Execution strategy for the solve
    pub execution: ExecutionMode,
    /// Node count above which `Auto` uses the background channel
    pub background_node_threshold: usize,
    /// Mesh resolution
    pub mesh: MeshOptions,
    /// Out-of-range position handling
    pub position_policy: PositionPolicy,
    /// Distributed load lumping scheme
    pub lumping: LumpingScheme,
    /// Kernel settings
    pub solver: SolverConfig,
    /// Material copied onto every element
    pub material: Material,
    /// Section copied onto every element
    pub section: Section,
    /// Display unit of the deflection series
    pub deflection_unit: LengthUnit,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::Auto,
            background_node_threshold: 400,
            mesh: MeshOptions::default(),
            position_policy: PositionPolicy::Clamp,
            lumping: LumpingScheme::Tributary,
            solver: SolverConfig::default(),
            material: Material::default(),
            section: Section::default(),
            deflection_unit: LengthUnit::Millimeters,
        }
    }
}

impl AnalysisOptions {
    /// Options that always solve in-process
    pub fn synchronous() -> Self {
        Self::default().with_execution(ExecutionMode::Synchronous)
    }

    /// Options that always solve on the background channel
    pub fn background() -> Self {
        Self::default().with_execution(ExecutionMode::Background)
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> BeamResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the execution mode
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Set the position policy
    pub fn with_position_policy(mut self, policy: PositionPolicy) -> Self {
        self.position_policy = policy;
        self
    }

    /// Set the lumping scheme
    pub fn with_lumping(mut self, lumping: LumpingScheme) -> Self {
        self.lumping = lumping;
        self
    }

    /// Set the mesh options
    pub fn with_mesh(mut self, mesh: MeshOptions) -> Self {
        self.mesh = mesh;
        self
    }

    /// Set the solver method
    pub fn with_solve_method(mut self, method: SolveMethod) -> Self {
        self.solver.method = method;
        self
    }

    /// Set material and section
    pub fn with_properties(mut self, material: Material, section: Section) -> Self {
        self.material = material;
        self.section = section;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: AnalysisOptions =
            serde_json::from_str(r#"{"execution":"background","mesh":{"min_elements":80}}"#)
                .unwrap();
        assert_eq!(opts.execution, ExecutionMode::Background);
        assert_eq!(opts.mesh.min_elements, 80);
        assert_eq!(opts.mesh.elements_per_unit_length, 20.0);
        assert_eq!(opts.position_policy, PositionPolicy::Clamp);
        assert_eq!(opts.lumping, LumpingScheme::Tributary);
        assert_eq!(opts.solver.method, SolveMethod::Auto);
    }

    #[test]
    fn test_builders() {
        let opts = AnalysisOptions::synchronous()
            .with_position_policy(PositionPolicy::Reject)
            .with_solve_method(SolveMethod::Iterative);
        assert_eq!(opts.execution, ExecutionMode::Synchronous);
        assert_eq!(opts.position_policy, PositionPolicy::Reject);
        assert_eq!(opts.solver.method, SolveMethod::Iterative);
    }

    #[test]
    fn test_length_unit_factor() {
        assert_eq!(LengthUnit::Millimeters.per_meter(), 1000.0);
        assert_eq!(LengthUnit::Meters.per_meter(), 1.0);
    }
}
