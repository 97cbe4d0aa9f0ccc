//! Messages exchanged with the solver kernel and the background worker
//!
//! Every message has a stable JSON form: `{"type": "<kind>", "data": {...}}`
//! with kebab-case kinds, so the protocol can be logged or bridged as-is.

use serde::{Deserialize, Serialize};

use crate::analysis::{SolveMethod, SolverConfig};
use crate::elements::{Element, Node, Restraints};
use crate::error::{BeamError, BeamResult};
use crate::loads::NodalLoadSet;
use crate::mesh::{BoundaryMapping, DiscretizedMesh};
use crate::sketch::BeamSketch;

/// Restrained DOFs at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConstraint {
    pub node: usize,
    pub restraints: Restraints,
}

/// External force components at a node
///
/// `fy` is upward-positive, `mz` counter-clockwise-positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalForce {
    pub node: usize,
    pub fy: f64,
    pub mz: f64,
}

/// Everything the kernel needs for one linear static solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    pub supports: Vec<NodeConstraint>,
    pub loads: Vec<NodalForce>,
    #[serde(default)]
    pub config: SolverConfig,
}

impl SolveRequest {
    /// Build a request from a compiled mesh and its lumped loads
    ///
    /// Supports snapped to the same node merge their restraints. Nodal loads
    /// are downward-positive and enter the request as `fy = -force`.
    pub fn build(
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        nodal_loads: &NodalLoadSet,
        sketch: &BeamSketch,
        config: SolverConfig,
    ) -> BeamResult<Self> {
        if nodal_loads.len() != mesh.node_count() {
            return Err(BeamError::InvalidInput(format!(
                "nodal load set covers {} nodes but the mesh has {}",
                nodal_loads.len(),
                mesh.node_count()
            )));
        }
        if mapping.supports.len() != sketch.supports.len() {
            return Err(BeamError::InvalidInput(
                "boundary mapping does not match the sketch supports".to_string(),
            ));
        }

        let mut supports: Vec<NodeConstraint> = Vec::new();
        for (support, &node) in sketch.supports.iter().zip(&mapping.supports) {
            match supports.iter_mut().find(|c| c.node == node) {
                Some(existing) => {
                    existing.restraints = existing.restraints | support.restraints();
                }
                None => supports.push(NodeConstraint {
                    node,
                    restraints: support.restraints(),
                }),
            }
        }
        supports.sort_by_key(|c| c.node);

        let loads = nodal_loads
            .iter_nonzero()
            .map(|(node, force)| NodalForce {
                node,
                fy: -force,
                mz: 0.0,
            })
            .collect();

        Ok(Self {
            nodes: mesh.nodes.clone(),
            elements: mesh.elements.clone(),
            supports,
            loads,
            config,
        })
    }

    /// Total number of DOFs in the model
    pub fn dof_count(&self) -> usize {
        self.nodes.len() * crate::math::DOFS_PER_NODE
    }
}

/// Stage of a running solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStage {
    Initializing,
    AssemblingSystem,
    SolvingSystem,
    PostProcessing,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProgressStage::Initializing => "initializing",
            ProgressStage::AssemblingSystem => "assembling-system",
            ProgressStage::SolvingSystem => "solving-system",
            ProgressStage::PostProcessing => "post-processing",
        };
        f.write_str(name)
    }
}

/// Progress report emitted while a solve runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    /// 0 to 100
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Which solver the kernel ran and on what size of system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverMetadata {
    /// Kernel that produced the result
    pub kernel: String,
    /// `Direct` or `Iterative`
    pub method: SolveMethod,
    /// Iteration count of the iterative solver
    pub iterations: Option<usize>,
    pub total_dofs: usize,
    pub free_dofs: usize,
    /// Stored entries of the global stiffness
    pub stiffness_nnz: usize,
}

/// Wall-clock timing of a solve in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveTiming {
    pub assembly_ms: f64,
    pub boundary_conditions_ms: f64,
    pub solve_ms: f64,
    pub post_processing_ms: f64,
    pub total_ms: f64,
}

/// Raw nodal output of a kernel, 2 entries (v, θ) per node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    pub displacements: Vec<f64>,
    pub reactions: Vec<f64>,
    pub metadata: SolverMetadata,
    pub timing: SolveTiming,
}

impl SolverOutput {
    /// Vertical displacement of a node
    pub fn deflection(&self, node: usize) -> f64 {
        self.displacements.get(2 * node).copied().unwrap_or(0.0)
    }

    /// Vertical reaction force at a node (upward positive)
    pub fn reaction_force(&self, node: usize) -> f64 {
        self.reactions.get(2 * node).copied().unwrap_or(0.0)
    }

    /// Reaction moment at a node (counter-clockwise positive)
    pub fn reaction_moment(&self, node: usize) -> f64 {
        self.reactions.get(2 * node + 1).copied().unwrap_or(0.0)
    }
}

/// Numeric buffer whose allocation moves between owners
///
/// `transfer` hands the allocation to a new buffer and leaves this one
/// detached. A detached buffer refuses every read with `BufferDetached`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferBuffer {
    data: Option<Vec<f64>>,
}

impl TransferBuffer {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data: Some(data) }
    }

    /// Move the allocation into a new buffer, detaching this one
    pub fn transfer(&mut self) -> BeamResult<TransferBuffer> {
        let data = self.data.take().ok_or(BeamError::BufferDetached)?;
        Ok(TransferBuffer { data: Some(data) })
    }

    pub fn is_detached(&self) -> bool {
        self.data.is_none()
    }

    /// Number of values, 0 when detached
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> BeamResult<&[f64]> {
        self.data.as_deref().ok_or(BeamError::BufferDetached)
    }

    /// Address of the underlying allocation, if attached
    pub fn as_ptr(&self) -> Option<*const f64> {
        self.data.as_ref().map(|d| d.as_ptr())
    }

    pub fn into_vec(self) -> BeamResult<Vec<f64>> {
        self.data.ok_or(BeamError::BufferDetached)
    }
}

/// Kernel output as it crosses the worker boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub displacements: TransferBuffer,
    pub reactions: TransferBuffer,
    pub metadata: SolverMetadata,
    pub timing: SolveTiming,
}

impl SolveResult {
    /// Build a result by transferring the sender's buffers
    ///
    /// Both sender handles are left detached, so the worker can no longer
    /// read or reuse the data once it is on its way.
    pub fn transfer_from(
        displacements: &mut TransferBuffer,
        reactions: &mut TransferBuffer,
        metadata: SolverMetadata,
        timing: SolveTiming,
    ) -> BeamResult<Self> {
        Ok(Self {
            displacements: displacements.transfer()?,
            reactions: reactions.transfer()?,
            metadata,
            timing,
        })
    }

    /// Take ownership of the buffers back as plain output
    pub fn into_output(self) -> BeamResult<SolverOutput> {
        Ok(SolverOutput {
            displacements: self.displacements.into_vec()?,
            reactions: self.reactions.into_vec()?,
            metadata: self.metadata,
            timing: self.timing,
        })
    }
}

/// Commands sent to the background worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum WorkerCommand {
    SolveRequest {
        request_id: u64,
        request: SolveRequest,
    },
    Shutdown,
}

/// Messages sent back by the background worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Sent once when the worker starts accepting requests
    Ready,
    Progress {
        request_id: u64,
        #[serde(flatten)]
        event: ProgressEvent,
    },
    Result {
        request_id: u64,
        result: SolveResult,
    },
    Error {
        request_id: u64,
        message: String,
        stack: Option<String>,
    },
}

impl WorkerMessage {
    /// Build an error message from a kernel error and its source chain
    pub fn from_error(request_id: u64, error: &BeamError) -> Self {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(error);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = std::error::Error::source(err);
        }
        WorkerMessage::Error {
            request_id,
            message: error.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }

    /// Kind tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Ready => "ready",
            WorkerMessage::Progress { .. } => "progress",
            WorkerMessage::Result { .. } => "result",
            WorkerMessage::Error { .. } => "error",
        }
    }

    /// Request this message belongs to, `None` for `Ready`
    pub fn request_id(&self) -> Option<u64> {
        match self {
            WorkerMessage::Ready => None,
            WorkerMessage::Progress { request_id, .. }
            | WorkerMessage::Result { request_id, .. }
            | WorkerMessage::Error { request_id, .. } => Some(*request_id),
        }
    }
}
