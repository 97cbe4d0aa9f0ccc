//! BeamLab solver - 1D beam analysis from a user sketch
//!
//! Turns a sketched beam (span, supports, loads) into reactions and shear,
//! moment and deflection diagrams:
//! - Uniform meshing with support/load snapping
//! - Distributed load lumping onto nodes
//! - Euler-Bernoulli stiffness solve (skyline Cholesky or Jacobi PCG)
//! - Optional background solver thread with progress reporting
//!
//! Units are metres and kilonewtons. Loads are positive downward, reactions
//! positive upward, sagging moment positive.
//!
//! ## Example
//! ```rust
//! use beamlab_solver::prelude::*;
//!
//! let sketch = BeamSketch::new(6.0)
//!     .with_support(Support::pinned(0.0))
//!     .with_support(Support::roller(6.0))
//!     .with_load(Load::point(3.0, 10.0));
//!
//! let gateway = ExecutionGateway::new(AnalysisOptions::synchronous());
//! let results = gateway.analyze_blocking(&sketch).unwrap();
//!
//! assert!((results.total_reaction() - 10.0).abs() < 1e-9);
//! assert!((results.max_moment.value - 15.0).abs() < 1e-9);
//! ```

pub mod analysis;
pub mod diagrams;
pub mod elements;
pub mod error;
pub mod loads;
pub mod math;
pub mod mesh;
pub mod results;
pub mod sketch;
pub mod solver;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisOptions, ExecutionMode, LengthUnit, LumpingScheme, MeshOptions, PositionPolicy,
        SolveMethod, SolverConfig,
    };
    pub use crate::diagrams::{DiagramSeries, DiagramSynthesizer, Extremum};
    pub use crate::elements::{Material, Restraints, Section, Support, SupportKind};
    pub use crate::error::{BeamError, BeamResult};
    pub use crate::loads::{
        DistributedLoad, EquivalentLoadLumper, Load, NodalLoadSet, PointLoad,
    };
    pub use crate::mesh::{BoundaryMapping, DiscretizedMesh, SketchToMeshCompiler};
    pub use crate::results::{AnalysisResults, ExecutionPath, SupportReaction};
    pub use crate::sketch::BeamSketch;
    pub use crate::solver::{
        BackgroundSolverChannel, ChannelState, ExecutionGateway, ProgressEvent, ProgressStage,
        SolverKernel, StiffnessKernel,
    };
}
