//! Execution gateway
//!
//! One awaitable `analyze` regardless of where the kernel runs. Small meshes
//! (or `ExecutionMode::Synchronous`) solve in-process; larger ones go to a
//! background channel that the gateway creates on first use and owns until
//! it is dropped.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::OnceCell;

use crate::analysis::{AnalysisOptions, ExecutionMode};
use crate::diagrams::DiagramSynthesizer;
use crate::error::BeamResult;
use crate::loads::{EquivalentLoadLumper, NodalLoadSet};
use crate::mesh::{BoundaryMapping, DiscretizedMesh, SketchToMeshCompiler};
use crate::results::{AnalysisResults, ExecutionPath, ResultAssembler, SupportReaction};
use crate::sketch::BeamSketch;
use crate::solver::channel::{BackgroundSolverChannel, ChannelState};
use crate::solver::kernel::{SolverKernel, StiffnessKernel};
use crate::solver::protocol::{ProgressEvent, SolveRequest, SolverOutput};

/// Callback receiving progress from either execution path
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Runs the pipeline from sketch to results
pub struct ExecutionGateway {
    options: AnalysisOptions,
    kernel: Arc<dyn SolverKernel>,
    channel: OnceCell<BackgroundSolverChannel>,
    on_progress: Option<ProgressCallback>,
}

impl ExecutionGateway {
    /// Create a gateway using the stock stiffness kernel
    pub fn new(options: AnalysisOptions) -> Self {
        Self::with_kernel(options, Arc::new(StiffnessKernel))
    }

    /// Create a gateway around a custom kernel
    pub fn with_kernel(options: AnalysisOptions, kernel: Arc<dyn SolverKernel>) -> Self {
        Self {
            options,
            kernel,
            channel: OnceCell::new(),
            on_progress: None,
        }
    }

    /// Forward progress events to `callback`
    ///
    /// The callback runs on the caller's task and must not block.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// State of the background channel, `Uninitialized` until first used
    pub fn channel_state(&self) -> ChannelState {
        self.channel
            .get()
            .map_or(ChannelState::Uninitialized, BackgroundSolverChannel::state)
    }

    /// Path a mesh of this size will take
    pub fn execution_path(&self, mesh: &DiscretizedMesh) -> ExecutionPath {
        match self.options.execution {
            ExecutionMode::Synchronous => ExecutionPath::InProcess,
            ExecutionMode::Background => ExecutionPath::Background,
            ExecutionMode::Auto if mesh.node_count() > self.options.background_node_threshold => {
                ExecutionPath::Background
            }
            ExecutionMode::Auto => ExecutionPath::InProcess,
        }
    }

    /// Validate, mesh, lump and analyze a sketch
    pub async fn analyze_sketch(&self, sketch: &BeamSketch) -> BeamResult<AnalysisResults> {
        let (sketch, mesh, mapping, nodal_loads) = self.prepare(sketch)?;
        self.analyze(&mesh, &mapping, &nodal_loads, &sketch).await
    }

    /// Analyze an already compiled mesh
    ///
    /// `sketch` must be the validated snapshot the mesh was compiled from.
    pub async fn analyze(
        &self,
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        nodal_loads: &NodalLoadSet,
        sketch: &BeamSketch,
    ) -> BeamResult<AnalysisResults> {
        let request =
            SolveRequest::build(mesh, mapping, nodal_loads, sketch, self.options.solver)?;
        let path = self.execution_path(mesh);
        debug!(
            "Solving {} nodes via {:?} path",
            mesh.node_count(),
            path
        );

        let output = match path {
            ExecutionPath::InProcess => self.solve_in_process(&request)?,
            ExecutionPath::Background => {
                let channel = self
                    .channel
                    .get_or_try_init(|| async {
                        BackgroundSolverChannel::spawn(Arc::clone(&self.kernel))
                    })
                    .await?;
                let callback = self.on_progress.clone();
                channel
                    .solve(request, move |event| {
                        if let Some(cb) = &callback {
                            cb(&event);
                        }
                    })
                    .await?
            }
        };

        self.finish(mesh, mapping, sketch, output, path)
    }

    /// Run the whole pipeline on the calling thread
    ///
    /// Always solves in-process, whatever the execution mode.
    pub fn analyze_blocking(&self, sketch: &BeamSketch) -> BeamResult<AnalysisResults> {
        let (sketch, mesh, mapping, nodal_loads) = self.prepare(sketch)?;
        let request =
            SolveRequest::build(&mesh, &mapping, &nodal_loads, &sketch, self.options.solver)?;
        let output = self.solve_in_process(&request)?;
        self.finish(&mesh, &mapping, &sketch, output, ExecutionPath::InProcess)
    }

    fn prepare(
        &self,
        sketch: &BeamSketch,
    ) -> BeamResult<(BeamSketch, DiscretizedMesh, BoundaryMapping, NodalLoadSet)> {
        let snapshot = sketch.validate(self.options.position_policy)?;
        let (mesh, mapping) = SketchToMeshCompiler::from_options(&self.options).compile(&snapshot)?;
        let nodal_loads =
            EquivalentLoadLumper::new(self.options.lumping).lump(&mesh, &mapping, &snapshot.loads);
        Ok((snapshot, mesh, mapping, nodal_loads))
    }

    fn solve_in_process(&self, request: &SolveRequest) -> BeamResult<SolverOutput> {
        let callback = self.on_progress.clone();
        self.kernel.solve(request, &mut |event| {
            if let Some(cb) = &callback {
                cb(&event);
            }
        })
    }

    fn finish(
        &self,
        mesh: &DiscretizedMesh,
        mapping: &BoundaryMapping,
        sketch: &BeamSketch,
        output: SolverOutput,
        path: ExecutionPath,
    ) -> BeamResult<AnalysisResults> {
        let reactions = SupportReaction::distribute(mesh, mapping, sketch, &output);
        let diagrams = DiagramSynthesizer::new(self.options.deflection_unit)
            .synthesize(mesh, mapping, sketch, &reactions, &output)?;
        let results = ResultAssembler::assemble(
            reactions,
            diagrams,
            mesh,
            output,
            self.options.deflection_unit,
            path,
        );
        info!(
            "Analysis complete: {} elements, max moment {:.3} at x = {:.3}",
            results.mesh.element_count, results.max_moment.value, results.max_moment.x
        );
        Ok(results)
    }
}

impl Default for ExecutionGateway {
    fn default() -> Self {
        Self::new(AnalysisOptions::default())
    }
}

impl std::fmt::Debug for ExecutionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGateway")
            .field("options", &self.options)
            .field("kernel", &self.kernel.name())
            .field("channel", &self.channel_state())
            .finish()
    }
}
