//! Solver kernel, wire protocol and execution paths

pub mod channel;
pub mod gateway;
pub mod kernel;
pub mod protocol;

pub use channel::{BackgroundSolverChannel, ChannelState};
pub use gateway::{ExecutionGateway, ProgressCallback};
pub use kernel::{SolverKernel, StiffnessKernel};
pub use protocol::{
    NodalForce, NodeConstraint, ProgressEvent, ProgressStage, SolveRequest, SolveResult,
    SolveTiming, SolverMetadata, SolverOutput, TransferBuffer, WorkerCommand, WorkerMessage,
};
