//! Error types for the beam analysis pipeline

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum BeamError {
    #[error("Invalid span length {0}: span must be a positive, finite length")]
    InvalidSpan(f64),

    #[error("Beam has no supports - add at least one support before analyzing")]
    NoSupports,

    #[error("Beam has no loads - add at least one load before analyzing")]
    NoLoads,

    #[error("Invalid load #{index}: {reason}")]
    InvalidLoad { index: usize, reason: String },

    #[error("{what} position {position} lies outside the span [0, {span}]")]
    PositionOutOfRange {
        what: String,
        position: f64,
        span: f64,
    },

    #[error("Model is unstable: {0}")]
    Unstable(String),

    #[error("Singular stiffness matrix - model may be unstable or have insufficient supports")]
    SingularMatrix,

    #[error("Iterative solver did not converge after {0} iterations")]
    ConvergenceFailed(usize),

    #[error("Solver worker failed: {message}")]
    Worker {
        message: String,
        stack: Option<String>,
    },

    #[error("Background solver channel has been terminated")]
    ChannelTerminated,

    #[error("Transfer buffer was detached - its contents were moved to another owner")]
    BufferDetached,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BeamError {
    /// Whether this error is a user-input problem detected before meshing
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BeamError::InvalidSpan(_)
                | BeamError::NoSupports
                | BeamError::NoLoads
                | BeamError::InvalidLoad { .. }
                | BeamError::PositionOutOfRange { .. }
        )
    }
}

/// Result type for pipeline operations
pub type BeamResult<T> = Result<T, BeamError>;
