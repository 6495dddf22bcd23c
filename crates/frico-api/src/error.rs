//! Front-end error types.

use thiserror::Error;

use frico_engine::EngineError;

/// Errors surfaced to arrival submitters.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline stopped before this request's result was posted.
    #[error("arrival pipeline is shutting down")]
    Shutdown,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
