//! Engine error types.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the placement engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid priority value: {0} (expected 1..=5)")]
    InvalidPriority(u8),

    #[error("capacity violated on node {node}: task {task} needs {cpu}m / {memory} bytes")]
    CapacityViolation {
        node: String,
        task: String,
        cpu: u64,
        memory: u64,
    },

    #[error("unknown node: {0}")]
    UnknownNode(String),
}
