//! Cluster adapter error types.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubernetes api error: {0}")]
    Api(#[from] kube::Error),

    #[error("invalid resource quantity: {0:?}")]
    InvalidQuantity(String),
}
