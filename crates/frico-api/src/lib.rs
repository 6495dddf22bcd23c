//! frico-api — HTTP front-end for the FRICO controller.
//!
//! Accepts task arrivals, feeds them through the serialized pipeline, and
//! exposes health and metrics.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/create` | Submit a task arrival; returns `{"message": …}` |
//! | GET | `/health` | 204 No Content |
//! | GET | `/metrics` | Prometheus exposition |

pub mod error;
pub mod handlers;
pub mod pipeline;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use frico_cluster::ClusterOps;
use frico_metrics::SimulationMetrics;

pub use error::PipelineError;
pub use pipeline::{ArrivalOutcome, ArrivalQueue, ArrivalRequest, ArrivalWorker};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub queue: ArrivalQueue,
    pub cluster: Arc<dyn ClusterOps>,
    pub metrics: Arc<SimulationMetrics>,
    pub namespace: String,
}

/// Build the front-end router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/create", post(handlers::create))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}
