//! HTTP handlers for the arrival front-end.
//!
//! Handlers do no engine work themselves: `create` enqueues the arrival
//! and waits on its result slot, then reflects an admission by creating
//! the workload. Decision failures ride back in the message with HTTP 200;
//! only a pipeline shutdown changes the status code.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

use crate::ApiState;
use crate::pipeline::ArrivalRequest;

/// Response body for `POST /create`.
#[derive(serde::Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

/// POST /create
pub async fn create(
    State(state): State<ApiState>,
    Json(request): Json<ArrivalRequest>,
) -> impl IntoResponse {
    let pod_id = request.name.clone();
    let started = Instant::now();

    let outcome = match state.queue.submit(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return (StatusCode::SERVICE_UNAVAILABLE, message(e.to_string())).into_response();
        }
    };
    state
        .metrics
        .record_kube_processing_time(&pod_id, started.elapsed().as_secs_f64())
        .await;

    if let Some(pod) = &outcome.pod {
        if let Err(e) = state.cluster.create_workload(pod, &state.namespace).await {
            error!(pod = %pod.name, error = %e, "workload creation failed");
            return message(format!("Error while creating pod: {e}")).into_response();
        }
    }

    message(outcome.message).into_response()
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /metrics
pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot().await;
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        frico_metrics::render(&snapshot),
    )
}
