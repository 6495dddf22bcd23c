//! Arrival pipeline.
//!
//! A FIFO queue with exactly one consumer. The worker is the sole writer
//! to engine state on the arrival path: each item is fully processed —
//! admissibility, solve, displacement reflection, metrics — before the
//! next one is dequeued. Submitters get a per-request oneshot slot; the
//! worker fills it when the decision is done, and a dropped slot is the
//! shutdown signal.
//!
//! Engine critical sections never overlap cluster I/O: the decision is
//! committed first, then displacements are reflected outside the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use frico_cluster::{ClusterOps, PodData};
use frico_engine::{Displacement, EngineHandle, PlacementDecision, Priority, Task};
use frico_metrics::{ArrivalRecord, AuditLog, SimulationMetrics};

use crate::error::PipelineError;

/// Arrival payload accepted by `POST /create`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrivalRequest {
    /// Unique id; doubles as the workload name.
    pub name: String,
    /// Priority ordinal in 1..=5.
    pub priority: u8,
    pub color: String,
    /// Simulated runtime in seconds.
    #[serde(rename = "execTime")]
    pub exec_time: u64,
    /// Millicores.
    pub cpu: u64,
    /// MiB; converted to bytes at this boundary.
    pub memory: u64,
}

/// What the worker posts back for one arrival.
#[derive(Debug, Clone)]
pub struct ArrivalOutcome {
    pub allowed: bool,
    pub message: String,
    /// Workload to create when the task was admitted.
    pub pod: Option<PodData>,
}

struct ArrivalItem {
    request: ArrivalRequest,
    reply: oneshot::Sender<ArrivalOutcome>,
}

/// Submission side of the pipeline. Cheap to clone; handlers only enqueue
/// and wait.
#[derive(Clone)]
pub struct ArrivalQueue {
    tx: mpsc::UnboundedSender<ArrivalItem>,
}

impl ArrivalQueue {
    /// Enqueue an arrival and wait for the worker's verdict.
    pub async fn submit(&self, request: ArrivalRequest) -> Result<ArrivalOutcome, PipelineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ArrivalItem {
                request,
                reply: reply_tx,
            })
            .map_err(|_| PipelineError::Shutdown)?;
        reply_rx.await.map_err(|_| PipelineError::Shutdown)
    }
}

/// The single consumer that serializes all placement decisions.
pub struct ArrivalWorker {
    rx: mpsc::UnboundedReceiver<ArrivalItem>,
    engine: EngineHandle,
    cluster: Arc<dyn ClusterOps>,
    metrics: Arc<SimulationMetrics>,
    audit: AuditLog,
    namespace: String,
}

/// Build a connected queue/worker pair.
pub fn channel(
    engine: EngineHandle,
    cluster: Arc<dyn ClusterOps>,
    metrics: Arc<SimulationMetrics>,
    audit: AuditLog,
    namespace: String,
) -> (ArrivalQueue, ArrivalWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ArrivalQueue { tx },
        ArrivalWorker {
            rx,
            engine,
            cluster,
            metrics,
            audit,
            namespace,
        },
    )
}

impl ArrivalWorker {
    /// Consume arrivals until the shutdown signal flips. The in-flight item
    /// finishes; anything still queued is dropped, which surfaces a
    /// shutdown error to its submitter.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("arrival worker started");
        loop {
            tokio::select! {
                item = self.rx.recv() => match item {
                    Some(item) => {
                        let outcome = self.process(item.request).await;
                        // The submitter may have given up; that is fine.
                        let _ = item.reply.send(outcome);
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("arrival worker stopped");
    }

    async fn process(&self, request: ArrivalRequest) -> ArrivalOutcome {
        match self.place(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "arrival processing failed");
                ArrivalOutcome {
                    allowed: false,
                    message: format!("Exception occured: {e}"),
                    pod: None,
                }
            }
        }
    }

    async fn place(&self, request: ArrivalRequest) -> Result<ArrivalOutcome, PipelineError> {
        let priority = Priority::try_from(request.priority)?;
        let memory_bytes = request.memory * 1024 * 1024;
        let arrival_time = epoch_secs();

        if let Err(e) = self.audit.append(&ArrivalRecord {
            task_id: request.name.clone(),
            priority: priority.value(),
            color: request.color.clone(),
            exec_time_secs: request.exec_time,
            arrival_time,
            cpu_millicores: request.cpu,
            memory_bytes,
        }) {
            warn!(error = %e, "audit append failed");
        }

        let task = Task::new(
            &request.name,
            &request.name,
            request.cpu,
            memory_bytes,
            priority,
            &request.color,
        );
        self.metrics.task_arrived();

        let started = Instant::now();
        let decision = if self.engine.is_admissible(&task) {
            self.engine.solve(task.clone())?
        } else {
            PlacementDecision::default()
        };
        self.metrics
            .record_processing_time(&request.name, started.elapsed().as_secs_f64())
            .await;

        // Moves are committed in the engine either way; reflect them all.
        self.reflect_displacements(&decision.displacements, &request.name, priority.value())
            .await;

        match decision.chosen_node {
            Some(node_name) => {
                self.metrics
                    .task_allocated(&node_name, decision.objective, &request.name, priority.value())
                    .await;
                info!(task = %request.name, node = %node_name, "task admitted");
                let pod = PodData::for_task(&task, &node_name, request.exec_time, arrival_time);
                Ok(ArrivalOutcome {
                    allowed: true,
                    message: format!("Task {} assigned to {}", request.name, node_name),
                    pod: Some(pod),
                })
            }
            None => {
                self.metrics.task_unallocated(priority.value()).await;
                info!(task = %request.name, "task rejected");
                Ok(ArrivalOutcome {
                    allowed: false,
                    message: format!("No capacity for task {}", request.name),
                    pod: None,
                })
            }
        }
    }

    async fn reflect_displacements(
        &self,
        displacements: &HashMap<String, Displacement>,
        pod: &str,
        priority: u8,
    ) {
        for displaced in displacements.values() {
            match &displaced.target {
                Some(node) => {
                    if let Err(e) = self
                        .cluster
                        .reschedule(&displaced.task, &self.namespace, node)
                        .await
                    {
                        warn!(
                            task = %displaced.task.id,
                            node = %node,
                            error = %e,
                            "reschedule failed, finished before rescheduling; rolling back"
                        );
                        self.engine.release(node, &displaced.task.id);
                    }
                    self.metrics.task_reallocated();
                }
                None => {
                    if let Err(e) = self
                        .cluster
                        .delete_workload(&displaced.task.name, &self.namespace)
                        .await
                    {
                        warn!(
                            task = %displaced.task.name,
                            error = %e,
                            "delete during offloading failed; probably finished first"
                        );
                    }
                    self.metrics.task_offloaded(pod, priority).await;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use frico_cluster::{ClusterResult, DiscoveredNode};
    use frico_engine::{Frico, Node};

    /// Records every call; all operations succeed.
    #[derive(Default)]
    struct RecordingCluster {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingCluster {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ClusterOps for RecordingCluster {
        async fn discover_nodes(&self) -> ClusterResult<Vec<DiscoveredNode>> {
            Ok(Vec::new())
        }

        async fn create_workload(&self, pod: &PodData, _namespace: &str) -> ClusterResult<()> {
            self.record(format!("create {} on {}", pod.name, pod.node_name));
            Ok(())
        }

        async fn delete_workload(&self, name: &str, _namespace: &str) -> ClusterResult<()> {
            self.record(format!("delete {name}"));
            Ok(())
        }

        async fn reschedule(
            &self,
            task: &Task,
            _namespace: &str,
            new_node: &str,
        ) -> ClusterResult<()> {
            self.record(format!("reschedule {} to {new_node}", task.name));
            Ok(())
        }
    }

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    fn test_pipeline(
        nodes: Vec<Node>,
    ) -> (
        ArrivalQueue,
        ArrivalWorker,
        EngineHandle,
        Arc<RecordingCluster>,
        Arc<SimulationMetrics>,
        tempfile::TempDir,
    ) {
        let engine = EngineHandle::new(Frico::new(nodes, 2));
        let cluster = Arc::new(RecordingCluster::default());
        let metrics = Arc::new(SimulationMetrics::new("test"));
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("test_bed.csv"));
        let (queue, worker) = channel(
            engine.clone(),
            cluster.clone(),
            metrics.clone(),
            audit,
            "tasks".to_string(),
        );
        (queue, worker, engine, cluster, metrics, dir)
    }

    fn arrival(name: &str, cpu: u64, memory_mib: u64, priority: u8, color: &str) -> ArrivalRequest {
        ArrivalRequest {
            name: name.to_string(),
            priority,
            color: color.to_string(),
            exec_time: 30,
            cpu,
            memory: memory_mib,
        }
    }

    #[tokio::test]
    async fn admitted_arrival_reports_node() {
        let (queue, worker, engine, _cluster, metrics, _dir) = test_pipeline(vec![Node::new(
            0,
            "a",
            1000,
            GIB,
            ["red".to_string()],
        )]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        let outcome = queue.submit(arrival("t1", 300, 256, 3, "red")).await.unwrap();

        assert!(outcome.allowed);
        assert_eq!(outcome.message, "Task t1 assigned to a");
        let pod = outcome.pod.unwrap();
        assert_eq!(pod.node_name, "a");
        assert_eq!(pod.memory_bytes, 256 * MIB);

        assert!(engine.with(|f| f.node("a").unwrap().task("t1").is_some()));
        assert_eq!(metrics.snapshot().await.total_tasks, 1);

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn inadmissible_arrival_is_rejected_without_cluster_calls() {
        let (queue, worker, _engine, cluster, metrics, _dir) = test_pipeline(vec![Node::new(
            0,
            "a",
            1000,
            GIB,
            ["red".to_string()],
        )]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        let outcome = queue.submit(arrival("t1", 5000, 64, 3, "red")).await.unwrap();

        assert!(!outcome.allowed);
        assert_eq!(outcome.message, "No capacity for task t1");
        assert!(outcome.pod.is_none());
        assert!(cluster.calls().is_empty());
        assert_eq!(metrics.snapshot().await.unallocated_tasks, 1);

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_priority_surfaces_as_exception_message() {
        let (queue, worker, _engine, _cluster, _metrics, _dir) = test_pipeline(vec![Node::new(
            0,
            "a",
            1000,
            GIB,
            ["red".to_string()],
        )]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        let outcome = queue.submit(arrival("t1", 100, 64, 9, "red")).await.unwrap();

        assert!(!outcome.allowed);
        assert!(outcome.message.starts_with("Exception occured:"));

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn offloaded_displacement_deletes_workload() {
        // One red node and one red+blue node; a high-priority blue arrival
        // preempts the blue-capable node's resident, which has nowhere to
        // go.
        let (queue, worker, engine, cluster, metrics, _dir) = test_pipeline(vec![
            Node::new(0, "a", 1000, GIB, ["red".to_string()]),
            Node::new(1, "b", 1000, GIB, ["red".to_string(), "blue".to_string()]),
        ]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.submit(arrival("t1", 900, 128, 2, "red")).await.unwrap();
        queue.submit(arrival("t2", 900, 700, 2, "red")).await.unwrap();

        let outcome = queue.submit(arrival("t3", 200, 600, 4, "blue")).await.unwrap();

        assert!(outcome.allowed);
        assert_eq!(cluster.calls(), vec!["delete t2".to_string()]);
        assert_eq!(engine.offloaded_tasks(), 1);
        assert_eq!(metrics.snapshot().await.offloaded_tasks, 1);

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_drops_queued_requests() {
        let (queue, worker, _engine, _cluster, _metrics, _dir) = test_pipeline(vec![Node::new(
            0,
            "a",
            1000,
            GIB,
            ["red".to_string()],
        )]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let result = queue.submit(arrival("t1", 100, 64, 3, "red")).await;
        assert!(matches!(result, Err(PipelineError::Shutdown)));
    }
}
