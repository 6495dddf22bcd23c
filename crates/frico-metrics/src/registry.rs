//! Simulation metric registry.
//!
//! The counter/gauge surface of the controller, labeled with the run's
//! simulation id. Plain counters use atomics; labeled series live behind
//! async locks and are copied wholesale into a [`MetricsSnapshot`] for
//! exposition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

/// Point-in-time copy of every series, for exposition. Labeled series are
/// sorted so rendered output is deterministic.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub simulation: String,
    pub total_tasks: u64,
    pub unallocated_tasks: u64,
    pub reallocated_tasks: u64,
    pub offloaded_tasks: u64,
    pub objective_value: f64,
    /// node → count.
    pub allocated_tasks: Vec<(String, u64)>,
    /// (pod, priority) → gauge.
    pub priorities: Vec<(String, u8, f64)>,
    /// priority → gauge.
    pub unallocated_priorities: Vec<(u8, f64)>,
    /// pod → seconds.
    pub pod_processing_time: Vec<(String, f64)>,
    /// pod → seconds.
    pub kube_pod_processing_time: Vec<(String, f64)>,
}

/// Collects per-run metrics across the arrival pipeline and front-end.
pub struct SimulationMetrics {
    simulation: String,
    total_tasks: AtomicU64,
    unallocated_tasks: AtomicU64,
    reallocated_tasks: AtomicU64,
    offloaded_tasks: AtomicU64,
    objective_value: RwLock<f64>,
    allocated_tasks: RwLock<HashMap<String, u64>>,
    priorities: RwLock<HashMap<(String, u8), f64>>,
    unallocated_priorities: RwLock<HashMap<u8, f64>>,
    pod_processing_time: RwLock<HashMap<String, f64>>,
    kube_pod_processing_time: RwLock<HashMap<String, f64>>,
}

impl SimulationMetrics {
    pub fn new(simulation: impl Into<String>) -> Self {
        Self {
            simulation: simulation.into(),
            total_tasks: AtomicU64::new(0),
            unallocated_tasks: AtomicU64::new(0),
            reallocated_tasks: AtomicU64::new(0),
            offloaded_tasks: AtomicU64::new(0),
            objective_value: RwLock::new(0.0),
            allocated_tasks: RwLock::new(HashMap::new()),
            priorities: RwLock::new(HashMap::new()),
            unallocated_priorities: RwLock::new(HashMap::new()),
            pod_processing_time: RwLock::new(HashMap::new()),
            kube_pod_processing_time: RwLock::new(HashMap::new()),
        }
    }

    pub fn simulation(&self) -> &str {
        &self.simulation
    }

    /// Every arrival, admitted or not.
    pub fn task_arrived(&self) {
        self.total_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn task_allocated(&self, node: &str, objective: f64, pod: &str, priority: u8) {
        *self
            .allocated_tasks
            .write()
            .await
            .entry(node.to_string())
            .or_insert(0) += 1;
        *self.objective_value.write().await += objective;
        *self
            .priorities
            .write()
            .await
            .entry((pod.to_string(), priority))
            .or_insert(0.0) += 1.0;
    }

    pub async fn task_unallocated(&self, priority: u8) {
        self.unallocated_tasks.fetch_add(1, Ordering::Relaxed);
        *self
            .unallocated_priorities
            .write()
            .await
            .entry(priority)
            .or_insert(0.0) += 1.0;
    }

    pub fn task_reallocated(&self) {
        self.reallocated_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn task_offloaded(&self, pod: &str, priority: u8) {
        self.offloaded_tasks.fetch_add(1, Ordering::Relaxed);
        *self
            .priorities
            .write()
            .await
            .entry((pod.to_string(), priority))
            .or_insert(0.0) -= 1.0;
    }

    /// Seconds the engine spent deciding one arrival.
    pub async fn record_processing_time(&self, pod: &str, seconds: f64) {
        self.pod_processing_time
            .write()
            .await
            .insert(pod.to_string(), seconds);
    }

    /// Seconds the submitter waited end to end.
    pub async fn record_kube_processing_time(&self, pod: &str, seconds: f64) {
        self.kube_pod_processing_time
            .write()
            .await
            .insert(pod.to_string(), seconds);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let mut allocated_tasks: Vec<(String, u64)> = self
            .allocated_tasks
            .read()
            .await
            .iter()
            .map(|(node, count)| (node.clone(), *count))
            .collect();
        allocated_tasks.sort();

        let mut priorities: Vec<(String, u8, f64)> = self
            .priorities
            .read()
            .await
            .iter()
            .map(|((pod, priority), value)| (pod.clone(), *priority, *value))
            .collect();
        priorities.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

        let mut unallocated_priorities: Vec<(u8, f64)> = self
            .unallocated_priorities
            .read()
            .await
            .iter()
            .map(|(priority, value)| (*priority, *value))
            .collect();
        unallocated_priorities.sort_by_key(|(priority, _)| *priority);

        let mut pod_processing_time: Vec<(String, f64)> = self
            .pod_processing_time
            .read()
            .await
            .iter()
            .map(|(pod, value)| (pod.clone(), *value))
            .collect();
        pod_processing_time.sort_by(|a, b| a.0.cmp(&b.0));

        let mut kube_pod_processing_time: Vec<(String, f64)> = self
            .kube_pod_processing_time
            .read()
            .await
            .iter()
            .map(|(pod, value)| (pod.clone(), *value))
            .collect();
        kube_pod_processing_time.sort_by(|a, b| a.0.cmp(&b.0));

        MetricsSnapshot {
            simulation: self.simulation.clone(),
            total_tasks: self.total_tasks.load(Ordering::Relaxed),
            unallocated_tasks: self.unallocated_tasks.load(Ordering::Relaxed),
            reallocated_tasks: self.reallocated_tasks.load(Ordering::Relaxed),
            offloaded_tasks: self.offloaded_tasks.load(Ordering::Relaxed),
            objective_value: *self.objective_value.read().await,
            allocated_tasks,
            priorities,
            unallocated_priorities,
            pod_processing_time,
            kube_pod_processing_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate() {
        let metrics = SimulationMetrics::new("run-1");
        metrics.task_arrived();
        metrics.task_arrived();
        metrics.task_allocated("node-a", 0.25, "t1", 3).await;
        metrics.task_unallocated(2).await;
        metrics.task_reallocated();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.simulation, "run-1");
        assert_eq!(snapshot.total_tasks, 2);
        assert_eq!(snapshot.unallocated_tasks, 1);
        assert_eq!(snapshot.reallocated_tasks, 1);
        assert_eq!(snapshot.allocated_tasks, vec![("node-a".to_string(), 1)]);
        assert!((snapshot.objective_value - 0.25).abs() < 1e-9);
        assert_eq!(snapshot.unallocated_priorities, vec![(2, 1.0)]);
    }

    #[tokio::test]
    async fn offload_decrements_priority_gauge() {
        let metrics = SimulationMetrics::new("run-1");
        metrics.task_allocated("node-a", 0.1, "t1", 4).await;
        metrics.task_offloaded("t1", 4).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.offloaded_tasks, 1);
        assert_eq!(snapshot.priorities, vec![("t1".to_string(), 4, 0.0)]);
    }

    #[tokio::test]
    async fn processing_times_keep_latest_value() {
        let metrics = SimulationMetrics::new("run-1");
        metrics.record_processing_time("t1", 0.5).await;
        metrics.record_processing_time("t1", 0.2).await;
        metrics.record_kube_processing_time("t1", 1.5).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.pod_processing_time, vec![("t1".to_string(), 0.2)]);
        assert_eq!(
            snapshot.kube_pod_processing_time,
            vec![("t1".to_string(), 1.5)]
        );
    }
}
