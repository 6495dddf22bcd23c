//! Cluster adapter contract.
//!
//! The engine never talks to the orchestrator directly; everything goes
//! through [`ClusterOps`]. The daemon wires in the Kubernetes-backed
//! implementation, tests wire in a recording double.

use std::collections::BTreeMap;

use async_trait::async_trait;

use frico_engine::Task;

use crate::error::ClusterResult;

/// Everything the cluster reported about a worker node at discovery time.
/// Capacities are already de-rated.
#[derive(Debug, Clone)]
pub struct DiscoveredNode {
    pub id: u32,
    pub name: String,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
    pub colors: Vec<String>,
}

/// Workload parameters for materializing a task on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PodData {
    pub name: String,
    pub node_name: String,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
    pub exec_time_secs: u64,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl PodData {
    /// Workload data for `task` pinned to `node_name`, with the label and
    /// annotation set the completion watcher and admission path key on.
    pub fn for_task(task: &Task, node_name: &str, exec_time_secs: u64, arrival_time: u64) -> Self {
        let labels = BTreeMap::from([
            ("arrival_time".to_string(), arrival_time.to_string()),
            ("exec_time".to_string(), exec_time_secs.to_string()),
            ("task_id".to_string(), task.id.clone()),
            ("frico".to_string(), "true".to_string()),
            ("node_name".to_string(), node_name.to_string()),
        ]);
        let annotations = BTreeMap::from([
            (
                "v2x.context/priority".to_string(),
                task.priority.value().to_string(),
            ),
            ("v2x.context/color".to_string(), task.color.clone()),
            (
                "v2x.context/exec_time".to_string(),
                exec_time_secs.to_string(),
            ),
        ]);
        Self {
            name: task.name.clone(),
            node_name: node_name.to_string(),
            cpu_millicores: task.cpu_millicores,
            memory_bytes: task.memory_bytes,
            exec_time_secs,
            labels,
            annotations,
        }
    }
}

/// Operations the core needs from the orchestrator.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Worker nodes available for placement.
    async fn discover_nodes(&self) -> ClusterResult<Vec<DiscoveredNode>>;

    /// Create the workload pinned to `pod.node_name`.
    async fn create_workload(&self, pod: &PodData, namespace: &str) -> ClusterResult<()>;

    /// Best-effort delete with zero grace period; a missing workload is
    /// tolerated.
    async fn delete_workload(&self, name: &str, namespace: &str) -> ClusterResult<()>;

    /// Move a task's workload to another node, carrying over its remaining
    /// execution time.
    async fn reschedule(&self, task: &Task, namespace: &str, new_node: &str) -> ClusterResult<()>;
}
