//! Kubernetes-backed cluster adapter.
//!
//! Discovers worker nodes, creates/deletes task pods, and rebuilds pods on
//! another node when the engine relocates a task. Task containers simulate
//! their runtime with a plain sleep.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Node as KubeNode, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use tracing::{info, warn};

use frico_engine::Task;

use crate::adapter::{ClusterOps, DiscoveredNode, PodData};
use crate::error::ClusterResult;
use crate::quantity;

/// Marker label identifying management nodes excluded from placement.
const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
/// Node annotation listing the colors the node serves, comma-separated.
const COLORS_ANNOTATION: &str = "colors";
/// Share of advertised capacity handed to the engine; the rest is headroom.
const CAPACITY_PERCENT: u64 = 95;
/// Runtime floor for rescheduled workloads.
const MIN_EXEC_TIME_SECS: u64 = 5;
const TASK_IMAGE: &str = "alpine:3.19";

/// The real adapter, backed by the Kubernetes API.
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn discover_nodes(&self) -> ClusterResult<Vec<DiscoveredNode>> {
        let api: Api<KubeNode> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;

        let mut discovered = Vec::new();
        for node in nodes.items {
            let name = node.metadata.name.clone().unwrap_or_default();
            let labels = node.metadata.labels.clone().unwrap_or_default();
            if labels.contains_key(CONTROL_PLANE_LABEL) {
                info!(node = %name, "skipping management node");
                continue;
            }
            let Some(capacity) = node.status.as_ref().and_then(|s| s.capacity.as_ref()) else {
                warn!(node = %name, "node reports no capacity; skipping");
                continue;
            };
            let Some(colors) = node
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(COLORS_ANNOTATION))
            else {
                warn!(node = %name, "node has no colors annotation; skipping");
                continue;
            };
            let colors: Vec<String> = colors.split(',').map(str::to_string).collect();

            let (Some(cpu), Some(memory)) = (capacity.get("cpu"), capacity.get("memory")) else {
                warn!(node = %name, "node capacity is missing cpu or memory; skipping");
                continue;
            };
            let cpu = quantity::cpu_millicores(&cpu.0)? * CAPACITY_PERCENT / 100;
            let memory = quantity::memory_bytes(&memory.0)? * CAPACITY_PERCENT / 100;

            info!(
                node = %name,
                cpu_millicores = cpu,
                memory_bytes = memory,
                colors = ?colors,
                "discovered node"
            );
            discovered.push(DiscoveredNode {
                id: discovered.len() as u32,
                name,
                cpu_millicores: cpu,
                memory_bytes: memory,
                colors,
            });
        }
        Ok(discovered)
    }

    async fn create_workload(&self, pod: &PodData, namespace: &str) -> ClusterResult<()> {
        self.pods(namespace)
            .create(&PostParams::default(), &build_pod(pod))
            .await?;
        info!(pod = %pod.name, node = %pod.node_name, "workload created");
        Ok(())
    }

    async fn delete_workload(&self, name: &str, namespace: &str) -> ClusterResult<()> {
        let params = DeleteParams::default().grace_period(0);
        match self.pods(namespace).delete(name, &params).await {
            Ok(_) => info!(pod = name, "workload deleted"),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(pod = name, "workload already gone")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn reschedule(&self, task: &Task, namespace: &str, new_node: &str) -> ClusterResult<()> {
        let pods = self.pods(namespace);
        let existing = pods.get_opt(&task.name).await?;
        let now = epoch_secs();

        let mut data = match &existing {
            Some(pod) => carried_over_pod_data(pod, task, now),
            None => {
                warn!(pod = %task.name, "original workload vanished; recreating fresh");
                PodData::for_task(task, new_node, MIN_EXEC_TIME_SECS, now)
            }
        };

        if existing.is_some() {
            let params = DeleteParams::default().grace_period(0);
            if let Err(e) = pods.delete(&task.name, &params).await {
                warn!(pod = %task.name, error = %e, "delete during reschedule failed");
            }
        }

        data.node_name = new_node.to_string();
        data.labels
            .insert("node_name".to_string(), new_node.to_string());
        data.labels
            .insert("frico_skip".to_string(), "true".to_string());

        pods.create(&PostParams::default(), &build_pod(&data)).await?;
        info!(pod = %task.name, node = new_node, "workload rescheduled");
        Ok(())
    }
}

/// Pod data for a reschedule, preserving the original pod's labels and
/// annotations and carrying over the time it has left to run.
fn carried_over_pod_data(pod: &Pod, task: &Task, now: u64) -> PodData {
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    let annotations = pod.metadata.annotations.clone().unwrap_or_default();
    let arrival = labels
        .get("arrival_time")
        .and_then(|v| v.parse().ok())
        .unwrap_or(now);
    let exec_time = labels
        .get("exec_time")
        .and_then(|v| v.parse().ok())
        .unwrap_or(MIN_EXEC_TIME_SECS);

    PodData {
        name: task.name.clone(),
        node_name: String::new(),
        cpu_millicores: task.cpu_millicores,
        memory_bytes: task.memory_bytes,
        exec_time_secs: remaining_exec_time(arrival, exec_time, now),
        labels,
        annotations,
    }
}

/// Time the task has left: original exec time minus elapsed wall clock,
/// floored to the minimum runtime.
fn remaining_exec_time(arrival: u64, exec_time: u64, now: u64) -> u64 {
    let remaining = exec_time.saturating_sub(now.saturating_sub(arrival));
    if remaining == 0 {
        MIN_EXEC_TIME_SECS
    } else {
        remaining
    }
}

fn build_pod(data: &PodData) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(data.name.clone()),
            labels: Some(data.labels.clone()),
            annotations: Some(data.annotations.clone()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_selector: Some(BTreeMap::from([(
                "name".to_string(),
                data.node_name.clone(),
            )])),
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: "task".to_string(),
                image: Some(TASK_IMAGE.to_string()),
                command: Some(vec!["/bin/sh".to_string()]),
                args: Some(vec![
                    "-c".to_string(),
                    format!("sleep {} && exit 0", data.exec_time_secs),
                ]),
                resources: Some(ResourceRequirements {
                    requests: Some(BTreeMap::from([
                        (
                            "cpu".to_string(),
                            Quantity(format!("{}m", data.cpu_millicores)),
                        ),
                        ("memory".to_string(), Quantity(data.memory_bytes.to_string())),
                    ])),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
