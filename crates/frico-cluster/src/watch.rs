//! Completion watcher.
//!
//! An independent producer of release events: it watches for successfully
//! finished frico-managed pods, releases their resources back to the
//! engine, and deletes the finished record. Spurious, duplicate, and
//! out-of-order events are tolerated — release of an absent task is a
//! warning inside the engine, not an error.

use std::sync::Arc;

use futures::TryStreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::{Api, ListParams};
use kube::runtime::watcher;
use tokio::sync::watch;
use tracing::{info, warn};

use frico_engine::EngineHandle;

use crate::adapter::ClusterOps;

/// Label selector for frico-managed workloads.
const MANAGED_SELECTOR: &str = "frico=true";
/// Field selector matching successfully terminated pods.
const SUCCEEDED_SELECTOR: &str = "status.phase=Succeeded";

/// Watches the cluster for finished tasks and feeds releases to the engine.
pub struct CompletionWatcher {
    client: Client,
    namespace: String,
    engine: EngineHandle,
    cluster: Arc<dyn ClusterOps>,
}

impl CompletionWatcher {
    pub fn new(
        client: Client,
        namespace: String,
        engine: EngineHandle,
        cluster: Arc<dyn ClusterOps>,
    ) -> Self {
        Self {
            client,
            namespace,
            engine,
            cluster,
        }
    }

    /// Run until the shutdown signal flips. Stream breaks reconnect with a
    /// warning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let params = ListParams::default()
            .labels(MANAGED_SELECTOR)
            .fields(SUCCEEDED_SELECTOR);
        info!(namespace = %self.namespace, "completion watcher started");

        'watch: loop {
            let mut stream = Box::pin(watcher(api.clone(), params.clone()));
            loop {
                tokio::select! {
                    event = stream.try_next() => match event {
                        Ok(Some(watcher::Event::Applied(pod))) => {
                            self.handle_completion(pod).await;
                        }
                        Ok(Some(watcher::Event::Restarted(pods))) => {
                            for pod in pods {
                                self.handle_completion(pod).await;
                            }
                        }
                        Ok(Some(watcher::Event::Deleted(_))) => {}
                        Ok(None) => {
                            warn!("completion stream ended; reconnecting");
                            continue 'watch;
                        }
                        Err(e) => warn!(error = %e, "completion stream error"),
                    },
                    _ = shutdown.changed() => {
                        info!("completion watcher stopping");
                        break 'watch;
                    }
                }
            }
        }
    }

    async fn handle_completion(&self, pod: Pod) {
        let name = pod.metadata.name.unwrap_or_default();
        let Some(node_name) = pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get("node_name"))
            .cloned()
        else {
            warn!(pod = %name, "completed pod is missing the node_name label");
            return;
        };

        info!(pod = %name, node = %node_name, "task completed");
        self.engine.handle_task_completion(&name, &node_name);
        if let Err(e) = self.cluster.delete_workload(&name, &self.namespace).await {
            warn!(pod = %name, error = %e, "cleanup delete failed");
        }
    }
}
