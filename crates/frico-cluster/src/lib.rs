//! frico-cluster — the controller's view of the Kubernetes fleet.
//!
//! # Components
//!
//! - **`adapter`** — the `ClusterOps` trait the core consumes, plus
//!   `PodData`/`DiscoveredNode`
//! - **`k8s`** — the Kubernetes-backed implementation (discovery,
//!   workload lifecycle, reschedule)
//! - **`watch`** — the completion watcher feeding release events to the
//!   engine
//! - **`quantity`** — resource quantity parsing

pub mod adapter;
pub mod error;
pub mod k8s;
pub mod quantity;
pub mod watch;

pub use adapter::{ClusterOps, DiscoveredNode, PodData};
pub use error::{ClusterError, ClusterResult};
pub use k8s::KubeCluster;
pub use watch::CompletionWatcher;
