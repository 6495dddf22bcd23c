//! frico-engine — admission and placement for latency-sensitive tasks.
//!
//! The engine owns a fleet of heterogeneous nodes and decides, per arriving
//! task, whether it fits the cluster's residual budget, which node gets it,
//! and which already-admitted tasks to move or evict to make room.
//!
//! # Components
//!
//! - **`model`** — `Priority`, `Task`, `Node` value types and per-node
//!   residual bookkeeping
//! - **`engine`** — the three-tier solver (direct fit → one-level
//!   displacement → preemption) and displacement records
//! - **`handle`** — `EngineHandle`, the single-mutex concurrency envelope
//!   shared by the arrival pipeline and the completion watcher

pub mod engine;
pub mod error;
pub mod handle;
pub mod model;

pub use engine::{Displacement, Frico, PlacementDecision};
pub use error::{EngineError, EngineResult};
pub use handle::EngineHandle;
pub use model::{Node, Priority, Task};
