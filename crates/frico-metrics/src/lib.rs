//! frico-metrics — observability for the FRICO controller.
//!
//! Tracks per-run placement counters and gauges, renders them in the
//! Prometheus text exposition format, and keeps the per-arrival CSV audit
//! trail.
//!
//! # Architecture
//!
//! ```text
//! SimulationMetrics
//!   ├── task_arrived() / task_allocated() / ... ← arrival pipeline
//!   └── snapshot() → MetricsSnapshot
//!
//! Prometheus exposition
//!   └── render() → text/plain for /metrics
//!
//! AuditLog
//!   └── append() → one CSV row per arrival
//! ```

pub mod audit;
pub mod prometheus;
pub mod registry;

pub use audit::{ArrivalRecord, AuditLog, write_simulation_id};
pub use prometheus::render;
pub use registry::{MetricsSnapshot, SimulationMetrics};
