//! Thread-safe engine handle.
//!
//! All engine state lives behind a single mutex. Each public method is
//! exactly one critical section: a full `solve` (including its internal
//! moves and re-homing) is never observable half-done, and no I/O happens
//! while the lock is held. Cluster calls and metrics belong to the caller,
//! after the decision is committed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::{Frico, PlacementDecision};
use crate::error::EngineError;
use crate::model::Task;

/// Cloneable handle to the shared placement engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<Frico>>,
}

impl EngineHandle {
    pub fn new(engine: Frico) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Frico> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_admissible(&self, task: &Task) -> bool {
        self.lock().is_admissible(task)
    }

    pub fn solve(&self, task: Task) -> Result<PlacementDecision, EngineError> {
        self.lock().solve(task)
    }

    pub fn release(&self, node_name: &str, task_id: &str) {
        self.lock().release(node_name, task_id);
    }

    pub fn handle_task_completion(&self, task_id: &str, node_name: &str) {
        self.lock().handle_task_completion(task_id, node_name);
    }

    pub fn offloaded_tasks(&self) -> u64 {
        self.lock().offloaded_tasks()
    }

    /// Run a closure against the engine under the lock. For snapshots and
    /// assertions; the closure must not block.
    pub fn with<R>(&self, f: impl FnOnce(&Frico) -> R) -> R {
        f(&self.lock())
    }
}
