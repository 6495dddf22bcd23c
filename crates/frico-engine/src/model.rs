//! Task and node model for the placement engine.
//!
//! A `Task` carries its priority class, color tag, and explicit CPU/memory
//! requests. A `Node` tracks fixed capacities, residuals, a color set, and
//! the tasks currently allocated to it, ordered ascending by objective
//! value so preemption always sees the cheapest resident first.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::EngineError;

/// Priority class of a task. Higher value = more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    None = 1,
    Low = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl Priority {
    /// Ordinal value in 1..=5.
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::None),
            2 => Ok(Priority::Low),
            3 => Ok(Priority::Medium),
            4 => Ok(Priority::High),
            5 => Ok(Priority::Critical),
            other => Err(EngineError::InvalidPriority(other)),
        }
    }
}

/// A unit of admitted or arriving work.
///
/// Identity and requirements are fixed at arrival. The host capacity pair
/// is filled in while the task is bound to a node and drives
/// [`Task::objective_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Globally unique id; equal to the externally chosen name.
    pub id: String,
    /// Workload name used by the cluster adapter.
    pub name: String,
    /// CPU request in millicores (> 0).
    pub cpu_millicores: u64,
    /// Memory request in bytes (> 0).
    pub memory_bytes: u64,
    pub priority: Priority,
    pub color: String,
    host_cpu_capacity: u64,
    host_memory_capacity: u64,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cpu_millicores: u64,
        memory_bytes: u64,
        priority: Priority,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cpu_millicores,
            memory_bytes,
            priority,
            color: color.into(),
            host_cpu_capacity: 0,
            host_memory_capacity: 0,
        }
    }

    /// Quality score of a placed task: prefers high-priority work that
    /// occupies a small share of its host. Zero while unbound.
    pub fn objective_value(&self) -> f64 {
        if self.host_cpu_capacity == 0 || self.host_memory_capacity == 0 {
            return 0.0;
        }
        let c = self.host_cpu_capacity as f64;
        let m = self.host_memory_capacity as f64;
        let spare =
            ((c - self.cpu_millicores as f64) / c + (m - self.memory_bytes as f64) / m) / 2.0;
        f64::from(self.priority.value()) / 5.0 * spare
    }

    pub fn is_bound(&self) -> bool {
        self.host_cpu_capacity != 0
    }

    fn bind(&mut self, cpu_capacity: u64, memory_capacity: u64) {
        self.host_cpu_capacity = cpu_capacity;
        self.host_memory_capacity = memory_capacity;
    }

    fn unbind(&mut self) {
        self.host_cpu_capacity = 0;
        self.host_memory_capacity = 0;
    }
}

/// A worker node: fixed capacities, a color set, and residual bookkeeping.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable numeric id assigned at discovery.
    pub id: u32,
    pub name: String,
    /// Total CPU capacity in millicores; constant after init.
    pub cpu_capacity: u64,
    /// Total memory capacity in bytes; constant after init.
    pub memory_capacity: u64,
    remaining_cpu: u64,
    remaining_memory: u64,
    colors: HashSet<String>,
    /// Ascending by `(objective_value, id)`.
    allocated: Vec<Task>,
}

impl Node {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        cpu_capacity: u64,
        memory_capacity: u64,
        colors: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            cpu_capacity,
            memory_capacity,
            remaining_cpu: cpu_capacity,
            remaining_memory: memory_capacity,
            colors: colors.into_iter().collect(),
            allocated: Vec::new(),
        }
    }

    pub fn remaining_cpu(&self) -> u64 {
        self.remaining_cpu
    }

    pub fn remaining_memory(&self) -> u64 {
        self.remaining_memory
    }

    pub fn serves_color(&self, color: &str) -> bool {
        self.colors.contains(color)
    }

    /// Resource-only fit test (≤ on both dimensions); color compatibility
    /// is checked separately.
    pub fn fits(&self, task: &Task) -> bool {
        self.remaining_cpu >= task.cpu_millicores && self.remaining_memory >= task.memory_bytes
    }

    /// Mean utilization across both dimensions, in 0.0..=1.0.
    pub fn load_fraction(&self) -> f64 {
        let cpu_used = (self.cpu_capacity - self.remaining_cpu) as f64 / self.cpu_capacity as f64;
        let mem_used =
            (self.memory_capacity - self.remaining_memory) as f64 / self.memory_capacity as f64;
        (cpu_used + mem_used) / 2.0
    }

    /// Allocated tasks in ascending objective order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.allocated.iter()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.allocated.iter().find(|t| t.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.allocated.len()
    }

    /// Bind `task` to this node, debiting residuals. The engine never calls
    /// this speculatively; an insufficient residual is an invariant
    /// violation surfaced as an error.
    pub(crate) fn allocate(&mut self, mut task: Task) -> Result<(), EngineError> {
        if !self.fits(&task) {
            return Err(EngineError::CapacityViolation {
                node: self.name.clone(),
                task: task.id,
                cpu: task.cpu_millicores,
                memory: task.memory_bytes,
            });
        }
        self.remaining_cpu -= task.cpu_millicores;
        self.remaining_memory -= task.memory_bytes;
        task.bind(self.cpu_capacity, self.memory_capacity);

        let objective = task.objective_value();
        let at = self.allocated.partition_point(|resident| {
            match resident.objective_value().total_cmp(&objective) {
                Ordering::Less => true,
                Ordering::Equal => resident.id < task.id,
                Ordering::Greater => false,
            }
        });
        self.allocated.insert(at, task);
        Ok(())
    }

    /// Remove a task and credit its requirements back. Returns the unbound
    /// task, or `None` if it was not allocated here.
    pub(crate) fn release(&mut self, task_id: &str) -> Option<Task> {
        let at = self.allocated.iter().position(|t| t.id == task_id)?;
        let mut task = self.allocated.remove(at);
        self.remaining_cpu += task.cpu_millicores;
        self.remaining_memory += task.memory_bytes;
        task.unbind();
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    fn red_node() -> Node {
        Node::new(0, "a", 1000, GIB, ["red".to_string()])
    }

    fn task(id: &str, cpu: u64, memory: u64, priority: Priority) -> Task {
        Task::new(id, id, cpu, memory, priority, "red")
    }

    #[test]
    fn priority_roundtrip() {
        for value in 1..=5u8 {
            assert_eq!(Priority::try_from(value).unwrap().value(), value);
        }
        assert!(Priority::try_from(0).is_err());
        assert!(Priority::try_from(6).is_err());
    }

    #[test]
    fn objective_zero_while_unbound() {
        let t = task("t1", 500, 256 * MIB, Priority::High);
        assert_eq!(t.objective_value(), 0.0);
        assert!(!t.is_bound());
    }

    #[test]
    fn objective_reflects_priority_and_spare() {
        let mut node = red_node();
        node.allocate(task("t1", 500, 512 * MIB, Priority::Critical)).unwrap();

        // (5/5) * ((500/1000 + 512Mi/1Gi) / 2) = 0.5
        let t = node.task("t1").unwrap();
        assert!((t.objective_value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn allocate_debits_and_release_credits() {
        let mut node = red_node();
        node.allocate(task("t1", 300, 256 * MIB, Priority::Medium)).unwrap();

        assert_eq!(node.remaining_cpu(), 700);
        assert_eq!(node.remaining_memory(), 768 * MIB);

        let released = node.release("t1").unwrap();
        assert!(!released.is_bound());
        assert_eq!(node.remaining_cpu(), 1000);
        assert_eq!(node.remaining_memory(), GIB);
    }

    #[test]
    fn exact_fit_is_allowed() {
        let mut node = red_node();
        assert!(node.fits(&task("t1", 1000, GIB, Priority::Low)));
        node.allocate(task("t1", 1000, GIB, Priority::Low)).unwrap();
        assert_eq!(node.remaining_cpu(), 0);
        assert_eq!(node.remaining_memory(), 0);
    }

    #[test]
    fn over_allocation_is_an_error() {
        let mut node = red_node();
        node.allocate(task("t1", 800, 256 * MIB, Priority::Low)).unwrap();

        let err = node.allocate(task("t2", 300, 256 * MIB, Priority::Low));
        assert!(matches!(err, Err(EngineError::CapacityViolation { .. })));
        // Failed allocation leaves residuals untouched.
        assert_eq!(node.remaining_cpu(), 200);
    }

    #[test]
    fn tasks_iterate_cheapest_first() {
        let mut node = red_node();
        node.allocate(task("expensive", 100, 64 * MIB, Priority::Critical)).unwrap();
        node.allocate(task("cheap", 500, 512 * MIB, Priority::None)).unwrap();
        node.allocate(task("middle", 300, 256 * MIB, Priority::Medium)).unwrap();

        let order: Vec<&str> = node.tasks().map(|t| t.id.as_str()).collect();
        assert_eq!(order, ["cheap", "middle", "expensive"]);
    }

    #[test]
    fn release_of_absent_task_returns_none() {
        let mut node = red_node();
        assert!(node.release("ghost").is_none());
        assert_eq!(node.remaining_cpu(), 1000);
    }
}
