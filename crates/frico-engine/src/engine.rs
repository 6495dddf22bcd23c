//! The FRICO placement engine.
//!
//! Given an arriving task, the engine decides:
//! 1. Direct fit — least-loaded color-compatible node with room (tier 1)
//! 2. One-level displacement — relocate cheap residents to open a slot (tier 2)
//! 3. Preemption — evict a prefix of lower-value residents, then try to
//!    re-home each victim elsewhere (tier 3)
//!
//! Moves already performed by tiers 2 and 3 stay committed even when the
//! placement ultimately fails; the caller reflects every recorded
//! displacement to the cluster.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::model::{Node, Task};

/// Scale factor turning a load fraction into an orderable integer key.
const LOAD_KEY_SCALE: f64 = 1e9;

/// An already-admitted task that a placement decision moved or evicted.
#[derive(Debug, Clone)]
pub struct Displacement {
    pub task: Task,
    /// New host, or `None` when the task was offloaded for good.
    pub target: Option<String>,
}

/// Outcome of a [`Frico::solve`] call.
#[derive(Debug, Clone, Default)]
pub struct PlacementDecision {
    /// Node that received the task; `None` when the task was rejected.
    pub chosen_node: Option<String>,
    /// Objective value the task took on its chosen node (0.0 on rejection).
    pub objective: f64,
    /// Every task moved or evicted on the way, keyed by task id. A task
    /// displaced more than once keeps only its final disposition.
    pub displacements: HashMap<String, Displacement>,
}

/// The placement engine: a collection of nodes with an ascending-load
/// index, a preemption bound, and an offload counter.
pub struct Frico {
    nodes: HashMap<String, Node>,
    /// Ascending `(load key, node id)` → node name. Entries are reinserted
    /// on every allocate/release so iteration always sees current loads.
    order: BTreeMap<(u64, u32), String>,
    /// Maximum prefix length inspected per node during tier-3 preemption.
    realloc_threshold: usize,
    offloaded_tasks: u64,
}

impl Frico {
    pub fn new(nodes: impl IntoIterator<Item = Node>, realloc_threshold: usize) -> Self {
        let mut engine = Self {
            nodes: HashMap::new(),
            order: BTreeMap::new(),
            realloc_threshold,
            offloaded_tasks: 0,
        };
        for node in nodes {
            engine.order.insert(order_key(&node), node.name.clone());
            engine.nodes.insert(node.name.clone(), node);
        }
        engine
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Total number of tasks evicted without a new home, ever.
    pub fn offloaded_tasks(&self) -> u64 {
        self.offloaded_tasks
    }

    /// Aggregate-residual precondition: the cluster as a whole has enough
    /// free CPU and memory. Necessary but not sufficient — ignores color
    /// and bin-packing.
    pub fn is_admissible(&self, task: &Task) -> bool {
        let free_cpu: u64 = self.nodes.values().map(Node::remaining_cpu).sum();
        let free_memory: u64 = self.nodes.values().map(Node::remaining_memory).sum();
        debug!(
            free_cpu,
            free_memory,
            cpu = task.cpu_millicores,
            memory = task.memory_bytes,
            "admissibility check"
        );
        task.cpu_millicores <= free_cpu && task.memory_bytes <= free_memory
    }

    /// Place `task`, displacing residents if necessary. On return the
    /// engine accounts for `task` on the chosen node and for every
    /// recorded displacement; reflecting those decisions to the cluster is
    /// the caller's job.
    pub fn solve(&mut self, task: Task) -> Result<PlacementDecision, EngineError> {
        let mut decision = PlacementDecision::default();

        // Tier 1: direct fit on the least-loaded compatible node.
        if let Some(name) = self.find_direct(&task) {
            info!(task = %task.id, node = %name, "direct fit");
            return self.commit(name, task, decision);
        }

        let hosts: Vec<String> = self
            .ascending_names()
            .into_iter()
            .filter(|name| self.nodes[name.as_str()].serves_color(&task.color))
            .collect();

        // Tier 2: relocate residents one level deep, cheapest first, until
        // some node admits the task directly.
        for host in &hosts {
            let residents: Vec<String> = self.nodes[host.as_str()]
                .tasks()
                .map(|t| t.id.clone())
                .collect();
            for resident_id in residents {
                let Some(resident) = self.nodes[host.as_str()].task(&resident_id).cloned() else {
                    continue;
                };
                let destination = self.ascending_names().into_iter().find(|name| {
                    name != host && {
                        let node = &self.nodes[name.as_str()];
                        node.serves_color(&resident.color) && node.fits(&resident)
                    }
                });
                let Some(destination) = destination else {
                    continue;
                };

                let Some(moved) = self.release_from(host, &resident_id) else {
                    continue;
                };
                self.allocate_on(&destination, moved.clone())?;
                info!(
                    task = %resident_id,
                    from = %host,
                    to = %destination,
                    "relocated resident task"
                );
                decision.displacements.insert(
                    resident_id.clone(),
                    Displacement {
                        task: moved,
                        target: Some(destination),
                    },
                );

                if let Some(name) = self.find_direct(&task) {
                    info!(task = %task.id, node = %name, "fits after relocation");
                    return self.commit(name, task, decision);
                }
            }
        }

        // Tier 3: on each candidate host, collect the cheapest residents
        // whose objective stays under the task's potential; preempt them if
        // their accumulated requirements cover the task.
        if self.realloc_threshold > 0 {
            for host in &hosts {
                let node = &self.nodes[host.as_str()];
                let bound = potential(&task, node);
                let mut prefix: Vec<String> = Vec::new();
                let (mut cpu_sum, mut memory_sum) = (0u64, 0u64);
                let mut covers = false;
                for resident in node.tasks() {
                    if resident.objective_value() > bound {
                        break;
                    }
                    prefix.push(resident.id.clone());
                    cpu_sum += resident.cpu_millicores;
                    memory_sum += resident.memory_bytes;
                    if cpu_sum >= task.cpu_millicores && memory_sum >= task.memory_bytes {
                        covers = true;
                        break;
                    }
                    if prefix.len() == self.realloc_threshold {
                        break;
                    }
                }
                if !covers {
                    continue;
                }

                let mut evicted = Vec::with_capacity(prefix.len());
                for victim_id in &prefix {
                    if let Some(victim) = self.release_from(host, victim_id) {
                        evicted.push(victim);
                    }
                }
                let task_id = task.id.clone();
                self.allocate_on(host, task)?;
                info!(task = %task_id, node = %host, victims = evicted.len(), "preempted");

                // Re-homing pass: each victim gets one chance at another
                // color-compatible node; otherwise it is offloaded.
                for victim in evicted {
                    let destination = self.ascending_names().into_iter().find(|name| {
                        name != host && {
                            let node = &self.nodes[name.as_str()];
                            node.serves_color(&victim.color) && node.fits(&victim)
                        }
                    });
                    match destination {
                        Some(destination) => {
                            self.allocate_on(&destination, victim.clone())?;
                            info!(task = %victim.id, node = %destination, "re-homed victim");
                            decision.displacements.insert(
                                victim.id.clone(),
                                Displacement {
                                    task: victim,
                                    target: Some(destination),
                                },
                            );
                        }
                        None => {
                            self.offloaded_tasks += 1;
                            warn!(task = %victim.id, "no host for displaced task; offloading");
                            decision.displacements.insert(
                                victim.id.clone(),
                                Displacement {
                                    task: victim,
                                    target: None,
                                },
                            );
                        }
                    }
                }

                decision.objective = self.nodes[host.as_str()]
                    .task(&task_id)
                    .map(Task::objective_value)
                    .unwrap_or_default();
                decision.chosen_node = Some(host.clone());
                return Ok(decision);
            }
        }

        info!("no placement found");
        Ok(decision)
    }

    /// Release a task's accounting from a node. An absent task or unknown
    /// node is a tolerated race and only logs a warning.
    pub fn release(&mut self, node_name: &str, task_id: &str) {
        if !self.nodes.contains_key(node_name) {
            warn!(node = node_name, task = task_id, "release on unknown node");
            return;
        }
        match self.release_from(node_name, task_id) {
            Some(task) => info!(task = %task.id, node = node_name, "released task"),
            None => warn!(task = task_id, node = node_name, "release of absent task"),
        }
    }

    /// Completion signal from the cluster: release the finished task.
    pub fn handle_task_completion(&mut self, task_id: &str, node_name: &str) {
        self.release(node_name, task_id);
    }

    /// Node names in ascending load order (ties broken by node id).
    fn ascending_names(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }

    /// First node in ascending load order that serves the color and fits.
    fn find_direct(&self, task: &Task) -> Option<String> {
        self.order
            .values()
            .find(|name| {
                let node = &self.nodes[name.as_str()];
                node.serves_color(&task.color) && node.fits(task)
            })
            .cloned()
    }

    fn commit(
        &mut self,
        name: String,
        task: Task,
        mut decision: PlacementDecision,
    ) -> Result<PlacementDecision, EngineError> {
        let task_id = task.id.clone();
        self.allocate_on(&name, task)?;
        decision.objective = self.nodes[name.as_str()]
            .task(&task_id)
            .map(Task::objective_value)
            .unwrap_or_default();
        decision.chosen_node = Some(name);
        Ok(decision)
    }

    fn allocate_on(&mut self, name: &str, task: Task) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        let old_key = order_key(node);
        node.allocate(task)?;
        let new_key = order_key(node);
        self.order.remove(&old_key);
        self.order.insert(new_key, name.to_string());
        Ok(())
    }

    fn release_from(&mut self, name: &str, task_id: &str) -> Option<Task> {
        let node = self.nodes.get_mut(name)?;
        let old_key = order_key(node);
        let task = node.release(task_id)?;
        let new_key = order_key(node);
        self.order.remove(&old_key);
        self.order.insert(new_key, name.to_string());
        Some(task)
    }
}

fn order_key(node: &Node) -> (u64, u32) {
    ((node.load_fraction() * LOAD_KEY_SCALE) as u64, node.id)
}

/// Objective value `task` would take on `node`, without the priority/5
/// scaling. The unscaled form is a liberal bound that widens the
/// tier-3 preemption prefix.
fn potential(task: &Task, node: &Node) -> f64 {
    let occupancy = (task.cpu_millicores as f64 / node.cpu_capacity as f64
        + task.memory_bytes as f64 / node.memory_capacity as f64)
        / 2.0;
    f64::from(task.priority.value()) / occupancy
}
