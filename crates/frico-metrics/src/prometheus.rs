//! Prometheus text exposition format.
//!
//! Renders a metrics snapshot into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use crate::registry::MetricsSnapshot;

/// Render a snapshot into Prometheus text format.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let simulation = &snapshot.simulation;
    let mut out = String::new();

    out.push_str("# HELP allocated_tasks Allocated tasks per node.\n");
    out.push_str("# TYPE allocated_tasks counter\n");
    for (node, count) in &snapshot.allocated_tasks {
        out.push_str(&format!(
            "allocated_tasks{{node=\"{node}\",simulation=\"{simulation}\"}} {count}\n"
        ));
    }

    out.push_str("# HELP unallocated_tasks Unallocated tasks.\n");
    out.push_str("# TYPE unallocated_tasks counter\n");
    out.push_str(&format!(
        "unallocated_tasks{{simulation=\"{simulation}\"}} {}\n",
        snapshot.unallocated_tasks
    ));

    out.push_str("# HELP total_tasks Total tasks.\n");
    out.push_str("# TYPE total_tasks counter\n");
    out.push_str(&format!(
        "total_tasks{{simulation=\"{simulation}\"}} {}\n",
        snapshot.total_tasks
    ));

    out.push_str("# HELP reallocated_tasks Reallocated tasks.\n");
    out.push_str("# TYPE reallocated_tasks counter\n");
    out.push_str(&format!(
        "reallocated_tasks{{simulation=\"{simulation}\"}} {}\n",
        snapshot.reallocated_tasks
    ));

    out.push_str("# HELP offloaded_tasks Offloaded tasks.\n");
    out.push_str("# TYPE offloaded_tasks counter\n");
    out.push_str(&format!(
        "offloaded_tasks{{simulation=\"{simulation}\"}} {}\n",
        snapshot.offloaded_tasks
    ));

    out.push_str("# HELP objective_value Current objective value.\n");
    out.push_str("# TYPE objective_value gauge\n");
    out.push_str(&format!(
        "objective_value{{simulation=\"{simulation}\"}} {:.6}\n",
        snapshot.objective_value
    ));

    out.push_str("# HELP priority Task priority.\n");
    out.push_str("# TYPE priority gauge\n");
    for (pod, priority, value) in &snapshot.priorities {
        out.push_str(&format!(
            "priority{{pod=\"{pod}\",priority=\"{priority}\",simulation=\"{simulation}\"}} {value}\n"
        ));
    }

    out.push_str("# HELP unallocated_priorities Unallocated task priority.\n");
    out.push_str("# TYPE unallocated_priorities gauge\n");
    for (priority, value) in &snapshot.unallocated_priorities {
        out.push_str(&format!(
            "unallocated_priorities{{priority=\"{priority}\",simulation=\"{simulation}\"}} {value}\n"
        ));
    }

    out.push_str("# HELP pod_processing_time Task allocation time.\n");
    out.push_str("# TYPE pod_processing_time gauge\n");
    for (pod, value) in &snapshot.pod_processing_time {
        out.push_str(&format!(
            "pod_processing_time{{pod=\"{pod}\",simulation=\"{simulation}\"}} {value:.6}\n"
        ));
    }

    out.push_str("# HELP kube_pod_processing_time End-to-end task processing time.\n");
    out.push_str("# TYPE kube_pod_processing_time gauge\n");
    for (pod, value) in &snapshot.kube_pod_processing_time {
        out.push_str(&format!(
            "kube_pod_processing_time{{pod=\"{pod}\",simulation=\"{simulation}\"}} {value:.6}\n"
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            simulation: "sim-1700000000".to_string(),
            total_tasks: 10,
            unallocated_tasks: 2,
            reallocated_tasks: 3,
            offloaded_tasks: 1,
            objective_value: 1.5,
            allocated_tasks: vec![("node-a".to_string(), 5), ("node-b".to_string(), 3)],
            priorities: vec![("t1".to_string(), 4, 1.0)],
            unallocated_priorities: vec![(2, 2.0)],
            pod_processing_time: vec![("t1".to_string(), 0.001)],
            kube_pod_processing_time: vec![("t1".to_string(), 0.25)],
        }
    }

    #[test]
    fn render_empty_still_declares_types() {
        let snapshot = MetricsSnapshot {
            simulation: "sim".to_string(),
            total_tasks: 0,
            unallocated_tasks: 0,
            reallocated_tasks: 0,
            offloaded_tasks: 0,
            objective_value: 0.0,
            allocated_tasks: vec![],
            priorities: vec![],
            unallocated_priorities: vec![],
            pod_processing_time: vec![],
            kube_pod_processing_time: vec![],
        };
        let output = render(&snapshot);
        assert!(output.contains("# HELP allocated_tasks"));
        assert!(output.contains("# TYPE priority gauge"));
        assert!(output.contains("total_tasks{simulation=\"sim\"} 0"));
    }

    #[test]
    fn render_carries_simulation_label() {
        let output = render(&test_snapshot());

        assert!(output.contains(
            "allocated_tasks{node=\"node-a\",simulation=\"sim-1700000000\"} 5"
        ));
        assert!(output.contains(
            "allocated_tasks{node=\"node-b\",simulation=\"sim-1700000000\"} 3"
        ));
        assert!(output.contains("unallocated_tasks{simulation=\"sim-1700000000\"} 2"));
        assert!(output.contains("offloaded_tasks{simulation=\"sim-1700000000\"} 1"));
        assert!(output.contains(
            "priority{pod=\"t1\",priority=\"4\",simulation=\"sim-1700000000\"} 1"
        ));
        assert!(output.contains(
            "unallocated_priorities{priority=\"2\",simulation=\"sim-1700000000\"} 2"
        ));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let output = render(&test_snapshot());

        // Every non-comment line should match: metric_name{labels} value
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            assert!(
                line.contains('{') && line.contains("} "),
                "line should have labels: {line}"
            );
        }
    }
}
