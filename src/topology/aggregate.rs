//! Uniform-topology aggregation
//!
//! Reduces an inventory to `(NUMA nodes, devices, work queues, engines)` for
//! one device generation. The result describes a single "shape" shared by
//! every device, which is what benchmark result keys are built from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::DeviceDescriptor;
use crate::error::{AccelError, Result};

/// Non-fatal inconsistency found while aggregating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyWarning {
    /// Device sits past a NUMA transition and was not counted
    NonUniformNuma { device: String, numa_node: i32 },
    /// Device has no group with work queues
    NoActiveGroup { device: String },
    /// Device has more than one group with work queues
    MultipleGroups { device: String, groups: usize },
    /// Device shape differs from the first counted device
    NonUniformDevices {
        reference: String,
        device: String,
        work_queues: usize,
        engines: usize,
    },
}

impl fmt::Display for TopologyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonUniformNuma { device, numa_node } => write!(
                f,
                "non-uniform NUMA configuration: {} on node {} not counted",
                device, numa_node
            ),
            Self::NoActiveGroup { device } => write!(f, "no groups for device: {}", device),
            Self::MultipleGroups { device, groups } => {
                write!(f, "multiple groups ({}) for device: {}", groups, device)
            }
            Self::NonUniformDevices {
                reference,
                device,
                work_queues,
                engines,
            } => write!(
                f,
                "non-uniform devices configuration for devices: {} and {} ({} wqs, {} engines)",
                reference, device, work_queues, engines
            ),
        }
    }
}

/// Compact topology of one device generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySummary {
    /// Generation filter the summary was computed for
    pub filter: String,
    /// NUMA nodes seen
    pub numa_count: usize,
    /// Devices counted (first NUMA node only when non-uniform)
    pub device_count: usize,
    /// Work queues per device
    pub work_queue_count: usize,
    /// Engines per device
    pub engine_count: usize,
    /// Set once a NUMA transition has been seen
    pub non_uniform: bool,
    /// Warnings raised while aggregating
    pub warnings: Vec<TopologyWarning>,
}

impl TopologySummary {
    /// Check if the fleet aggregated without any warning
    pub fn is_uniform(&self) -> bool {
        !self.non_uniform && self.warnings.is_empty()
    }

    /// Result-file key used by the benchmark runner, e.g. `1n4d8e8w`
    pub fn config_key(&self) -> String {
        format!(
            "{}n{}d{}e{}w",
            self.numa_count, self.device_count, self.engine_count, self.work_queue_count
        )
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("Topology ({}):", if self.filter.is_empty() { "all devices" } else { self.filter.as_str() });
        println!("  NUMA nodes:   {}", self.numa_count);
        println!("  Devices:      {}", self.device_count);
        println!("  Work queues:  {}", self.work_queue_count);
        println!("  Engines:      {}", self.engine_count);
        println!("  Config key:   {}", self.config_key());

        if !self.warnings.is_empty() {
            println!("\nWarnings: {}", self.warnings.len());
            for warning in &self.warnings {
                println!("  {}", warning);
            }
        }
    }
}

/// Aggregate an inventory for devices whose name contains `filter`
///
/// Devices are ordered by NUMA node and the first device's node is the
/// reference. After the first NUMA transition among matching devices, later
/// devices only advance `numa_count`; their queues, engines and the devices
/// themselves are not tallied. A non-uniform fleet therefore reports the shape
/// of its first NUMA node only. This is a best-effort heuristic and says
/// nothing reliable about a genuinely non-uniform fleet; `non_uniform` and the
/// warning list tell callers when that happened.
///
/// Only an empty inventory is an error.
pub fn aggregate(devices: &[DeviceDescriptor], filter: &str) -> Result<TopologySummary> {
    let mut sorted: Vec<&DeviceDescriptor> = devices.iter().collect();
    sorted.sort_by_key(|d| d.numa_node);

    let first = sorted.first().ok_or_else(|| AccelError::EmptyInventory {
        filter: filter.to_string(),
    })?;

    let mut summary = TopologySummary {
        filter: filter.to_string(),
        numa_count: 1,
        device_count: 0,
        work_queue_count: 0,
        engine_count: 0,
        non_uniform: false,
        warnings: Vec::new(),
    };
    let mut numa_node = first.numa_node;
    let mut reference: Option<&str> = None;

    for device in sorted {
        if !device.matches(filter) {
            continue;
        }

        if device.numa_node != numa_node {
            summary.numa_count += 1;
            numa_node = device.numa_node;
            summary.non_uniform = true;
        }

        if summary.non_uniform {
            warn(
                &mut summary,
                TopologyWarning::NonUniformNuma {
                    device: device.name.clone(),
                    numa_node: device.numa_node,
                },
            );
            continue;
        }

        summary.device_count += 1;

        let groups = device.groups_with_work_queues();
        if groups > 1 {
            warn(
                &mut summary,
                TopologyWarning::MultipleGroups {
                    device: device.name.clone(),
                    groups,
                },
            );
        }

        let Some(group) = device.active_group() else {
            warn(
                &mut summary,
                TopologyWarning::NoActiveGroup {
                    device: device.name.clone(),
                },
            );
            continue;
        };

        let work_queues = group.work_queues.len();
        let engines = group.engines.len();
        match reference {
            None => {
                reference = Some(device.name.as_str());
                summary.work_queue_count = work_queues;
                summary.engine_count = engines;
            }
            Some(reference) => {
                if work_queues != summary.work_queue_count || engines != summary.engine_count {
                    warn(
                        &mut summary,
                        TopologyWarning::NonUniformDevices {
                            reference: reference.to_string(),
                            device: device.name.clone(),
                            work_queues,
                            engines,
                        },
                    );
                }
            }
        }
    }

    Ok(summary)
}

fn warn(summary: &mut TopologySummary, warning: TopologyWarning) {
    tracing::warn!("{}", warning);
    summary.warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::GroupDescriptor;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn device(name: &str, numa: i32, wqs: usize, engines: usize) -> DeviceDescriptor {
        let idx = name.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        DeviceDescriptor::new(name, numa).with_group(
            GroupDescriptor::new(format!("group{}.0", idx))
                .with_work_queues((0..wqs).map(|i| format!("wq{}.{}", idx, i)))
                .with_engines((0..engines).map(|i| format!("engine{}.{}", idx, i))),
        )
    }

    #[test]
    fn test_single_device() {
        let devices = vec![device("iax0", 0, 2, 2)];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(
            (summary.numa_count, summary.device_count, summary.work_queue_count, summary.engine_count),
            (1, 1, 2, 2)
        );
        assert!(summary.is_uniform());
        assert_eq!(summary.config_key(), "1n1d2e2w");
    }

    #[test]
    fn test_two_numa_nodes_counts_first_node_only() {
        let devices = vec![
            device("iax1", 0, 8, 8),
            device("iax3", 0, 8, 8),
            device("iax5", 1, 8, 8),
            device("iax7", 1, 8, 8),
        ];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.numa_count, 2);
        assert_eq!(summary.device_count, 2);
        assert_eq!(summary.work_queue_count, 8);
        assert!(summary.non_uniform);
        assert!(!summary.is_uniform());
        assert_eq!(
            summary
                .warnings
                .iter()
                .filter(|w| matches!(w, TopologyWarning::NonUniformNuma { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_unsorted_input_is_sorted_by_numa() {
        let devices = vec![
            device("iax5", 1, 4, 4),
            device("iax1", 0, 2, 2),
            device("iax3", 0, 2, 2),
        ];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.numa_count, 2);
        assert_eq!(summary.device_count, 2);
        assert_eq!(summary.work_queue_count, 2);
        assert_eq!(summary.engine_count, 2);
    }

    #[test]
    fn test_empty_inventory() {
        let err = aggregate(&[], "iax").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInventory);
    }

    #[test]
    fn test_filter_skips_other_generations() {
        let devices = vec![
            device("dsa0", 0, 4, 4),
            device("iax1", 0, 2, 1),
            device("dsa2", 0, 4, 4),
            device("iax3", 0, 2, 1),
        ];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.device_count, 2);
        assert_eq!(summary.work_queue_count, 2);
        assert_eq!(summary.engine_count, 1);
        assert!(summary.is_uniform());
    }

    #[test]
    fn test_reference_node_comes_from_first_device_overall() {
        // dsa0 on node 0 sets the reference even though it is filtered out
        let devices = vec![device("dsa0", 0, 4, 4), device("iax1", 1, 2, 2)];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.numa_count, 2);
        assert_eq!(summary.device_count, 0);
        assert!(summary.non_uniform);
    }

    #[test]
    fn test_no_matching_devices() {
        let devices = vec![device("dsa0", 0, 4, 4)];
        let summary = aggregate(&devices, "iax").unwrap();
        assert_eq!(summary.numa_count, 1);
        assert_eq!(summary.device_count, 0);
        assert_eq!(summary.config_key(), "1n0d0e0w");
    }

    #[test]
    fn test_non_uniform_devices_first_seen_wins() {
        let devices = vec![device("iax1", 0, 4, 4), device("iax3", 0, 2, 4)];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.device_count, 2);
        assert_eq!(summary.work_queue_count, 4);
        assert_eq!(summary.engine_count, 4);
        assert_eq!(
            summary.warnings,
            vec![TopologyWarning::NonUniformDevices {
                reference: "iax1".to_string(),
                device: "iax3".to_string(),
                work_queues: 2,
                engines: 4,
            }]
        );
    }

    #[test]
    fn test_device_without_active_group() {
        let devices = vec![
            DeviceDescriptor::new("iax1", 0)
                .with_group(GroupDescriptor::new("group1.0").with_engines(["engine1.0"])),
            device("iax3", 0, 2, 2),
        ];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.device_count, 2);
        assert_eq!(summary.work_queue_count, 2);
        assert_eq!(summary.engine_count, 2);
        assert_eq!(
            summary.warnings,
            vec![TopologyWarning::NoActiveGroup { device: "iax1".to_string() }]
        );
    }

    #[test]
    fn test_multiple_groups_uses_first() {
        let devices = vec![DeviceDescriptor::new("iax1", 0)
            .with_group(GroupDescriptor::new("group1.0"))
            .with_group(GroupDescriptor::new("group1.1").with_work_queues(["wq1.0"]).with_engines(["engine1.0", "engine1.1"]))
            .with_group(GroupDescriptor::new("group1.2").with_work_queues(["wq1.1", "wq1.2"]))];
        let summary = aggregate(&devices, "iax").unwrap();

        assert_eq!(summary.work_queue_count, 1);
        assert_eq!(summary.engine_count, 2);
        assert!(matches!(
            summary.warnings[0],
            TopologyWarning::MultipleGroups { groups: 2, .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_uniform_single_numa_fleet(n in 1usize..32, wqs in 1usize..16, engines in 0usize..8, numa in -1i32..4) {
            let devices: Vec<_> = (0..n)
                .map(|i| device(&format!("iax{}", i * 2 + 1), numa, wqs, engines))
                .collect();
            let summary = aggregate(&devices, "iax").unwrap();

            prop_assert_eq!(summary.numa_count, 1);
            prop_assert_eq!(summary.device_count, n);
            prop_assert_eq!(summary.work_queue_count, wqs);
            prop_assert_eq!(summary.engine_count, engines);
            prop_assert!(summary.is_uniform());
        }

        #[test]
        fn prop_numa_count_tracks_distinct_nodes(nodes in proptest::collection::vec(0i32..4, 1..24)) {
            let devices: Vec<_> = nodes
                .iter()
                .enumerate()
                .map(|(i, &numa)| device(&format!("iax{}", i), numa, 2, 2))
                .collect();
            let summary = aggregate(&devices, "iax").unwrap();

            let mut distinct = nodes.clone();
            distinct.sort();
            distinct.dedup();
            let min = distinct[0];
            let on_first = nodes.iter().filter(|&&n| n == min).count();

            prop_assert_eq!(summary.numa_count, distinct.len());
            prop_assert_eq!(summary.device_count, on_first);
            prop_assert_eq!(summary.non_uniform, distinct.len() > 1);
        }
    }
}
