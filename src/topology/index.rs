//! Nested topology index
//!
//! `generation -> NUMA node -> device -> group -> {work queues, engines}`,
//! used for inspection and reporting. Unlike aggregation this keeps every
//! device, bucketed by the generation tag found in its name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::DeviceDescriptor;
use crate::error::{AccelError, Result};

/// Generation tags checked in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTags(Vec<String>);

impl Default for GenerationTags {
    fn default() -> Self {
        Self(vec!["iax".to_string(), "dsa".to_string()])
    }
}

impl GenerationTags {
    /// Use a custom tag list; earlier tags win when several match
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    /// Tags in priority order
    pub fn tags(&self) -> &[String] {
        &self.0
    }

    /// The first tag contained in `device_name`
    pub fn infer(&self, device_name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|tag| device_name.contains(tag.as_str()))
            .map(String::as_str)
    }
}

/// Work queues and engines bound to one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBinding {
    /// Work queue names
    pub work_queues: Vec<String>,
    /// Engine names
    pub engines: Vec<String>,
}

/// Groups of one device, keyed by group name
pub type DeviceGroups = BTreeMap<String, GroupBinding>;

/// Devices of one NUMA node, keyed by device name
pub type NumaDevices = BTreeMap<String, DeviceGroups>;

/// Nested lookup of the whole fleet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopologyIndex {
    generations: BTreeMap<String, BTreeMap<i32, NumaDevices>>,
}

impl TopologyIndex {
    /// Generation tags present in the index
    pub fn generations(&self) -> impl Iterator<Item = &str> {
        self.generations.keys().map(String::as_str)
    }

    /// NUMA nodes of one generation
    pub fn numa_nodes(&self, generation: &str) -> Option<&BTreeMap<i32, NumaDevices>> {
        self.generations.get(generation)
    }

    /// Groups of one device
    pub fn device(&self, generation: &str, numa_node: i32, device: &str) -> Option<&DeviceGroups> {
        self.generations.get(generation)?.get(&numa_node)?.get(device)
    }

    /// Total devices across all generations
    pub fn device_count(&self) -> usize {
        self.generations
            .values()
            .flat_map(|nodes| nodes.values())
            .map(|devices| devices.len())
            .sum()
    }

    /// Check if the index holds no device
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Print the index as an indented tree
    pub fn print_tree(&self) {
        if self.is_empty() {
            println!("No devices");
            return;
        }

        for (generation, nodes) in &self.generations {
            println!("{}:", generation);
            for (numa_node, devices) in nodes {
                println!("  node {}:", numa_node);
                for (device, groups) in devices {
                    println!("    {}:", device);
                    for (group, binding) in groups {
                        println!("      {}:", group);
                        println!("        wqs:     {}", binding.work_queues.join(" "));
                        println!("        engines: {}", binding.engines.join(" "));
                    }
                }
            }
        }
    }
}

/// Builds [`TopologyIndex`] values
#[derive(Debug, Clone, Default)]
pub struct TopologyIndexer {
    tags: GenerationTags,
}

impl TopologyIndexer {
    /// Create an indexer for a custom tag list
    pub fn new(tags: GenerationTags) -> Self {
        Self { tags }
    }

    /// Index every device
    ///
    /// Only groups with both work queues and engines are recorded; devices are
    /// always present, possibly with no groups. A device whose name carries no
    /// known tag fails the whole call.
    pub fn index(&self, devices: &[DeviceDescriptor]) -> Result<TopologyIndex> {
        let mut index = TopologyIndex::default();

        for device in devices {
            let generation = self
                .tags
                .infer(&device.name)
                .ok_or_else(|| AccelError::UnknownGeneration(device.name.clone()))?;

            let groups = index
                .generations
                .entry(generation.to_string())
                .or_default()
                .entry(device.numa_node)
                .or_default()
                .entry(device.name.clone())
                .or_default();

            for group in &device.groups {
                if !(group.has_work_queues() && group.has_engines()) {
                    continue;
                }
                let binding = groups.entry(group.name.clone()).or_default();
                binding.work_queues.extend(group.work_queue_names());
                binding.engines.extend(group.engine_names());
            }
        }

        Ok(index)
    }
}

/// Index devices with the default `iax`, `dsa` tags
pub fn index(devices: &[DeviceDescriptor]) -> Result<TopologyIndex> {
    TopologyIndexer::default().index(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::GroupDescriptor;
    use crate::error::ErrorKind;

    fn fleet() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new("iax1", 0).with_group(
                GroupDescriptor::new("group1.0")
                    .with_work_queues(["wq1.0", "wq1.1"])
                    .with_engines(["engine1.0", "engine1.1"]),
            ),
            DeviceDescriptor::new("dsa0", 0)
                .with_group(GroupDescriptor::new("group0.0").with_work_queues(["wq0.0"]).with_engines(["engine0.0"]))
                .with_group(GroupDescriptor::new("group0.1").with_engines(["engine0.1"])),
            DeviceDescriptor::new("iax3", 1).with_group(
                GroupDescriptor::new("group3.0")
                    .with_work_queues(["wq3.0"])
                    .with_engines(["engine3.0"]),
            ),
        ]
    }

    #[test]
    fn test_index_buckets_by_generation_and_numa() {
        let index = index(&fleet()).unwrap();

        assert_eq!(index.generations().collect::<Vec<_>>(), vec!["dsa", "iax"]);
        assert_eq!(index.device_count(), 3);

        let iax1 = index.device("iax", 0, "iax1").unwrap();
        assert_eq!(iax1["group1.0"].work_queues, vec!["wq1.0", "wq1.1"]);
        assert_eq!(iax1["group1.0"].engines, vec!["engine1.0", "engine1.1"]);

        let iax3 = index.device("iax", 1, "iax3").unwrap();
        assert_eq!(iax3["group3.0"].work_queues, vec!["wq3.0"]);

        // group0.1 has engines but no work queues
        let dsa0 = index.device("dsa", 0, "dsa0").unwrap();
        assert_eq!(dsa0.len(), 1);
        assert!(dsa0.contains_key("group0.0"));
    }

    #[test]
    fn test_groups_missing_either_list_are_skipped() {
        let devices = vec![
            DeviceDescriptor::new("iax1", 0)
                .with_group(GroupDescriptor::new("group1.0").with_work_queues(["wq1.0"]))
                .with_group(GroupDescriptor::new("group1.1").with_engines(["engine1.0"])),
            DeviceDescriptor::new("iax3", 0),
        ];
        let index = index(&devices).unwrap();

        assert_eq!(index.device_count(), 2);
        assert!(index.device("iax", 0, "iax1").unwrap().is_empty());
        assert!(index.device("iax", 0, "iax3").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_generation() {
        let devices = vec![DeviceDescriptor::new("qat0", 0)];
        let err = index(&devices).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownGeneration);
        assert!(err.to_string().contains("qat0"));
    }

    #[test]
    fn test_custom_generation_tags() {
        let indexer = TopologyIndexer::new(GenerationTags::new(["qat", "iax"]));
        let devices = vec![DeviceDescriptor::new("qat0", 0), DeviceDescriptor::new("iax1", 0)];
        let index = indexer.index(&devices).unwrap();

        assert_eq!(index.generations().collect::<Vec<_>>(), vec!["iax", "qat"]);
        assert!(indexer.index(&[DeviceDescriptor::new("dsa0", 0)]).is_err());
    }

    #[test]
    fn test_tag_priority() {
        let tags = GenerationTags::default();
        assert_eq!(tags.infer("iax1"), Some("iax"));
        assert_eq!(tags.infer("dsa2"), Some("dsa"));
        assert_eq!(tags.infer("dsa-iax"), Some("iax"));
        assert_eq!(tags.infer("qat0"), None);
    }

    #[test]
    fn test_empty_inventory_is_empty_index() {
        let index = index(&[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.device_count(), 0);
    }

    #[test]
    fn test_serializes_as_nested_maps() {
        let index = index(&fleet()[..1]).unwrap();
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(
            json["iax"]["0"]["iax1"]["group1.0"]["work_queues"],
            serde_json::json!(["wq1.0", "wq1.1"])
        );
    }
}
