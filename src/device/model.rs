//! Device inventory records
//!
//! Strongly typed view of the JSON emitted by `accel-config list` and read
//! from desired-state configuration files. Only the fields the pipeline uses
//! are modelled; everything else the tool prints is ignored on decode.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AccelError, Result};

/// One hardware accelerator device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device name, e.g. `iax1` or `dsa0`
    #[serde(rename = "dev")]
    pub name: String,
    /// NUMA node affinity (`-1` when the platform reports none)
    pub numa_node: i32,
    /// Groups in the order the tool reports them
    #[serde(default)]
    pub groups: Vec<GroupDescriptor>,
}

/// A work-queue/engine binding group within a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Group name, e.g. `group1.0`
    #[serde(rename = "dev")]
    pub name: String,
    /// Work queues bound to this group
    #[serde(rename = "grouped_workqueues", default)]
    pub work_queues: Vec<WorkQueueDescriptor>,
    /// Engines bound to this group
    #[serde(rename = "grouped_engines", default)]
    pub engines: Vec<EngineDescriptor>,
}

/// A work queue bound to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkQueueDescriptor {
    /// Work queue name, e.g. `wq1.0`
    #[serde(rename = "dev")]
    pub name: String,
}

/// A processing engine bound to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Engine name, e.g. `engine1.0`
    #[serde(rename = "dev")]
    pub name: String,
}

impl DeviceDescriptor {
    /// Create a device with no groups
    pub fn new(name: impl Into<String>, numa_node: i32) -> Self {
        Self {
            name: name.into(),
            numa_node,
            groups: Vec::new(),
        }
    }

    /// Add a group (builder style)
    pub fn with_group(mut self, group: GroupDescriptor) -> Self {
        self.groups.push(group);
        self
    }

    /// Check whether the device name contains a generation filter
    ///
    /// An empty filter matches every device.
    pub fn matches(&self, filter: &str) -> bool {
        self.name.contains(filter)
    }

    /// The first group with at least one work queue
    pub fn active_group(&self) -> Option<&GroupDescriptor> {
        self.groups.iter().find(|g| g.has_work_queues())
    }

    /// Number of groups with at least one work queue
    pub fn groups_with_work_queues(&self) -> usize {
        self.groups.iter().filter(|g| g.has_work_queues()).count()
    }

    /// Work queues of the first group, as listed in a desired-state file
    pub fn first_group_work_queues(&self) -> &[WorkQueueDescriptor] {
        self.groups
            .first()
            .map(|g| g.work_queues.as_slice())
            .unwrap_or_default()
    }
}

impl GroupDescriptor {
    /// Create an empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            work_queues: Vec::new(),
            engines: Vec::new(),
        }
    }

    /// Add work queues by name (builder style)
    pub fn with_work_queues<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.work_queues
            .extend(names.into_iter().map(|name| WorkQueueDescriptor { name: name.into() }));
        self
    }

    /// Add engines by name (builder style)
    pub fn with_engines<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engines
            .extend(names.into_iter().map(|name| EngineDescriptor { name: name.into() }));
        self
    }

    /// Check if any work queue is bound
    pub fn has_work_queues(&self) -> bool {
        !self.work_queues.is_empty()
    }

    /// Check if any engine is bound
    pub fn has_engines(&self) -> bool {
        !self.engines.is_empty()
    }

    /// Work queue names in order
    pub fn work_queue_names(&self) -> Vec<String> {
        self.work_queues.iter().map(|wq| wq.name.clone()).collect()
    }

    /// Engine names in order
    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name.clone()).collect()
    }
}

/// Decode a device list from JSON text
///
/// Whitespace-only input is an empty inventory: `accel-config list` prints
/// nothing when no device is enabled.
pub fn parse_devices(json: &str, context: &str) -> Result<Vec<DeviceDescriptor>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|e| AccelError::json(context, e))
}

/// Read a desired-state configuration file
pub fn load_desired_state(path: &Path) -> Result<Vec<DeviceDescriptor>> {
    if !path.exists() {
        return Err(AccelError::ConfigFileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| AccelError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| AccelError::json(path.display().to_string(), e))
}
