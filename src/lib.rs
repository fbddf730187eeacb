//! # accelcfg - Accelerator Fleet Topology and Configuration
//!
//! accelcfg inspects and reconfigures IAA/DSA accelerator devices by driving
//! the external `accel-config` command and decoding its JSON inventory.
//!
//! ## Features
//!
//! - **Inventory**: Active or full device listings decoded into typed descriptors
//! - **Aggregation**: Uniform-topology summary with a compact config key (`1n1d8e8w`)
//! - **Indexing**: Generation / NUMA node / device / group view of the fleet
//! - **Configuration**: Disable, load, tune and re-enable devices from a desired-state file
//!
//! ## Quick Start
//!
//! ```no_run
//! use accelcfg::device::{AccelConfig, ToolConfig};
//! use accelcfg::topology::aggregate;
//!
//! let tool = AccelConfig::system(ToolConfig::default());
//! let devices = tool.fetch_active().unwrap();
//!
//! let summary = aggregate(&devices, "iax").unwrap();
//! println!("config key: {}", summary.config_key());
//! ```
//!
//! ## Applying a Configuration
//!
//! ```no_run
//! use accelcfg::apply::{ApplyOptions, ConfigApplier};
//! use accelcfg::device::{AccelConfig, ToolConfig};
//! use std::path::Path;
//!
//! let applier = ConfigApplier::new(AccelConfig::system(ToolConfig::default()));
//! let options = ApplyOptions {
//!     filter: "iax".to_string(),
//!     block_on_fault: true,
//!     elevated: true,
//! };
//!
//! let report = applier.apply(Path::new("iax_1n1d8e8w.conf"), &options);
//! report.print_summary();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod config;
pub mod device;
pub mod error;
pub mod topology;

// Re-export commonly used types
pub use apply::{ApplyOptions, ConfigApplier, ConfigReport};
pub use device::{AccelConfig, DeviceDescriptor, ToolConfig};
pub use error::{AccelError, Result};
pub use topology::{TopologyIndex, TopologySummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use accelcfg::prelude::*;
    //! ```

    pub use crate::apply::{ApplyOptions, ApplyState, ConfigApplier, ConfigReport};
    pub use crate::device::{
        load_desired_state, parse_devices, AccelConfig, CommandRunner, DeviceDescriptor,
        GroupDescriptor, ToolConfig, ToolStatus,
    };
    pub use crate::error::{AccelError, Result};
    pub use crate::topology::{aggregate, index, GenerationTags, TopologyIndex, TopologyIndexer, TopologySummary};
}
