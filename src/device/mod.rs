//! Device inventory module
//!
//! Typed inventory records and the `accel-config` client used to read and
//! mutate the fleet.

mod model;
pub mod tool;

pub use model::*;
pub use tool::{
    AccelConfig, CommandRunner, CommandSpec, SystemRunner, ToolConfig, ToolOutput, ToolStatus,
    DEFAULT_ELEVATE_WITH, DEFAULT_TOOL,
};
