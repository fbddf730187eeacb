//! Topology reporting module
//!
//! Read-only views over a device inventory: the compact uniform summary used
//! for benchmark keys, and the nested index used for inspection.

pub mod aggregate;
pub mod index;

pub use aggregate::{aggregate, TopologySummary, TopologyWarning};
pub use index::{index, GenerationTags, GroupBinding, TopologyIndex, TopologyIndexer};
