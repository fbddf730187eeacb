//! Configuration applier module
//!
//! Reconfigures devices from a desired-state file and reports every step.

mod applier;
mod report;

pub use applier::{ApplyOptions, ConfigApplier};
pub use report::*;
