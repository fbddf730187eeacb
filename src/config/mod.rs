//! Configuration module for accelcfg
//!
//! Provides the CLI arguments and their conversion into tool settings,
//! run options and generation tags.

mod settings;

pub use settings::*;
