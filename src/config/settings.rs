//! Configuration settings for accelcfg
//!
//! Defines the CLI arguments and their conversion into runtime settings.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::apply::ApplyOptions;
use crate::device::{ToolConfig, DEFAULT_ELEVATE_WITH, DEFAULT_TOOL};
use crate::topology::GenerationTags;

/// accelcfg - accelerator topology and configuration tool
#[derive(Parser, Debug, Clone)]
#[command(name = "accelcfg")]
#[command(author = "accelcfg Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and reconfigure IAA/DSA accelerator fleets through accel-config")]
#[command(long_about = r#"
accelcfg inspects and reconfigures hardware accelerator devices through the
accel-config command.

Examples:
  accelcfg list --all                          # Every device, including disabled ones
  accelcfg aggregate --filter iax              # Uniform topology summary and config key
  accelcfg index                               # Nested generation/node/device/group view
  accelcfg --root load iax_1n1d8e8w.conf --filter iax --bof
"#)]
pub struct CliArgs {
    /// Device-management command
    #[arg(long, env = "ACCELCFG_TOOL", default_value = DEFAULT_TOOL, value_name = "PROG", global = true)]
    pub tool: String,

    /// Run every accel-config call through the escalation wrapper
    #[arg(long, global = true)]
    pub root: bool,

    /// Escalation wrapper used with --root
    #[arg(long, env = "ACCELCFG_ELEVATE_WITH", default_value = DEFAULT_ELEVATE_WITH, value_name = "PROG", global = true)]
    pub elevate_with: String,

    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the device inventory
    #[command(name = "list")]
    List {
        /// Include disabled devices
        #[arg(short, long)]
        all: bool,
    },

    /// Summarize the topology of one device generation
    #[command(name = "aggregate")]
    Aggregate {
        /// Device name filter
        #[arg(short, long, default_value = "iax")]
        filter: String,
    },

    /// Show the nested topology index
    #[command(name = "index")]
    Index {
        /// Generation tag, in priority order (repeatable; default: iax, dsa)
        #[arg(short, long = "generation", value_name = "TAG")]
        generations: Vec<String>,
    },

    /// Apply a desired-state configuration file
    #[command(name = "load")]
    Load {
        /// Configuration file
        #[arg(value_name = "FILE")]
        config_file: PathBuf,
        /// Device name filter (empty matches every device)
        #[arg(short, long, default_value = "")]
        filter: String,
        /// Set the block-on-fault flag on every configured work queue
        #[arg(long)]
        bof: bool,
    },

    /// Check that accel-config can be run
    #[command(name = "check")]
    Check,
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

impl CliArgs {
    /// Default log filter when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl ToolConfig {
    /// Create tool settings from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        if args.tool.trim().is_empty() {
            return Err("Tool name must not be empty".to_string());
        }
        if args.root && args.elevate_with.trim().is_empty() {
            return Err("--root requires a non-empty --elevate-with".to_string());
        }

        Ok(Self {
            program: args.tool.clone(),
            elevated: args.root,
            elevate_with: args.elevate_with.clone(),
        })
    }
}

impl ApplyOptions {
    /// Create run options for a `load` command
    pub fn from_cli(args: &CliArgs) -> Option<Self> {
        match &args.command {
            Commands::Load { filter, bof, .. } => Some(Self {
                filter: filter.clone(),
                block_on_fault: *bof,
                elevated: args.root,
            }),
            _ => None,
        }
    }
}

impl GenerationTags {
    /// Tag list from `--generation` flags, or the default one
    pub fn from_cli(generations: &[String]) -> Self {
        if generations.is_empty() {
            Self::default()
        } else {
            Self::new(generations.iter().cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("accelcfg").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_load_command() {
        let args = parse(&["--root", "load", "iax.conf", "--filter", "iax", "--bof"]);

        let options = ApplyOptions::from_cli(&args).unwrap();
        assert_eq!(options.filter, "iax");
        assert!(options.block_on_fault);
        assert!(options.elevated);

        let tool = ToolConfig::from_cli(&args).unwrap();
        assert!(tool.elevated);
        assert_eq!(tool.elevate_with, "sudo");
        assert_eq!(tool.program, "accel-config");

        match args.command {
            Commands::Load { config_file, .. } => assert_eq!(config_file, PathBuf::from("iax.conf")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_load_defaults() {
        let args = parse(&["load", "dsa.conf"]);
        let options = ApplyOptions::from_cli(&args).unwrap();
        assert_eq!(options, ApplyOptions::default());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["aggregate", "--tool", "/opt/accel/bin/accel-config", "-vv"]);
        assert_eq!(args.tool, "/opt/accel/bin/accel-config");
        assert_eq!(args.log_level(), "debug");
        assert!(ApplyOptions::from_cli(&args).is_none());

        match args.command {
            Commands::Aggregate { filter } => assert_eq!(filter, "iax"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tool_settings() {
        let args = parse(&["--root", "--elevate-with", "", "check"]);
        assert!(ToolConfig::from_cli(&args).is_err());

        let args = parse(&["--tool", " ", "check"]);
        assert!(ToolConfig::from_cli(&args).is_err());
    }

    #[test]
    fn test_generation_flags() {
        let args = parse(&["index", "-g", "dsa", "-g", "iax"]);
        match args.command {
            Commands::Index { generations } => {
                let tags = GenerationTags::from_cli(&generations);
                assert_eq!(tags.tags(), &["dsa".to_string(), "iax".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(GenerationTags::from_cli(&[]), GenerationTags::default());
    }

    #[test]
    fn test_quiet_wins() {
        let args = parse(&["-q", "-v", "list"]);
        assert_eq!(args.log_level(), "error");
    }
}
