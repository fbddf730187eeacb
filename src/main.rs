//! accelcfg CLI - Accelerator Topology and Configuration Tool
//!
//! Lists, summarizes and reconfigures IAA/DSA devices through accel-config.

use accelcfg::apply::{ApplyOptions, ConfigApplier};
use accelcfg::config::{CliArgs, Commands, OutputFormat};
use accelcfg::device::{AccelConfig, DeviceDescriptor, ToolConfig, ToolStatus};
use accelcfg::error::{AccelError, Result};
use accelcfg::topology::{aggregate, GenerationTags, TopologyIndexer};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging; RUST_LOG overrides -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Dispatch the subcommand; `Ok(false)` means it ran but did not succeed
fn run(args: &CliArgs) -> Result<bool> {
    let tool_config = ToolConfig::from_cli(args).map_err(AccelError::Config)?;
    let tool = AccelConfig::system(tool_config);

    match &args.command {
        Commands::List { all } => {
            let devices = if *all { tool.fetch_all()? } else { tool.fetch_active()? };
            emit(args.output_format, &devices, || print_devices(&devices))?;
            Ok(true)
        }
        Commands::Aggregate { filter } => {
            let devices = tool.fetch_active()?;
            let summary = aggregate(&devices, filter)?;
            emit(args.output_format, &summary, || summary.print_summary())?;
            Ok(true)
        }
        Commands::Index { generations } => {
            let devices = tool.fetch_active()?;
            let indexer = TopologyIndexer::new(GenerationTags::from_cli(generations));
            let index = indexer.index(&devices)?;
            emit(args.output_format, &index, || index.print_tree())?;
            Ok(true)
        }
        Commands::Load { config_file, .. } => {
            let options = ApplyOptions::from_cli(args)
                .ok_or_else(|| AccelError::config("load options missing"))?;
            let applier = ConfigApplier::new(tool);
            let report = applier.apply(config_file, &options);
            emit(args.output_format, &report, || report.print_summary())?;
            Ok(report.is_success())
        }
        Commands::Check => cmd_check(&tool, args.output_format),
    }
}

fn cmd_check(tool: &AccelConfig, format: OutputFormat) -> Result<bool> {
    let program = tool.config().program.clone();
    let status = tool.detect();

    let (available, detail) = match &status {
        ToolStatus::Available(version) => (true, version.clone()),
        ToolStatus::NotInstalled => (false, format!("{} is not installed or not on PATH", program)),
        ToolStatus::ValidationFailed(stderr) => (false, stderr.clone()),
    };

    let value = serde_json::json!({
        "program": program,
        "available": available,
        "detail": detail,
    });
    emit(format, &value, || {
        if available {
            println!("{}: available (version {})", program, detail);
        } else {
            println!("{}: unavailable ({})", program, detail);
        }
    })?;

    Ok(available)
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Text => text(),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| AccelError::json("report output", e))?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn print_devices(devices: &[DeviceDescriptor]) {
    if devices.is_empty() {
        println!("No devices reported");
        return;
    }

    println!("=== Devices ===");
    for device in devices {
        println!("{} (NUMA {})", device.name, device.numa_node);
        for group in &device.groups {
            if !group.has_work_queues() && !group.has_engines() {
                continue;
            }
            println!(
                "  {:<10} wqs: [{}]  engines: [{}]",
                group.name,
                group.work_queue_names().join(", "),
                group.engine_names().join(", ")
            );
        }
    }
}
