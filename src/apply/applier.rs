//! Configuration applier
//!
//! Reconfigures the fleet from a desired-state file in strictly sequential
//! steps: disable active devices, load the file, optionally force
//! block-on-fault, enable devices and their work queues, verify.
//!
//! Tool failures are recorded and the run continues. Only a missing file, or
//! a desired-state file that is not valid JSON, ends the run in
//! [`ApplyState::Failed`].

use std::path::Path;

use crate::apply::report::{
    Action, ApplyState, ConfigReport, Outcome, ReportedError, StepRecord, VerifiedGroup,
};
use crate::device::{load_desired_state, AccelConfig, CommandRunner, DeviceDescriptor, SystemRunner, ToolOutput};
use crate::error::{AccelError, Result};

/// Per-run options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Only devices whose name contains this are touched
    pub filter: String,
    /// Force block-on-fault on every configured work queue
    pub block_on_fault: bool,
    /// Prefix every tool call with the escalation wrapper
    pub elevated: bool,
}

/// Drives a configuration run against the fleet
#[derive(Debug, Clone)]
pub struct ConfigApplier<R = SystemRunner> {
    tool: AccelConfig<R>,
}

impl<R: CommandRunner> ConfigApplier<R> {
    /// Create an applier on top of a tool client
    pub fn new(tool: AccelConfig<R>) -> Self {
        Self { tool }
    }

    /// Apply `config_file` and report what happened
    ///
    /// Runs must not overlap: nothing here locks the fleet.
    pub fn apply(&self, config_file: &Path, options: &ApplyOptions) -> ConfigReport {
        let mut run = Run {
            tool: self.tool.with_elevation(options.elevated),
            options,
            report: ConfigReport::new(
                config_file,
                options.filter.as_str(),
                options.block_on_fault,
                options.elevated,
            ),
        };

        tracing::info!(
            "Applying {} (filter '{}', block on fault: {})",
            config_file.display(),
            options.filter,
            options.block_on_fault
        );

        if !config_file.exists() {
            run.fail(AccelError::ConfigFileNotFound(config_file.to_path_buf()));
            return run.finish();
        }

        run.disable_active();

        run.transition(ApplyState::Loading);
        run.load(config_file);
        let desired = match load_desired_state(config_file) {
            Ok(devices) => devices,
            Err(e) => {
                run.fail(e);
                return run.finish();
            }
        };

        if options.block_on_fault {
            run.transition(ApplyState::TuningFaultHandling);
            run.force_block_on_fault(&desired);
        }

        run.transition(ApplyState::Enabling);
        run.enable(&desired);

        run.transition(ApplyState::Verifying);
        run.verify();

        run.transition(ApplyState::Done);
        run.finish()
    }
}

/// State of one configuration run
struct Run<'a, R> {
    tool: AccelConfig<&'a R>,
    options: &'a ApplyOptions,
    report: ConfigReport,
}

impl<R: CommandRunner> Run<'_, R> {
    fn transition(&mut self, next: ApplyState) {
        tracing::debug!("{} -> {}", self.report.state, next);
        self.report.state = next;
    }

    fn fail(&mut self, error: AccelError) {
        tracing::error!("{}", error);
        self.report
            .errors
            .push(ReportedError::new(self.report.state, None, &error));
        self.transition(ApplyState::Failed);
    }

    fn finish(mut self) -> ConfigReport {
        self.report.finished_at = Some(chrono::Utc::now());
        self.report
    }

    fn skip(&mut self, action: Action, target: &str) {
        tracing::debug!("Skipping {:?} for {}", action, target);
        self.report.records.push(StepRecord {
            action,
            target: target.to_string(),
            outcome: Outcome::Skipped,
        });
    }

    fn record(&mut self, action: Action, target: String, result: Result<ToolOutput>) {
        let outcome = match result {
            Ok(_) => Outcome::Done,
            Err(e) => {
                tracing::warn!("{:?} {} failed: {}", action, target, e);
                self.report
                    .errors
                    .push(ReportedError::new(action.step(), Some(target.clone()), &e));
                Outcome::Error {
                    message: e.to_string(),
                }
            }
        };
        self.report.records.push(StepRecord {
            action,
            target,
            outcome,
        });
    }

    /// Record a failure that has no single target
    fn record_error(&mut self, error: AccelError) {
        tracing::warn!("{} step failed: {}", self.report.state, error);
        self.report
            .errors
            .push(ReportedError::new(self.report.state, None, &error));
    }

    fn disable_active(&mut self) {
        self.transition(ApplyState::Disabling);

        let active = match self.tool.fetch_active() {
            Ok(devices) => devices,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };
        if active.is_empty() {
            tracing::info!("No active devices");
        }

        let options = self.options;
        let filter = options.filter.as_str();
        for device in &active {
            if device.matches(filter) {
                let result = self.tool.disable_device(&device.name);
                self.record(Action::DisableDevice, device.name.clone(), result);
            } else {
                self.skip(Action::DisableDevice, &device.name);
            }
        }
    }

    fn load(&mut self, config_file: &Path) {
        let result = self.tool.load_config(config_file);
        self.record(Action::LoadConfig, config_file.display().to_string(), result);
    }

    fn force_block_on_fault(&mut self, desired: &[DeviceDescriptor]) {
        let options = self.options;
        let filter = options.filter.as_str();
        for device in desired.iter().filter(|d| d.matches(filter)) {
            for wq in device.first_group_work_queues() {
                let result = self.tool.set_block_on_fault(&device.name, &wq.name, true);
                self.record(
                    Action::SetBlockOnFault,
                    format!("{}/{}", device.name, wq.name),
                    result,
                );
            }
        }
    }

    fn enable(&mut self, desired: &[DeviceDescriptor]) {
        let options = self.options;
        let filter = options.filter.as_str();
        for device in desired {
            if !device.matches(filter) {
                self.skip(Action::EnableDevice, &device.name);
                continue;
            }

            let result = self.tool.enable_device(&device.name);
            self.record(Action::EnableDevice, device.name.clone(), result);

            // Work queues are enabled even if the device step failed
            for wq in device.first_group_work_queues() {
                let result = self.tool.enable_wq(&device.name, &wq.name);
                self.record(
                    Action::EnableWorkQueue,
                    format!("{}/{}", device.name, wq.name),
                    result,
                );
            }
        }
    }

    fn verify(&mut self) {
        let mut active = match self.tool.fetch_active() {
            Ok(devices) => devices,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };
        active.sort_by(|a, b| a.name.cmp(&b.name));

        for device in &active {
            for group in &device.groups {
                if !group.has_work_queues() && !group.has_engines() {
                    continue;
                }
                self.report.verification.push(VerifiedGroup {
                    numa_node: device.numa_node,
                    device: device.name.clone(),
                    group: group.name.clone(),
                    work_queues: group.work_queue_names(),
                    engines: group.engine_names(),
                });
            }
        }

        if self.report.verification.is_empty() {
            tracing::info!("No active devices after configuration");
        }
    }
}
