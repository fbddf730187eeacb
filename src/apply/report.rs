//! Configuration run report
//!
//! The applier never prints; it returns a [`ConfigReport`] describing every
//! attempted action, every error and the verified end state. Console output
//! is rendered from the report by [`ConfigReport::print_summary`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{AccelError, ErrorKind};

/// Configuration run states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    /// Not started
    Idle,
    /// Disabling the currently active devices
    Disabling,
    /// Loading the desired-state file
    Loading,
    /// Forcing block-on-fault on configured work queues
    TuningFaultHandling,
    /// Enabling devices and work queues
    Enabling,
    /// Reading back the active topology
    Verifying,
    /// Finished
    Done,
    /// Aborted before the run could complete
    Failed,
}

impl ApplyState {
    /// Check if the run has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Disabling => "disabling",
            Self::Loading => "loading",
            Self::TuningFaultHandling => "tuning fault handling",
            Self::Enabling => "enabling",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Kind of mutation performed on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    DisableDevice,
    LoadConfig,
    SetBlockOnFault,
    EnableDevice,
    EnableWorkQueue,
}

impl Action {
    /// State during which this action runs
    pub fn step(&self) -> ApplyState {
        match self {
            Self::DisableDevice => ApplyState::Disabling,
            Self::LoadConfig => ApplyState::Loading,
            Self::SetBlockOnFault => ApplyState::TuningFaultHandling,
            Self::EnableDevice | Self::EnableWorkQueue => ApplyState::Enabling,
        }
    }
}

/// Result of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Tool call succeeded
    Done,
    /// Target did not match the filter; nothing was invoked
    Skipped,
    /// Tool call failed
    Error { message: String },
}

/// One attempted or skipped action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// What was done
    pub action: Action,
    /// Device, `device/wq` pair, or configuration file
    pub target: String,
    /// How it went
    pub outcome: Outcome,
}

impl StepRecord {
    /// Check if the tool was invoked for this record
    pub fn is_attempt(&self) -> bool {
        self.outcome != Outcome::Skipped
    }

    /// Check if the tool call failed
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error { .. })
    }
}

/// An error recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    /// State the run was in
    pub step: ApplyState,
    /// Error classification
    pub kind: ErrorKind,
    /// Target of the failed action, if any
    pub target: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Captured tool stderr
    pub stderr: Option<String>,
}

impl ReportedError {
    /// Capture an error at a given step
    pub fn new(step: ApplyState, target: Option<String>, error: &AccelError) -> Self {
        Self {
            step,
            kind: error.kind(),
            target,
            message: error.to_string(),
            stderr: error
                .tool_stderr()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// One group found bound after the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedGroup {
    /// NUMA node of the device
    pub numa_node: i32,
    /// Device name
    pub device: String,
    /// Group name
    pub group: String,
    /// Work queue names
    pub work_queues: Vec<String>,
    /// Engine names
    pub engines: Vec<String>,
}

/// Outcome of a configuration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigReport {
    /// Desired-state file
    pub config_file: PathBuf,
    /// Device filter
    pub filter: String,
    /// Whether block-on-fault tuning was requested
    pub block_on_fault: bool,
    /// Whether tool calls were elevated
    pub elevated: bool,
    /// Final state
    pub state: ApplyState,
    /// Every action, in execution order
    pub records: Vec<StepRecord>,
    /// Every error, in execution order
    pub errors: Vec<ReportedError>,
    /// Groups bound after the run, sorted by device
    pub verification: Vec<VerifiedGroup>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConfigReport {
    /// Create an empty report in the idle state
    pub fn new(config_file: impl Into<PathBuf>, filter: impl Into<String>, block_on_fault: bool, elevated: bool) -> Self {
        Self {
            config_file: config_file.into(),
            filter: filter.into(),
            block_on_fault,
            elevated,
            state: ApplyState::Idle,
            records: Vec::new(),
            errors: Vec::new(),
            verification: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Check if the run finished with no recorded error
    pub fn is_success(&self) -> bool {
        self.state == ApplyState::Done && self.errors.is_empty()
    }

    /// Records for one action
    pub fn records_for(&self, action: Action) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(move |r| r.action == action)
    }

    /// Records where the tool was invoked
    pub fn attempts(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(|r| r.is_attempt())
    }

    /// Records skipped by the filter
    pub fn skipped(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(|r| !r.is_attempt())
    }

    /// Errors of one kind
    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &ReportedError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
    }

    /// Print the step-by-step report to console
    pub fn print_summary(&self) {
        println!("Filter: {}", self.filter);

        if self.state == ApplyState::Failed && self.records.is_empty() {
            self.print_errors(None);
            return;
        }

        let disabled: Vec<_> = self.records_for(Action::DisableDevice).collect();
        if disabled.is_empty() {
            println!("No active devices");
        } else {
            println!("Disabling active devices");
            for record in disabled {
                println!("    {} - {}", record.target, outcome_label(&record.outcome));
            }
        }
        self.print_errors_without_target(ApplyState::Disabling);

        for record in self.records_for(Action::LoadConfig) {
            println!("Loading configuration - {}", outcome_label(&record.outcome));
            self.print_stderr(&record.target);
        }

        if self.state == ApplyState::Failed {
            self.print_errors(Some(ApplyState::Loading));
            return;
        }

        println!("Additional configuration steps");
        println!("    Force block on fault: {}", self.block_on_fault);
        for record in self.records_for(Action::SetBlockOnFault) {
            println!("        {} - {}", record.target, outcome_label(&record.outcome));
            self.print_stderr(&record.target);
        }

        println!("Enabling configured devices");
        for record in self.records_for(Action::EnableDevice) {
            println!("    {} - {}", record.target, outcome_label(&record.outcome));
            if !record.is_attempt() {
                continue;
            }
            let prefix = format!("{}/", record.target);
            let queues: Vec<_> = self
                .records_for(Action::EnableWorkQueue)
                .filter(|r| r.target.starts_with(&prefix))
                .collect();
            if queues.is_empty() {
                println!("        No work queues configured for the device");
            }
            for queue in queues {
                println!(
                    "        {} - {}",
                    &queue.target[prefix.len()..],
                    outcome_label(&queue.outcome)
                );
                self.print_stderr(&queue.target);
            }
        }

        println!("Checking configuration");
        self.print_errors_without_target(ApplyState::Verifying);
        if self.verification.is_empty() {
            println!("No active devices");
        }
        for group in &self.verification {
            println!(
                "    node: {}; device: {}; group: {}",
                group.numa_node, group.device, group.group
            );
            if !group.work_queues.is_empty() {
                println!("        wqs:     {}", group.work_queues.join(" "));
            }
            if !group.engines.is_empty() {
                println!("        engines: {}", group.engines.join(" "));
            }
        }

        println!();
        print!("Result: {}", self.state);
        if !self.errors.is_empty() {
            print!(" ({} errors)", self.errors.len());
        }
        if let Some(duration) = self.duration() {
            print!(" in {}", humantime::format_duration(truncate_millis(duration)));
        }
        println!();
    }

    fn print_stderr(&self, target: &str) {
        let stderr = self
            .errors
            .iter()
            .filter(|e| e.target.as_deref() == Some(target))
            .filter_map(|e| e.stderr.as_deref());
        for text in stderr {
            println!("---------");
            println!("{}", text);
            println!("---------");
        }
    }

    fn print_errors_without_target(&self, step: ApplyState) {
        for error in self.errors.iter().filter(|e| e.step == step && e.target.is_none()) {
            println!("    error: {}", error.message);
        }
    }

    fn print_errors(&self, step: Option<ApplyState>) {
        for error in self
            .errors
            .iter()
            .filter(|e| step.map_or(true, |s| e.step == s) && e.target.is_none())
        {
            println!("Error: {}", error.message);
        }
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Done => "done",
        Outcome::Skipped => "skipped",
        Outcome::Error { .. } => "error",
    }
}

fn truncate_millis(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis() as u64)
}
