//! accel-config integration
//!
//! Every interaction with the accelerator fleet goes through the external
//! `accel-config` command. Calls are blocking and issued one at a time; a
//! non-zero exit status becomes [`AccelError::ToolInvocation`] with the
//! captured output attached, and nothing is retried.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::device::model::{parse_devices, DeviceDescriptor};
use crate::error::{AccelError, Result};

/// Default name of the device-management command
pub const DEFAULT_TOOL: &str = "accel-config";

/// Default privilege-escalation wrapper
pub const DEFAULT_ELEVATE_WITH: &str = "sudo";

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Start a command line for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Prefix the command line with a wrapper such as `sudo`
    pub fn wrapped(self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: wrapper.to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Check if the command exited with status zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a [`AccelError::ToolInvocation`]
    pub fn into_result(self, spec: &CommandSpec) -> Result<ToolOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(AccelError::tool_invocation(
                spec.to_string(),
                self.code,
                self.stderr,
                self.stdout,
            ))
        }
    }
}

/// Executes command lines
///
/// [`SystemRunner`] spawns real processes; tests substitute a scripted runner.
pub trait CommandRunner {
    /// Run the command to completion and capture its output
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput> {
        (**self).run(spec)
    }
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| AccelError::ToolSpawn {
                program: spec.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How the device-management command is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Program name or path
    pub program: String,
    /// Prefix every call with the escalation wrapper
    pub elevated: bool,
    /// Escalation wrapper program
    pub elevate_with: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_TOOL.to_string(),
            elevated: false,
            elevate_with: DEFAULT_ELEVATE_WITH.to_string(),
        }
    }
}

/// Tool availability status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// Tool answered the version probe
    Available(String),
    /// Tool could not be started
    NotInstalled,
    /// Tool started but the version probe failed
    ValidationFailed(String),
}

/// Client for the `accel-config` command
#[derive(Debug, Clone)]
pub struct AccelConfig<R = SystemRunner> {
    config: ToolConfig,
    runner: R,
}

impl AccelConfig<SystemRunner> {
    /// Create a client that spawns real processes
    pub fn system(config: ToolConfig) -> Self {
        Self::new(config, SystemRunner)
    }
}

impl<R: CommandRunner> AccelConfig<R> {
    /// Create a client with a custom runner
    pub fn new(config: ToolConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Invocation settings
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Borrow this client with elevation switched on or off
    pub fn with_elevation(&self, elevated: bool) -> AccelConfig<&R> {
        AccelConfig {
            config: ToolConfig {
                elevated,
                ..self.config.clone()
            },
            runner: &self.runner,
        }
    }

    /// Build the command line for a subcommand
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(&self.config.program).args(args);
        if self.config.elevated {
            spec.wrapped(&self.config.elevate_with)
        } else {
            spec
        }
    }

    fn invoke(&self, spec: CommandSpec) -> Result<ToolOutput> {
        tracing::debug!("Running {}", spec);
        let output = self.runner.run(&spec)?;
        if !output.success() {
            tracing::debug!("{} exited with {:?}", spec, output.code);
        }
        output.into_result(&spec)
    }

    fn list(&self, spec: CommandSpec) -> Result<Vec<DeviceDescriptor>> {
        let context = spec.to_string();
        let output = self.invoke(spec)?;
        parse_devices(&output.stdout, &context)
    }

    /// Fetch the enabled devices (`list`)
    pub fn fetch_active(&self) -> Result<Vec<DeviceDescriptor>> {
        self.list(self.command(["list"]))
    }

    /// Fetch every device, including disabled ones (`list -i`)
    pub fn fetch_all(&self) -> Result<Vec<DeviceDescriptor>> {
        self.list(self.command(["list", "-i"]))
    }

    /// Load a desired-state configuration file
    pub fn load_config(&self, config_file: &Path) -> Result<ToolOutput> {
        let file = config_file.display().to_string();
        self.invoke(self.command(["load-config", "-v", "-c", file.as_str()]))
    }

    /// Disable one device
    pub fn disable_device(&self, device: &str) -> Result<ToolOutput> {
        self.invoke(self.command(["disable-device", "-v", device]))
    }

    /// Enable one device
    pub fn enable_device(&self, device: &str) -> Result<ToolOutput> {
        self.invoke(self.command(["enable-device", "-v", device]))
    }

    /// Enable one work queue of a device
    pub fn enable_wq(&self, device: &str, wq: &str) -> Result<ToolOutput> {
        let target = format!("{}/{}", device, wq);
        self.invoke(self.command(["enable-wq", "-v", target.as_str()]))
    }

    /// Set or clear the block-on-fault flag of a work queue
    pub fn set_block_on_fault(&self, device: &str, wq: &str, block: bool) -> Result<ToolOutput> {
        let target = format!("{}/{}", device, wq);
        let flag = if block { "1" } else { "0" };
        self.invoke(self.command(["config-wq", target.as_str(), "-b", flag]))
    }

    /// Probe the tool with `--version`
    pub fn detect(&self) -> ToolStatus {
        let spec = CommandSpec::new(&self.config.program).arg("--version");
        match self.runner.run(&spec) {
            Ok(output) if output.success() => ToolStatus::Available(output.stdout.trim().to_string()),
            Ok(output) => ToolStatus::ValidationFailed(output.stderr.trim().to_string()),
            Err(_) => ToolStatus::NotInstalled,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted runner for exercising the pipeline without hardware

    use super::*;
    use std::cell::RefCell;

    /// A canned response for commands whose arguments contain `pattern`
    struct Rule {
        pattern: String,
        responses: Vec<ToolOutput>,
    }

    /// Records every command line and answers from a script
    ///
    /// Rules are matched in insertion order against the space-joined
    /// arguments, at the start or after a space. A rule with several responses hands them out in order and
    /// repeats the last one. Unmatched commands succeed with empty output.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: RefCell<Vec<Rule>>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, pattern: &str, output: ToolOutput) -> Self {
            self.rules.borrow_mut().push(Rule {
                pattern: pattern.to_string(),
                responses: vec![output],
            });
            self
        }

        pub fn respond_seq(self, pattern: &str, outputs: Vec<ToolOutput>) -> Self {
            self.rules.borrow_mut().push(Rule {
                pattern: pattern.to_string(),
                responses: outputs,
            });
            self
        }

        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.borrow().clone()
        }

        pub fn call_lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.to_string()).collect()
        }

        pub fn count(&self, needle: &str) -> usize {
            self.call_lines().iter().filter(|l| l.contains(needle)).count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<ToolOutput> {
            self.calls.borrow_mut().push(spec.clone());
            let line = spec.args.join(" ");
            let mut rules = self.rules.borrow_mut();
            for rule in rules.iter_mut() {
                if line.starts_with(&rule.pattern) || line.contains(&format!(" {}", rule.pattern)) {
                    let output = if rule.responses.len() > 1 {
                        rule.responses.remove(0)
                    } else {
                        rule.responses.first().cloned().unwrap_or_else(ok)
                    };
                    return Ok(output);
                }
            }
            Ok(ok())
        }
    }

    pub fn ok() -> ToolOutput {
        ToolOutput {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn stdout(json: &str) -> ToolOutput {
        ToolOutput {
            code: Some(0),
            stdout: json.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> ToolOutput {
        ToolOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}
