//! Error types for accelcfg
//!
//! This module defines the error taxonomy shared by the inventory reader,
//! the topology reporters and the configuration applier.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for accelcfg operations
#[derive(Error, Debug)]
pub enum AccelError {
    /// The external device-management command exited with a non-zero status
    #[error("'{command}' failed with exit code {}: {}", display_code(.code), .stderr.trim())]
    ToolInvocation {
        command: String,
        code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    /// The external device-management command could not be started
    #[error("Failed to run '{program}': {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Inventory or desired-state JSON could not be decoded
    #[error("Invalid JSON in {context}: {source}")]
    JsonDecode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Desired-state configuration file is missing
    #[error("Configuration file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    /// Aggregation requested on an empty device list
    #[error("No devices in inventory (filter '{filter}')")]
    EmptyInventory { filter: String },

    /// Device name carries no known generation tag
    #[error("Unknown device generation for '{0}'")]
    UnknownGeneration(String),

    /// I/O error while reading a local file
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string())
}

/// Serializable classification of an [`AccelError`], used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolInvocation,
    ToolSpawn,
    JsonDecode,
    ConfigFileNotFound,
    EmptyInventory,
    UnknownGeneration,
    Io,
    Config,
}

impl AccelError {
    /// Create a tool invocation error from a finished command
    pub fn tool_invocation(
        command: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
        stdout: impl Into<String>,
    ) -> Self {
        Self::ToolInvocation {
            command: command.into(),
            code,
            stderr: stderr.into(),
            stdout: stdout.into(),
        }
    }

    /// Create a JSON decode error with a description of what was decoded
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonDecode {
            context: context.into(),
            source,
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolInvocation { .. } => ErrorKind::ToolInvocation,
            Self::ToolSpawn { .. } => ErrorKind::ToolSpawn,
            Self::JsonDecode { .. } => ErrorKind::JsonDecode,
            Self::ConfigFileNotFound(_) => ErrorKind::ConfigFileNotFound,
            Self::EmptyInventory { .. } => ErrorKind::EmptyInventory,
            Self::UnknownGeneration(_) => ErrorKind::UnknownGeneration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if the configuration applier records this error and keeps going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ToolInvocation { .. } | Self::ToolSpawn { .. })
    }

    /// Captured standard error of a failed tool call, if any
    pub fn tool_stderr(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }
}

/// Result type alias for accelcfg operations
pub type Result<T> = std::result::Result<T, AccelError>;
