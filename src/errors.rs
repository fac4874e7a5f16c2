// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every failure that happened after the subprocess produced output carries
//! that output, so callers can surface the raw stdout/stderr.

use std::time::Duration;

use thiserror::Error;

use crate::exec::CapturedOutput;
use crate::types::RecoverableSignature;

#[derive(Error, Debug)]
pub enum DevctlError {
    #[error("failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("no target available: {}", .output.stderr)]
    NoTarget { output: CapturedOutput },

    #[error("command timed out after {}ms", .elapsed.as_millis())]
    Timeout {
        elapsed: Duration,
        output: CapturedOutput,
    },

    #[error("wrong command: output is the tool's usage text")]
    WrongCommand { output: CapturedOutput },

    #[error("recoverable failure ({signature})")]
    Recoverable {
        signature: RecoverableSignature,
        output: CapturedOutput,
    },

    #[error("unrecognised output (stdout: {:?}, stderr: {:?})", .output.stdout, .output.stderr)]
    Unknown { output: CapturedOutput },

    #[error("failed to connect to {target} after {attempts} attempt(s)")]
    ConnectFail { target: String, attempts: u32 },

    #[error("{reason}")]
    CommandFailed {
        reason: String,
        output: CapturedOutput,
    },

    #[error("usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevctlError {
    /// The failure category the recovery wrapper switches on, if any.
    pub fn signature(&self) -> Option<RecoverableSignature> {
        match self {
            DevctlError::Recoverable { signature, .. } => Some(*signature),
            DevctlError::NoTarget { .. } => Some(RecoverableSignature::NoTargetFound),
            DevctlError::Timeout { .. } => Some(RecoverableSignature::GenericTimeout),
            _ => None,
        }
    }

    /// Captured stdout/stderr attached to this failure, if any.
    pub fn output(&self) -> Option<&CapturedOutput> {
        match self {
            DevctlError::NoTarget { output }
            | DevctlError::Timeout { output, .. }
            | DevctlError::WrongCommand { output }
            | DevctlError::Recoverable { output, .. }
            | DevctlError::Unknown { output }
            | DevctlError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevctlError>;
