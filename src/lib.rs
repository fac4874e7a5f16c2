// src/lib.rs

//! Subprocess execution core for a device-management tool.
//!
//! - [`exec`] runs single commands to completion ([`BlockingRunner`]) or
//!   keeps long-lived ones under control ([`NonBlockingHandle`]), tracking
//!   every child in a [`ProcessRegistry`].
//! - [`session`] composes those invocations into device operations with
//!   connection checks and one-shot recovery.

pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod session;
pub mod types;

use tracing::info;

pub use crate::config::ConfigFile;
pub use crate::errors::{DevctlError, Result};
pub use crate::exec::{
    BlockingRunner, CapturedOutput, Command, CommandBackend, HandleState, NoTargetPatterns,
    NonBlockingHandle, ProcessRegistry, StreamDrainer,
};
pub use crate::session::{DeviceSession, RecoveryAction, RecoveryPlan, SessionOptions, SignatureTable};
pub use crate::types::{DeviceIdentity, RecoverableSignature, TargetState, Timeout};

/// Build a ready-to-use session from a validated configuration.
///
/// Primes the runner's usage-text cache, so this fails with
/// `DevctlError::Spawn` when the configured binary cannot be started.
pub fn open_session(cfg: &ConfigFile) -> Result<DeviceSession> {
    let registry = ProcessRegistry::new();
    let mut runner = BlockingRunner::new(cfg.tool.binary.as_str(), registry.clone())
        .with_poll_interval(cfg.tool.poll_interval);
    runner.prime_help_text(cfg.tool.help_timeout)?;

    info!(binary = %cfg.tool.binary, "session opened");
    DeviceSession::from_config(runner, registry, cfg)
}
