// src/exec/backend.rs

//! Pluggable command backend abstraction.
//!
//! `DeviceSession` talks to a `CommandBackend` instead of a concrete runner.
//! Production code uses [`BlockingRunner`]; tests can provide a backend that
//! replays canned output without spawning real processes.

use crate::errors::Result;
use crate::types::Timeout;

use super::patterns::NoTargetPatterns;
use super::runner::{BlockingRunner, CapturedOutput};

/// Trait abstracting how one tool invocation is executed.
pub trait CommandBackend: Send + Sync {
    /// Run the tool with `args` (the binary path is supplied by the backend)
    /// and return its final output.
    fn run(
        &self,
        args: &[String],
        timeout: Timeout,
        no_target: &NoTargetPatterns,
    ) -> Result<CapturedOutput>;
}

impl CommandBackend for BlockingRunner {
    fn run(
        &self,
        args: &[String],
        timeout: Timeout,
        no_target: &NoTargetPatterns,
    ) -> Result<CapturedOutput> {
        let cmd = self.command(args.iter().cloned());
        BlockingRunner::run(self, &cmd, timeout, no_target)
    }
}
