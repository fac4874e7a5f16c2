// src/exec/command.rs

//! Argument vectors handed to the runner.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use crate::errors::{DevctlError, Result};

/// An ordered argument vector whose first slot is the resolved binary path.
///
/// Built once with the consuming builder methods, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            argv: vec![binary.as_ref().to_string_lossy().into_owned()],
        }
    }

    pub fn with_args<I, S>(binary: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(binary).args(args)
    }

    /// Split a shell-style argument line (`"-s emulator-5554 shell ls"`)
    /// into a command for `binary`.
    pub fn parse(binary: impl AsRef<Path>, line: &str) -> Result<Self> {
        let args = shell_words::split(line)
            .map_err(|e| DevctlError::Usage(format!("cannot split command line {line:?}: {e}")))?;
        Ok(Self::with_args(binary, args))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// `false` for the bare binary invocation that prints usage text.
    pub fn has_arguments(&self) -> bool {
        self.argv.len() > 1
    }

    /// Build the OS-level command. On unix the child leads its own process
    /// group so a kill also reaches helpers it forked.
    pub(crate) fn to_process(&self, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> std::process::Command {
        let mut cmd = std::process::Command::new(self.program());
        cmd.args(self.arguments())
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(&self.argv))
    }
}
