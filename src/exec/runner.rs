// src/exec/runner.rs

//! Blocking command runner.
//!
//! Runs one command to completion (or until its timeout), draining stdout and
//! stderr concurrently so the child never stalls on a full pipe. The loop is
//! cooperative: every `poll_interval` it collects queued output, checks the
//! stderr seen so far against the caller's no-target patterns, polls the
//! process for exit and compares elapsed time against the timeout.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::command::Command;
use super::drainer::StreamDrainer;
use super::patterns::NoTargetPatterns;
use super::process::ChildProcess;
use super::registry::ProcessRegistry;
use crate::errors::{DevctlError, Result};
use crate::types::Timeout;

/// Default pause between two polls of a running command.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Final stdout/stderr of one blocking invocation, both trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: impl AsRef<str>, stderr: impl AsRef<str>) -> Self {
        Self {
            stdout: stdout.as_ref().trim().to_string(),
            stderr: stderr.as_ref().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// True if `needle` occurs in either stream.
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }
}

/// Per-invocation state of the polling loop.
struct RunState {
    started: Instant,
    stdout: String,
    stderr: String,
    no_target: Option<String>,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            stdout: String::new(),
            stderr: String::new(),
            no_target: None,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn output(&self) -> CapturedOutput {
        CapturedOutput::new(&self.stdout, &self.stderr)
    }
}

enum Verdict {
    Exited(ExitStatus),
    NoTarget,
    TimedOut,
}

pub struct BlockingRunner {
    binary: String,
    registry: ProcessRegistry,
    poll_interval: Duration,
    help_text: Option<CapturedOutput>,
}

impl BlockingRunner {
    pub fn new(binary: impl Into<String>, registry: ProcessRegistry) -> Self {
        Self {
            binary: binary.into(),
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            help_text: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Use `help` as the cached no-argument output instead of probing.
    pub fn with_help_text(mut self, help: CapturedOutput) -> Self {
        self.help_text = Some(help);
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn help_text(&self) -> Option<&CapturedOutput> {
        self.help_text.as_ref()
    }

    /// Run the binary with no arguments and cache what it prints.
    ///
    /// A spawn failure is returned (the binary is unusable); any other
    /// failure just leaves the cache empty.
    pub fn prime_help_text(&mut self, timeout: Timeout) -> Result<()> {
        let cmd = Command::new(&self.binary);
        match self.run(&cmd, timeout, &NoTargetPatterns::none()) {
            Ok(output) => {
                debug!(
                    binary = %self.binary,
                    stdout_len = output.stdout.len(),
                    stderr_len = output.stderr.len(),
                    "cached usage text"
                );
                self.help_text = Some(output);
                Ok(())
            }
            Err(err @ DevctlError::Spawn { .. }) => Err(err),
            Err(err) => {
                warn!(binary = %self.binary, error = %err, "could not capture usage text; guard disabled");
                Ok(())
            }
        }
    }

    /// Command for this runner's binary with the given arguments.
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::with_args(&self.binary, args)
    }

    /// Run `cmd` to completion and return its output.
    ///
    /// Fails with `Spawn` if the process cannot be created, `NoTarget` as
    /// soon as stderr matches one of `no_target`, `Timeout` (carrying the
    /// partial output) once `timeout` elapses, and `WrongCommand` if the
    /// output is the binary's usage text.
    pub fn run(
        &self,
        cmd: &Command,
        timeout: Timeout,
        no_target: &NoTargetPatterns,
    ) -> Result<CapturedOutput> {
        info!(cmd = %cmd, timeout = %timeout, "running command");

        let child = cmd
            .to_process(Stdio::null(), Stdio::piped(), Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!(cmd = %cmd, error = %e, "failed to spawn command");
                DevctlError::Spawn {
                    program: cmd.program().to_string(),
                    message: e.to_string(),
                }
            })?;

        let (process, stdout, stderr) = self.adopt(child, cmd)?;
        let mut state = RunState::new();

        let verdict = loop {
            stdout.drain_into(&mut state.stdout);
            if stderr.drain_into(&mut state.stderr) {
                if let Some(pattern) = no_target.find(&state.stderr) {
                    state.no_target = Some(pattern.to_string());
                    break Verdict::NoTarget;
                }
            }

            match process.try_wait() {
                Ok(Some(status)) => break Verdict::Exited(status),
                Ok(None) => {}
                Err(e) => {
                    warn!(pid = process.pid(), error = %e, "failed to poll process; killing it");
                    stop_process(&process);
                    finish_into(stdout, stderr, &mut state);
                    return Err(DevctlError::IoError(e));
                }
            }

            if timeout.is_expired(state.elapsed()) {
                break Verdict::TimedOut;
            }

            thread::sleep(self.poll_interval);
        };

        match verdict {
            Verdict::Exited(status) => {
                finish_into(stdout, stderr, &mut state);
                debug!(
                    pid = process.pid(),
                    exit_code = status.code().unwrap_or(-1),
                    elapsed_ms = state.elapsed().as_millis() as u64,
                    "command exited"
                );
                // The exit can be seen before the drainer queued the last lines.
                if let Some(pattern) = no_target.find(&state.stderr) {
                    warn!(cmd = %cmd, pattern, "no target available");
                    return Err(DevctlError::NoTarget {
                        output: state.output(),
                    });
                }
                self.guard_help_text(cmd, state.output())
            }
            Verdict::NoTarget => {
                stop_process(&process);
                finish_into(stdout, stderr, &mut state);
                warn!(
                    cmd = %cmd,
                    pattern = state.no_target.as_deref().unwrap_or_default(),
                    elapsed_ms = state.elapsed().as_millis() as u64,
                    "no target available; command abandoned"
                );
                Err(DevctlError::NoTarget {
                    output: state.output(),
                })
            }
            Verdict::TimedOut => {
                stop_process(&process);
                finish_into(stdout, stderr, &mut state);
                let elapsed = state.elapsed();
                warn!(cmd = %cmd, elapsed_ms = elapsed.as_millis() as u64, "command timed out; killed");
                Err(DevctlError::Timeout {
                    elapsed,
                    output: state.output(),
                })
            }
        }
    }

    /// Register a freshly spawned child and attach drainers to both pipes.
    fn adopt(
        &self,
        mut child: std::process::Child,
        cmd: &Command,
    ) -> Result<(Arc<ChildProcess>, StreamDrainer, StreamDrainer)> {
        let out_pipe = child.stdout.take();
        let err_pipe = child.stderr.take();
        let process = Arc::new(ChildProcess::new(child, cmd.program()));
        self.registry.register(&process);

        let pid = process.pid();
        let drainers = match (out_pipe, err_pipe) {
            (Some(out), Some(err)) => StreamDrainer::start(out, format!("stdout[{pid}]")).and_then(
                |out| StreamDrainer::start(err, format!("stderr[{pid}]")).map(|err| (out, err)),
            ),
            _ => Err(std::io::Error::other("child output pipes missing")),
        };

        match drainers {
            Ok((out, err)) => Ok((process, out, err)),
            Err(e) => {
                stop_process(&process);
                Err(DevctlError::IoError(e))
            }
        }
    }

    fn guard_help_text(&self, cmd: &Command, output: CapturedOutput) -> Result<CapturedOutput> {
        let is_help = cmd.has_arguments()
            && cmd.program() == self.binary
            && self
                .help_text
                .as_ref()
                .is_some_and(|help| !help.is_empty() && *help == output);

        if is_help {
            warn!(cmd = %cmd, "command printed the usage text; arguments are malformed");
            return Err(DevctlError::WrongCommand { output });
        }
        Ok(output)
    }
}

/// Kill (tolerating an already-exited process) and reap.
pub(crate) fn stop_process(process: &ChildProcess) {
    if let Err(e) = process.kill() {
        warn!(pid = process.pid(), error = %e, "failed to kill process");
    }
    if let Err(e) = process.wait() {
        warn!(pid = process.pid(), error = %e, "failed to reap process");
    }
}

/// Stop and join both drainers, then append what they still held.
fn finish_into(stdout: StreamDrainer, stderr: StreamDrainer, state: &mut RunState) {
    state.stdout.push_str(&stdout.finish());
    state.stderr.push_str(&stderr.finish());
}
