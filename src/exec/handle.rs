// src/exec/handle.rs

//! Non-blocking handles for long-lived subprocesses.
//!
//! Two flavours share one type:
//! - capture: stdout is redirected into a caller-provided file that the
//!   handle owns and closes; stderr is drained into memory.
//! - interactive: stdin is piped for [`NonBlockingHandle::write`] and both
//!   output streams are drained for `read_stdout` / `read_stderr`.

use std::fs::File;
use std::io::Write;
use std::process::{ChildStdin, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::command::Command;
use super::drainer::StreamDrainer;
use super::process::ChildProcess;
use super::registry::ProcessRegistry;
use super::runner::stop_process;
use crate::errors::{DevctlError, Result};
use crate::types::Timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Running,
    /// The process exited on its own.
    Exited,
    /// The process was force-terminated through [`NonBlockingHandle::kill`].
    Killed,
}

pub struct NonBlockingHandle {
    process: Arc<ChildProcess>,
    label: String,
    stdin: Option<ChildStdin>,
    stdout: Option<StreamDrainer>,
    stderr: Option<StreamDrainer>,
    sink: Option<File>,
    killed: bool,
    poll_interval: Duration,
}

impl NonBlockingHandle {
    /// Spawn `cmd` with stdout written straight into `sink`.
    pub fn spawn_capture(
        cmd: &Command,
        sink: File,
        registry: &ProcessRegistry,
        poll_interval: Duration,
    ) -> Result<Self> {
        let child_sink = sink.try_clone()?;
        let mut handle = Self::spawn(
            cmd,
            Stdio::null(),
            Stdio::from(child_sink),
            registry,
            poll_interval,
        )?;
        handle.sink = Some(sink);
        info!(pid = handle.pid(), cmd = %cmd, "started capture process");
        Ok(handle)
    }

    /// Spawn `cmd` with stdin piped and both output streams drained.
    pub fn spawn_interactive(
        cmd: &Command,
        registry: &ProcessRegistry,
        poll_interval: Duration,
    ) -> Result<Self> {
        let handle = Self::spawn(cmd, Stdio::piped(), Stdio::piped(), registry, poll_interval)?;
        info!(pid = handle.pid(), cmd = %cmd, "started interactive process");
        Ok(handle)
    }

    fn spawn(
        cmd: &Command,
        stdin: Stdio,
        stdout: Stdio,
        registry: &ProcessRegistry,
        poll_interval: Duration,
    ) -> Result<Self> {
        let mut child = cmd
            .to_process(stdin, stdout, Stdio::piped())
            .spawn()
            .map_err(|e| DevctlError::Spawn {
                program: cmd.program().to_string(),
                message: e.to_string(),
            })?;

        let stdin = child.stdin.take();
        let out_pipe = child.stdout.take();
        let err_pipe = child.stderr.take();
        let process = Arc::new(ChildProcess::new(child, cmd.program()));
        registry.register(&process);

        let mut handle = Self {
            label: format!("{}[{}]", cmd.program(), process.pid()),
            process,
            stdin,
            stdout: None,
            stderr: None,
            sink: None,
            killed: false,
            poll_interval,
        };

        let pid = handle.pid();
        if let Some(out) = out_pipe {
            handle.stdout = Some(StreamDrainer::start(out, format!("stdout[{pid}]"))?);
        }
        if let Some(err) = err_pipe {
            handle.stderr = Some(StreamDrainer::start(err, format!("stderr[{pid}]"))?);
        }
        Ok(handle)
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current state; polls the process but changes nothing.
    pub fn state(&self) -> HandleState {
        if self.killed {
            HandleState::Killed
        } else if self.process.is_running() {
            HandleState::Running
        } else {
            HandleState::Exited
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state() == HandleState::Running
    }

    /// Block until the process exits or `timeout` elapses; returns whether
    /// it has exited.
    pub fn join(&self, timeout: Timeout) -> bool {
        debug!(handle = %self.label, timeout = %timeout, "joining process");
        let started = Instant::now();
        while self.process.is_running() {
            if timeout.is_expired(started.elapsed()) {
                return false;
            }
            thread::sleep(self.poll_interval);
        }
        true
    }

    /// Terminate the process if it still runs, then release drainers, stdin
    /// and the capture file. Safe to call any number of times.
    pub fn kill(&mut self) -> Result<()> {
        if self.process.try_wait()?.is_none() {
            info!(handle = %self.label, "killing process");
            if self.process.kill()? {
                self.killed = true;
            }
            self.process.wait()?;
        }
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        // Closing stdin first lets a process blocked on input see EOF.
        self.stdin.take();
        for drainer in [self.stdout.as_mut(), self.stderr.as_mut()].into_iter().flatten() {
            if !drainer.is_stopped() {
                drainer.stop();
                drainer.join();
            }
        }
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.sync_all() {
                debug!(handle = %self.label, error = %e, "could not sync capture file");
            }
        }
    }

    /// Encode `text` as UTF-8 and send it to the process's stdin.
    pub fn write(&mut self, text: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            DevctlError::Usage(format!("{} has no open stdin", self.label))
        })?;
        debug!(handle = %self.label, text = ?text, "writing to stdin");
        stdin.write_all(text.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    /// Close stdin so the process sees end of input.
    pub fn close_input(&mut self) {
        self.stdin.take();
    }

    /// Whatever stdout text has been queued since the last read.
    pub fn read_stdout(&self) -> String {
        self.stdout.as_ref().map(StreamDrainer::try_drain).unwrap_or_default()
    }

    /// Whatever stderr text has been queued since the last read.
    pub fn read_stderr(&self) -> String {
        self.stderr.as_ref().map(StreamDrainer::try_drain).unwrap_or_default()
    }
}

impl Drop for NonBlockingHandle {
    fn drop(&mut self) {
        if self.process.is_running() {
            debug!(handle = %self.label, "handle dropped while process running");
            stop_process(&self.process);
        }
        self.release();
    }
}

impl std::fmt::Debug for NonBlockingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonBlockingHandle")
            .field("label", &self.label)
            .field("pid", &self.pid())
            .field("state", &self.state())
            .finish()
    }
}
