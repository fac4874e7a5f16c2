// src/exec/process.rs

//! A spawned OS process shared between its owner and the registry.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

/// Owned by exactly one runner or handle (through an `Arc`); the registry
/// only keeps a `Weak` to it for bulk teardown.
#[derive(Debug)]
pub struct ChildProcess {
    pid: u32,
    program: String,
    child: Mutex<Child>,
}

impl ChildProcess {
    pub(crate) fn new(child: Child, program: impl Into<String>) -> Self {
        Self {
            pid: child.id(),
            program: program.into(),
            child: Mutex::new(child),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking exit check.
    pub fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        self.lock().try_wait()
    }

    pub fn is_running(&self) -> bool {
        match self.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                warn!(pid = self.pid, error = %e, "cannot poll process status; assuming exited");
                false
            }
        }
    }

    /// Force-kill the process (and, on unix, its process group).
    ///
    /// A process that is already gone is not an error; returns whether a
    /// signal was actually delivered.
    pub fn kill(&self) -> io::Result<bool> {
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            debug!(pid = self.pid, "kill requested but process already exited");
            return Ok(false);
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(self.pid as i32), Signal::SIGKILL) {
                Ok(()) => {
                    debug!(pid = self.pid, "sent SIGKILL to process group");
                    return Ok(true);
                }
                Err(Errno::ESRCH) => {
                    debug!(pid = self.pid, "process group already gone");
                }
                Err(e) => {
                    warn!(pid = self.pid, error = %e, "killpg failed; killing process directly");
                }
            }
        }

        match child.kill() {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Block until exit. Only call after the process exited or was killed.
    pub fn wait(&self) -> io::Result<ExitStatus> {
        self.lock().wait()
    }
}
