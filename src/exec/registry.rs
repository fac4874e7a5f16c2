// src/exec/registry.rs

//! Bookkeeping of every subprocess a session spawned, for bulk teardown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use super::process::ChildProcess;

struct Entry {
    pid: u32,
    program: String,
    process: Weak<ChildProcess>,
}

/// Cheap to clone; all clones share the same list.
///
/// The registry never owns a process: runners and handles do, and the
/// registry only upgrades its weak references when asked to kill
/// stragglers.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, process: &Arc<ChildProcess>) {
        let mut entries = self.lock();
        // Entries whose owner is gone can never be killed again.
        entries.retain(|e| e.process.strong_count() > 0);
        // Pids can be reused once a tracked child is reaped, so compare owners.
        debug_assert!(
            !entries
                .iter()
                .any(|e| e.process.as_ptr() == Arc::as_ptr(process)),
            "process registered twice"
        );
        entries.push(Entry {
            pid: process.pid(),
            program: process.program().to_string(),
            process: Arc::downgrade(process),
        });
        debug!(pid = process.pid(), tracked = entries.len(), "registered process");
    }

    /// Number of tracked processes whose owner still exists.
    pub fn len(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.process.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// PIDs of tracked processes that have not exited yet.
    pub fn running_pids(&self) -> Vec<u32> {
        self.lock()
            .iter()
            .filter_map(|e| e.process.upgrade())
            .filter(|p| p.is_running())
            .map(|p| p.pid())
            .collect()
    }

    /// Force-kill every tracked process that is still running.
    ///
    /// Best effort: failures are logged and skipped. Returns how many
    /// processes were signalled.
    pub fn kill_all(&self) -> usize {
        let live: Vec<(u32, String, Arc<ChildProcess>)> = {
            let mut entries = self.lock();
            entries.retain(|e| e.process.strong_count() > 0);
            entries
                .iter()
                .filter_map(|e| e.process.upgrade().map(|p| (e.pid, e.program.clone(), p)))
                .collect()
        };

        if live.is_empty() {
            debug!("no tracked processes to kill");
            return 0;
        }

        let mut killed = 0;
        for (pid, program, process) in live {
            match process.kill() {
                Ok(true) => {
                    warn!(pid, program = %program, "process still running at teardown; killed");
                    if let Err(e) = process.wait() {
                        warn!(pid, error = %e, "failed to reap killed process");
                    }
                    killed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(pid, program = %program, error = %e, "failed to kill process"),
            }
        }
        info!(killed, "process registry teardown complete");
        killed
    }
}
