// src/session/recovery.rs

//! Recover-and-retry wrapper for device operations.

use tracing::{info, warn};

use super::DeviceSession;
use crate::errors::Result;
use crate::exec::CommandBackend;
use crate::types::{DeviceIdentity, RecoverableSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Restart the remote daemon with elevated privileges, then reconnect.
    Elevate,
    /// Remount the system partitions read-write (elevating first).
    Remount,
    /// Re-establish the connection.
    Reconnect,
}

/// Which recovery action, if any, an operation accepts for each failure
/// category.
#[derive(Debug, Clone, Default)]
pub struct RecoveryPlan {
    actions: Vec<(RecoverableSignature, RecoveryAction)>,
}

impl RecoveryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover from `signature` with `action`. A later registration for the
    /// same signature replaces the earlier one.
    pub fn on(mut self, signature: RecoverableSignature, action: RecoveryAction) -> Self {
        self.actions.retain(|(s, _)| *s != signature);
        self.actions.push((signature, action));
        self
    }

    pub fn action_for(&self, signature: RecoverableSignature) -> Option<RecoveryAction> {
        self.actions
            .iter()
            .find(|(s, _)| *s == signature)
            .map(|(_, action)| *action)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<B: CommandBackend> DeviceSession<B> {
    /// Run `op` against `target`; whenever it fails with a signature that
    /// `plan` knows, perform that recovery action and run `op` again.
    ///
    /// Each signature triggers its recovery at most once per call, so a
    /// permission failure followed by a read-only failure can elevate and
    /// then remount, while the same signature seen twice propagates. A
    /// failing recovery action is logged and the retry still runs. The
    /// retry addresses the target by the name the recovery reported.
    pub fn with_recovery<T, F>(
        &self,
        target: &DeviceIdentity,
        name: &str,
        plan: &RecoveryPlan,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(&Self, &DeviceIdentity) -> Result<T>,
    {
        let mut current = target.clone();
        let mut recovered: Vec<RecoverableSignature> = Vec::new();

        loop {
            let err = match op(self, &current) {
                Ok(value) => {
                    if !recovered.is_empty() {
                        info!(op = name, device = %current, retries = recovered.len(), "retry succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(signature) = err.signature() else {
                return Err(err);
            };
            if recovered.contains(&signature) {
                warn!(op = name, device = %current, signature = %signature, "failed again after recovery; giving up");
                return Err(err);
            }
            let Some(action) = plan.action_for(signature) else {
                warn!(op = name, device = %current, signature = %signature, "no recovery registered");
                return Err(err);
            };

            info!(
                op = name,
                device = %current,
                signature = %signature,
                action = ?action,
                "operation failed; recovering before retry"
            );
            recovered.push(signature);
            match self.recover(&current, action) {
                Ok(renamed) => current = renamed,
                Err(recovery_err) => {
                    warn!(op = name, device = %current, action = ?action, error = %recovery_err, "recovery action failed");
                }
            }
        }
    }

    fn recover(&self, target: &DeviceIdentity, action: RecoveryAction) -> Result<DeviceIdentity> {
        match action {
            RecoveryAction::Elevate => self.ensure_elevated(Some(target)),
            RecoveryAction::Remount => self.remount_auto(Some(target)),
            RecoveryAction::Reconnect => self.reconnect(target),
        }
    }
}
