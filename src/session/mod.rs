// src/session/mod.rs

//! Device-level operations built from single tool invocations.
//!
//! Every operation that addresses a target first makes sure the target is
//! reachable (listing, liveness probe, connect with retries), and the
//! `*_auto` transfers wrap the raw invocation in a one-shot recovery.

pub mod listing;
pub mod recovery;
pub mod signatures;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{DevctlError, Result};
use crate::exec::{
    BlockingRunner, CapturedOutput, CommandBackend, DEFAULT_POLL_INTERVAL, NoTargetPatterns,
    NonBlockingHandle, ProcessRegistry,
};
use crate::types::{DeviceIdentity, RecoverableSignature, TargetState, Timeout};

use listing::{ConnectReply, find_listed, parse_connect_reply, parse_targets, parse_uid_reply};
pub use recovery::{RecoveryAction, RecoveryPlan};
pub use signatures::SignatureTable;

/// Timeouts and retry limits used by a [`DeviceSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub connect_attempts: u32,
    pub probe_timeout: Timeout,
    pub default_timeout: Timeout,
    pub transfer_timeout: Timeout,
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            probe_timeout: Timeout::from_secs(5),
            default_timeout: Timeout::from_secs(30),
            transfer_timeout: Timeout::from_secs(60),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SessionOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            connect_attempts: cfg.session.connect_attempts,
            probe_timeout: cfg.session.probe_timeout,
            default_timeout: cfg.tool.default_timeout,
            transfer_timeout: cfg.tool.transfer_timeout,
            poll_interval: cfg.tool.poll_interval,
        }
    }
}

/// Owns the process registry: dropping the session kills whatever it
/// spawned that is still running.
pub struct DeviceSession<B: CommandBackend = BlockingRunner> {
    backend: B,
    registry: ProcessRegistry,
    signatures: SignatureTable,
    no_target: NoTargetPatterns,
    options: SessionOptions,
    default_target: Option<DeviceIdentity>,
}

impl<B: CommandBackend> DeviceSession<B> {
    /// Session with default options and empty signature tables.
    pub fn new(backend: B, registry: ProcessRegistry) -> Self {
        Self {
            backend,
            registry,
            signatures: SignatureTable::new(),
            no_target: NoTargetPatterns::none(),
            options: SessionOptions::default(),
            default_target: None,
        }
    }

    pub fn from_config(backend: B, registry: ProcessRegistry, cfg: &ConfigFile) -> Result<Self> {
        let mut session = Self::new(backend, registry)
            .with_signatures(cfg.signatures.signature_table())
            .with_no_target(cfg.signatures.no_target_patterns()?)
            .with_options(SessionOptions::from_config(cfg));
        if let Some(target) = &cfg.session.default_target {
            session.set_default_target(DeviceIdentity::new(target.as_str())?);
        }
        Ok(session)
    }

    pub fn with_signatures(mut self, signatures: SignatureTable) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_no_target(mut self, no_target: NoTargetPatterns) -> Self {
        self.no_target = no_target;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    pub fn set_default_target(&mut self, target: DeviceIdentity) {
        if target.is_bare_ip() {
            warn!(device = %target, "default target has no port; the tool may pick its own default");
        }
        info!(device = %target, "default target set");
        self.default_target = Some(target);
    }

    pub fn clear_default_target(&mut self) {
        self.default_target = None;
    }

    pub fn default_target(&self) -> Option<&DeviceIdentity> {
        self.default_target.as_ref()
    }

    /// `target` if given, else the session default.
    pub fn resolve_target(&self, target: Option<&DeviceIdentity>) -> Result<DeviceIdentity> {
        target
            .or(self.default_target.as_ref())
            .cloned()
            .ok_or_else(|| {
                DevctlError::Usage("no target given and no default target set".to_string())
            })
    }

    /// Force-kill every subprocess this session spawned that still runs.
    pub fn kill_all(&self) -> usize {
        self.registry.kill_all()
    }

    fn invoke(&self, args: Vec<String>, timeout: Timeout) -> Result<CapturedOutput> {
        self.backend.run(&args, timeout, &self.no_target)
    }

    fn invoke_on(
        &self,
        target: &DeviceIdentity,
        args: &[&str],
        timeout: Timeout,
    ) -> Result<CapturedOutput> {
        self.invoke(targeted(target, args), timeout)
    }

    /// Recoverable failure if any configured signature occurs in `output`.
    fn check_signatures(&self, output: &CapturedOutput) -> Result<()> {
        match self.signatures.classify_output(output) {
            Some(signature) => Err(DevctlError::Recoverable {
                signature,
                output: output.clone(),
            }),
            None => Ok(()),
        }
    }

    // ---- connection ----

    /// Current target listing.
    pub fn targets(&self) -> Result<BTreeMap<DeviceIdentity, TargetState>> {
        let output = self.invoke(vec!["devices".to_string()], self.options.default_timeout)?;
        let targets = parse_targets(&output.stdout);
        debug!(count = targets.len(), "listed targets");
        Ok(targets)
    }

    /// Ask the tool to connect to `target`; returns the name it reported.
    pub fn connect(&self, target: &DeviceIdentity) -> Result<DeviceIdentity> {
        let output = self.invoke(
            vec!["connect".to_string(), target.to_string()],
            self.options.default_timeout,
        )?;
        match parse_connect_reply(&output.stdout) {
            ConnectReply::Connected(name) => {
                info!(device = %target, name = %name, "connected");
                Ok(DeviceIdentity::new(name).unwrap_or_else(|_| target.clone()))
            }
            ConnectReply::AlreadyConnected(name) => {
                info!(device = %target, name = %name, "already connected; liveness not yet verified");
                Ok(DeviceIdentity::new(name).unwrap_or_else(|_| target.clone()))
            }
            ConnectReply::Refused => Err(DevctlError::CommandFailed {
                reason: format!("unable to connect to {target}"),
                output,
            }),
            ConnectReply::Unrecognised => {
                self.check_signatures(&output)?;
                Err(DevctlError::Unknown { output })
            }
        }
    }

    /// Drop the connection to `target`. Disconnecting a target the tool
    /// does not know is not an error.
    pub fn disconnect(&self, target: &DeviceIdentity) -> Result<()> {
        let output = self.invoke(
            vec!["disconnect".to_string(), target.to_string()],
            self.options.default_timeout,
        )?;
        if output.stdout.to_lowercase().contains("no such device") {
            warn!(device = %target, "disconnect: target was not connected");
            return Ok(());
        }
        if output.is_empty() || output.stdout.starts_with("disconnected") {
            info!(device = %target, "disconnected");
            return Ok(());
        }
        Err(DevctlError::Unknown { output })
    }

    /// Liveness probe: a no-op shell command must succeed silently.
    pub fn check_connection(&self, target: &DeviceIdentity) -> bool {
        match self.invoke_on(target, &["shell", "exit"], self.options.probe_timeout) {
            Ok(output) if output.is_empty() => {
                debug!(device = %target, "liveness probe passed");
                true
            }
            Ok(output) => {
                warn!(device = %target, stdout = %output.stdout, stderr = %output.stderr, "liveness probe produced output");
                false
            }
            Err(e) => {
                warn!(device = %target, error = %e, "liveness probe failed");
                false
            }
        }
    }

    /// Make sure `target` is reachable and return the name to address it by.
    ///
    /// A listed, healthy target is trusted only after a liveness probe; a
    /// listed target in a bad state is disconnected first. Otherwise up to
    /// `max_attempts` connects are tried, each verified by the probe.
    pub fn connect_with_retry(
        &self,
        target: Option<&DeviceIdentity>,
        max_attempts: u32,
    ) -> Result<DeviceIdentity> {
        if max_attempts == 0 {
            return Err(DevctlError::Usage(
                "connect attempts must be at least 1".to_string(),
            ));
        }
        let wanted = self.resolve_target(target)?;

        match self.targets() {
            Ok(listed) => match find_listed(&listed, &wanted) {
                Some((name, state)) if !state.is_healthy() => {
                    warn!(device = %name, state = %state, "listed in a bad state; disconnecting");
                    if let Err(e) = self.disconnect(name) {
                        warn!(device = %name, error = %e, "disconnect failed");
                    }
                }
                Some((name, _)) => {
                    if self.check_connection(name) {
                        info!(device = %name, "already connected");
                        return Ok(name.clone());
                    }
                    warn!(device = %name, "listed as healthy but not responding");
                }
                None => debug!(device = %wanted, "target not listed"),
            },
            Err(e) => warn!(device = %wanted, error = %e, "could not list targets"),
        }

        for attempt in 1..=max_attempts {
            match self.connect(&wanted) {
                Ok(name) => {
                    if self.check_connection(&name) {
                        info!(device = %name, attempt, "connection verified");
                        return Ok(name);
                    }
                    warn!(device = %name, attempt, "connected but liveness probe failed");
                }
                Err(e @ DevctlError::NoTarget { .. }) => {
                    warn!(device = %wanted, attempt, "no target available; abandoning connect");
                    return Err(e);
                }
                Err(e) => warn!(device = %wanted, attempt, error = %e, "connect attempt failed"),
            }
        }

        Err(DevctlError::ConnectFail {
            target: wanted.to_string(),
            attempts: max_attempts,
        })
    }

    /// `connect_with_retry` with the configured attempt count.
    pub fn reconnect(&self, target: &DeviceIdentity) -> Result<DeviceIdentity> {
        self.connect_with_retry(Some(target), self.options.connect_attempts)
    }

    fn ensure_connected(&self, target: Option<&DeviceIdentity>) -> Result<DeviceIdentity> {
        self.connect_with_retry(target, self.options.connect_attempts)
    }

    // ---- shell ----

    /// Connect, then run `cmd` in the remote shell.
    ///
    /// Any stderr is a failure: output matching a configured signature
    /// becomes `Recoverable`, other stderr is `Unknown`.
    pub fn shell(
        &self,
        target: Option<&DeviceIdentity>,
        cmd: &str,
        timeout: Timeout,
    ) -> Result<CapturedOutput> {
        let name = self.ensure_connected(target)?;
        let output = self.invoke_on(&name, &["shell", cmd], timeout)?;
        if !output.stderr.is_empty() {
            self.check_signatures(&output)?;
            warn!(device = %name, stderr = %output.stderr, "shell command wrote to stderr");
            return Err(DevctlError::Unknown { output });
        }
        Ok(output)
    }

    // ---- privilege ----

    /// Whether the remote shell runs as uid 0.
    pub fn is_elevated(&self, target: Option<&DeviceIdentity>) -> Result<bool> {
        let name = self.ensure_connected(target)?;
        self.probe_elevated(&name)
    }

    fn probe_elevated(&self, target: &DeviceIdentity) -> Result<bool> {
        let output = self.invoke_on(target, &["shell", "id"], self.options.probe_timeout)?;
        match parse_uid_reply(&output.stdout) {
            Some(elevated) => {
                debug!(device = %target, elevated, "privilege probed");
                Ok(elevated)
            }
            None => Err(DevctlError::Unknown { output }),
        }
    }

    /// Restart the remote daemon as root. The connection is invalid
    /// afterwards; see [`Self::ensure_elevated`].
    pub fn elevate(&self, target: &DeviceIdentity) -> Result<()> {
        let output = self.invoke_on(target, &["root"], self.options.default_timeout)?;
        if output.stdout.contains("cannot run as root in production builds") {
            return Err(DevctlError::CommandFailed {
                reason: "production builds cannot run the daemon as root".to_string(),
                output,
            });
        }
        if output.stdout.contains("already running as root") {
            info!(device = %target, "daemon already running as root");
            return Ok(());
        }
        if output.is_empty() || output.stdout.contains("restarting adbd as root") {
            info!(device = %target, "daemon restarting as root");
            return Ok(());
        }
        self.check_signatures(&output)?;
        Err(DevctlError::Unknown { output })
    }

    /// Elevate unless already elevated, then reconnect.
    pub fn ensure_elevated(&self, target: Option<&DeviceIdentity>) -> Result<DeviceIdentity> {
        let wanted = self.resolve_target(target)?;
        let name = self.ensure_connected(Some(&wanted))?;
        match self.probe_elevated(&name) {
            Ok(true) => {
                debug!(device = %name, "already elevated");
                return Ok(name);
            }
            Ok(false) => {}
            Err(e) => warn!(device = %name, error = %e, "privilege probe failed; elevating anyway"),
        }
        self.elevate(&name)?;
        self.ensure_connected(Some(&wanted))
    }

    // ---- filesystem ----

    /// Remount the system partitions read-write. Needs elevation.
    pub fn remount(&self, target: &DeviceIdentity) -> Result<()> {
        let output = self.invoke_on(target, &["remount"], self.options.default_timeout)?;
        self.check_signatures(&output)?;
        if output.stdout.contains("remount failed") {
            return Err(DevctlError::CommandFailed {
                reason: "remount failed".to_string(),
                output,
            });
        }
        if output.stdout.is_empty() || output.stdout.contains("remount succeeded") {
            info!(device = %target, "remounted");
            return Ok(());
        }
        Err(DevctlError::Unknown { output })
    }

    /// Connect, elevate, then remount.
    pub fn remount_auto(&self, target: Option<&DeviceIdentity>) -> Result<DeviceIdentity> {
        let name = self.ensure_elevated(target)?;
        self.remount(&name)?;
        Ok(name)
    }

    // ---- transfers ----

    pub fn push(&self, target: &DeviceIdentity, local: &Path, remote: &str) -> Result<CapturedOutput> {
        let local = local.to_string_lossy();
        let output = self.invoke_on(
            target,
            &["push", &*local, remote],
            self.options.transfer_timeout,
        )?;
        self.classify_transfer("push", target, output)
    }

    pub fn pull(&self, target: &DeviceIdentity, remote: &str, local: &Path) -> Result<CapturedOutput> {
        let local = local.to_string_lossy();
        let output = self.invoke_on(
            target,
            &["pull", remote, &*local],
            self.options.transfer_timeout,
        )?;
        self.classify_transfer("pull", target, output)
    }

    fn classify_transfer(
        &self,
        op: &str,
        target: &DeviceIdentity,
        output: CapturedOutput,
    ) -> Result<CapturedOutput> {
        self.check_signatures(&output)?;
        if output.contains("No such file or directory") || output.contains("does not exist") {
            return Err(DevctlError::CommandFailed {
                reason: "no such file or directory".to_string(),
                output,
            });
        }
        if output.contains("0 files pulled") || output.contains("failed to copy") {
            return Err(DevctlError::CommandFailed {
                reason: format!("{op} copied nothing"),
                output,
            });
        }
        if output.contains("bytes in") || output.contains("files skipped") {
            info!(op, device = %target, "transfer complete");
            return Ok(output);
        }
        Err(DevctlError::Unknown { output })
    }

    /// Connect and push. A permission failure elevates and a read-only
    /// failure remounts, each at most once, before the push is retried.
    pub fn push_auto(
        &self,
        target: Option<&DeviceIdentity>,
        local: &Path,
        remote: &str,
    ) -> Result<CapturedOutput> {
        let name = self.ensure_connected(target)?;
        let plan = RecoveryPlan::new()
            .on(RecoverableSignature::PermissionDenied, RecoveryAction::Elevate)
            .on(RecoverableSignature::ReadOnlyFilesystem, RecoveryAction::Remount);
        self.with_recovery(&name, "push", &plan, |session, t| {
            session.push(t, local, remote)
        })
    }

    /// Connect and pull, elevating once on a permission failure before
    /// the pull is retried.
    pub fn pull_auto(
        &self,
        target: Option<&DeviceIdentity>,
        remote: &str,
        local: &Path,
    ) -> Result<CapturedOutput> {
        let name = self.ensure_connected(target)?;
        let plan =
            RecoveryPlan::new().on(RecoverableSignature::PermissionDenied, RecoveryAction::Elevate);
        self.with_recovery(&name, "pull", &plan, |session, t| {
            session.pull(t, remote, local)
        })
    }
}

impl DeviceSession<BlockingRunner> {
    /// Start a continuous log capture whose stdout goes into `sink`.
    ///
    /// The returned handle owns `sink` and closes it once killed.
    pub fn log_capture<I, S>(
        &self,
        target: Option<&DeviceIdentity>,
        params: I,
        sink: File,
    ) -> Result<NonBlockingHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = self.ensure_connected(target)?;
        let mut args = targeted(&name, &["logcat"]);
        args.extend(params.into_iter().map(Into::into));
        let cmd = self.backend.command(args);
        NonBlockingHandle::spawn_capture(&cmd, sink, &self.registry, self.options.poll_interval)
    }

    /// Open an interactive remote shell.
    pub fn open_shell(&self, target: Option<&DeviceIdentity>) -> Result<NonBlockingHandle> {
        let name = self.ensure_connected(target)?;
        let cmd = self.backend.command(targeted(&name, &["shell"]));
        NonBlockingHandle::spawn_interactive(&cmd, &self.registry, self.options.poll_interval)
    }
}

impl<B: CommandBackend> Drop for DeviceSession<B> {
    fn drop(&mut self) {
        let killed = self.registry.kill_all();
        if killed > 0 {
            info!(killed, "session closed; stray processes killed");
        }
    }
}

/// `-s <target>` followed by `rest`.
fn targeted(target: &DeviceIdentity, rest: &[&str]) -> Vec<String> {
    let mut args = Vec::with_capacity(rest.len() + 2);
    args.push("-s".to_string());
    args.push(target.to_string());
    args.extend(rest.iter().map(|s| s.to_string()));
    args
}
