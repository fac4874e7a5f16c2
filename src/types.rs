// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{DevctlError, Result};

/// Wall-clock budget for one command.
///
/// - `After(d)`: the runner kills the process once `d` has elapsed.
/// - `Infinite`: the runner waits for the process to exit on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Timeout {
    After(Duration),
    Infinite,
}

impl Timeout {
    pub fn from_secs(secs: u64) -> Self {
        Timeout::After(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Timeout::After(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::After(d) => Some(*d),
            Timeout::Infinite => None,
        }
    }

    /// Whether `elapsed` has used up the budget.
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        match self {
            Timeout::After(d) => elapsed >= *d,
            Timeout::Infinite => false,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::After(d) => write!(f, "{}ms", d.as_millis()),
            Timeout::Infinite => f.write_str("infinite"),
        }
    }
}

impl FromStr for Timeout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "infinite" | "none" => Ok(Timeout::Infinite),
            _ => parse_duration(s).map(Timeout::After),
        }
    }
}

impl TryFrom<String> for Timeout {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60, s),
        "h" => scaled_secs(value, 60 * 60, s),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled_secs(value: u64, unit_secs: u64, raw: &str) -> std::result::Result<Duration, String> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{raw}' is too large"))
}

/// Opaque identifier of a target endpoint: a serial number or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Build an identity, rejecting empty or whitespace-only input.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DevctlError::Usage(
                "device identity must not be empty".to_string(),
            ));
        }
        Ok(DeviceIdentity(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A bare IPv4 address with no `:port` suffix.
    pub fn is_bare_ip(&self) -> bool {
        let parts: Vec<&str> = self.0.split('.').collect();
        parts.len() == 4
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.len() <= 3 && p.chars().all(|c| c.is_ascii_digit()))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceIdentity {
    type Err = DevctlError;

    fn from_str(s: &str) -> Result<Self> {
        DeviceIdentity::new(s)
    }
}

impl AsRef<str> for DeviceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Known failure categories that a specific recovery action can fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoverableSignature {
    NoTargetFound,
    PermissionDenied,
    ReadOnlyFilesystem,
    DeviceOffline,
    ShellCommandFailed,
    GenericTimeout,
}

impl RecoverableSignature {
    pub const ALL: [RecoverableSignature; 6] = [
        RecoverableSignature::NoTargetFound,
        RecoverableSignature::PermissionDenied,
        RecoverableSignature::ReadOnlyFilesystem,
        RecoverableSignature::DeviceOffline,
        RecoverableSignature::ShellCommandFailed,
        RecoverableSignature::GenericTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoverableSignature::NoTargetFound => "no-target-found",
            RecoverableSignature::PermissionDenied => "permission-denied",
            RecoverableSignature::ReadOnlyFilesystem => "read-only-filesystem",
            RecoverableSignature::DeviceOffline => "device-offline",
            RecoverableSignature::ShellCommandFailed => "shell-command-failed",
            RecoverableSignature::GenericTimeout => "generic-timeout",
        }
    }
}

impl fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoverableSignature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        RecoverableSignature::ALL
            .into_iter()
            .find(|sig| sig.as_str() == wanted)
            .ok_or_else(|| format!("unknown error signature: {s}"))
    }
}

/// Connection state of a target as reported by the tool's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Device,
    Offline,
    Unauthorized,
    Sideload,
    Other(String),
}

impl TargetState {
    /// Only `Device` means the handshake completed; everything else should
    /// be disconnected before reconnecting.
    pub fn is_healthy(&self) -> bool {
        matches!(self, TargetState::Device)
    }
}

impl From<&str> for TargetState {
    fn from(s: &str) -> Self {
        match s.trim() {
            "device" => TargetState::Device,
            "offline" => TargetState::Offline,
            "unauthorized" => TargetState::Unauthorized,
            "sideload" => TargetState::Sideload,
            other => TargetState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Device => f.write_str("device"),
            TargetState::Offline => f.write_str("offline"),
            TargetState::Unauthorized => f.write_str("unauthorized"),
            TargetState::Sideload => f.write_str("sideload"),
            TargetState::Other(s) => f.write_str(s),
        }
    }
}

/// Verbosity accepted by [`crate::logging::init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}
