// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;
use crate::exec::NoTargetPatterns;
use crate::session::SignatureTable;
use crate::types::{LogLevel, RecoverableSignature, Timeout};

/// The file exactly as deserialized; see [`ConfigFile`] for the validated
/// form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfigFile {
    pub tool: ToolSection,
    pub session: SessionSection,
    pub signatures: SignatureSection,
}

/// `[tool]`: how to run the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolSection {
    pub binary: String,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    pub default_timeout: Timeout,
    pub transfer_timeout: Timeout,
    pub help_timeout: Timeout,
    pub log_level: Option<LogLevel>,
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            binary: "adb".to_string(),
            poll_interval: Duration::from_millis(50),
            default_timeout: Timeout::from_secs(30),
            transfer_timeout: Timeout::from_secs(60),
            help_timeout: Timeout::from_secs(10),
            log_level: None,
        }
    }
}

/// `[session]`: connection handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub connect_attempts: u32,
    pub probe_timeout: Timeout,
    pub default_target: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            probe_timeout: Timeout::from_secs(5),
            default_target: None,
        }
    }
}

/// `[signatures]`: output text that identifies known failures.
///
/// `no_target` entries are regular expressions matched against stderr while
/// a command runs; the other lists are plain substrings matched against the
/// final output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignatureSection {
    pub no_target: Vec<String>,
    pub permission_denied: Vec<String>,
    pub read_only: Vec<String>,
    pub device_offline: Vec<String>,
    pub shell_failed: Vec<String>,
}

impl Default for SignatureSection {
    fn default() -> Self {
        Self {
            no_target: vec![
                r"error: device .*not found".to_string(),
                "error: no devices/emulators found".to_string(),
                "waiting for device".to_string(),
            ],
            permission_denied: vec![
                "Permission denied".to_string(),
                "Not running as root".to_string(),
                "Operation not permitted".to_string(),
            ],
            read_only: vec!["Read-only file system".to_string()],
            device_offline: vec!["error: device offline".to_string()],
            shell_failed: Vec::new(),
        }
    }
}

impl SignatureSection {
    pub fn no_target_patterns(&self) -> Result<NoTargetPatterns> {
        NoTargetPatterns::new(&self.no_target)
    }

    pub fn signature_table(&self) -> SignatureTable {
        SignatureTable::new()
            .with(RecoverableSignature::DeviceOffline, &self.device_offline)
            .with(RecoverableSignature::PermissionDenied, &self.permission_denied)
            .with(RecoverableSignature::ReadOnlyFilesystem, &self.read_only)
            .with(RecoverableSignature::ShellCommandFailed, &self.shell_failed)
    }
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub tool: ToolSection,
    pub session: SessionSection,
    pub signatures: SignatureSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        tool: ToolSection,
        session: SessionSection,
        signatures: SignatureSection,
    ) -> Self {
        Self {
            tool,
            session,
            signatures,
        }
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    use crate::types::parse_duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
