// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevctlError, Result};
use crate::types::Timeout;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DevctlError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.tool, raw.session, raw.signatures))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_tool(cfg)?;
    validate_session(cfg)?;
    validate_signatures(cfg)?;
    Ok(())
}

fn validate_tool(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tool.binary.trim().is_empty() {
        return Err(DevctlError::ConfigError(
            "[tool].binary must not be empty".to_string(),
        ));
    }

    if cfg.tool.poll_interval.is_zero() {
        return Err(DevctlError::ConfigError(
            "[tool].poll_interval must be greater than zero".to_string(),
        ));
    }

    ensure_non_zero("[tool].default_timeout", cfg.tool.default_timeout)?;
    ensure_non_zero("[tool].transfer_timeout", cfg.tool.transfer_timeout)?;
    ensure_non_zero("[tool].help_timeout", cfg.tool.help_timeout)?;
    Ok(())
}

fn validate_session(cfg: &RawConfigFile) -> Result<()> {
    if cfg.session.connect_attempts == 0 {
        return Err(DevctlError::ConfigError(
            "[session].connect_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    ensure_non_zero("[session].probe_timeout", cfg.session.probe_timeout)?;

    if let Some(target) = &cfg.session.default_target {
        if target.trim().is_empty() {
            return Err(DevctlError::ConfigError(
                "[session].default_target must not be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_signatures(cfg: &RawConfigFile) -> Result<()> {
    // Compiling reports the offending pattern.
    cfg.signatures.no_target_patterns()?;

    let lists = [
        ("permission_denied", &cfg.signatures.permission_denied),
        ("read_only", &cfg.signatures.read_only),
        ("device_offline", &cfg.signatures.device_offline),
        ("shell_failed", &cfg.signatures.shell_failed),
    ];
    for (name, list) in lists {
        if list.iter().any(|s| s.is_empty()) {
            return Err(DevctlError::ConfigError(format!(
                "[signatures].{name} contains an empty string, which would match any output"
            )));
        }
    }
    Ok(())
}

fn ensure_non_zero(field: &str, timeout: Timeout) -> Result<()> {
    if timeout.as_duration().is_some_and(|d| d.is_zero()) {
        return Err(DevctlError::ConfigError(format!(
            "{field} must be greater than zero or \"infinite\""
        )));
    }
    Ok(())
}
