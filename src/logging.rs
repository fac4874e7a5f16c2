// src/logging.rs

//! Logging setup for `devctl` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from the caller's level (usually `[tool].log_level`)
//! when given, otherwise from `DEVCTL_LOG`, which accepts full
//! `EnvFilter` directives such as `devctl::exec=debug,info`. Without either
//! the level is `info`.
//!
//! Output goes to stderr; stdout belongs to whatever embeds the crate.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::types::LogLevel;

pub const LOG_ENV: &str = "DEVCTL_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(LogLevel::default().as_str())),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}
