#![allow(dead_code)]

use devctl::config::{ConfigFile, RawConfigFile};
use devctl::types::Timeout;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn binary(mut self, binary: &str) -> Self {
        self.config.tool.binary = binary.to_string();
        self
    }

    pub fn default_timeout(mut self, timeout: Timeout) -> Self {
        self.config.tool.default_timeout = timeout;
        self
    }

    pub fn help_timeout(mut self, timeout: Timeout) -> Self {
        self.config.tool.help_timeout = timeout;
        self
    }

    pub fn connect_attempts(mut self, attempts: u32) -> Self {
        self.config.session.connect_attempts = attempts;
        self
    }

    pub fn default_target(mut self, target: &str) -> Self {
        self.config.session.default_target = Some(target.to_string());
        self
    }

    pub fn no_target(mut self, pattern: &str) -> Self {
        self.config.signatures.no_target.push(pattern.to_string());
        self
    }

    pub fn shell_failed(mut self, needle: &str) -> Self {
        self.config.signatures.shell_failed.push(needle.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
