// src/config/mod.rs

//! Configuration file handling.
//!
//! - [`model`] holds the serde data model for `Devctl.toml`.
//! - [`loader`] reads and deserializes the file.
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, SessionSection, SignatureSection, ToolSection};
