// src/exec/mod.rs

//! Process execution layer.
//!
//! This module owns everything that touches OS processes:
//!
//! - [`command`] is the immutable argument vector handed to the runner.
//! - [`drainer`] moves a child's stdout/stderr into in-memory queues on
//!   dedicated threads.
//! - [`process`] wraps a spawned child so its owner and the registry can
//!   both reach it.
//! - [`registry`] tracks every spawned process for bulk teardown.
//! - [`runner`] runs one command to completion with timeout and no-target
//!   detection.
//! - [`handle`] wraps long-lived processes (log capture, interactive shell).
//! - [`backend`] provides the `CommandBackend` trait that the session layer
//!   runs commands through, and which tests replace with a fake.

pub mod backend;
pub mod command;
pub mod drainer;
pub mod handle;
pub mod patterns;
pub mod process;
pub mod registry;
pub mod runner;

pub use backend::CommandBackend;
pub use command::Command;
pub use drainer::StreamDrainer;
pub use handle::{HandleState, NonBlockingHandle};
pub use patterns::NoTargetPatterns;
pub use registry::ProcessRegistry;
pub use runner::{BlockingRunner, CapturedOutput, DEFAULT_POLL_INTERVAL};
