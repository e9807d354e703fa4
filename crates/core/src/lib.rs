//! matcher-core
//!
//! Core library for matching classes, methods and fields between two builds
//! of an obfuscated JVM program.
//!
//! This crate defines the class-file loader, the per-side entity model, the
//! class environment, the classifier framework, the matcher itself, input
//! acquisition and the plugin API.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, review tools, etc.).

pub mod classifier;
pub mod config;
pub mod env;
pub mod error;
pub mod input;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod plugin;

pub use error::{MatcherError, MatcherResult};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
