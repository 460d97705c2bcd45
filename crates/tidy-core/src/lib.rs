//! tidy core - shared functionality for the tidy runner
//!
//! Paths, project configuration, tool lookup and output formatting.

pub mod config;
pub mod format;
pub mod paths;
pub mod process;

pub use config::{ConfigError, ProjectConfig};
pub use paths::Paths;
