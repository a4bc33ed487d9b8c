//! Configuration module for stack-backup
//!
//! This module handles loading, validating, and resolving configuration.
//!
//! ## Sources
//!
//! Settings come from exactly one of two sources:
//! 1. A TOML configuration file (`--config`)
//! 2. Command-line flags
//!
//! Both produce a [`RawConfig`], which [`RawConfig::resolve`] turns into the
//! immutable [`BackupConfig`] consumed by the orchestrator.
//!
//! ## Example Usage
//!
//! ```no_run
//! use stack_backup::config;
//!
//! let config = config::load_backup_config("stack-backup.toml")?;
//!
//! for service in config.services() {
//!     println!("Service: {}, Container: {}", service.name, service.container);
//! }
//! # Ok::<(), stack_backup::config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_backup_config, load_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
