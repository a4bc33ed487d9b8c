//! Stack Backup Library
//!
//! This library provides backup orchestration for a containerized
//! application stack: filesystem archives and database dumps per service,
//! verified from their logs, plus a retention sweep of old artifacts.

pub mod config;
pub mod jobs;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_backup_config, BackupConfig, RawConfig, Secret, SweepPhase};
pub use jobs::{JobKind, JobSpec, RunTimestamp, Service, ServiceSpec};
pub use managers::backup::{BackupOrchestrator, RunReport, ServiceOutcome};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::retention::RetentionSweeper;
