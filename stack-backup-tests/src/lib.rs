//! Test utilities for stack-backup
//!
//! This crate provides shared test utilities, re-exported mock
//! implementations, and helper functions for testing stack-backup.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockContainerOps};
//! use stack_backup::BackupOrchestrator;
//!
//! #[test]
//! fn my_test() {
//!     let builder = ConfigBuilder::all_services();
//!     let orchestrator = BackupOrchestrator::new(builder.build(), MockContainerOps::new());
//!     let report = orchestrator.run().unwrap();
//!     // ... assertions
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext, TEST_TIMESTAMP};

// Re-export types from the main crate for convenience
pub use stack_backup::config::{BackupConfig, RawConfig, Secret, SweepPhase};
pub use stack_backup::jobs::{JobKind, JobSpec, RunTimestamp, Service, ServiceSpec};

// Re-export mock implementations from the main crate
pub use stack_backup::utils::docker_ops::mock::{ContainerCall, JobScript, MockContainerOps};
pub use stack_backup::utils::docker_ops::ContainerOperations;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
