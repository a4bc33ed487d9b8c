//! Test context and harness for orchestrator testing
//!
//! Provides a unified context for setting up a configuration, a mock
//! backend and a backup directory with pre-existing files.

use crate::config_builder::ConfigBuilder;
use crate::fixtures::create_aged_file;
use anyhow::Result;
use stack_backup::config::BackupConfig;
use stack_backup::jobs::RunTimestamp;
use stack_backup::managers::backup::{BackupOrchestrator, RunError, RunReport};
use stack_backup::utils::docker_ops::mock::MockContainerOps;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed timestamp used by [`TestContext::run`]
pub const TEST_TIMESTAMP: &str = "2021-01-01_00-00-00";

/// Test context that owns a configuration and the mock backend it runs against
pub struct TestContext {
    builder: ConfigBuilder,
    mock: MockContainerOps,
}

impl TestContext {
    /// Create a test context with all four services
    pub fn new() -> Self {
        Self::from_builder(ConfigBuilder::all_services())
    }

    /// Create a test context from a ConfigBuilder
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        Self {
            builder,
            mock: MockContainerOps::new(),
        }
    }

    /// Replace the mock backend
    pub fn with_mock(mut self, mock: MockContainerOps) -> Self {
        self.mock = mock;
        self
    }

    /// The mock backend; clones share recorded state
    pub fn mock(&self) -> &MockContainerOps {
        &self.mock
    }

    /// The resolved configuration
    pub fn config(&self) -> BackupConfig {
        self.builder.build()
    }

    /// Get the backup directory path
    pub fn backup_dir(&self) -> PathBuf {
        self.builder.backup_dir()
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.builder.temp_path()
    }

    /// An orchestrator over this context's config and mock
    pub fn orchestrator(&self) -> BackupOrchestrator<MockContainerOps> {
        BackupOrchestrator::new(self.config(), self.mock.clone())
    }

    /// Run the orchestrator with [`TEST_TIMESTAMP`]
    pub fn run(&self) -> Result<RunReport, RunError> {
        self.orchestrator()
            .run_with_timestamp(RunTimestamp::new(TEST_TIMESTAMP))
    }

    /// Create a file in the backup directory
    pub fn create_backup_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.backup_dir().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Create a file in the backup directory aged by `age`
    pub fn create_aged_backup_file(&self, name: &str, age: Duration) -> PathBuf {
        create_aged_file(&self.backup_dir(), name, age)
    }

    /// Check if a file exists in the backup directory
    pub fn backup_file_exists(&self, name: &str) -> bool {
        self.backup_dir().join(name).exists()
    }

    /// Read a file from the backup directory
    pub fn read_backup_file(&self, name: &str) -> Result<String> {
        let path = self.backup_dir().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err
    fn assert_err(self);

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display + std::fmt::Debug> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    }

    fn assert_err(self) {
        if let Ok(v) = self {
            panic!("Expected Err, got Ok: {:?}", v);
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}

/// Extension trait for Option assertions
pub trait OptionAssertions<T> {
    /// Assert that the option is Some and return the value
    fn assert_some(self) -> T;

    /// Assert that the option is None
    fn assert_none(self);
}

impl<T: std::fmt::Debug> OptionAssertions<T> for Option<T> {
    fn assert_some(self) -> T {
        match self {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    }

    fn assert_none(self) {
        if let Some(v) = self {
            panic!("Expected None, got Some: {:?}", v);
        }
    }
}
