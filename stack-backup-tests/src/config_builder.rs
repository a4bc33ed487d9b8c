//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.
//! Every builder owns a temporary directory holding the backup and log directories.

use stack_backup::config::{BackupConfig, MarkerConfig, RawConfig, Secret, SweepPhase};
use stack_backup::jobs::Service;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Container identifier used for a service unless overridden
pub fn default_container(service: Service) -> String {
    format!("astack_{}_1", service)
}

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    raw: RawConfig,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no services
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let backup_dir = temp_dir.path().join("backups");
        fs::create_dir_all(&backup_dir).expect("Failed to create backup dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let raw = RawConfig {
            backup_dir: Some(backup_dir),
            database_password: Some(Secret::new("test-password-123")),
            log_directory: Some(log_directory),
            log_max_files: Some(5),
            job_timeout_seconds: Some(60),
            ..Default::default()
        };

        Self { temp_dir, raw }
    }

    /// Create a config with a single issue tracker service
    pub fn minimal() -> Self {
        Self::new().add_service(Service::IssueTracker)
    }

    /// Create a config with all four services configured
    pub fn all_services() -> Self {
        Service::ALL
            .iter()
            .fold(Self::new(), |builder, service| builder.add_service(*service))
            .with_identity_service_version("2.10.1")
    }

    /// Add a service using its default container identifier
    pub fn add_service(self, service: Service) -> Self {
        self.add_service_container(service, &default_container(service))
    }

    /// Add a service with a specific container identifier
    pub fn add_service_container(mut self, service: Service, container: &str) -> Self {
        self.raw.containers.insert(service, container.to_string());
        self
    }

    /// Set the database password
    pub fn with_password(mut self, password: &str) -> Self {
        self.raw.database_password = Some(Secret::new(password));
        self
    }

    /// Remove the database password
    pub fn without_password(mut self) -> Self {
        self.raw.database_password = None;
        self
    }

    /// Set the backup directory
    pub fn with_backup_dir(mut self, path: &Path) -> Self {
        self.raw.backup_dir = Some(path.to_path_buf());
        self
    }

    /// Set the retention window in days
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.raw.retention_days = Some(days);
        self
    }

    /// Set when the sweep runs
    pub fn with_sweep_phase(mut self, phase: SweepPhase) -> Self {
        self.raw.sweep_phase = Some(phase);
        self
    }

    /// Set the job network
    pub fn with_network(mut self, network: &str) -> Self {
        self.raw.network_name = Some(network.to_string());
        self
    }

    /// Set the database host
    pub fn with_database_host(mut self, host: &str) -> Self {
        self.raw.database_host = Some(host.to_string());
        self
    }

    /// Set the identity service version
    pub fn with_identity_service_version(mut self, version: &str) -> Self {
        self.raw.identity_service_version = Some(version.to_string());
        self
    }

    /// Set the per-job timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.raw.job_timeout_seconds = Some(seconds);
        self
    }

    /// Set the job images
    pub fn with_images(mut self, filesystem: &str, database: &str) -> Self {
        self.raw.filesystem_image = Some(filesystem.to_string());
        self.raw.database_image = Some(database.to_string());
        self
    }

    /// Override the verification markers
    pub fn with_markers(mut self, filesystem: Option<Vec<&str>>, database: Option<Vec<&str>>) -> Self {
        let owned = |list: Vec<&str>| list.into_iter().map(String::from).collect();
        self.raw.markers = MarkerConfig {
            filesystem: filesystem.map(owned),
            database: database.map(owned),
        };
        self
    }

    /// Path of the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.raw
            .backup_dir
            .clone()
            .expect("backup_dir was removed from the builder")
    }

    /// Get the temp directory path
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The unresolved configuration
    pub fn raw(&self) -> RawConfig {
        self.raw.clone()
    }

    /// Resolve the configuration, panicking when it is invalid
    pub fn build(&self) -> BackupConfig {
        self.raw().resolve().expect("Test configuration failed to resolve")
    }

    /// Serialize the configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string(&self.raw).expect("Failed to serialize config")
    }

    /// Write the configuration to `stack-backup.toml` in the temp dir
    pub fn write_config_file(&self) -> PathBuf {
        let path = self.temp_dir.path().join("stack-backup.toml");
        fs::write(&path, self.to_toml()).expect("Failed to write config file");
        path
    }

    /// Build the config and return it with the temp dir
    pub fn persist(self) -> (BackupConfig, TempDir) {
        let config = self.build();
        (config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
