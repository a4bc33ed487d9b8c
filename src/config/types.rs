use crate::jobs::{Service, ServiceSpec};
use crate::utils::verifier::Markers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration as read from a TOML file or assembled from CLI flags.
///
/// Every field is optional here; [`RawConfig::resolve`] applies defaults and
/// validation and produces the immutable [`BackupConfig`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Directory receiving all archives, dumps and job logs
    pub backup_dir: Option<PathBuf>,

    /// Container identifier per backed-up service
    #[serde(default)]
    pub containers: BTreeMap<Service, String>,

    /// Password used by the database dump jobs
    pub database_password: Option<Secret>,

    /// Database server host name, as seen from the job network
    pub database_host: Option<String>,

    /// Container network the database jobs join
    pub network_name: Option<String>,

    /// Age in days after which backup artifacts are swept
    pub retention_days: Option<u32>,

    /// Installed identity-service version (part of its install path)
    pub identity_service_version: Option<String>,

    /// Images used for the job containers
    pub filesystem_image: Option<String>,
    pub database_image: Option<String>,

    /// Per-job timeout
    pub job_timeout_seconds: Option<u64>,

    /// Whether the retention sweep runs before or after the backup jobs
    pub sweep_phase: Option<SweepPhase>,

    /// Logging configuration
    pub log_level: Option<String>,
    pub log_directory: Option<PathBuf>,
    pub log_max_files: Option<u32>,

    /// Verification marker overrides
    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Marker overrides per job kind; `None` keeps the built-in list
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerConfig {
    #[serde(default)]
    pub filesystem: Option<Vec<String>>,
    #[serde(default)]
    pub database: Option<Vec<String>>,
}

/// When the retention sweep runs relative to the backup jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SweepPhase {
    #[default]
    Before,
    After,
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub containers: BTreeMap<Service, String>,
    pub database_password: Secret,
    pub database_host: String,
    pub network_name: Option<String>,
    pub retention_days: u32,
    pub identity_service_version: Option<String>,
    pub filesystem_image: String,
    pub database_image: String,
    pub job_timeout: Duration,
    pub sweep_phase: SweepPhase,
    pub markers: Markers,
    pub logging: LogSettings,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub directory: PathBuf,
    pub max_files: u32,
}

impl BackupConfig {
    /// Retention window as a duration
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }

    /// Configured services, in processing order
    pub fn services(&self) -> Vec<ServiceSpec> {
        Service::ALL
            .iter()
            .filter_map(|service| {
                self.containers.get(service).map(|container| {
                    ServiceSpec::new(
                        *service,
                        container,
                        self.identity_service_version.as_deref(),
                        &self.database_host,
                    )
                })
            })
            .collect()
    }

    /// Names of every known service, used by the retention sweep
    pub fn service_names(&self) -> Vec<&'static str> {
        Service::ALL.iter().map(|s| s.name()).collect()
    }
}

/// A string that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

// Default value functions

pub(crate) fn default_retention_days() -> u32 { 7 }
pub(crate) fn default_database_host() -> String { "postgres".to_string() }
pub(crate) fn default_filesystem_image() -> String { "centos:latest".to_string() }
pub(crate) fn default_database_image() -> String { "postgres:latest".to_string() }
pub(crate) fn default_timeout() -> u64 { 3600 }
pub(crate) fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
pub(crate) fn default_log_level() -> String { "info".to_string() }
pub(crate) fn default_log_max_files() -> u32 { 10 }
