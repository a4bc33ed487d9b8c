use super::types::*;
use super::expand_tilde;
use crate::jobs::Service;
use crate::utils::verifier::{MarkerSet, Markers};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load raw configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RawConfig> {
    let contents = fs::read_to_string(path)?;
    let config: RawConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a TOML file and resolve it into a [`BackupConfig`]
pub fn load_backup_config<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
    load_config(path)?.resolve()
}

impl RawConfig {
    /// Apply defaults and validate, producing the configuration for one run
    pub fn resolve(self) -> Result<BackupConfig> {
        let backup_dir = self
            .backup_dir
            .map(|p| expand_tilde(&p))
            .ok_or(ConfigError::MissingField("backup_dir"))?;
        let backup_dir = resolve_backup_dir(&backup_dir)?;

        let database_password = match self.database_password {
            Some(password) if !password.is_empty() => password,
            _ => return Err(ConfigError::MissingField("database_password")),
        };

        if self.containers.is_empty() {
            return Err(ConfigError::ValidationError(
                "No service containers configured".to_string(),
            ));
        }

        for (service, container) in &self.containers {
            if container.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Container identifier for '{}' is empty",
                    service
                )));
            }
        }

        let retention_days = self.retention_days.unwrap_or_else(default_retention_days);
        if retention_days == 0 {
            return Err(ConfigError::ValidationError(
                "retention_days must be at least 1".to_string(),
            ));
        }

        let identity_service_version = self.identity_service_version;
        if self.containers.contains_key(&Service::IdentityService) {
            match identity_service_version.as_deref() {
                None => return Err(ConfigError::MissingField("identity_service_version")),
                Some(version) => validate_token("identity_service_version", version)?,
            }
        }

        let database_host = self.database_host.unwrap_or_else(default_database_host);
        validate_token("database_host", &database_host)?;

        let job_timeout_seconds = self.job_timeout_seconds.unwrap_or_else(default_timeout);
        if job_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "job_timeout_seconds must be at least 1".to_string(),
            ));
        }

        let markers = resolve_markers(self.markers)?;

        Ok(BackupConfig {
            backup_dir,
            containers: self.containers,
            database_password,
            database_host,
            network_name: self.network_name.filter(|n| !n.is_empty()),
            retention_days,
            identity_service_version,
            filesystem_image: self.filesystem_image.unwrap_or_else(default_filesystem_image),
            database_image: self.database_image.unwrap_or_else(default_database_image),
            job_timeout: Duration::from_secs(job_timeout_seconds),
            sweep_phase: self.sweep_phase.unwrap_or_default(),
            markers,
            logging: LogSettings {
                level: self.log_level.unwrap_or_else(default_log_level),
                directory: expand_tilde(
                    &self.log_directory.unwrap_or_else(default_log_directory),
                ),
                max_files: self.log_max_files.unwrap_or_else(default_log_max_files),
            },
        })
    }
}

/// The backup directory is bind-mounted into job containers as
/// `host:container:mode`, so it must be absolute and free of `:`.
/// A relative host path would be taken as a named volume.
fn resolve_backup_dir(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("backup_dir"));
    }

    if path.to_string_lossy().contains(':') {
        return Err(ConfigError::ValidationError(format!(
            "backup_dir must not contain ':': {:?}",
            path
        )));
    }

    std::path::absolute(path).map_err(|e| {
        ConfigError::ValidationError(format!("Cannot resolve backup_dir {:?}: {}", path, e))
    })
}

fn resolve_markers(config: MarkerConfig) -> Result<Markers> {
    let mut markers = Markers::default();

    if let Some(list) = config.filesystem {
        markers.filesystem = marker_set("markers.filesystem", list)?;
    }
    if let Some(list) = config.database {
        markers.database = marker_set("markers.database", list)?;
    }

    Ok(markers)
}

fn marker_set(key: &str, list: Vec<String>) -> Result<MarkerSet> {
    // An empty marker would match every line
    if list.iter().any(|m| m.is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "{} contains an empty marker",
            key
        )));
    }
    Ok(MarkerSet::new(list))
}

/// Values interpolated into job commands are restricted to a safe alphabet
fn validate_token(key: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));

    if !valid {
        return Err(ConfigError::ValidationError(format!(
            "{} contains unsupported characters: {:?}",
            key, value
        )));
    }
    Ok(())
}
