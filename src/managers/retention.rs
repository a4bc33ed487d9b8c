//! Retention sweep - deletes expired backup artifacts

use crate::config::BackupConfig;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Failed to read backup directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files touched by one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub removed: Vec<PathBuf>,
    /// Expired files that could not be deleted
    pub failed: Vec<PathBuf>,
}

impl SweepSummary {
    pub fn count_removed(&self) -> usize {
        self.removed.len()
    }
}

/// Deletes files older than the retention window whose name contains a
/// service name. Only regular files directly inside the directory are
/// considered.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    directory: PathBuf,
    threshold: Duration,
    service_names: Vec<String>,
}

impl RetentionSweeper {
    pub fn new<I, S>(directory: impl Into<PathBuf>, threshold: Duration, service_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directory: directory.into(),
            threshold,
            service_names: service_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(
            config.backup_dir.clone(),
            config.retention(),
            config.service_names(),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Sweep against the current time
    pub fn sweep(&self) -> Result<SweepSummary, SweepError> {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep treating `now` as the current time.
    ///
    /// A file that cannot be inspected or deleted is logged and skipped;
    /// only an unreadable directory fails the sweep.
    pub fn sweep_at(&self, now: SystemTime) -> Result<SweepSummary, SweepError> {
        self.sweep_with(now, |path| fs::remove_file(path))
    }

    fn sweep_with<F>(&self, now: SystemTime, mut remove: F) -> Result<SweepSummary, SweepError>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        info!(
            "Sweeping {:?} for backups older than {} days",
            self.directory,
            self.threshold.as_secs() / 86_400
        );

        let entries = fs::read_dir(&self.directory).map_err(|source| SweepError::ReadDir {
            path: self.directory.clone(),
            source,
        })?;

        let mut summary = SweepSummary::default();

        // Nothing can be older than a cutoff before the epoch
        let Some(cutoff) = now.checked_sub(self.threshold) else {
            info!("No expired backups found");
            return Ok(summary);
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if !self.service_names.iter().any(|s| name.contains(s.as_str())) {
                continue;
            }

            match entry.file_type() {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to inspect {:?}: {}", path, e);
                    continue;
                }
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Failed to read modification time of {:?}: {}", path, e);
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match remove(&path) {
                Ok(()) => {
                    debug!("Removed expired backup: {:?}", path);
                    summary.removed.push(path);
                }
                Err(e) => {
                    warn!("Failed to remove expired backup {:?}: {}", path, e);
                    summary.failed.push(path);
                }
            }
        }

        if summary.removed.is_empty() {
            info!("No expired backups found");
        } else {
            info!("{} expired backup file(s) removed", summary.count_removed());
        }
        if !summary.failed.is_empty() {
            warn!("{} expired backup file(s) could not be removed", summary.failed.len());
        }

        Ok(summary)
    }
}
