use super::{Service, ServiceSpec};
use crate::config::{BackupConfig, Secret};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the backup directory is mounted inside job containers
pub const BACKUP_MOUNT: &str = "/backup";

/// The two jobs run per service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Filesystem,
    Database,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Filesystem => "filesystem",
            JobKind::Database => "database",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp token shared by every artifact of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    pub const FORMAT: &'static str = "%Y-%m-%d_%H-%M-%S";

    /// Sample the local clock once for the whole run
    pub fn now() -> Self {
        Self(chrono::Local::now().format(Self::FORMAT).to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    ReadOnly,
    ReadWrite,
}

/// Host path mounted into a job container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub host: PathBuf,
    pub container: String,
    pub mode: VolumeMode,
}

impl VolumeBinding {
    /// `host:container:mode`, as accepted by `docker run -v`
    pub fn to_arg(&self) -> String {
        let mode = match self.mode {
            VolumeMode::ReadOnly => "ro",
            VolumeMode::ReadWrite => "rw",
        };
        format!("{}:{}:{}", self.host.display(), self.container, mode)
    }
}

/// One executable container job
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub service: Service,
    pub kind: JobKind,
    /// Name given to the ephemeral container
    pub container_name: String,
    pub image: String,
    /// Shell command run inside the container
    pub command: String,
    pub volumes: Vec<VolumeBinding>,
    /// Application container whose volumes are mounted
    pub volumes_from: Option<String>,
    pub env: BTreeMap<String, Secret>,
    pub network: Option<String>,
    pub auto_remove: bool,
    /// Host paths of the files the job produces
    pub artifacts: Vec<PathBuf>,
    /// Host path the captured container log is written to
    pub log_path: PathBuf,
}

impl JobSpec {
    /// Archive the service's home (and install) directories with tar
    pub fn filesystem(service: &ServiceSpec, config: &BackupConfig, ts: &RunTimestamp) -> Self {
        let name = &service.name;
        let home_archive = home_archive_name(name, ts);

        let mut command = format!("tar -cvf {}/{} {}", BACKUP_MOUNT, home_archive, service.home_path);
        let mut artifacts = vec![config.backup_dir.join(&home_archive)];

        if let Some(ref install_path) = service.install_path {
            let install_archive = install_archive_name(name, ts);
            command.push_str(&format!(
                " && tar -cvf {}/{} {}",
                BACKUP_MOUNT, install_archive, install_path
            ));
            artifacts.push(config.backup_dir.join(install_archive));
        }

        Self {
            service: service.service,
            kind: JobKind::Filesystem,
            container_name: container_name(name, JobKind::Filesystem, ts),
            image: config.filesystem_image.clone(),
            command,
            volumes: vec![backup_volume(&config.backup_dir)],
            volumes_from: Some(service.container.clone()),
            env: BTreeMap::new(),
            network: None,
            auto_remove: false,
            artifacts,
            log_path: config.backup_dir.join(filesystem_log_name(name, ts)),
        }
    }

    /// Dump the service's database in pg_dump custom format, if it has one
    pub fn database(
        service: &ServiceSpec,
        config: &BackupConfig,
        ts: &RunTimestamp,
    ) -> Option<Self> {
        let database = service.database.as_ref()?;
        let name = &service.name;
        let dump = database_dump_name(name, ts);

        let command = format!(
            "pg_dump -h {} -U {} -F c -f {}/{} {}",
            database.host, database.user, BACKUP_MOUNT, dump, database.name
        );

        let mut env = BTreeMap::new();
        env.insert("PGPASSWORD".to_string(), config.database_password.clone());

        Some(Self {
            service: service.service,
            kind: JobKind::Database,
            container_name: container_name(name, JobKind::Database, ts),
            image: config.database_image.clone(),
            command,
            volumes: vec![backup_volume(&config.backup_dir)],
            volumes_from: None,
            env,
            network: config.network_name.clone(),
            auto_remove: false,
            artifacts: vec![config.backup_dir.join(dump)],
            log_path: config.backup_dir.join(database_log_name(name, ts)),
        })
    }

    /// `service/kind`, for log lines
    pub fn label(&self) -> String {
        format!("{}/{}", self.service, self.kind)
    }
}

fn backup_volume(backup_dir: &Path) -> VolumeBinding {
    VolumeBinding {
        host: backup_dir.to_path_buf(),
        container: BACKUP_MOUNT.to_string(),
        mode: VolumeMode::ReadWrite,
    }
}

fn container_name(service: &str, kind: JobKind, ts: &RunTimestamp) -> String {
    format!("stack-backup-{}-{}-{}", service, kind, ts)
}

fn home_archive_name(service: &str, ts: &RunTimestamp) -> String {
    format!("{}-home-{}.backup.tar", service, ts)
}

fn install_archive_name(service: &str, ts: &RunTimestamp) -> String {
    format!("{}-install-{}.backup.tar", service, ts)
}

fn database_dump_name(service: &str, ts: &RunTimestamp) -> String {
    format!("{}db-{}.pg_dump.fc", service, ts)
}

fn filesystem_log_name(service: &str, ts: &RunTimestamp) -> String {
    format!("{}-bck-{}.log", service, ts)
}

fn database_log_name(service: &str, ts: &RunTimestamp) -> String {
    format!("{}-db-bck-{}.log", service, ts)
}
