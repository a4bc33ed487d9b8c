//! Test fixtures and sample data
//!
//! Provides sample job logs, config templates and helpers for aging files.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// One day
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Output of a successful filesystem archive job
pub fn tar_success_log() -> &'static str {
    "tar: Removing leading `/' from member names\n\
     /var/atlassian/application-data/jira/\n\
     /var/atlassian/application-data/jira/dbconfig.xml\n\
     /var/atlassian/application-data/jira/data/attachments/\n"
}

/// Output of a filesystem archive job that hit a missing path
pub fn tar_missing_path_log() -> &'static str {
    "tar: Removing leading `/' from member names\n\
     tar: /opt/atlassian/jira: Cannot stat: No such file or directory\n\
     tar: Exiting with failure status due to previous errors\n"
}

/// Output of a filesystem archive job without read access
pub fn tar_permission_denied_log() -> &'static str {
    "tar: /var/atlassian/application-data/wiki/shared-home: Cannot open: Permission denied\n"
}

/// Output of a database dump that could not resolve its host
pub fn pg_dump_host_unknown_log() -> &'static str {
    "pg_dump: error: could not translate host name \"postgres\" to address: Name or service not known\n"
}

/// Output of a database dump rejected by the server
pub fn pg_dump_auth_failure_log() -> &'static str {
    "pg_dump: error: connection to server at \"postgres\" (172.18.0.2), port 5432 failed: \
     FATAL:  password authentication failed for user \"jira\"\n"
}

/// Output of a database dump against a missing database
pub fn pg_dump_missing_database_log() -> &'static str {
    "pg_dump: error: connection to server failed: FATAL:  database \"crowddb\" does not exist\n"
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
backup_dir = "{backup_dir}"
database_password = "secret"
log_directory = "{log_dir}"

[containers]
issue-tracker = "astack_jira_1"
"#
}

/// Config with every service and most settings
pub fn full_config_toml() -> &'static str {
    r#"
backup_dir = "{backup_dir}"
database_password = "secret"
database_host = "postgres"
network_name = "astack_default"
retention_days = 3
identity_service_version = "2.10.1"
job_timeout_seconds = 600
sweep_phase = "after"
log_level = "debug"
log_directory = "{log_dir}"

[containers]
issue-tracker = "astack_jira_1"
wiki = "astack_confluence_1"
code-host = "astack_bitbucket_1"
identity-service = "astack_crowd_1"

[markers]
database = ["refused", "not known"]
"#
}

/// Fill a config template's placeholders
pub fn render_config(template: &str, backup_dir: &Path, log_dir: &Path) -> String {
    template
        .replace("{backup_dir}", &backup_dir.display().to_string())
        .replace("{log_dir}", &log_dir.display().to_string())
}

/// Create `name` in `dir` with a modification time `age` in the past
pub fn create_aged_file(dir: &Path, name: &str, age: Duration) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).expect("Failed to create file");
    file.set_modified(SystemTime::now() - age)
        .expect("Failed to set modification time");
    path
}

/// Artifact and log names a filesystem job produces for `service` at `ts`
pub fn filesystem_file_names(service: &str, ts: &str) -> Vec<String> {
    vec![
        format!("{}-home-{}.backup.tar", service, ts),
        format!("{}-install-{}.backup.tar", service, ts),
        format!("{}-bck-{}.log", service, ts),
    ]
}

/// Artifact and log names a database job produces for `service` at `ts`
pub fn database_file_names(service: &str, ts: &str) -> Vec<String> {
    vec![
        format!("{}db-{}.pg_dump.fc", service, ts),
        format!("{}-db-bck-{}.log", service, ts),
    ]
}
