//! Filesystem job integration tests
//!
//! Archive the volumes of a stand-in application container with real tar
//! jobs. Run with: `cargo test -p stack-backup-tests --test integration -- --ignored`

use super::common::{container_exists, docker, is_docker_available, unique, ContainerGuard};
use stack_backup::utils::docker_ops::ContainerOperations;
use stack_backup::utils::job_runner::{JobRunner, JobStatus};
use stack_backup::utils::RealDockerOps;
use stack_backup::BackupOrchestrator;
use std::time::Duration;
use test_utils::{ConfigBuilder, JobSpec, RunTimestamp, Service};

const IMAGE: &str = "alpine:3.19";

/// Start a container exposing the issue tracker's home and install volumes
fn start_application_container(name: &str) {
    docker(&[
        "run",
        "-d",
        "--name",
        name,
        "-v",
        "/var/atlassian/application-data/jira",
        "-v",
        "/opt/atlassian/jira",
        IMAGE,
        "sh",
        "-c",
        "echo home > /var/atlassian/application-data/jira/dbconfig.xml && \
         echo install > /opt/atlassian/jira/VERSION && sleep 600",
    ]);
}

#[test]
#[ignore] // Requires Docker
fn test_backend_ping() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let ops = RealDockerOps::new().unwrap();
    let version = ops.ping().unwrap();
    assert!(!version.is_empty());
}

#[test]
#[ignore] // Requires Docker
fn test_filesystem_backup_of_application_container() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let app = unique("stack-backup-app");
    let _guard = ContainerGuard::new(app.clone());
    start_application_container(&app);

    let builder = ConfigBuilder::new()
        .add_service_container(Service::IssueTracker, &app)
        .with_images(IMAGE, "postgres:16-alpine");
    let config = builder.build();
    let services = config.services();
    let job = JobSpec::filesystem(&services[0], &config, &RunTimestamp::now());

    let ops = RealDockerOps::new().unwrap();
    let result = JobRunner::new(&ops)
        .execute(&job, Duration::from_secs(120))
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed { exit_code: 0 });
    for artifact in &job.artifacts {
        assert!(artifact.exists(), "missing archive {:?}", artifact);
    }
    assert!(job.log_path.exists());
    assert!(!container_exists(&job.container_name));
}

#[test]
#[ignore] // Requires Docker
fn test_missing_install_directory_fails_verification() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    // Only the home volume exists, so archiving the install path fails
    let app = unique("stack-backup-app");
    let _guard = ContainerGuard::new(app.clone());
    docker(&[
        "run",
        "-d",
        "--name",
        &app,
        "-v",
        "/var/atlassian/application-data/jira",
        IMAGE,
        "sleep",
        "600",
    ]);

    let builder = ConfigBuilder::new()
        .add_service_container(Service::IssueTracker, &app)
        .with_images(IMAGE, "postgres:16-alpine")
        .with_database_host("no-such-host");
    let orchestrator = BackupOrchestrator::new(builder.build(), RealDockerOps::new().unwrap());

    let report = orchestrator.run().unwrap();

    assert!(!report.overall_success);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!report.outcomes[0].filesystem.is_success());
}

#[test]
#[ignore] // Requires Docker
fn test_hung_job_is_killed_and_removed() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let app = unique("stack-backup-app");
    let _guard = ContainerGuard::new(app.clone());
    start_application_container(&app);

    let builder = ConfigBuilder::new()
        .add_service_container(Service::IssueTracker, &app)
        .with_images(IMAGE, "postgres:16-alpine");
    let config = builder.build();
    let services = config.services();
    let mut job = JobSpec::filesystem(&services[0], &config, &RunTimestamp::now());
    job.command = "echo started && sleep 300".to_string();

    let ops = RealDockerOps::new().unwrap();
    let result = JobRunner::new(&ops)
        .execute(&job, Duration::from_secs(3))
        .unwrap();

    assert!(matches!(result.status, JobStatus::TimedOut { .. }));
    assert!(result.log.contains("timeout-exceeded"));
    assert!(!container_exists(&job.container_name));
}
