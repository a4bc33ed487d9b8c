//! Tests for the 'run' command
//!
//! A run sweeps expired artifacts and backs up every configured service.

use stack_backup::managers::backup::{AbortReason, FailureReason, JobOutcome, RunError};
use stack_backup::utils::locker::RunLock;
use std::fs;
use test_utils::{
    database_file_names, filesystem_file_names, pg_dump_host_unknown_log, tar_missing_path_log,
    ConfigBuilder, JobKind, JobScript, MockContainerOps, Service, SweepPhase, TestContext, DAY,
    TEST_TIMESTAMP,
};

#[test]
fn test_all_jobs_succeed_and_sweep_finds_nothing() {
    let ctx = TestContext::new();

    let report = ctx.run().unwrap();

    assert!(report.overall_success);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.files_removed, 0);
    assert_eq!(report.abort_reason, None);
    assert_eq!(report.outcomes.len(), 4);
    assert!(report.outcomes.iter().all(|o| o.is_success()));
}

#[test]
fn test_one_outcome_per_service_in_order() {
    let ctx = TestContext::new();

    let report = ctx.run().unwrap();

    let names: Vec<_> = report.outcomes.iter().map(|o| o.service.as_str()).collect();
    assert_eq!(names, ["issue-tracker", "wiki", "code-host", "identity-service"]);
}

#[test]
fn test_database_failure_on_second_service_is_isolated() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::all_services().with_sweep_phase(SweepPhase::After),
    )
    .with_mock(MockContainerOps::new().with_logs(
        Service::Wiki,
        JobKind::Database,
        pg_dump_host_unknown_log(),
    ));
    let expired = ctx.create_aged_backup_file("issue-tracker-home-old.backup.tar", 30 * DAY);

    let report = ctx.run().unwrap();

    assert!(!report.overall_success);
    assert_eq!(report.exit_code(), 1);

    let wiki = &report.outcomes[1];
    assert!(wiki.filesystem.is_success());
    match wiki.database {
        Some(JobOutcome::Failure {
            reason: FailureReason::MarkerMatched { ref marker, .. },
            ..
        }) => assert_eq!(marker, "not known"),
        ref other => panic!("Expected marker failure, got {:?}", other),
    }

    for index in [0, 2, 3] {
        assert!(report.outcomes[index].is_success());
    }

    // The run still reached the sweep phase
    assert_eq!(report.files_removed, 1);
    assert!(!expired.exists());
}

#[test]
fn test_failures_accumulate_across_services() {
    let mock = MockContainerOps::new()
        .with_logs(Service::IssueTracker, JobKind::Filesystem, tar_missing_path_log())
        .with_launch_failure(Service::Wiki, JobKind::Database, "image not found")
        .with_hang(Service::CodeHost, JobKind::Filesystem);
    let ctx = TestContext::new().with_mock(mock);

    let report = ctx.run().unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert!(!report.outcomes[0].is_success());
    assert!(!report.outcomes[1].is_success());
    assert!(!report.outcomes[2].is_success());
    assert!(report.outcomes[3].is_success());

    assert!(matches!(
        report.outcomes[2].filesystem,
        JobOutcome::Failure {
            reason: FailureReason::TimeoutExceeded,
            ..
        }
    ));
    assert!(ctx.mock().live_containers().is_empty());
}

#[test]
fn test_nonzero_exit_without_marker_fails() {
    let mock = MockContainerOps::new().with_job(
        Service::IdentityService,
        JobKind::Database,
        JobScript {
            logs: "pg_dump: aborting\n".to_string(),
            exit_code: 1,
            ..Default::default()
        },
    );
    let ctx = TestContext::new().with_mock(mock);

    let report = ctx.run().unwrap();

    assert_eq!(
        report.outcomes[3].database.as_ref().map(|o| o.is_success()),
        Some(false)
    );
    assert!(!report.overall_success);
}

#[test]
fn test_backend_unreachable_at_start() {
    let ctx = TestContext::new().with_mock(MockContainerOps::new().unreachable());
    let expired = ctx.create_aged_backup_file("wiki-home-old.backup.tar", 30 * DAY);

    let report = ctx.run().unwrap();

    assert!(!report.overall_success);
    assert_eq!(report.exit_code(), 1);
    assert!(report.outcomes.is_empty());
    assert_eq!(report.abort_reason, Some(AbortReason::BackendUnavailable));
    // Nothing, not even the sweep, runs after the probe fails
    assert!(expired.exists());
    assert!(ctx.mock().launched().is_empty());
}

#[test]
fn test_logs_and_artifact_paths_use_run_timestamp() {
    let ctx = TestContext::new();

    let report = ctx.run().unwrap();

    let log_names: Vec<_> = filesystem_file_names("wiki", TEST_TIMESTAMP)
        .into_iter()
        .chain(database_file_names("wiki", TEST_TIMESTAMP))
        .filter(|name| name.ends_with(".log"))
        .collect();
    for name in &log_names {
        assert!(ctx.backup_file_exists(name), "missing job log {}", name);
    }

    match &report.outcomes[1].filesystem {
        JobOutcome::Success { artifacts, .. } => {
            let expected: Vec<_> = filesystem_file_names("wiki", TEST_TIMESTAMP)
                .into_iter()
                .filter(|name| name.ends_with(".tar"))
                .map(|name| ctx.backup_dir().join(name))
                .collect();
            assert_eq!(artifacts, &expected);
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[test]
fn test_second_run_with_same_timestamp_does_not_overwrite() {
    let ctx = TestContext::new();

    assert!(ctx.run().unwrap().overall_success);
    let second = ctx.run().unwrap();

    // Every job log of the first run already exists
    assert!(!second.overall_success);
    assert!(second.outcomes.iter().all(|o| matches!(
        o.filesystem,
        JobOutcome::Failure {
            reason: FailureReason::LaunchFailed { .. },
            ..
        }
    )));
}

#[test]
fn test_concurrent_run_is_locked_out() {
    let ctx = TestContext::new();
    let _held = RunLock::acquire(&ctx.backup_dir()).unwrap();

    assert!(matches!(ctx.run(), Err(RunError::Lock(_))));
    assert!(ctx.mock().get_calls().is_empty());
}

#[test]
fn test_report_serializes_to_json() {
    let ctx = TestContext::new()
        .with_mock(MockContainerOps::new().with_hang(Service::Wiki, JobKind::Database));

    let report = ctx.run().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["timestamp"], TEST_TIMESTAMP);
    assert_eq!(json["overall_success"], false);
    assert_eq!(json["outcomes"][1]["service"], "wiki");
    assert_eq!(json["outcomes"][1]["database"]["status"], "failure");
    assert_eq!(
        json["outcomes"][1]["database"]["reason"]["kind"],
        "timeout-exceeded"
    );
}

#[test]
fn test_failed_after_sweep_still_runs_every_job() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::all_services().with_sweep_phase(SweepPhase::After),
    );
    let backup_dir = ctx.backup_dir();
    let mock = MockContainerOps::new().on_launch(
        Service::IdentityService,
        JobKind::Database,
        move |_| fs::remove_dir_all(&backup_dir).unwrap(),
    );
    let ctx = ctx.with_mock(mock);

    let report = ctx.run().unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert!(report.outcomes.iter().all(|o| o.is_success()));
    assert_eq!(ctx.mock().launched().len(), 8);
    assert!(report.sweep_failure.is_some());
    assert_eq!(report.abort_reason, None);
    assert!(!report.overall_success);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_interrupted_job_is_recorded_and_run_continues() {
    let ctx = TestContext::new().with_mock(MockContainerOps::new().with_wait_error(
        Service::Wiki,
        JobKind::Filesystem,
        "No such container",
    ));

    let report = ctx.run().unwrap();

    assert!(matches!(
        report.outcomes[1].filesystem,
        JobOutcome::Failure {
            reason: FailureReason::Interrupted { .. },
            ..
        }
    ));
    assert!(report.outcomes[1].database.as_ref().unwrap().is_success());
    assert!(report.outcomes[2].is_success());
    assert!(!report.overall_success);
    assert!(ctx.mock().live_containers().is_empty());
}
