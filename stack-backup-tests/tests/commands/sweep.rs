//! Tests for the 'sweep' command
//!
//! The sweep command removes expired artifacts without running any job.

use stack_backup::managers::retention::SweepError;
use stack_backup::RetentionSweeper;
use std::fs;
use test_utils::{ConfigBuilder, MockContainerOps, SweepPhase, TestContext, DAY};

#[test]
fn test_sweep_removes_only_expired_service_files() {
    let ctx = TestContext::from_builder(ConfigBuilder::all_services().with_retention_days(3));
    let expired = ctx.create_aged_backup_file("issue-tracker-home-2021-01-01.backup.tar", 10 * DAY);
    let notes = ctx.create_aged_backup_file("notes.txt", 10 * DAY);
    let recent = ctx.create_aged_backup_file("wikidb-2021-01-09.pg_dump.fc", DAY);

    let summary = RetentionSweeper::from_config(&ctx.config()).sweep().unwrap();

    assert_eq!(summary.removed, vec![expired.clone()]);
    assert!(summary.failed.is_empty());
    assert!(!expired.exists());
    assert!(notes.exists());
    assert!(recent.exists());
}

#[test]
fn test_sweep_is_idempotent() {
    let ctx = TestContext::new();
    ctx.create_aged_backup_file("code-host-bck-old.log", 30 * DAY);

    let sweeper = RetentionSweeper::from_config(&ctx.config());
    assert_eq!(sweeper.sweep().unwrap().count_removed(), 1);
    assert_eq!(sweeper.sweep().unwrap().count_removed(), 0);
}

#[test]
fn test_sweep_of_missing_directory_fails() {
    let builder = ConfigBuilder::minimal();
    let missing = builder.temp_path().join("never-created");
    let config = builder.with_backup_dir(&missing).build();

    let result = RetentionSweeper::from_config(&config).sweep();

    assert!(matches!(result, Err(SweepError::ReadDir { .. })));
}

#[test]
fn test_sweep_before_jobs_does_not_touch_new_artifacts() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::all_services()
            .with_retention_days(1)
            .with_sweep_phase(SweepPhase::Before),
    );
    ctx.create_aged_backup_file("wiki-home-old.backup.tar", 2 * DAY);

    let report = ctx.run().unwrap();

    assert_eq!(report.files_removed, 1);
    assert!(report.overall_success);
    // Fresh job logs survive the sweep
    let logs = fs::read_dir(ctx.backup_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
        .count();
    assert_eq!(logs, 8);
}

#[test]
fn test_sweep_does_not_need_the_backend() {
    let ctx = TestContext::new().with_mock(MockContainerOps::new().unreachable());
    ctx.create_aged_backup_file("identity-service-bck-old.log", 30 * DAY);

    let summary = RetentionSweeper::from_config(&ctx.config()).sweep().unwrap();

    assert_eq!(summary.count_removed(), 1);
    assert!(ctx.mock().get_calls().is_empty());
}
