//! Unit tests for log verification

use rstest::rstest;
use stack_backup::utils::verifier::{verify, verify_log, MarkerSet, Markers, VerifyResult};
use stack_backup::JobKind;
use test_utils::{
    pg_dump_auth_failure_log, pg_dump_host_unknown_log, pg_dump_missing_database_log,
    tar_missing_path_log, tar_permission_denied_log, tar_success_log,
};

#[rstest]
#[case::missing_path(tar_missing_path_log(), "Cannot stat")]
#[case::permission(tar_permission_denied_log(), "Cannot open")]
fn test_filesystem_failures_are_detected(#[case] log: &str, #[case] marker: &str) {
    match verify_log(log, &MarkerSet::filesystem_defaults()) {
        VerifyResult::Failed { marker: found, .. } => assert_eq!(found, marker),
        VerifyResult::Ok => panic!("Expected failure for log: {}", log),
    }
}

#[rstest]
#[case::host_unknown(pg_dump_host_unknown_log(), "not known")]
#[case::auth(pg_dump_auth_failure_log(), "authentication failed")]
#[case::missing_db(pg_dump_missing_database_log(), "does not exist")]
fn test_database_failures_are_detected(#[case] log: &str, #[case] marker: &str) {
    match verify_log(log, &MarkerSet::database_defaults()) {
        VerifyResult::Failed { marker: found, .. } => assert_eq!(found, marker),
        VerifyResult::Ok => panic!("Expected failure for log: {}", log),
    }
}

#[test]
fn test_successful_tar_log_passes() {
    assert!(verify_log(tar_success_log(), &MarkerSet::filesystem_defaults()).is_ok());
}

#[test]
fn test_empty_log_passes() {
    assert_eq!(verify_log("", &MarkerSet::database_defaults()), VerifyResult::Ok);
}

#[rstest]
#[case::first_line(0)]
#[case::middle_line(2)]
#[case::last_line(4)]
fn test_marker_position_does_not_matter(#[case] position: usize) {
    let mut lines = vec!["unrelated output"; 5];
    lines[position] = "prefix connection refused suffix";

    let result = verify(lines.iter().copied(), &MarkerSet::database_defaults());

    assert_eq!(
        result,
        VerifyResult::Failed {
            marker: "refused".to_string(),
            line: "prefix connection refused suffix".to_string(),
        }
    );
}

#[test]
fn test_markers_are_per_kind() {
    let markers = Markers::default();
    let log = pg_dump_host_unknown_log();

    // A database failure phrase is not part of the filesystem vocabulary
    assert!(verify_log(log, markers.for_kind(JobKind::Filesystem)).is_ok());
    assert!(!verify_log(log, markers.for_kind(JobKind::Database)).is_ok());
}

#[test]
fn test_custom_marker_set() {
    let markers = MarkerSet::new(["FATAL"]);
    assert_eq!(markers.len(), 1);
    assert!(!verify_log("FATAL: out of memory", &markers).is_ok());
    assert!(verify_log("connection refused", &markers).is_ok());
}

#[test]
fn test_empty_marker_set_never_fails() {
    let markers = MarkerSet::new(Vec::<String>::new());
    assert!(markers.is_empty());
    assert!(verify_log(tar_missing_path_log(), &markers).is_ok());
}
