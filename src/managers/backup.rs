//! Backup orchestrator - sequences the retention sweep and per-service jobs

use crate::config::{BackupConfig, SweepPhase};
use crate::jobs::{JobKind, JobSpec, RunTimestamp, ServiceSpec};
use crate::managers::retention::{RetentionSweeper, SweepError, SweepSummary};
use crate::utils::docker::RuntimeError;
use crate::utils::docker_ops::ContainerOperations;
use crate::utils::job_runner::{JobResult, JobRunner, JobStatus};
use crate::utils::locker::RunLock;
use crate::utils::verifier::{verify, VerifyResult};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors that stop a run before any job is attempted
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to create backup directory {path:?}: {source}")]
    BackupDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:#}")]
    Lock(anyhow::Error),
}

/// Why a job was recorded as failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureReason {
    LaunchFailed { message: String },
    TimeoutExceeded,
    MarkerMatched { marker: String, line: String },
    ExitCode { code: i64 },
    Interrupted { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::LaunchFailed { message } => write!(f, "launch failed: {}", message),
            FailureReason::TimeoutExceeded => f.write_str("timeout-exceeded"),
            FailureReason::MarkerMatched { marker, line } => {
                write!(f, "failure marker '{}' in output: {}", marker, line)
            }
            FailureReason::ExitCode { code } => write!(f, "exited with code {}", code),
            FailureReason::Interrupted { message } => write!(f, "interrupted: {}", message),
        }
    }
}

/// Verdict for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Success { artifacts: Vec<PathBuf>, log: PathBuf },
    Failure { reason: FailureReason, log: PathBuf },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }
}

/// Per-service result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub service: String,
    pub filesystem: JobOutcome,
    /// `None` when the service has no database
    pub database: Option<JobOutcome>,
}

impl ServiceOutcome {
    pub fn is_success(&self) -> bool {
        self.filesystem.is_success() && self.database.as_ref().map_or(true, JobOutcome::is_success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    BackendUnavailable,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::BackendUnavailable => f.write_str("backend-unavailable"),
        }
    }
}

/// Terminal result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: RunTimestamp,
    pub outcomes: Vec<ServiceOutcome>,
    pub files_removed: usize,
    /// Expired files the sweep could not delete
    pub sweep_errors: usize,
    /// Set when the sweep could not run at all
    pub sweep_failure: Option<String>,
    pub abort_reason: Option<AbortReason>,
    pub overall_success: bool,
}

impl RunReport {
    fn aborted(timestamp: RunTimestamp, reason: AbortReason) -> Self {
        Self {
            timestamp,
            outcomes: Vec::new(),
            files_removed: 0,
            sweep_errors: 0,
            sweep_failure: None,
            abort_reason: Some(reason),
            overall_success: false,
        }
    }

    fn completed(
        timestamp: RunTimestamp,
        outcomes: Vec<ServiceOutcome>,
        sweep: Option<Result<SweepSummary, SweepError>>,
    ) -> Self {
        let (files_removed, sweep_errors, sweep_failure) = match sweep {
            Some(Ok(summary)) => (summary.count_removed(), summary.failed.len(), None),
            Some(Err(e)) => (0, 0, Some(e.to_string())),
            None => (0, 0, None),
        };

        let overall_success =
            outcomes.iter().all(ServiceOutcome::is_success) && sweep_failure.is_none();

        Self {
            timestamp,
            outcomes,
            files_removed,
            sweep_errors,
            sweep_failure,
            abort_reason: None,
            overall_success,
        }
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.overall_success {
            0
        } else {
            1
        }
    }
}

/// Runs one backup pass: init, sweep, per-service jobs, report.
///
/// Services are processed in their fixed order, the filesystem job before
/// the database job, one job at a time. A failed job is recorded and the
/// run moves on; only an unreachable container backend aborts the run.
pub struct BackupOrchestrator<O: ContainerOperations> {
    config: BackupConfig,
    ops: O,
}

impl<O: ContainerOperations> BackupOrchestrator<O> {
    pub fn new(config: BackupConfig, ops: O) -> Self {
        Self { config, ops }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Run a backup pass with a fresh run timestamp
    pub fn run(&self) -> Result<RunReport, RunError> {
        self.run_with_timestamp(RunTimestamp::now())
    }

    /// Run a backup pass naming every artifact with `timestamp`
    pub fn run_with_timestamp(&self, timestamp: RunTimestamp) -> Result<RunReport, RunError> {
        let start_time = Instant::now();
        info!("Starting backup run {}", timestamp);
        self.log_parameters();

        // Init
        self.prepare_backup_dir()
            .inspect_err(|e| error!("Aborting backup run: {}", e))?;
        let _lock = RunLock::acquire(&self.config.backup_dir)
            .map_err(RunError::Lock)
            .inspect_err(|e| error!("Aborting backup run: {}", e))?;

        match self.ops.ping() {
            Ok(version) => info!("Container backend reachable (version {})", version),
            Err(e) => {
                error!("Aborting backup run: {}", e);
                return Ok(RunReport::aborted(timestamp, AbortReason::BackendUnavailable));
            }
        }

        let mut sweep = None;

        if self.config.sweep_phase == SweepPhase::Before {
            sweep = Some(self.sweep());
        }

        let outcomes = match self.backup_services(&timestamp) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Aborting backup run, container backend became unreachable: {}", e);
                return Ok(RunReport::aborted(timestamp, AbortReason::BackendUnavailable));
            }
        };

        if self.config.sweep_phase == SweepPhase::After {
            sweep = Some(self.sweep());
        }

        let report = RunReport::completed(timestamp, outcomes, sweep);

        let succeeded = report.outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "Backup run {} completed in {:.2}s: {} of {} service(s) succeeded, {} expired file(s) removed",
            report.timestamp,
            start_time.elapsed().as_secs_f64(),
            succeeded,
            report.outcomes.len(),
            report.files_removed
        );

        if !report.overall_success {
            error!("Backup run {} finished with failures", report.timestamp);
        }

        Ok(report)
    }

    fn log_parameters(&self) {
        let config = &self.config;
        debug!("Backup Path: {:?}", config.backup_dir);
        for (service, container) in &config.containers {
            debug!("{} Container: {}", service, container);
        }
        debug!("Database Host: {}", config.database_host);
        debug!("Database Password: {}", config.database_password);
        debug!("Identity Service Version: {:?}", config.identity_service_version);
        debug!("Network Name: {:?}", config.network_name);
        debug!("Retention: {} days ({:?} phase)", config.retention_days, config.sweep_phase);
        debug!("Job Timeout: {:?}", config.job_timeout);
        debug!(
            "Images: filesystem={} database={}",
            config.filesystem_image, config.database_image
        );
    }

    fn prepare_backup_dir(&self) -> Result<(), RunError> {
        let path = &self.config.backup_dir;
        if !path.is_dir() {
            info!("Creating backup directory {:?}", path);
        }
        fs::create_dir_all(path).map_err(|source| RunError::BackupDir {
            path: path.clone(),
            source,
        })
    }

    fn sweep(&self) -> Result<SweepSummary, SweepError> {
        let result = RetentionSweeper::from_config(&self.config).sweep();
        if let Err(ref e) = result {
            error!("Retention sweep failed: {}", e);
        }
        result
    }

    /// Run every configured service; errors only when the backend is gone
    fn backup_services(&self, timestamp: &RunTimestamp) -> Result<Vec<ServiceOutcome>, RuntimeError> {
        let runner = JobRunner::new(&self.ops);
        let services = self.config.services();
        let mut outcomes = Vec::with_capacity(services.len());

        for service in &services {
            let outcome = self.backup_service(&runner, service, timestamp)?;

            if outcome.is_success() {
                info!("Service '{}' backed up successfully", outcome.service);
            } else {
                error!("Service '{}' backup recorded failures", outcome.service);
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn backup_service(
        &self,
        runner: &JobRunner<'_>,
        service: &ServiceSpec,
        timestamp: &RunTimestamp,
    ) -> Result<ServiceOutcome, RuntimeError> {
        info!("Backing up service '{}' ({})", service.name, service.container);

        let filesystem_job = JobSpec::filesystem(service, &self.config, timestamp);
        let filesystem = self.run_job(runner, &filesystem_job)?;

        let database = match JobSpec::database(service, &self.config, timestamp) {
            Some(job) => Some(self.run_job(runner, &job)?),
            None => None,
        };

        Ok(ServiceOutcome {
            service: service.name.clone(),
            filesystem,
            database,
        })
    }

    fn run_job(&self, runner: &JobRunner<'_>, job: &JobSpec) -> Result<JobOutcome, RuntimeError> {
        let result = runner.execute(job, self.config.job_timeout)?;
        let outcome = self.judge(job.kind, result);

        match outcome {
            JobOutcome::Success { ref artifacts, .. } => {
                info!("{} backup succeeded: {:?}", job.label(), artifacts)
            }
            JobOutcome::Failure { ref reason, .. } => {
                error!("{} backup failed: {}", job.label(), reason)
            }
        }

        Ok(outcome)
    }

    /// Turn a job result into a verdict; only the verdict and paths survive
    fn judge(&self, kind: JobKind, result: JobResult) -> JobOutcome {
        let failure = |reason| JobOutcome::Failure {
            reason,
            log: result.log_path.clone(),
        };

        match result.status {
            JobStatus::LaunchFailed { ref reason } => failure(FailureReason::LaunchFailed {
                message: reason.clone(),
            }),
            JobStatus::TimedOut { .. } => failure(FailureReason::TimeoutExceeded),
            JobStatus::Interrupted { ref reason } => failure(FailureReason::Interrupted {
                message: reason.clone(),
            }),
            JobStatus::Completed { exit_code } => {
                match verify(result.lines(), self.config.markers.for_kind(kind)) {
                    VerifyResult::Failed { marker, line } => {
                        failure(FailureReason::MarkerMatched { marker, line })
                    }
                    VerifyResult::Ok if exit_code != 0 => {
                        warn!("No failure marker found, but the job exited with {}", exit_code);
                        failure(FailureReason::ExitCode { code: exit_code })
                    }
                    VerifyResult::Ok => JobOutcome::Success {
                        artifacts: result.artifacts.clone(),
                        log: result.log_path.clone(),
                    },
                }
            }
        }
    }
}
