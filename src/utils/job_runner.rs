//! Execution of one containerized job
//!
//! Launch, wait with a timeout, capture the log, and always remove the
//! container afterwards.

use super::docker::{RuntimeError, WaitStatus};
use super::docker_ops::ContainerOperations;
use crate::jobs::JobSpec;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Marker appended to the log of a job that ran out of time
pub const TIMEOUT_MARKER: &str = "timeout-exceeded";

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// The container ran to completion
    Completed { exit_code: i64 },
    /// The container never started
    LaunchFailed { reason: String },
    /// The container was killed after the timeout elapsed
    TimedOut { after: Duration },
    /// The container started but its outcome could not be collected
    Interrupted { reason: String },
}

/// Outcome of [`JobRunner::execute`]
#[derive(Debug, Clone)]
pub struct JobResult {
    pub status: JobStatus,
    /// Captured container output
    pub log: String,
    pub log_path: PathBuf,
    pub artifacts: Vec<PathBuf>,
}

impl JobResult {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.log.lines()
    }
}

/// Runs job containers against a backend
pub struct JobRunner<'a> {
    ops: &'a dyn ContainerOperations,
}

impl<'a> JobRunner<'a> {
    pub fn new(ops: &'a dyn ContainerOperations) -> Self {
        Self { ops }
    }

    /// Run one job to completion.
    ///
    /// Only an unreachable backend is returned as an error; every other
    /// problem is reported through [`JobResult::status`]. The container is
    /// removed in every case.
    pub fn execute(&self, spec: &JobSpec, timeout: Duration) -> Result<JobResult, RuntimeError> {
        info!("Starting {} job ({})", spec.label(), spec.container_name);
        debug!("Job command: {}", spec.command);

        // Never overwrite an artifact that is already on disk
        if let Some(existing) = spec
            .artifacts
            .iter()
            .chain(std::iter::once(&spec.log_path))
            .find(|p| p.exists())
        {
            let reason = format!("Artifact already exists: {}", existing.display());
            warn!("Refusing to run {} job: {}", spec.label(), reason);
            return Ok(result(spec, JobStatus::LaunchFailed { reason }, String::new()));
        }

        let id = match self.ops.launch(spec) {
            Ok(id) => id,
            Err(e) => {
                // A failed `docker run` can leave a created container behind
                self.cleanup(&spec.container_name);

                if let RuntimeError::Unreachable(_) = e {
                    return Err(e);
                }

                let reason = e.to_string();
                warn!("Failed to launch {} job: {}", spec.label(), reason);
                write_log(spec, &reason);
                return Ok(result(spec, JobStatus::LaunchFailed { reason }, String::new()));
            }
        };

        let outcome = self.supervise(&id, timeout);
        self.cleanup(&id);
        let (status, log) = outcome?;

        write_log(spec, &log);
        info!("Finished {} job: {:?}", spec.label(), status);

        Ok(result(spec, status, log))
    }

    fn supervise(&self, id: &str, timeout: Duration) -> Result<(JobStatus, String), RuntimeError> {
        match self.ops.wait(id, timeout) {
            Ok(WaitStatus::Exited(exit_code)) => match self.ops.logs(id) {
                Ok(log) => Ok((JobStatus::Completed { exit_code }, log)),
                Err(e @ RuntimeError::Unreachable(_)) => Err(e),
                Err(e) => Ok((
                    JobStatus::Interrupted {
                        reason: format!("Failed to collect logs: {}", e),
                    },
                    String::new(),
                )),
            },
            Ok(WaitStatus::TimedOut) => {
                warn!("Container {} exceeded timeout of {:?}, killing it", id, timeout);
                if let Err(e) = self.ops.kill(id) {
                    warn!("Failed to kill container {}: {}", id, e);
                }

                let mut log = self.ops.logs(id).unwrap_or_default();
                if !log.is_empty() && !log.ends_with('\n') {
                    log.push('\n');
                }
                log.push_str(&format!("{} after {:?}\n", TIMEOUT_MARKER, timeout));

                Ok((JobStatus::TimedOut { after: timeout }, log))
            }
            Err(e @ RuntimeError::Unreachable(_)) => Err(e),
            Err(e) => Ok((
                JobStatus::Interrupted {
                    reason: e.to_string(),
                },
                String::new(),
            )),
        }
    }

    fn cleanup(&self, id: &str) {
        match self.ops.remove(id) {
            Ok(()) => debug!("Removed container {}", id),
            Err(e) => warn!("Failed to remove container {}: {}", id, e),
        }
    }
}

fn result(spec: &JobSpec, status: JobStatus, log: String) -> JobResult {
    JobResult {
        status,
        log,
        log_path: spec.log_path.clone(),
        artifacts: spec.artifacts.clone(),
    }
}

fn write_log(spec: &JobSpec, log: &str) {
    if let Err(e) = fs::write(&spec.log_path, log) {
        warn!("Failed to write job log {:?}: {}", spec.log_path, e);
    }
}
