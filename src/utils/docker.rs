//! Docker CLI wrappers for running ephemeral job containers

use super::command::{run_command, CommandError, CommandOutput};
use crate::jobs::JobSpec;
use std::time::Duration;
use tracing::{debug, info};

/// Errors talking to the container backend
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No job can run; the whole run must abort
    #[error("Container backend unreachable: {0}")]
    Unreachable(String),

    #[error("Failed to launch container: {0}")]
    Launch(String),

    #[error("Container operation failed: {0}")]
    Operation(String),
}

/// How a container wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited(i64),
    TimedOut,
}

/// stderr fragments the docker CLI prints when the daemon is not reachable
const UNREACHABLE_MARKERS: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "Is the docker daemon running",
    "error during connect",
    "permission denied while trying to connect to the Docker daemon",
];

fn is_unreachable(stderr: &str) -> bool {
    UNREACHABLE_MARKERS.iter().any(|m| stderr.contains(m))
}

async fn docker(
    args: Vec<String>,
    env: &[(&str, &str)],
    timeout: Duration,
) -> Result<CommandOutput, RuntimeError> {
    classify(run_command("docker", &args, env, Some(timeout)).await)
}

fn classify(result: Result<CommandOutput, CommandError>) -> Result<CommandOutput, RuntimeError> {
    match result {
        Ok(output) => {
            if !output.success() && is_unreachable(&output.stderr) {
                return Err(RuntimeError::Unreachable(output.stderr.trim().to_string()));
            }
            Ok(output)
        }
        // No docker binary means no backend at all
        Err(e @ CommandError::Spawn { .. }) => Err(RuntimeError::Unreachable(e.to_string())),
        Err(e @ CommandError::TimedOut(_)) => Err(RuntimeError::Unreachable(e.to_string())),
    }
}

/// Like [`classify`], but a `docker run` that outlives its timeout (usually
/// a slow image pull) fails only its own job.
fn classify_launch(
    result: Result<CommandOutput, CommandError>,
) -> Result<CommandOutput, RuntimeError> {
    match result {
        Err(e @ CommandError::TimedOut(_)) => Err(RuntimeError::Launch(e.to_string())),
        other => classify(other),
    }
}

fn check(output: CommandOutput, what: &str) -> Result<CommandOutput, RuntimeError> {
    if output.success() {
        Ok(output)
    } else {
        Err(RuntimeError::Operation(format!(
            "{} failed with exit code {:?}: {}",
            what,
            output.exit_code,
            output.stderr.trim()
        )))
    }
}

/// Query the daemon version; fails when the daemon is unreachable
pub async fn server_version(timeout: Duration) -> Result<String, RuntimeError> {
    let args = vec![
        "version".to_string(),
        "--format".to_string(),
        "{{.Server.Version}}".to_string(),
    ];
    let output = docker(args, &[], timeout).await?;

    if !output.success() {
        return Err(RuntimeError::Unreachable(output.stderr.trim().to_string()));
    }

    Ok(output.stdout.trim().to_string())
}

/// `docker run -d` arguments for a job.
///
/// Environment variables are passed by name only; their values are set on
/// the docker CLI process so they never show up in the argument list.
pub fn run_args(spec: &JobSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.container_name.clone(),
    ];

    if spec.auto_remove {
        args.push("--rm".to_string());
    }

    if let Some(ref network) = spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    if let Some(ref container) = spec.volumes_from {
        args.push("--volumes-from".to_string());
        args.push(container.clone());
    }

    for volume in &spec.volumes {
        args.push("-v".to_string());
        args.push(volume.to_arg());
    }

    for key in spec.env.keys() {
        args.push("-e".to_string());
        args.push(key.clone());
    }

    args.push(spec.image.clone());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(spec.command.clone());

    args
}

/// Start a job container detached and return its id
pub async fn run_detached(spec: &JobSpec, timeout: Duration) -> Result<String, RuntimeError> {
    info!("Launching container {} ({})", spec.container_name, spec.image);

    let env: Vec<(&str, &str)> = spec
        .env
        .iter()
        .map(|(k, v)| (k.as_str(), v.expose()))
        .collect();

    let output =
        classify_launch(run_command("docker", &run_args(spec), &env, Some(timeout)).await)?;

    if !output.success() {
        return Err(RuntimeError::Launch(output.stderr.trim().to_string()));
    }

    let id = output.stdout.trim().to_string();
    debug!("Container {} started with id {}", spec.container_name, id);
    Ok(id)
}

/// Block until the container exits or `timeout` elapses
pub async fn wait(id: &str, timeout: Duration) -> Result<WaitStatus, RuntimeError> {
    let args = vec!["wait".to_string(), id.to_string()];

    let output = match run_command("docker", &args, &[], Some(timeout)).await {
        Ok(output) => output,
        Err(CommandError::TimedOut(_)) => return Ok(WaitStatus::TimedOut),
        Err(e) => return Err(RuntimeError::Unreachable(e.to_string())),
    };

    if !output.success() {
        if is_unreachable(&output.stderr) {
            return Err(RuntimeError::Unreachable(output.stderr.trim().to_string()));
        }
        return Err(RuntimeError::Operation(output.stderr.trim().to_string()));
    }

    output
        .stdout
        .trim()
        .parse::<i64>()
        .map(WaitStatus::Exited)
        .map_err(|e| RuntimeError::Operation(format!("Unexpected docker wait output: {}", e)))
}

/// Forcibly stop a running container
pub async fn kill(id: &str, timeout: Duration) -> Result<(), RuntimeError> {
    let output = docker(vec!["kill".to_string(), id.to_string()], &[], timeout).await?;
    check(output, "docker kill").map(|_| ())
}

/// Combined stdout and stderr of a container
pub async fn logs(id: &str, timeout: Duration) -> Result<String, RuntimeError> {
    let output = docker(vec!["logs".to_string(), id.to_string()], &[], timeout).await?;
    let output = check(output, "docker logs")?;

    let mut text = output.stdout;
    if !output.stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&output.stderr);
    }
    Ok(text)
}

/// Remove a container, stopping it first if needed
pub async fn remove(id: &str, timeout: Duration) -> Result<(), RuntimeError> {
    let args = vec!["rm".to_string(), "-f".to_string(), id.to_string()];
    let output = docker(args, &[], timeout).await?;
    check(output, "docker rm").map(|_| ())
}
