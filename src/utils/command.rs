//! Utilities for running commands with proper error handling and timeouts

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {0:?}")]
    TimedOut(Duration),
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a command with optional timeout.
///
/// `env` entries are set on the child process only. A non-zero exit is not
/// an error here; callers inspect [`CommandOutput::exit_code`]. On timeout
/// the child is killed.
pub async fn run_command(
    program: &str,
    args: &[String],
    env: &[(&str, &str)],
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(env.iter().copied());
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!("Running command: {} {}", program, args.join(" "));

    let spawn_error = |source| CommandError::Spawn {
        program: program.to_string(),
        source,
    };

    let output = match timeout {
        Some(timeout_duration) => {
            match tokio::time::timeout(timeout_duration, cmd.output()).await {
                Ok(output) => output.map_err(spawn_error)?,
                Err(_) => return Err(CommandError::TimedOut(timeout_duration)),
            }
        }
        None => cmd.output().await.map_err(spawn_error)?,
    };

    let result = CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !result.success() {
        debug!(
            "Command exited with {:?}: {}",
            result.exit_code,
            result.stderr.trim()
        );
    }

    Ok(result)
}
