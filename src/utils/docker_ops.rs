//! Container backend abstraction for testability
//!
//! This module provides a trait-based abstraction for the container
//! operations a job needs, enabling dependency injection and mocking for
//! tests.

use super::docker::{self, RuntimeError, WaitStatus};
use crate::jobs::JobSpec;
use std::time::Duration;

/// Abstraction for the container backend, enabling mocking in tests
pub trait ContainerOperations: Send + Sync {
    /// Check the backend is reachable, returning its version
    fn ping(&self) -> Result<String, RuntimeError>;

    /// Launch a detached job container, returning its id
    fn launch(&self, spec: &JobSpec) -> Result<String, RuntimeError>;

    /// Block until the container exits or `timeout` elapses
    fn wait(&self, id: &str, timeout: Duration) -> Result<WaitStatus, RuntimeError>;

    /// Forcibly stop a container
    fn kill(&self, id: &str) -> Result<(), RuntimeError>;

    /// Captured output of a container
    fn logs(&self, id: &str) -> Result<String, RuntimeError>;

    /// Remove a container (by id or name)
    fn remove(&self, id: &str) -> Result<(), RuntimeError>;
}

/// Default implementation using real Docker CLI calls
pub struct RealDockerOps {
    runtime: tokio::runtime::Runtime,
    /// Bound for short CLI calls (everything except `wait`)
    command_timeout: Duration,
}

impl RealDockerOps {
    pub fn new() -> Result<Self, RuntimeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::Operation(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            runtime,
            command_timeout: Duration::from_secs(60),
        })
    }
}

impl ContainerOperations for RealDockerOps {
    fn ping(&self) -> Result<String, RuntimeError> {
        self.runtime
            .block_on(docker::server_version(self.command_timeout))
    }

    fn launch(&self, spec: &JobSpec) -> Result<String, RuntimeError> {
        // Image pulls happen here, so allow more than a plain CLI call
        self.runtime
            .block_on(docker::run_detached(spec, self.command_timeout * 10))
    }

    fn wait(&self, id: &str, timeout: Duration) -> Result<WaitStatus, RuntimeError> {
        self.runtime.block_on(docker::wait(id, timeout))
    }

    fn kill(&self, id: &str) -> Result<(), RuntimeError> {
        self.runtime.block_on(docker::kill(id, self.command_timeout))
    }

    fn logs(&self, id: &str) -> Result<String, RuntimeError> {
        self.runtime.block_on(docker::logs(id, self.command_timeout))
    }

    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.runtime.block_on(docker::remove(id, self.command_timeout))
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use crate::jobs::{JobKind, Service};
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Recorded backend call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ContainerCall {
        Ping,
        Launch { name: String },
        Wait { id: String },
        Kill { id: String },
        Logs { id: String },
        Remove { id: String },
    }

    /// Scripted behaviour for one job
    #[derive(Clone, Debug)]
    pub struct JobScript {
        pub logs: String,
        pub exit_code: i64,
        pub hang: bool,
        pub launch_error: Option<String>,
        /// `wait` fails with this operation error
        pub wait_error: Option<String>,
    }

    impl Default for JobScript {
        fn default() -> Self {
            Self {
                logs: String::new(),
                exit_code: 0,
                hang: false,
                launch_error: None,
                wait_error: None,
            }
        }
    }

    /// Callback run when a scripted job is launched
    pub type LaunchHook = Arc<dyn Fn(&JobSpec) + Send + Sync>;

    /// Mock container backend for testing.
    ///
    /// Jobs succeed with empty logs unless scripted otherwise. Containers
    /// are tracked from launch to removal so tests can assert cleanup.
    #[derive(Clone, Default)]
    pub struct MockContainerOps {
        /// Recorded backend calls
        pub calls: Arc<Mutex<Vec<ContainerCall>>>,
        scripts: Arc<Mutex<HashMap<(Service, JobKind), JobScript>>>,
        hooks: Arc<Mutex<HashMap<(Service, JobKind), LaunchHook>>>,
        /// Container id -> script, for launched containers
        running: Arc<Mutex<HashMap<String, JobScript>>>,
        live: Arc<Mutex<HashSet<String>>>,
        unreachable: Arc<Mutex<bool>>,
        /// Backend becomes unreachable after this many launches
        unreachable_after: Arc<Mutex<Option<usize>>>,
        launches: Arc<Mutex<usize>>,
    }

    impl MockContainerOps {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every call fail as unreachable
        pub fn unreachable(self) -> Self {
            *self.unreachable.lock().unwrap() = true;
            self
        }

        /// Let `launches` jobs start, then become unreachable
        pub fn unreachable_after(self, launches: usize) -> Self {
            *self.unreachable_after.lock().unwrap() = Some(launches);
            self
        }

        /// Script the behaviour of one job
        pub fn with_job(self, service: Service, kind: JobKind, script: JobScript) -> Self {
            self.scripts.lock().unwrap().insert((service, kind), script);
            self
        }

        /// Shorthand: job completes with exit code 0 and the given logs
        pub fn with_logs(self, service: Service, kind: JobKind, logs: &str) -> Self {
            self.with_job(
                service,
                kind,
                JobScript {
                    logs: logs.to_string(),
                    ..Default::default()
                },
            )
        }

        /// Shorthand: job never finishes
        pub fn with_hang(self, service: Service, kind: JobKind) -> Self {
            self.with_job(
                service,
                kind,
                JobScript {
                    hang: true,
                    ..Default::default()
                },
            )
        }

        /// Shorthand: job fails to launch
        pub fn with_launch_failure(self, service: Service, kind: JobKind, error: &str) -> Self {
            self.with_job(
                service,
                kind,
                JobScript {
                    launch_error: Some(error.to_string()),
                    ..Default::default()
                },
            )
        }

        /// Shorthand: `wait` fails with an operation error
        pub fn with_wait_error(self, service: Service, kind: JobKind, error: &str) -> Self {
            self.with_job(
                service,
                kind,
                JobScript {
                    wait_error: Some(error.to_string()),
                    ..Default::default()
                },
            )
        }

        /// Run `hook` whenever the given job is launched
        pub fn on_launch<F>(self, service: Service, kind: JobKind, hook: F) -> Self
        where
            F: Fn(&JobSpec) + Send + Sync + 'static,
        {
            self.hooks
                .lock()
                .unwrap()
                .insert((service, kind), Arc::new(hook));
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<ContainerCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Names of launched containers, in order
        pub fn launched(&self) -> Vec<String> {
            self.get_calls()
                .into_iter()
                .filter_map(|c| match c {
                    ContainerCall::Launch { name } => Some(name),
                    _ => None,
                })
                .collect()
        }

        /// Containers launched but not yet removed
        pub fn live_containers(&self) -> Vec<String> {
            self.live.lock().unwrap().iter().cloned().collect()
        }

        pub fn kill_called(&self) -> bool {
            self.get_calls()
                .iter()
                .any(|c| matches!(c, ContainerCall::Kill { .. }))
        }

        fn record_call(&self, call: ContainerCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn check_reachable(&self) -> Result<(), RuntimeError> {
            if *self.unreachable.lock().unwrap() {
                return Err(RuntimeError::Unreachable(
                    "Mock backend unreachable".to_string(),
                ));
            }
            Ok(())
        }
    }

    impl ContainerOperations for MockContainerOps {
        fn ping(&self) -> Result<String, RuntimeError> {
            self.record_call(ContainerCall::Ping);
            self.check_reachable()?;
            Ok("mock-24.0".to_string())
        }

        fn launch(&self, spec: &JobSpec) -> Result<String, RuntimeError> {
            self.record_call(ContainerCall::Launch {
                name: spec.container_name.clone(),
            });

            {
                let mut launches = self.launches.lock().unwrap();
                if let Some(limit) = *self.unreachable_after.lock().unwrap() {
                    if *launches >= limit {
                        *self.unreachable.lock().unwrap() = true;
                    }
                }
                *launches += 1;
            }
            self.check_reachable()?;

            let hook = self.hooks.lock().unwrap().get(&(spec.service, spec.kind)).cloned();
            if let Some(hook) = hook {
                hook(spec);
            }

            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(&(spec.service, spec.kind))
                .cloned()
                .unwrap_or_default();

            if let Some(ref error) = script.launch_error {
                return Err(RuntimeError::Launch(error.clone()));
            }

            let id = format!("mock-{}", spec.container_name);
            self.running.lock().unwrap().insert(id.clone(), script);
            self.live.lock().unwrap().insert(id.clone());
            Ok(id)
        }

        fn wait(&self, id: &str, _timeout: Duration) -> Result<WaitStatus, RuntimeError> {
            self.record_call(ContainerCall::Wait { id: id.to_string() });
            self.check_reachable()?;

            let running = self.running.lock().unwrap();
            let script = running
                .get(id)
                .ok_or_else(|| RuntimeError::Operation(format!("No such container: {}", id)))?;

            if let Some(ref error) = script.wait_error {
                return Err(RuntimeError::Operation(error.clone()));
            }
            if script.hang {
                return Ok(WaitStatus::TimedOut);
            }
            Ok(WaitStatus::Exited(script.exit_code))
        }

        fn kill(&self, id: &str) -> Result<(), RuntimeError> {
            self.record_call(ContainerCall::Kill { id: id.to_string() });
            self.check_reachable()
        }

        fn logs(&self, id: &str) -> Result<String, RuntimeError> {
            self.record_call(ContainerCall::Logs { id: id.to_string() });
            self.check_reachable()?;

            Ok(self
                .running
                .lock()
                .unwrap()
                .get(id)
                .map(|s| s.logs.clone())
                .unwrap_or_default())
        }

        fn remove(&self, id: &str) -> Result<(), RuntimeError> {
            self.record_call(ContainerCall::Remove { id: id.to_string() });
            self.check_reachable()?;
            self.live.lock().unwrap().remove(id);
            Ok(())
        }
    }
}
