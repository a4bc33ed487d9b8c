pub mod command;
pub mod docker;
pub mod job_runner;
pub mod locker;
pub mod verifier;

// Trait-based abstraction for testability
pub mod docker_ops;

// Re-export commonly used types and traits (used by test crate)
pub use docker::{RuntimeError, WaitStatus};
pub use docker_ops::{ContainerOperations, RealDockerOps};
pub use job_runner::{JobResult, JobRunner, JobStatus};
pub use verifier::{verify, verify_log, MarkerSet, Markers, VerifyResult};
