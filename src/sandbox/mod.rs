//! Isolation backends for running untrusted programs.
//!
//! The orchestrator never talks to a container runtime directly. It drives
//! an [`IsolationBackend`], which Docker implements in production and a
//! scripted mock implements in tests.

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use docker::DockerBackend;
pub use error::SandboxError;

use async_trait::async_trait;

use crate::descriptor::LaunchSpec;

/// Opaque reference to one live isolated environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxHandle(String);

impl SandboxHandle {
    /// Wraps a backend-specific identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Backend-specific identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of an environment as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Process has not finished yet.
    Running,
    /// Process finished on its own.
    Exited {
        /// Exit code reported by the runtime.
        exit_code: i64,
        /// Whether the runtime's memory cap killed the process.
        oom_killed: bool,
    },
}

/// Which output streams to read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSelection {
    /// Standard output only.
    Stdout,
    /// Standard error only.
    Stderr,
    /// Both streams, interleaved in arrival order.
    Combined,
}

/// Container runtime operations the supervisor relies on.
///
/// Implementations must be safe to share between concurrently running
/// submissions.
#[async_trait]
pub trait IsolationBackend: Send + Sync {
    /// Creates and starts a detached, network-disabled environment.
    async fn launch(&self, spec: &LaunchSpec) -> Result<SandboxHandle, SandboxError>;

    /// Reports whether the environment's process has finished.
    async fn poll(&self, handle: &SandboxHandle) -> Result<ContainerStatus, SandboxError>;

    /// Sends a forceful kill to the environment's process.
    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;

    /// Force-removes the environment.
    async fn remove(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;

    /// Reads captured output of a finished environment.
    async fn logs(
        &self,
        handle: &SandboxHandle,
        selection: LogSelection,
    ) -> Result<String, SandboxError>;
}
