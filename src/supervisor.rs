//! Execution supervisor: owns the lifecycle of one isolated run.
//!
//! `CREATED -> RUNNING -> {COMPLETED, TIMED_OUT, LAUNCH_FAILED}`
//!
//! The supervisor launches an environment, polls it at a fixed interval
//! until it finishes or its deadline passes, harvests output, and removes
//! the environment on every exit path. It polls instead of waiting on the
//! backend so its own deadline holds even when the backend's wait would
//! hang.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::descriptor::LaunchSpec;
use crate::sandbox::{ContainerStatus, IsolationBackend, LogSelection, SandboxError, SandboxHandle};

/// Default interval between state polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Raw result of one supervised phase, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Process finished on its own.
    Completed {
        /// Exit code reported by the backend.
        exit_code: i64,
        /// Standard output, or combined output for [`Capture::Combined`].
        stdout: String,
        /// Standard error; empty for [`Capture::Combined`].
        stderr: String,
        /// Launch to observed finish.
        elapsed: Duration,
    },
    /// Deadline passed first; the process was killed and its output dropped.
    TimedOut {
        /// Launch to kill.
        elapsed: Duration,
    },
    /// The backend failed at some point.
    Failed {
        /// Backend error text.
        message: String,
        /// Launch to failure.
        elapsed: Duration,
    },
}

/// How output is read back after a natural finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Stdout and stderr separately.
    Split,
    /// Both streams merged into `stdout`.
    Combined,
}

/// Drives isolated runs against a shared backend.
#[derive(Clone)]
pub struct Supervisor {
    backend: Arc<dyn IsolationBackend>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Creates a supervisor polling every `poll_interval`.
    pub fn new(backend: Arc<dyn IsolationBackend>, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }

    /// Runs `spec` to completion or its deadline. Never fails; backend
    /// errors come back as [`PhaseOutcome::Failed`].
    pub async fn supervise(&self, spec: &LaunchSpec, capture: Capture) -> PhaseOutcome {
        let started = Instant::now();

        let handle = match self.backend.launch(spec).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Launch failed for image {}: {}", spec.image, e);
                return PhaseOutcome::Failed {
                    message: e.to_string(),
                    elapsed: started.elapsed(),
                };
            }
        };
        debug!("Container {} running, deadline {:?}", handle, spec.deadline);

        let teardown = Teardown::new(Arc::clone(&self.backend), handle.clone());
        let outcome = match self.monitor(&handle, spec.deadline, capture, started).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Backend failed while supervising {}: {}", handle, e);
                PhaseOutcome::Failed {
                    message: e.to_string(),
                    elapsed: started.elapsed(),
                }
            }
        };
        teardown.release().await;

        outcome
    }

    async fn monitor(
        &self,
        handle: &SandboxHandle,
        deadline: Duration,
        capture: Capture,
        started: Instant,
    ) -> Result<PhaseOutcome, SandboxError> {
        let exit_code = loop {
            if let ContainerStatus::Exited {
                exit_code,
                oom_killed,
            } = self.backend.poll(handle).await?
            {
                if oom_killed {
                    info!("Container {} was killed by its memory cap", handle);
                }
                break exit_code;
            }

            let elapsed = started.elapsed();
            if elapsed > deadline {
                info!("Container {} exceeded {:?}, killing", handle, deadline);
                // Teardown force-removes the container even if the kill is lost
                // to a race with a natural exit.
                if let Err(e) = self.backend.kill(handle).await {
                    warn!("Failed to kill container {}: {}", handle, e);
                }
                return Ok(PhaseOutcome::TimedOut {
                    elapsed: started.elapsed(),
                });
            }

            let remaining = deadline.saturating_sub(elapsed);
            tokio::time::sleep(self.poll_interval.min(remaining.max(Duration::from_millis(1))))
                .await;
        };
        let elapsed = started.elapsed();

        let (stdout, stderr) = match capture {
            Capture::Split => (
                self.backend.logs(handle, LogSelection::Stdout).await?,
                self.backend.logs(handle, LogSelection::Stderr).await?,
            ),
            Capture::Combined => (
                self.backend.logs(handle, LogSelection::Combined).await?,
                String::new(),
            ),
        };

        debug!("Container {} exited with {}", handle, exit_code);
        Ok(PhaseOutcome::Completed {
            exit_code,
            stdout,
            stderr,
            elapsed,
        })
    }
}

/// Removes an environment exactly once.
///
/// `release` removes inline. If the supervising future is dropped before
/// that, `Drop` hands removal to the runtime instead.
struct Teardown {
    backend: Arc<dyn IsolationBackend>,
    handle: Option<SandboxHandle>,
}

impl Teardown {
    fn new(backend: Arc<dyn IsolationBackend>, handle: SandboxHandle) -> Self {
        Self {
            backend,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            remove_quietly(self.backend.as_ref(), &handle).await;
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    remove_quietly(backend.as_ref(), &handle).await;
                });
            }
            Err(_) => warn!("No runtime left to remove container {}", handle),
        }
    }
}

/// Best-effort removal; failures are logged, never escalated.
async fn remove_quietly(backend: &dyn IsolationBackend, handle: &SandboxHandle) {
    match backend.remove(handle).await {
        Ok(()) => debug!("Removed container {}", handle),
        Err(e) => warn!("Failed to remove container {}: {}", handle, e),
    }
}
