//! Compile-execute pipeline and the orchestrator's public entry point.
//!
//! Compiled languages run a bounded compile phase first, sharing the
//! workspace with the execute phase. A compile phase that does not exit 0
//! ends the request; the program itself never starts.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::descriptor::{DescriptorBuilder, RunDescriptor};
use crate::request::RunRequest;
use crate::sandbox::IsolationBackend;
use crate::supervisor::{Capture, Supervisor};
use crate::verdict::{classify, Phase, Verdict};
use crate::workspace::Workspace;

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Interval between state polls.
    pub poll_interval: Duration,
    /// Directory workspaces are created under; the system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: crate::supervisor::DEFAULT_POLL_INTERVAL,
            workspace_root: None,
        }
    }
}

/// Turns requests into verdicts.
///
/// Holds no per-request state; one instance serves any number of
/// concurrent requests, each with its own workspace and environments.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    supervisor: Supervisor,
    descriptors: DescriptorBuilder,
    workspace_root: Option<PathBuf>,
}

impl Orchestrator {
    /// Creates an orchestrator over an injected backend.
    pub fn new(
        backend: Arc<dyn IsolationBackend>,
        descriptors: DescriptorBuilder,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            supervisor: Supervisor::new(backend, settings.poll_interval),
            descriptors,
            workspace_root: settings.workspace_root,
        }
    }

    /// Runs one request to a verdict. Never fails: every problem, including
    /// invalid limits and unsupported languages, becomes `InternalError`.
    pub async fn run(&self, request: &RunRequest) -> Verdict {
        let started = Instant::now();
        info!("Running {} submission", request.language);

        if let Err(e) = request.limits.validate() {
            return Verdict::internal(format!("Invalid request: {e}"), started.elapsed());
        }

        let (workspace, descriptor) = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(e) => return Verdict::internal(format!("{e:#}"), started.elapsed()),
        };

        let verdict = self.execute(&descriptor).await;

        debug!("Removing workspace {}", workspace.path().display());
        drop(workspace);

        info!(
            "Verdict {} in {:.3}s",
            verdict.status(),
            verdict.elapsed().as_secs_f64()
        );
        verdict
    }

    /// Creates the workspace, writes the artifacts, and builds launch parameters.
    fn prepare(&self, request: &RunRequest) -> Result<(Workspace, RunDescriptor)> {
        let workspace = Workspace::create(self.workspace_root.as_deref())?;
        let descriptor = self.descriptors.build(request, workspace.path())?;

        workspace
            .write(&descriptor.source_file, &request.normalized_source())
            .context("Failed to write source file")?;
        workspace
            .write(&descriptor.stdin_file, &request.normalized_stdin())
            .context("Failed to write stdin file")?;

        Ok((workspace, descriptor))
    }

    async fn execute(&self, descriptor: &RunDescriptor) -> Verdict {
        if let Some(ref compile) = descriptor.compile {
            info!("Compiling {} source", descriptor.language);
            let outcome = self.supervisor.supervise(compile, Capture::Combined).await;
            match classify(Phase::Compile, outcome) {
                Verdict::Ok { .. } => debug!("Compilation succeeded"),
                failed => return failed,
            }
        }

        let outcome = self
            .supervisor
            .supervise(&descriptor.execute, Capture::Split)
            .await;
        classify(Phase::Execute, outcome)
    }
}
