use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions,
    KillContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::service::{ContainerState, HostConfig};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ContainerStatus, IsolationBackend, LogSelection, SandboxError, SandboxHandle};
use crate::descriptor::LaunchSpec;

/// Label attached to every container this crate creates, for operator reaping.
pub const CONTAINER_LABEL: &str = "oj-sandbox";

/// Docker's placeholder for "has not finished".
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Runs submissions in Docker containers through the Engine API.
#[derive(Debug, Clone)]
pub struct DockerBackend {
    docker: Docker,
    call_timeout: Duration,
}

impl DockerBackend {
    /// Connects to the daemon at `socket`, or the local default when `None`.
    ///
    /// Every subsequent API call is bounded by `call_timeout`.
    pub fn connect(socket: Option<&str>, call_timeout: Duration) -> Result<Self, SandboxError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_unix(
                path,
                call_timeout.as_secs().max(1),
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        Ok(Self {
            docker,
            call_timeout,
        })
    }

    /// Checks the daemon answers.
    pub async fn ping(&self) -> Result<(), SandboxError> {
        self.bounded("ping", self.docker.ping())
            .await
            .map(|_| ())
            .map_err(|e| match e {
                SandboxError::ContainerFailed { message } => {
                    SandboxError::docker_unavailable(message)
                }
                other => other,
            })
    }

    /// Returns true if `image` is present locally.
    pub async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        match self.bounded("inspect_image", self.docker.inspect_image(image)).await {
            Ok(_) => Ok(true),
            Err(SandboxError::ImageNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes a container the supervisor never got a handle for.
    /// A missing container is expected and not logged as a failure.
    async fn discard(&self, handle: &SandboxHandle) {
        match self.remove(handle).await {
            Ok(()) => debug!("Removed unstarted container {}", handle),
            Err(e) if e.is_container_not_found() => debug!("Container {} was never created", handle),
            Err(e) => warn!("Failed to remove unstarted container {}: {}", handle, e),
        }
    }

    /// Awaits a Docker API call, giving up after the configured bound.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, SandboxError>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(SandboxError::from),
            Err(_) => Err(SandboxError::timeout(operation, self.call_timeout)),
        }
    }
}

#[async_trait]
impl IsolationBackend for DockerBackend {
    async fn launch(&self, spec: &LaunchSpec) -> Result<SandboxHandle, SandboxError> {
        let name = format!("{CONTAINER_LABEL}-{}", uuid::Uuid::new_v4().simple());

        debug!("Creating container {} from {}", name, spec.image);
        let created = self
            .bounded(
                "create",
                self.docker.create_container(
                    Some(CreateContainerOptions {
                        name: name.clone(),
                        platform: None,
                    }),
                    container_config(spec),
                ),
            )
            .await;

        let started = match created {
            Ok(_) => {
                debug!("Starting container {}", name);
                self.bounded(
                    "start",
                    self.docker
                        .start_container(&name, None::<StartContainerOptions<String>>),
                )
                .await
            }
            Err(e) => Err(e),
        };

        let handle = SandboxHandle::new(name);
        if let Err(e) = started {
            // A create that timed out may still have produced the container.
            self.discard(&handle).await;
            return Err(e);
        }

        Ok(handle)
    }

    async fn poll(&self, handle: &SandboxHandle) -> Result<ContainerStatus, SandboxError> {
        let info = self
            .bounded(
                "inspect",
                self.docker
                    .inspect_container(handle.id(), None::<InspectContainerOptions>),
            )
            .await?;

        let state = info.state.ok_or_else(|| {
            SandboxError::container_failed(format!("Container {handle} reported no state"))
        })?;
        Ok(observe(&state))
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        self.bounded(
            "kill",
            self.docker
                .kill_container(handle.id(), Some(KillContainerOptions { signal: "SIGKILL" })),
        )
        .await
    }

    async fn remove(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        self.bounded(
            "remove",
            self.docker.remove_container(
                handle.id(),
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            ),
        )
        .await
    }

    async fn logs(
        &self,
        handle: &SandboxHandle,
        selection: LogSelection,
    ) -> Result<String, SandboxError> {
        let options = LogsOptions::<String> {
            stdout: matches!(selection, LogSelection::Stdout | LogSelection::Combined),
            stderr: matches!(selection, LogSelection::Stderr | LogSelection::Combined),
            follow: false,
            ..Default::default()
        };

        let collect = async {
            let mut output = String::new();
            let mut stream = std::pin::pin!(self.docker.logs(handle.id(), Some(options)));
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message } => {
                        output.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
            Ok::<_, bollard::errors::Error>(output)
        };

        self.bounded("logs", collect).await
    }
}

fn container_config(spec: &LaunchSpec) -> ContainerConfig<String> {
    ContainerConfig {
        image: Some(spec.image.clone()),
        cmd: Some(spec.command.clone()),
        working_dir: Some(spec.working_dir.clone()),
        network_disabled: Some(spec.network_disabled),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        labels: Some(HashMap::from([(
            CONTAINER_LABEL.to_string(),
            "true".to_string(),
        )])),
        host_config: Some(HostConfig {
            binds: Some(spec.binds.clone()),
            memory: Some(spec.memory_bytes),
            // Same value as `memory` disables swap.
            memory_swap: Some(spec.memory_bytes),
            nano_cpus: Some(spec.nano_cpus),
            network_mode: spec.network_disabled.then(|| "none".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Derives the supervisor's view from Docker's container state.
///
/// A container counts as finished once it stopped running and Docker
/// recorded a real finish time.
fn observe(state: &ContainerState) -> ContainerStatus {
    let finished = state
        .finished_at
        .as_deref()
        .is_some_and(|t| !t.is_empty() && t != ZERO_TIME);

    if state.running == Some(true) || !finished {
        return ContainerStatus::Running;
    }

    ContainerStatus::Exited {
        exit_code: state.exit_code.unwrap_or(-1),
        oom_killed: state.oom_killed.unwrap_or(false),
    }
}
