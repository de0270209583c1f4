//! Domain-specific error types for sandbox operations.
//!
//! Typed errors let the supervisor and the `check` command match on
//! specific failure modes rather than parsing error message strings.

use std::time::Duration;

/// Errors that can occur while driving an isolation backend.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable {
        /// Underlying cause.
        message: String,
    },

    /// Runner image was not found.
    #[error("Runner image not found: {image}")]
    ImageNotFound {
        /// Image reference.
        image: String,
    },

    /// A single backend call did not answer within its bound.
    #[error("Backend call '{operation}' did not answer within {timeout_ms} ms")]
    Timeout {
        /// Operation that hung.
        operation: &'static str,
        /// Bound that was exceeded.
        timeout_ms: u64,
    },

    /// Container does not exist (never created or already removed).
    #[error("Container not found: {message}")]
    ContainerNotFound {
        /// Daemon response.
        message: String,
    },

    /// Container operation failed (create, start, inspect, logs, etc.).
    #[error("Container operation failed: {message}")]
    ContainerFailed {
        /// Underlying cause.
        message: String,
    },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates an `ImageNotFound` error.
    pub fn image_not_found(image: impl Into<String>) -> Self {
        Self::ImageNotFound {
            image: image.into(),
        }
    }

    /// Creates a `Timeout` error for a backend call.
    pub fn timeout(operation: &'static str, bound: Duration) -> Self {
        Self::Timeout {
            operation,
            timeout_ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a `ContainerFailed` error.
    pub fn container_failed(message: impl Into<String>) -> Self {
        Self::ContainerFailed {
            message: message.into(),
        }
    }

    /// Returns true if the container does not exist.
    pub fn is_container_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound { .. })
    }

    /// Returns true if this is a backend call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if this is a Docker unavailability error.
    pub fn is_docker_unavailable(&self) -> bool {
        matches!(self, Self::DockerUnavailable { .. })
    }

    /// Returns true if this is an image not found error.
    pub fn is_image_not_found(&self) -> bool {
        matches!(self, Self::ImageNotFound { .. })
    }
}

impl From<bollard::errors::Error> for SandboxError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } if message.contains("image") => Self::image_not_found(message),
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::ContainerNotFound { message },
            other => Self::container_failed(other.to_string()),
        }
    }
}
