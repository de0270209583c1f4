//! Verdicts and the classifier that derives them from raw phase outcomes.
//!
//! The classifier is the only place that decides a status. Both phases of
//! the compile-execute pipeline feed it, and it matches every
//! `(phase, outcome)` pair exhaustively.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::supervisor::PhaseOutcome;

/// Message reported when the compiler exceeds its deadline.
pub const COMPILE_TIMEOUT_MESSAGE: &str = "Compilation timed out";

/// Public status taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Program exited 0 within its deadline.
    #[serde(rename = "OK")]
    Ok,
    /// Wall-clock limit exceeded.
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    /// Program exited non-zero.
    #[serde(rename = "RE")]
    RuntimeError,
    /// Compiler exited non-zero or timed out.
    #[serde(rename = "CE")]
    CompileError,
    /// Orchestrator or backend malfunction.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl Status {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::TimeLimitExceeded => "TLE",
            Self::RuntimeError => "RE",
            Self::CompileError => "CE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final typed outcome of one execution request.
///
/// Output and exit code only exist on the variants where they are
/// meaningful, so a timed-out run can never carry a stale exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Program exited 0.
    Ok {
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Launch to resolution.
        elapsed: Duration,
    },
    /// Program exited non-zero.
    RuntimeError {
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Non-zero exit code reported by the backend.
        exit_code: i64,
        /// Launch to resolution.
        elapsed: Duration,
    },
    /// Program was killed at its deadline. Output is discarded.
    TimeLimitExceeded {
        /// Launch to kill.
        elapsed: Duration,
    },
    /// Compilation failed or timed out; the program never ran.
    CompileError {
        /// Combined compiler output, or the timeout message.
        output: String,
        /// Compiler exit code, absent when the compiler was killed.
        exit_code: Option<i64>,
        /// Launch of the compile phase to resolution.
        elapsed: Duration,
    },
    /// Something other than the submission failed.
    InternalError {
        /// Human-readable diagnostic.
        message: String,
        /// Time spent before the failure.
        elapsed: Duration,
    },
}

impl Verdict {
    /// Creates an `InternalError` verdict.
    pub fn internal(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::InternalError {
            message: message.into(),
            elapsed,
        }
    }

    /// Status tag of this verdict.
    pub fn status(&self) -> Status {
        match self {
            Self::Ok { .. } => Status::Ok,
            Self::RuntimeError { .. } => Status::RuntimeError,
            Self::TimeLimitExceeded { .. } => Status::TimeLimitExceeded,
            Self::CompileError { .. } => Status::CompileError,
            Self::InternalError { .. } => Status::InternalError,
        }
    }

    /// Captured standard output (empty when not recoverable).
    pub fn stdout(&self) -> &str {
        match self {
            Self::Ok { stdout, .. } | Self::RuntimeError { stdout, .. } => stdout,
            Self::TimeLimitExceeded { .. }
            | Self::CompileError { .. }
            | Self::InternalError { .. } => "",
        }
    }

    /// Captured standard error, compiler output, or diagnostic.
    pub fn stderr(&self) -> &str {
        match self {
            Self::Ok { stderr, .. } | Self::RuntimeError { stderr, .. } => stderr,
            Self::CompileError { output, .. } => output,
            Self::InternalError { message, .. } => message,
            Self::TimeLimitExceeded { .. } => "",
        }
    }

    /// Exit code of the process that decided the verdict, when it exited on its own.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::Ok { .. } => Some(0),
            Self::RuntimeError { exit_code, .. } => Some(*exit_code),
            Self::CompileError { exit_code, .. } => *exit_code,
            Self::TimeLimitExceeded { .. } | Self::InternalError { .. } => None,
        }
    }

    /// Wall-clock time from launch to resolution.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Ok { elapsed, .. }
            | Self::RuntimeError { elapsed, .. }
            | Self::TimeLimitExceeded { elapsed }
            | Self::CompileError { elapsed, .. }
            | Self::InternalError { elapsed, .. } => *elapsed,
        }
    }

    /// Flat, serializable view of the verdict.
    pub fn report(&self) -> VerdictReport {
        VerdictReport {
            status: self.status(),
            stdout: self.stdout().to_string(),
            stderr: self.stderr().to_string(),
            exit_code: self.exit_code(),
            time_sec: round_secs(self.elapsed()),
        }
    }
}

/// JSON shape of a verdict, as handed to result sinks and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReport {
    /// Status tag.
    pub status: Status,
    /// Standard output.
    pub stdout: String,
    /// Standard error or diagnostic.
    pub stderr: String,
    /// Exit code, when the deciding process exited on its own.
    pub exit_code: Option<i64>,
    /// Elapsed seconds, rounded to 4 decimals.
    pub time_sec: f64,
}

/// Which pipeline phase produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Compiler run.
    Compile,
    /// User program run.
    Execute,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Execute => write!(f, "execute"),
        }
    }
}

/// Maps a raw phase outcome onto the status taxonomy.
///
/// A compile phase yields `Verdict::Ok` only when the compiler exited 0;
/// the pipeline treats that as the signal to continue.
pub fn classify(phase: Phase, outcome: PhaseOutcome) -> Verdict {
    match (phase, outcome) {
        (
            _,
            PhaseOutcome::Completed {
                exit_code: 0,
                stdout,
                stderr,
                elapsed,
            },
        ) => Verdict::Ok {
            stdout,
            stderr,
            elapsed,
        },
        (
            Phase::Execute,
            PhaseOutcome::Completed {
                exit_code,
                stdout,
                stderr,
                elapsed,
            },
        ) => Verdict::RuntimeError {
            stdout,
            stderr,
            exit_code,
            elapsed,
        },
        // Compile output is captured as one combined stream in `stdout`.
        (
            Phase::Compile,
            PhaseOutcome::Completed {
                exit_code,
                stdout,
                elapsed,
                ..
            },
        ) => Verdict::CompileError {
            output: stdout,
            exit_code: Some(exit_code),
            elapsed,
        },
        (Phase::Execute, PhaseOutcome::TimedOut { elapsed }) => {
            Verdict::TimeLimitExceeded { elapsed }
        }
        (Phase::Compile, PhaseOutcome::TimedOut { elapsed }) => Verdict::CompileError {
            output: COMPILE_TIMEOUT_MESSAGE.to_string(),
            exit_code: None,
            elapsed,
        },
        (Phase::Execute, PhaseOutcome::Failed { message, elapsed }) => {
            Verdict::InternalError { message, elapsed }
        }
        (Phase::Compile, PhaseOutcome::Failed { message, elapsed }) => Verdict::InternalError {
            message: format!("Compilation error: {message}"),
            elapsed,
        },
    }
}

/// Seconds rounded to 4 decimal places.
pub(crate) fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}
