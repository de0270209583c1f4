//! Execution requests and their resource limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::language::Language;

/// Default wall-clock limit for the user program.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(2);

/// Default wall-clock limit for the compile phase.
pub const DEFAULT_COMPILE_TIME_LIMIT: Duration = Duration::from_secs(10);

/// Default memory cap (256 MiB).
pub const DEFAULT_MEMORY_LIMIT: u64 = 256 * 1024 * 1024;

/// Limits that make a request impossible to run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LimitsError {
    /// Time limit was zero.
    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,

    /// Compile time limit was zero.
    #[error("compile time limit must be greater than zero")]
    ZeroCompileTimeLimit,

    /// Memory limit was zero.
    #[error("memory limit must be greater than zero")]
    ZeroMemoryLimit,

    /// CPU share was zero, negative or not finite.
    #[error("cpu share must be a positive number, got {0}")]
    InvalidCpuShare(f64),
}

/// Resource caps applied to one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall-clock limit for the execute phase.
    pub time_limit: Duration,
    /// Wall-clock limit for the compile phase (compiled languages only).
    pub compile_time_limit: Duration,
    /// Memory cap in bytes.
    pub memory_limit: u64,
    /// CPU share in fractional cores.
    pub cpus: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            compile_time_limit: DEFAULT_COMPILE_TIME_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            cpus: 1.0,
        }
    }
}

impl ResourceLimits {
    /// Checks the invariants every request must satisfy before launch.
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.time_limit.is_zero() {
            return Err(LimitsError::ZeroTimeLimit);
        }
        if self.compile_time_limit.is_zero() {
            return Err(LimitsError::ZeroCompileTimeLimit);
        }
        if self.memory_limit == 0 {
            return Err(LimitsError::ZeroMemoryLimit);
        }
        if !self.cpus.is_finite() || self.cpus <= 0.0 {
            return Err(LimitsError::InvalidCpuShare(self.cpus));
        }
        Ok(())
    }
}

/// One untrusted program to run, with its input and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Program text as submitted.
    pub source_code: String,
    /// Data fed to the program's standard input.
    #[serde(default)]
    pub stdin: String,
    /// Language the source is written in.
    pub language: Language,
    /// Resource caps.
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl RunRequest {
    /// Creates a request with default limits.
    pub fn new(language: Language, source_code: impl Into<String>, stdin: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            stdin: stdin.into(),
            language,
            limits: ResourceLimits::default(),
        }
    }

    /// Replaces the limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Source with common leading indentation removed.
    pub fn normalized_source(&self) -> String {
        dedent(&self.source_code)
    }

    /// Stdin terminated by a newline when non-empty.
    pub fn normalized_stdin(&self) -> String {
        if self.stdin.is_empty() || self.stdin.ends_with('\n') {
            self.stdin.clone()
        } else {
            format!("{}\n", self.stdin)
        }
    }
}

/// Strips the space and tab prefix shared by every non-blank line.
///
/// Blank lines do not take part in the prefix computation and are emitted
/// empty.
fn dedent(text: &str) -> String {
    let is_margin = |c: char| c == ' ' || c == '\t';
    let is_blank = |line: &str| line.chars().all(is_margin);

    let mut prefix: Option<&str> = None;
    for line in text.split('\n') {
        if is_blank(line) {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start_matches(is_margin).len()];
        prefix = Some(match prefix {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }

    let prefix = prefix.unwrap_or("");
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if !is_blank(body) {
            out.push_str(body.strip_prefix(prefix).unwrap_or(body));
        }
        out.push_str(newline);
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8());
    &a[..len]
}
