//! Result sink: submission records keyed by id with a bounded lifetime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::language::Language;
use crate::verdict::{Status, Verdict};

/// Default lifetime of a stored record (one hour).
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(3600);

/// Longest lifetime a record can get; larger TTLs are clamped to it.
const MAX_RESULT_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Unique identifier of one submission.
pub type SubmissionId = Uuid;

/// Lifecycle status of a submission as seen by the result sink.
///
/// `Pending` and `Processing` are set by the job processor around the
/// orchestrator; the rest mirror the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Accepted, not yet picked up.
    Pending,
    /// A worker is running it.
    Processing,
    /// Verdict `OK`.
    Ok,
    /// Verdict `TLE`.
    Tle,
    /// Verdict `RE`.
    Re,
    /// Verdict `CE`.
    Ce,
    /// Verdict `INTERNAL_ERROR`.
    InternalError,
}

impl SubmissionStatus {
    /// Returns true once a verdict has been recorded.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }
}

impl From<Status> for SubmissionStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Self::Ok,
            Status::TimeLimitExceeded => Self::Tle,
            Status::RuntimeError => Self::Re,
            Status::CompileError => Self::Ce,
            Status::InternalError => Self::InternalError,
        }
    }
}

/// What the result sink stores for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Submission identifier.
    pub submission_id: SubmissionId,
    /// Language of the submission.
    pub language: Language,
    /// Current status.
    pub status: SubmissionStatus,
    /// Program output, once known.
    pub stdout: Option<String>,
    /// Program error output or diagnostic, once known.
    pub stderr: Option<String>,
    /// Exit code, when the deciding process exited on its own.
    pub exit_code: Option<i64>,
    /// Elapsed seconds, rounded to 4 decimals.
    pub time_sec: Option<f64>,
    /// When this record was written.
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// A record carrying only a lifecycle status.
    pub fn in_flight(
        submission_id: SubmissionId,
        language: Language,
        status: SubmissionStatus,
    ) -> Self {
        Self {
            submission_id,
            language,
            status,
            stdout: None,
            stderr: None,
            exit_code: None,
            time_sec: None,
            updated_at: Utc::now(),
        }
    }

    /// A terminal record built from a verdict.
    pub fn finished(submission_id: SubmissionId, language: Language, verdict: &Verdict) -> Self {
        let report = verdict.report();
        Self {
            submission_id,
            language,
            status: report.status.into(),
            stdout: Some(report.stdout),
            stderr: Some(report.stderr),
            exit_code: report.exit_code,
            time_sec: Some(report.time_sec),
            updated_at: Utc::now(),
        }
    }
}

/// Key-value sink the job processor writes records to.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Inserts or replaces the record for its submission, expiring after `ttl`.
    async fn put(&self, record: SubmissionRecord, ttl: Duration) -> anyhow::Result<()>;

    /// Fetches a record that has not expired.
    async fn get(&self, id: SubmissionId) -> anyhow::Result<Option<SubmissionRecord>>;

    /// Deletes a record, returning whether one existed.
    async fn delete(&self, id: SubmissionId) -> anyhow::Result<bool>;
}

/// In-process store with per-entry expiry. Expired entries are purged
/// lazily on access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<SubmissionId, (SubmissionRecord, Instant)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    /// Returns true when no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubmissionId, (SubmissionRecord, Instant)>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put(&self, record: SubmissionRecord, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        let expires = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + ttl.min(MAX_RESULT_TTL));
        let mut entries = self.lock();
        entries.retain(|_, (_, at)| *at > Instant::now());
        entries.insert(record.submission_id, (record, expires));
        Ok(())
    }

    async fn get(&self, id: SubmissionId) -> anyhow::Result<Option<SubmissionRecord>> {
        let mut entries = self.lock();
        match entries.get(&id) {
            Some((record, expires)) if *expires > Instant::now() => Ok(Some(record.clone())),
            Some(_) => {
                entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: SubmissionId) -> anyhow::Result<bool> {
        let removed = self.lock().remove(&id);
        Ok(removed.is_some_and(|(_, expires)| expires > Instant::now()))
    }
}
