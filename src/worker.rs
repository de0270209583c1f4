//! Job intake: runs submissions in the background and records their
//! progress in a result store.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::pipeline::Orchestrator;
use crate::request::RunRequest;
use crate::store::{ResultStore, SubmissionId, SubmissionRecord, SubmissionStatus};
use crate::verdict::Verdict;

/// Default hard limit for one job, orchestration overhead included.
pub const DEFAULT_JOB_TIME_LIMIT: Duration = Duration::from_secs(30);

/// Tunables for a [`JobProcessor`].
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// How long records stay queryable.
    pub result_ttl: Duration,
    /// Hard limit for one job.
    pub job_time_limit: Duration,
    /// Jobs allowed to run at once.
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            result_ttl: crate::store::DEFAULT_RESULT_TTL,
            job_time_limit: DEFAULT_JOB_TIME_LIMIT,
            max_concurrent_jobs: 4,
        }
    }
}

/// Accepts submissions and drives each one through the orchestrator.
#[derive(Clone)]
pub struct JobProcessor {
    orchestrator: Orchestrator,
    store: Arc<dyn ResultStore>,
    permits: Arc<Semaphore>,
    settings: WorkerSettings,
}

impl std::fmt::Debug for JobProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProcessor")
            .field("orchestrator", &self.orchestrator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl JobProcessor {
    /// Creates a processor writing to `store`.
    pub fn new(
        orchestrator: Orchestrator,
        store: Arc<dyn ResultStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            orchestrator,
            store,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            settings,
        }
    }

    /// Records the submission as pending and starts it in the background.
    pub async fn submit(
        &self,
        request: RunRequest,
    ) -> anyhow::Result<(SubmissionId, JoinHandle<()>)> {
        let id = uuid::Uuid::new_v4();
        self.store
            .put(
                SubmissionRecord::in_flight(id, request.language, SubmissionStatus::Pending),
                self.settings.result_ttl,
            )
            .await?;

        let processor = self.clone();
        let job = tokio::spawn(async move {
            processor.process(id, request).await;
        });

        info!("Accepted submission {}", id);
        Ok((id, job))
    }

    /// Runs one submission and stores its final record.
    ///
    /// Store failures are logged; nothing escapes to the caller.
    pub async fn process(&self, id: SubmissionId, request: RunRequest) {
        let Ok(_permit) = self.permits.acquire().await else {
            error!("Job permits closed; dropping submission {}", id);
            return;
        };

        self.record(SubmissionRecord::in_flight(
            id,
            request.language,
            SubmissionStatus::Processing,
        ))
        .await;

        let started = Instant::now();
        let verdict = match tokio::time::timeout(
            self.settings.job_time_limit,
            self.orchestrator.run(&request),
        )
        .await
        {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(
                    "Submission {} exceeded the job limit of {:?}",
                    id, self.settings.job_time_limit
                );
                Verdict::internal(
                    format!(
                        "Job exceeded hard limit of {}s",
                        self.settings.job_time_limit.as_secs_f64()
                    ),
                    started.elapsed(),
                )
            }
        };

        info!("Submission {} finished: {}", id, verdict.status());
        self.record(SubmissionRecord::finished(id, request.language, &verdict))
            .await;
    }

    /// Current record for a submission.
    pub async fn result(&self, id: SubmissionId) -> anyhow::Result<Option<SubmissionRecord>> {
        self.store.get(id).await
    }

    async fn record(&self, record: SubmissionRecord) {
        let id = record.submission_id;
        if let Err(e) = self.store.put(record, self.settings.result_ttl).await {
            error!("Failed to store record for submission {}: {:#}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use crate::language::Language;
    use crate::pipeline::OrchestratorSettings;
    use crate::sandbox::mock::{MockBackend, MockRun};
    use crate::store::MemoryStore;

    fn processor(runs: Vec<MockRun>, settings: WorkerSettings) -> (JobProcessor, Arc<MemoryStore>) {
        let orchestrator = Orchestrator::new(
            Arc::new(MockBackend::new(runs)),
            DescriptorBuilder::default(),
            OrchestratorSettings {
                poll_interval: Duration::from_millis(5),
                workspace_root: None,
            },
        );
        let store = Arc::new(MemoryStore::new());
        (
            JobProcessor::new(orchestrator, store.clone(), settings),
            store,
        )
    }

    #[tokio::test]
    async fn test_submit_records_final_verdict() {
        let (processor, _store) =
            processor(vec![MockRun::exit(0, "10\n", "")], WorkerSettings::default());
        let request = RunRequest::new(Language::Python, "print(int(input())*2)", "5");

        let (id, job) = processor.submit(request).await.unwrap();
        job.await.unwrap();

        let record = processor.result(id).await.unwrap().unwrap();
        assert_eq!(record.status, SubmissionStatus::Ok);
        assert_eq!(record.stdout.as_deref(), Some("10\n"));
        assert_eq!(record.exit_code, Some(0));
        assert!(record.time_sec.is_some());
    }

    #[tokio::test]
    async fn test_submit_is_pending_until_a_permit_frees() {
        let settings = WorkerSettings {
            max_concurrent_jobs: 1,
            ..Default::default()
        };
        let (processor, _store) = processor(vec![MockRun::exit(0, "1\n", "")], settings);
        let held = Arc::clone(&processor.permits).acquire_owned().await.unwrap();

        let (id, job) = processor
            .submit(RunRequest::new(Language::Python, "print(1)", ""))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let record = processor.result(id).await.unwrap().unwrap();
        assert_eq!(record.status, SubmissionStatus::Pending);
        assert!(record.stdout.is_none());
        assert!(!job.is_finished());

        drop(held);
        job.await.unwrap();
        let record = processor.result(id).await.unwrap().unwrap();
        assert_eq!(record.status, SubmissionStatus::Ok);
    }

    #[tokio::test]
    async fn test_job_time_limit_records_internal_error() {
        let settings = WorkerSettings {
            job_time_limit: Duration::from_millis(50),
            ..Default::default()
        };
        let (processor, _store) = processor(vec![MockRun::Hang], settings);
        let id = uuid::Uuid::new_v4();

        // Program limit well beyond the job limit.
        let request = RunRequest::new(Language::Python, "while True: pass", "").with_limits(
            crate::request::ResourceLimits {
                time_limit: Duration::from_secs(10),
                ..Default::default()
            },
        );
        processor.process(id, request).await;

        let record = processor.result(id).await.unwrap().unwrap();
        assert_eq!(record.status, SubmissionStatus::InternalError);
        assert!(record
            .stderr
            .as_deref()
            .is_some_and(|s| s.contains("hard limit")));
        assert_eq!(record.exit_code, None);
    }

    #[tokio::test]
    async fn test_compile_error_recorded() {
        let (processor, _store) = processor(
            vec![MockRun::exit(1, "error: expected ';'", "")],
            WorkerSettings::default(),
        );
        let id = uuid::Uuid::new_v4();
        processor
            .process(id, RunRequest::new(Language::Cpp, "int main() { return 0 }", ""))
            .await;

        let record = processor.result(id).await.unwrap().unwrap();
        assert_eq!(record.status, SubmissionStatus::Ce);
        assert_eq!(record.stdout.as_deref(), Some(""));
        assert_eq!(record.stderr.as_deref(), Some("error: expected ';'"));
    }
}
