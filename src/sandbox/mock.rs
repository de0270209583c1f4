//! Scripted isolation backend for testing.
//!
//! Each `launch` consumes the next scripted run. Every call is recorded so
//! tests can assert on kills, teardown, and which commands were started.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{ContainerStatus, IsolationBackend, LogSelection, SandboxError, SandboxHandle};
use crate::descriptor::LaunchSpec;

/// How one scripted environment behaves.
#[derive(Debug, Clone)]
pub(crate) enum MockRun {
    /// Finishes after `polls` polls with the given code and output.
    Exit {
        polls: usize,
        exit_code: i64,
        stdout: String,
        stderr: String,
    },
    /// Never finishes on its own.
    Hang,
    /// `launch` fails with the given message.
    LaunchFails(String),
    /// `poll` fails with the given message.
    PollFails(String),
    /// Finishes immediately but log retrieval fails.
    LogsFail { exit_code: i64, message: String },
}

impl MockRun {
    /// Finishes on the first poll.
    pub fn exit(exit_code: i64, stdout: &str, stderr: &str) -> Self {
        Self::Exit {
            polls: 1,
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockCall {
    Launch(Vec<String>),
    Poll(String),
    Kill(String),
    Remove(String),
    Logs(String, LogSelection),
}

#[derive(Debug)]
struct Live {
    run: MockRun,
    polls: usize,
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<MockRun>,
    live: HashMap<String, Live>,
    calls: Vec<MockCall>,
    snapshots: Vec<BTreeMap<String, String>>,
    fail_kill: bool,
    fail_remove: bool,
}

/// Backend whose environments follow a script instead of running anything.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockBackend {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Creates a backend that plays `runs` in launch order.
    pub fn new(runs: Vec<MockRun>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                script: runs.into(),
                ..Default::default()
            })),
            next_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every `kill` fail.
    pub fn with_failing_kill(self) -> Self {
        self.inner.lock().unwrap().fail_kill = true;
        self
    }

    /// Makes every `remove` fail, leaving the environment live.
    pub fn with_failing_remove(self) -> Self {
        self.inner.lock().unwrap().fail_remove = true;
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Commands passed to successful and failed launches, in order.
    pub fn launched_commands(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Launch(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Workspace contents as seen by each launch.
    pub fn workspace_snapshots(&self) -> Vec<BTreeMap<String, String>> {
        self.inner.lock().unwrap().snapshots.clone()
    }

    /// Number of kill calls.
    pub fn kill_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, MockCall::Kill(_)))
            .count()
    }

    /// Environments launched but not yet removed.
    pub fn live_count(&self) -> usize {
        self.inner.lock().unwrap().live.len()
    }
}

#[async_trait]
impl IsolationBackend for MockBackend {
    async fn launch(&self, spec: &LaunchSpec) -> Result<SandboxHandle, SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MockCall::Launch(spec.command.clone()));
        inner.snapshots.push(snapshot(spec));

        let run = inner
            .script
            .pop_front()
            .ok_or_else(|| SandboxError::container_failed("mock script exhausted"))?;
        if let MockRun::LaunchFails(message) = run {
            return Err(SandboxError::container_failed(message));
        }

        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        inner.live.insert(id.clone(), Live { run, polls: 0 });
        Ok(SandboxHandle::new(id))
    }

    async fn poll(&self, handle: &SandboxHandle) -> Result<ContainerStatus, SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MockCall::Poll(handle.id().to_string()));

        let live = inner
            .live
            .get_mut(handle.id())
            .ok_or_else(|| SandboxError::container_failed("no such container"))?;
        live.polls += 1;

        match &live.run {
            MockRun::Exit {
                polls, exit_code, ..
            } if live.polls >= *polls => Ok(ContainerStatus::Exited {
                exit_code: *exit_code,
                oom_killed: false,
            }),
            MockRun::LogsFail { exit_code, .. } => Ok(ContainerStatus::Exited {
                exit_code: *exit_code,
                oom_killed: false,
            }),
            MockRun::PollFails(message) => Err(SandboxError::container_failed(message.clone())),
            _ => Ok(ContainerStatus::Running),
        }
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MockCall::Kill(handle.id().to_string()));
        if inner.fail_kill {
            return Err(SandboxError::container_failed("kill refused"));
        }
        Ok(())
    }

    async fn remove(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MockCall::Remove(handle.id().to_string()));
        if inner.fail_remove {
            return Err(SandboxError::container_failed("removal refused"));
        }
        inner.live.remove(handle.id());
        Ok(())
    }

    async fn logs(
        &self,
        handle: &SandboxHandle,
        selection: LogSelection,
    ) -> Result<String, SandboxError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(MockCall::Logs(handle.id().to_string(), selection));

        let live = inner
            .live
            .get(handle.id())
            .ok_or_else(|| SandboxError::container_failed("no such container"))?;

        match &live.run {
            MockRun::Exit { stdout, stderr, .. } => Ok(match selection {
                LogSelection::Stdout => stdout.clone(),
                LogSelection::Stderr => stderr.clone(),
                LogSelection::Combined => format!("{stdout}{stderr}"),
            }),
            MockRun::LogsFail { message, .. } => {
                Err(SandboxError::container_failed(message.clone()))
            }
            _ => Ok(String::new()),
        }
    }
}

/// Reads every file in the host side of the first bind mount.
fn snapshot(spec: &LaunchSpec) -> BTreeMap<String, String> {
    let Some(host) = spec.binds.first().and_then(|b| b.split(':').next()) else {
        return BTreeMap::new();
    };
    std::fs::read_dir(host)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let content = std::fs::read_to_string(entry.path()).ok()?;
            Some((entry.file_name().to_string_lossy().into_owned(), content))
        })
        .collect()
}
