use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::descriptor::DescriptorBuilder;
use crate::language::{Language, LanguageProfile};
use crate::pipeline::OrchestratorSettings;
use crate::request::ResourceLimits;
use crate::worker::WorkerSettings;

/// Project-local configuration file name.
pub const CONFIG_FILE: &str = "oj-sandbox.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Per-language overrides of the built-in runner profiles
    #[serde(default)]
    pub languages: BTreeMap<Language, LanguageOverride>,
}

/// Docker daemon connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Unix socket path; the local default when unset
    /// - Example: "/var/run/docker.sock"
    #[serde(default)]
    pub socket: Option<String>,

    /// Upper bound for any single Docker API call, in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl DockerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interval between container state polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Default limits for requests that don't set their own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Program wall-clock limit in seconds
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f64,

    /// Compiler wall-clock limit in seconds
    #[serde(default = "default_compile_time_limit")]
    pub compile_time_limit_secs: f64,

    /// Memory limit (e.g., "256m", "1g")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU share in cores (e.g., 0.5)
    #[serde(default = "default_cpus")]
    pub cpus: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit(),
            compile_time_limit_secs: default_compile_time_limit(),
            memory: default_memory(),
            cpus: default_cpus(),
        }
    }
}

impl LimitsConfig {
    /// Converts to typed limits, rejecting malformed values.
    pub fn resource_limits(&self) -> Result<ResourceLimits> {
        let limits = ResourceLimits {
            time_limit: parse_seconds(self.time_limit_secs, "time_limit_secs")?,
            compile_time_limit: parse_seconds(
                self.compile_time_limit_secs,
                "compile_time_limit_secs",
            )?,
            memory_limit: parse_memory_limit(&self.memory)?,
            cpus: self.cpus,
        };
        limits.validate()?;
        Ok(limits)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory for per-request workspaces; must be visible to the Docker host
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long results stay queryable, in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Jobs that may run at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Hard limit for a whole job, in seconds
    #[serde(default = "default_job_time_limit")]
    pub job_time_limit_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_time_limit_secs: default_job_time_limit(),
        }
    }
}

/// Partial runner profile; unset fields keep the built-in value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageOverride {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub compile: Option<String>,
    #[serde(default)]
    pub execute: Option<String>,
}

// Default value functions
fn default_call_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    50
}

fn default_time_limit() -> f64 {
    2.0
}

fn default_compile_time_limit() -> f64 {
    10.0
}

fn default_memory() -> String {
    "256m".to_string()
}

fn default_cpus() -> f64 {
    1.0
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_job_time_limit() -> u64 {
    30
}

impl Config {
    /// Load configuration from the project file, then the user config
    /// directory, using defaults if neither exists
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_path = project_dir.join(CONFIG_FILE);
        let user_path = dirs::config_dir().map(|dir| dir.join("oj-sandbox").join("config.toml"));

        let Some(config_path) = std::iter::once(project_path)
            .chain(user_path)
            .find(|path| path.exists())
        else {
            return Ok(Self::default());
        };

        Self::load_file(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.limits.resource_limits()?;
        for (language, profile) in self.profiles() {
            profile
                .validate()
                .with_context(|| format!("Malformed command for language '{language}'"))?;
        }
        Ok(())
    }

    /// Built-in runner profiles with configured overrides applied
    pub fn profiles(&self) -> BTreeMap<Language, LanguageProfile> {
        Language::ALL
            .into_iter()
            .map(|language| {
                let mut profile = language.default_profile();
                if let Some(o) = self.languages.get(&language) {
                    if let Some(ref image) = o.image {
                        profile.image.clone_from(image);
                    }
                    if let Some(ref source_file) = o.source_file {
                        profile.source_file.clone_from(source_file);
                    }
                    if let Some(ref compile) = o.compile {
                        profile.compile = Some(compile.clone());
                    }
                    if let Some(ref execute) = o.execute {
                        profile.execute.clone_from(execute);
                    }
                }
                (language, profile)
            })
            .collect()
    }

    pub fn descriptor_builder(&self) -> DescriptorBuilder {
        DescriptorBuilder::new(self.profiles())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: Duration::from_millis(self.supervisor.poll_interval_ms.max(1)),
            workspace_root: self.workspace.root.clone(),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            result_ttl: Duration::from_secs(self.store.ttl_secs),
            job_time_limit: Duration::from_secs(self.worker.job_time_limit_secs),
            max_concurrent_jobs: self.worker.max_concurrent_jobs,
        }
    }
}

fn parse_seconds(secs: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid {field}: {secs}"))
}

/// Parse memory limit string (e.g., "1g", "256m") to bytes
pub fn parse_memory_limit(limit: &str) -> Result<u64> {
    let limit = limit.trim().to_lowercase();

    if let Some(num) = limit.strip_suffix('g') {
        let gigs: u64 = num.parse().context("Invalid memory limit")?;
        gigs.checked_mul(1024 * 1024 * 1024)
            .context("Memory limit too large")
    } else if let Some(num) = limit.strip_suffix('m') {
        let megs: u64 = num.parse().context("Invalid memory limit")?;
        megs.checked_mul(1024 * 1024)
            .context("Memory limit too large")
    } else {
        limit.parse().context("Invalid memory limit")
    }
}
