//! Run descriptor builder.
//!
//! Translates a request into the concrete launch parameters the isolation
//! backend needs. Pure: no IO, and the only failure is a language without
//! a configured profile.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::language::{Language, LanguageProfile, UnsupportedLanguage};
use crate::request::RunRequest;

/// Mount point of the workspace inside every environment.
pub const CONTAINER_WORKDIR: &str = "/workspace";

/// File the stdin data is written to inside the workspace.
pub const STDIN_FILE: &str = "input.txt";

/// Everything needed to start one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    /// Runner image reference.
    pub image: String,
    /// Full argv, `sh -c <script>`.
    pub command: Vec<String>,
    /// Working directory inside the environment.
    pub working_dir: String,
    /// Bind mounts in `host:container:mode` form.
    pub binds: Vec<String>,
    /// Memory cap in bytes.
    pub memory_bytes: i64,
    /// Memory cap in human form, e.g. `256m`.
    pub memory_cap: String,
    /// CPU share in the backend's native unit (billionths of a core).
    pub nano_cpus: i64,
    /// Always true; kept explicit so backends cannot forget it.
    pub network_disabled: bool,
    /// Wall-clock deadline for this phase.
    pub deadline: Duration,
}

/// Launch parameters for both phases of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDescriptor {
    /// Language being run.
    pub language: Language,
    /// Source file name inside the workspace.
    pub source_file: String,
    /// Stdin file name inside the workspace.
    pub stdin_file: String,
    /// Compile phase, for compiled languages.
    pub compile: Option<LaunchSpec>,
    /// Execute phase.
    pub execute: LaunchSpec,
}

/// Builds descriptors from a table of language profiles.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    profiles: BTreeMap<Language, LanguageProfile>,
}

impl Default for DescriptorBuilder {
    fn default() -> Self {
        Self::new(
            Language::ALL
                .into_iter()
                .map(|lang| (lang, lang.default_profile()))
                .collect(),
        )
    }
}

impl DescriptorBuilder {
    /// Creates a builder over the given profiles.
    pub fn new(profiles: BTreeMap<Language, LanguageProfile>) -> Self {
        Self { profiles }
    }

    /// Profile for a language, if one is configured.
    pub fn profile(&self, language: Language) -> Option<&LanguageProfile> {
        self.profiles.get(&language)
    }

    /// Produces launch parameters for `request` with the workspace at `host_dir`.
    pub fn build(
        &self,
        request: &RunRequest,
        host_dir: &Path,
    ) -> Result<RunDescriptor, UnsupportedLanguage> {
        let profile = self
            .profiles
            .get(&request.language)
            .ok_or_else(|| UnsupportedLanguage {
                name: request.language.to_string(),
            })?;

        let limits = &request.limits;
        let base = LaunchSpec {
            image: profile.image.clone(),
            command: Vec::new(),
            working_dir: CONTAINER_WORKDIR.to_string(),
            binds: vec![format!("{}:{CONTAINER_WORKDIR}:rw", host_dir.display())],
            memory_bytes: i64::try_from(limits.memory_limit).unwrap_or(i64::MAX),
            memory_cap: format_memory_cap(limits.memory_limit),
            nano_cpus: to_nano_cpus(limits.cpus),
            network_disabled: true,
            deadline: limits.time_limit,
        };

        let compile = profile.compile.as_ref().map(|compile| LaunchSpec {
            command: shell_command(&format!("{compile} 2>&1")),
            deadline: limits.compile_time_limit,
            ..base.clone()
        });

        let execute = LaunchSpec {
            command: shell_command(&format!("{} < {STDIN_FILE}", profile.execute)),
            ..base
        };

        Ok(RunDescriptor {
            language: request.language,
            source_file: profile.source_file.clone(),
            stdin_file: STDIN_FILE.to_string(),
            compile,
            execute,
        })
    }
}

fn shell_command(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Formats a byte count the way Docker's CLI accepts it (`512m`, `1g`).
pub(crate) fn format_memory_cap(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    if bytes % GIB == 0 {
        format!("{}g", bytes / GIB)
    } else if bytes % MIB == 0 {
        format!("{}m", bytes / MIB)
    } else {
        bytes.to_string()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_nano_cpus(cpus: f64) -> i64 {
    (cpus * 1_000_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResourceLimits;

    fn request(language: Language) -> RunRequest {
        RunRequest::new(language, "print(1)", "").with_limits(ResourceLimits {
            time_limit: Duration::from_millis(1500),
            compile_time_limit: Duration::from_secs(10),
            memory_limit: 128 * 1024 * 1024,
            cpus: 0.5,
        })
    }

    #[test]
    fn test_python_has_single_phase() {
        let descriptor = DescriptorBuilder::default()
            .build(&request(Language::Python), Path::new("/tmp/ws"))
            .unwrap();

        assert!(descriptor.compile.is_none());
        assert_eq!(descriptor.source_file, "main.py");

        let execute = &descriptor.execute;
        assert_eq!(execute.image, "oj-python-runner");
        assert_eq!(execute.command, ["sh", "-c", "python main.py < input.txt"]);
        assert_eq!(execute.working_dir, "/workspace");
        assert_eq!(execute.binds, ["/tmp/ws:/workspace:rw"]);
        assert_eq!(execute.memory_cap, "128m");
        assert_eq!(execute.memory_bytes, 128 * 1024 * 1024);
        assert_eq!(execute.nano_cpus, 500_000_000);
        assert!(execute.network_disabled);
        assert_eq!(execute.deadline, Duration::from_millis(1500));
    }

    #[test]
    fn test_cpp_has_compile_phase_with_own_deadline() {
        let descriptor = DescriptorBuilder::default()
            .build(&request(Language::Cpp), Path::new("/tmp/ws"))
            .unwrap();

        let compile = descriptor.compile.unwrap();
        assert_eq!(
            compile.command,
            ["sh", "-c", "g++ -O2 -std=c++17 -o main main.cpp 2>&1"]
        );
        assert_eq!(compile.deadline, Duration::from_secs(10));
        assert_eq!(compile.binds, descriptor.execute.binds);

        assert_eq!(descriptor.execute.command, ["sh", "-c", "./main < input.txt"]);
        assert_eq!(descriptor.execute.deadline, Duration::from_millis(1500));
    }

    #[test]
    fn test_missing_profile_is_unsupported() {
        let builder = DescriptorBuilder::new(BTreeMap::from([(
            Language::Python,
            Language::Python.default_profile(),
        )]));

        let err = builder
            .build(&request(Language::C), Path::new("/tmp/ws"))
            .unwrap_err();
        assert_eq!(err.name, "c");
    }

    #[test]
    fn test_format_memory_cap() {
        assert_eq!(format_memory_cap(256 * 1024 * 1024), "256m");
        assert_eq!(format_memory_cap(2 * 1024 * 1024 * 1024), "2g");
        assert_eq!(format_memory_cap(1000), "1000");
    }

    #[test]
    fn test_nano_cpus_scaling() {
        assert_eq!(to_nano_cpus(1.0), 1_000_000_000);
        assert_eq!(to_nano_cpus(0.25), 250_000_000);
    }
}
