//! Run one source file through the sandbox and print its verdict.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use oj_sandbox::config::{parse_memory_limit, Config};
use oj_sandbox::sandbox::DockerBackend;
use oj_sandbox::verdict::{Status, VerdictReport};
use oj_sandbox::{Language, Orchestrator, ResourceLimits, RunRequest};

// -----------------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------------

/// Options for a single run.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Source file to run
    pub file: PathBuf,

    /// Language (python, cpp, c); inferred from the file extension if omitted
    #[arg(short, long)]
    pub lang: Option<Language>,

    /// File to feed on standard input ("-" reads this process's stdin)
    #[arg(short, long)]
    pub stdin: Option<PathBuf>,

    /// Wall-clock limit for the program, in seconds
    #[arg(short, long)]
    pub time_limit: Option<f64>,

    /// Wall-clock limit for the compiler, in seconds
    #[arg(long)]
    pub compile_time_limit: Option<f64>,

    /// Memory limit (e.g., "256m", "1g")
    #[arg(short, long)]
    pub memory: Option<String>,

    /// CPU share in cores
    #[arg(long)]
    pub cpus: Option<f64>,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the file and prints the verdict. Returns true if the status is OK.
pub async fn run(args: RunArgs) -> Result<bool> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    let language = match args.lang {
        Some(language) => language,
        None => infer_language(&args.file)?,
    };
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read source file: {}", args.file.display()))?;
    let stdin = read_stdin(args.stdin.as_deref())?;

    let limits = apply_overrides(
        config.limits.resource_limits()?,
        &LimitOverrides {
            time_limit: args.time_limit,
            compile_time_limit: args.compile_time_limit,
            memory: args.memory.clone(),
            cpus: args.cpus,
        },
    )?;
    debug!("Effective limits: {:?}", limits);

    let backend = DockerBackend::connect(config.docker.socket.as_deref(), config.docker.call_timeout())
        .context("Failed to connect to Docker")?;
    let orchestrator = Orchestrator::new(
        Arc::new(backend),
        config.descriptor_builder(),
        config.orchestrator_settings(),
    );

    info!("Running {} as {}", args.file.display(), language);
    let request = RunRequest::new(language, source, stdin).with_limits(limits);
    let report = orchestrator.run(&request).await.report();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize verdict")?
        );
    } else {
        print!("{}", format_report(&report));
    }

    Ok(report.status == Status::Ok)
}

// -----------------------------------------------------------------------------
// Helper functions
// -----------------------------------------------------------------------------

/// Limits given on the command line, each replacing the configured value.
#[derive(Debug, Clone, Default)]
struct LimitOverrides {
    time_limit: Option<f64>,
    compile_time_limit: Option<f64>,
    memory: Option<String>,
    cpus: Option<f64>,
}

fn apply_overrides(mut limits: ResourceLimits, overrides: &LimitOverrides) -> Result<ResourceLimits> {
    if let Some(secs) = overrides.time_limit {
        limits.time_limit = seconds(secs, "--time-limit")?;
    }
    if let Some(secs) = overrides.compile_time_limit {
        limits.compile_time_limit = seconds(secs, "--compile-time-limit")?;
    }
    if let Some(ref memory) = overrides.memory {
        limits.memory_limit = parse_memory_limit(memory)?;
    }
    if let Some(cpus) = overrides.cpus {
        limits.cpus = cpus;
    }
    limits.validate()?;
    Ok(limits)
}

fn seconds(secs: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid {flag}: {secs}"))
}

/// Maps a file extension to a language.
fn infer_language(path: &Path) -> Result<Language> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("py") => Ok(Language::Python),
        Some("cpp" | "cc" | "cxx") => Ok(Language::Cpp),
        Some("c") => Ok(Language::C),
        _ => bail!(
            "Cannot infer language from {}; pass --lang",
            path.display()
        ),
    }
}

fn read_stdin(path: Option<&Path>) -> Result<String> {
    match path {
        None => Ok(String::new()),
        Some(p) if p == Path::new("-") => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read standard input")?;
            Ok(input)
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read stdin file: {}", p.display())),
    }
}

/// Formats a verdict for display with colored output.
fn format_report(report: &VerdictReport) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let status = match report.status {
        Status::Ok => report.status.as_str().green().bold(),
        Status::TimeLimitExceeded => report.status.as_str().yellow().bold(),
        _ => report.status.as_str().red().bold(),
    };
    let exit_code = report
        .exit_code
        .map_or_else(|| "-".to_string(), |code| code.to_string());

    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "  Status:     {status}").unwrap();
    writeln!(&mut out, "  Time:       {}s", report.time_sec.to_string().cyan()).unwrap();
    writeln!(&mut out, "  Exit code:  {}", exit_code.cyan()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();

    if !report.stdout.is_empty() {
        writeln!(&mut out, "{}", "stdout:".bold()).unwrap();
        write!(&mut out, "{}", report.stdout).unwrap();
        if !report.stdout.ends_with('\n') {
            out.push('\n');
        }
    }
    if !report.stderr.is_empty() {
        writeln!(&mut out, "{}", "stderr:".bold()).unwrap();
        write!(&mut out, "{}", report.stderr).unwrap();
        if !report.stderr.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
