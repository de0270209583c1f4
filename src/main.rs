use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "oj-sandbox")]
#[command(
    author,
    version,
    about = "Run untrusted submissions in Docker and report a verdict"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "OJ_SANDBOX_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file in the sandbox and print its verdict
    Run(commands::run::RunArgs),

    /// Check that Docker is reachable and runner images are present
    Check,

    /// Write a starter oj-sandbox.toml in the current directory
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// List configured languages and their runner profiles
    Languages,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so `run --json` output stays parseable
    let filter = if cli.verbose {
        EnvFilter::new("oj_sandbox=debug")
    } else {
        EnvFilter::new("oj_sandbox=info")
    };

    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let success = match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Check => commands::check::run().await?,
        Commands::Init { force } => {
            commands::init::run(force)?;
            true
        }
        Commands::Languages => {
            commands::languages::run()?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
