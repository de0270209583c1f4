//! Verify that Docker is reachable and the runner images are present.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use oj_sandbox::config::Config;
use oj_sandbox::language::LanguageProfile;
use oj_sandbox::sandbox::DockerBackend;
use oj_sandbox::Language;

/// Runs the check. Returns true if everything needed to run submissions
/// is in place.
pub async fn run() -> Result<bool> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    let backend = DockerBackend::connect(config.docker.socket.as_deref(), config.docker.call_timeout())
        .context("Failed to connect to Docker")?;

    let daemon = backend.ping().await.map_err(|e| e.to_string());
    let mut images = Vec::new();
    if daemon.is_ok() {
        for (languages, image) in runner_images(&config.profiles()) {
            let present = match backend.image_exists(&image).await {
                Ok(present) => present,
                Err(e) => {
                    warn!("Failed to inspect image {}: {}", image, e);
                    false
                }
            };
            images.push(ImageCheck {
                languages,
                image,
                present,
            });
        }
    }

    let report = CheckReport { daemon, images };
    print!("{}", format_report(&report));
    info!("Check finished, ready: {}", report.ready());
    Ok(report.ready())
}

/// Presence of one runner image.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageCheck {
    languages: Vec<Language>,
    image: String,
    present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CheckReport {
    daemon: Result<(), String>,
    images: Vec<ImageCheck>,
}

impl CheckReport {
    fn ready(&self) -> bool {
        self.daemon.is_ok() && self.images.iter().all(|i| i.present)
    }
}

/// Distinct images, each with the languages that run on it.
fn runner_images(profiles: &BTreeMap<Language, LanguageProfile>) -> Vec<(Vec<Language>, String)> {
    let mut images: Vec<(Vec<Language>, String)> = Vec::new();
    for (language, profile) in profiles {
        match images.iter_mut().find(|(_, image)| *image == profile.image) {
            Some((languages, _)) => languages.push(*language),
            None => images.push((vec![*language], profile.image.clone())),
        }
    }
    images
}

fn format_report(report: &CheckReport) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    match &report.daemon {
        Ok(()) => writeln!(&mut out, "{} Docker daemon reachable", "✓".green().bold()).unwrap(),
        Err(e) => {
            writeln!(&mut out, "{} Docker daemon unreachable: {}", "✗".red().bold(), e).unwrap();
            return out;
        }
    }

    for check in &report.images {
        let languages = check
            .languages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if check.present {
            writeln!(
                &mut out,
                "{} {} ({})",
                "✓".green().bold(),
                check.image.cyan(),
                languages
            )
            .unwrap();
        } else {
            writeln!(
                &mut out,
                "{} {} ({}) not found locally",
                "✗".red().bold(),
                check.image.cyan(),
                languages
            )
            .unwrap();
        }
    }

    out
}
