//! List the configured languages and their runner profiles.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;

use oj_sandbox::config::Config;
use oj_sandbox::language::LanguageProfile;
use oj_sandbox::Language;

pub fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    print!("{}", format_profiles(&config.profiles()));
    Ok(())
}

fn format_profiles(profiles: &BTreeMap<Language, LanguageProfile>) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    for (language, profile) in profiles {
        writeln!(&mut out, "{}", language.to_string().bold()).unwrap();
        writeln!(&mut out, "  image:    {}", profile.image.cyan()).unwrap();
        writeln!(&mut out, "  source:   {}", profile.source_file).unwrap();
        if let Some(ref compile) = profile.compile {
            writeln!(&mut out, "  compile:  {compile}").unwrap();
        }
        writeln!(&mut out, "  execute:  {}", profile.execute).unwrap();
    }

    out
}
