//! Supported submission languages and their runner profiles.
//!
//! Each language maps to a runner image, the file name the source is
//! written to, and the commands used inside the container:
//! - Python: `python main.py`
//! - C++: `g++ -O2 -std=c++17 -o main main.cpp`, then `./main`
//! - C: `gcc -O2 -std=c17 -o main main.c -lm`, then `./main`

use serde::{Deserialize, Serialize};

/// Languages the orchestrator knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Interpreted, single execute phase.
    Python,
    /// Compiled with `g++`.
    Cpp,
    /// Compiled with `gcc`.
    C,
}

/// Returned when a language name or profile cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: '{name}'. Supported: python, cpp, c")]
pub struct UnsupportedLanguage {
    /// The name that failed to resolve.
    pub name: String,
}

impl Language {
    /// All built-in languages, in display order.
    pub const ALL: [Language; 3] = [Language::Python, Language::Cpp, Language::C];

    /// Returns true if the language needs a compile phase by default.
    pub fn is_compiled(self) -> bool {
        !matches!(self, Self::Python)
    }

    /// Built-in runner profile for this language.
    pub fn default_profile(self) -> LanguageProfile {
        match self {
            Self::Python => LanguageProfile {
                image: "oj-python-runner".to_string(),
                source_file: "main.py".to_string(),
                compile: None,
                execute: "python main.py".to_string(),
            },
            Self::Cpp => LanguageProfile {
                image: "oj-cpp-runner".to_string(),
                source_file: "main.cpp".to_string(),
                compile: Some("g++ -O2 -std=c++17 -o main main.cpp".to_string()),
                execute: "./main".to_string(),
            },
            Self::C => LanguageProfile {
                image: "oj-cpp-runner".to_string(),
                source_file: "main.c".to_string(),
                compile: Some("gcc -O2 -std=c17 -o main main.c -lm".to_string()),
                execute: "./main".to_string(),
            },
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cpp => write!(f, "cpp"),
            Self::C => write!(f, "c"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Self::Python),
            "cpp" | "c++" | "cxx" => Ok(Self::Cpp),
            "c" => Ok(Self::C),
            _ => Err(UnsupportedLanguage {
                name: s.to_string(),
            }),
        }
    }
}

/// How a language is laid out and run inside its runner image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Runner image reference.
    pub image: String,

    /// File name the source is written to inside the workspace.
    pub source_file: String,

    /// Compiler invocation, run from the workspace. `None` for interpreted languages.
    #[serde(default)]
    pub compile: Option<String>,

    /// Program invocation; stdin is redirected onto it.
    pub execute: String,
}

impl LanguageProfile {
    /// Checks that the configured commands are well-formed shell words.
    pub fn validate(&self) -> Result<(), shell_words::ParseError> {
        if let Some(ref compile) = self.compile {
            shell_words::split(compile)?;
        }
        shell_words::split(&self.execute)?;
        Ok(())
    }
}
