//! Embedded templates.

/// Default `oj-sandbox.toml` configuration.
pub const CONFIG_TOML: &str = include_str!("oj-sandbox.toml");
