//! CLI command implementations.
//!
//! Each submodule implements an oj-sandbox CLI command with pure core
//! logic separated from IO for testability.

pub mod check;
pub mod init;
pub mod languages;
pub mod run;
