//! Sandboxed execution of untrusted submissions.
//!
//! A [`request::RunRequest`] is turned into a [`descriptor::RunDescriptor`],
//! run phase by phase in throwaway Docker containers under a
//! [`supervisor::Supervisor`], and classified into a [`verdict::Verdict`].
//! [`worker::JobProcessor`] wraps the [`pipeline::Orchestrator`] for
//! background jobs whose progress is kept in a [`store::ResultStore`].

pub mod config;
pub mod descriptor;
pub mod language;
pub mod pipeline;
pub mod request;
pub mod sandbox;
pub mod store;
pub mod supervisor;
pub mod templates;
pub mod verdict;
pub mod worker;
pub mod workspace;

pub use language::Language;
pub use pipeline::Orchestrator;
pub use request::{ResourceLimits, RunRequest};
pub use verdict::{Status, Verdict};
