//! The one error type returned from every library entry point.
//!
//! The teacher crate this one is modeled on splits errors by audience:
//! `thiserror` enums for library-facing code (`state::cache_output`) and
//! `anyhow` context for binary-facing code (`action::perform`). The core
//! engine only ever needs the former — per the design note in
//! `SPEC_FULL.md` §9, the process-exit boundary lives outside the core, in
//! whatever embeds it (see `demos/firn-demo.rs`).

use std::{io, path::PathBuf};
use thiserror::Error;

/// Every way a build, a clean, or a configuration change can fail.
///
/// Every variant's `Display` impl is prefixed `[builder]`, matching the
/// diagnostic style specified in §7 of the specification.
#[derive(Debug, Error)]
pub enum BuildError
{
    /// An option name was not present in the engine's option registry.
    #[error("[builder] unknown option `{0}`")]
    UnknownOption(String),

    /// An option's value failed its validator.
    #[error("[builder] invalid value `{value}` for option `{name}`: {reason}")]
    InvalidOptionValue
    {
        name: String,
        value: String,
        reason: String,
    },

    /// The name passed to [`Engine::build`][`crate::engine::Engine::build`]
    /// has no registered target.
    #[error("[builder] target `{name}` not found\navailable targets:\n{available}")]
    TargetNotFound
    {
        name: String,
        available: String,
    },

    /// `build_dir` could not be created.
    #[error("[builder] failed to create build directory `{0}`")]
    CreateBuildDir(PathBuf, #[source] io::Error),

    /// A string command exited with a status other than 0, or a callable
    /// command returned a code outside `{0, 1}`.
    #[error("[builder] command failed for target `{target}` (exit status {status})\nlast command: {}", last_command.as_deref().unwrap_or("<none>"))]
    CommandFailed
    {
        target: String,
        status: i32,
        last_command: Option<String>,
    },

    /// A target was visited a second time within the same
    /// [`Engine::build`][`crate::engine::Engine::build`] call before the
    /// first visit finished — i.e. the dependency graph has a cycle.
    #[error("[builder] dependency cycle detected at target `{0}`")]
    Cycle(String),

    /// Any other I/O failure (reading a `.d` file, writing a fingerprint).
    #[error("[builder] I/O error: {0}")]
    Io(#[from] io::Error),
}
