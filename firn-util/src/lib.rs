//! Small, dependency-free helpers shared by `firn-core`.
//!
//! Nothing in this crate knows about targets, graphs, or staleness; it only
//! deals with paths, timestamps, and spawning a shell command. Keeping it
//! separate mirrors the way the `snowflake-util` crate in the build engine
//! this one is modeled after holds basenames and hashing apart from the
//! graph logic in `snowflake-core`.

pub mod linearize;
pub mod mtime;
pub mod normalize;
pub mod shell;

pub use self::{
    linearize::linearize,
    mtime::{mtime, MISSING_MTIME},
    normalize::normalize_name,
    shell::shell_command,
};
