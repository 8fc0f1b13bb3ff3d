//! Target graph, staleness algorithm, and command execution core of an
//! incremental build engine for embedded firmware projects.
//!
//! This crate is deliberately silent on where targets come from (a config
//! file, a build script, hand-written Rust) — it only specifies what a
//! [`target::Target`] is, how [`engine::Engine`] decides whether one is
//! stale, and how a stale target's command runs. See `demos/firn-demo.rs`
//! in this workspace for an end-to-end wiring example.

pub mod command;
pub mod dep_file;
pub mod engine;
pub mod error;
pub mod file_dep;
pub mod fingerprint;
pub mod options;
pub mod registry;
pub mod target;

pub use crate::{
    command::{Command, Thunk},
    engine::{BuildMode, DisplayMode, Engine, Source},
    error::BuildError,
    file_dep::FileDep,
    fingerprint::{CompConfig, Fingerprintable, LinkConfig},
    options::{OptionRegistry, OptionSpec, OptionValue},
    registry::{Registry, TargetId},
    target::{is_phony, Dep, DepLeaf, ExtraArgs, Hook, HookContext, ResolvedDep, Target, TargetKind, PHONY_PREFIX},
};
