//! What a target does when it is stale: a template string or a callable.

use {
    crate::{registry::Registry, target::{ExtraArgs, ResolvedDep}},
    std::{path::Path, sync::Arc},
};

/// A callable command.
///
/// Receives the target's own name, its resolved dependencies, the registry
/// they live in (so the callable can resolve a dependency's own path or
/// recurse into its resolved deps), and the target's opaque `extra_args`.
/// Returns an exit code with the same `{0, 1, other}` meaning a string
/// command's shell exit status has — see [`Command`].
pub type Thunk = Arc<
    dyn Fn(&str, &[ResolvedDep], &Registry, Option<&ExtraArgs>) -> i32
        + Send + Sync
>;

/// How a stale target regenerates its output.
///
/// See the "Callable commands" design note: the source overloads one field
/// as either a string template or a callable; this is that sum type made
/// explicit.
#[derive(Clone)]
pub enum Command
{
    /// A shell command string containing `$(TARGET)`/`$(DEPENDS)`/`$(FIRST)`
    /// tokens, expanded by [`expand_template`] and run through
    /// [`firn_util::shell_command`].
    Template(String),

    /// A Rust closure invoked directly instead of spawning a process.
    ///
    /// Returning `0` means "ran and succeeded". Returning `1` is a sentinel
    /// meaning "succeeded but do not mark as executed" — the target still
    /// counts as fresh for this run, but its parent sees `child_stale =
    /// false` from it regardless of the rest of the staleness computation.
    /// Any other value aborts the build.
    Thunk(Thunk),
}

/// Expand `$(TARGET)`, `$(DEPENDS)`, and `$(FIRST)` in `template`.
///
/// Substitution is textual, single-pass, and non-recursive: each token is
/// replaced exactly once, in one left-to-right scan of `template`, and the
/// text substituted in is never itself rescanned for further tokens.
pub fn expand_template(
    template: &str,
    target_name: &str,
    depends: &str,
    first: Option<&Path>,
) -> String
{
    const TARGET: &str = "$(TARGET)";
    const DEPENDS: &str = "$(DEPENDS)";
    const FIRST: &str = "$(FIRST)";

    let first_str = first.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (token, replacement) in [
            (TARGET, target_name),
            (DEPENDS, depends),
            (FIRST, first_str.as_str()),
        ] {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        out.push(chars.next().unwrap());
        rest = chars.as_str();
    }
    out
}
