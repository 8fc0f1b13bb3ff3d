//! Targets: nodes of the build graph.
//!
//! See the module documentation of [`crate::engine`] for how targets are
//! driven through the staleness algorithm; this module only describes their
//! shape and the heterogeneous dependency tree attached to them.

use {
    crate::{command::Command, file_dep::FileDep, registry::TargetId},
    std::sync::Arc,
};

/// The literal prefix that marks a target name as phony.
///
/// A phony target has no backing file: it is a named goal, not an output.
pub const PHONY_PREFIX: &str = "#phony";

/// Whether `name` is a phony target name.
pub fn is_phony(name: &str) -> bool
{
    name.starts_with(PHONY_PREFIX)
}

/// What a target is for, beyond its place in the graph.
///
/// This controls only the human-readable label used when displaying a
/// target that is about to run its command (§4.3 "Display"); it has no
/// bearing on staleness or resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetKind
{
    /// Compiling a C source file to an object file.
    Compile,
    /// Assembling an assembly source file to an object file.
    Assemble,
    /// Running the compiler's dependency-emission mode to produce a `.d` file.
    Depend,
    /// Linking object files into an executable.
    Link,
    /// Anything else, including hand-wired targets and aggregators.
    Generic,
    /// A phony goal target with no backing file.
    Phony,
}

impl TargetKind
{
    /// A short label suitable for the `summary` display mode.
    pub fn label(self) -> &'static str
    {
        match self {
            Self::Compile  => "CC",
            Self::Assemble => "AS",
            Self::Depend   => "DEP",
            Self::Link     => "LINK",
            Self::Generic  => "GEN",
            Self::Phony    => "PHONY",
        }
    }
}

/// Opaque payload handed through to callable commands.
///
/// Modeled as a type-erased `Arc` rather than a generic parameter on
/// [`Target`], so that `Target`s of unrelated callers can live in the same
/// [`Registry`][`crate::registry::Registry`] arena without infecting it with
/// a type parameter.
pub type ExtraArgs = Arc<dyn std::any::Any + Send + Sync>;

/// A dependency that has already been resolved to a concrete node.
///
/// Used both as the final output of [resolution][`Target::resolve_deps`]
/// and, embedded in a [`Dep::Node`], as a way for a hook or a factory
/// function to splice an already-known node directly into `raw_deps`
/// without going through name lookup.
#[derive(Clone, PartialEq)]
pub enum ResolvedDep
{
    /// A dependency on another target in the same registry.
    Target(TargetId),
    /// A dependency on a plain file that is not itself a target.
    FileDep(FileDep),
}

impl ResolvedDep
{
    /// The path this dependency's output would live at, if it has one.
    ///
    /// `None` for a dependency on a phony target, or a `FileDep` whose
    /// consumer is phony.
    pub fn target_name<'a>(&'a self, registry: &'a crate::registry::Registry)
        -> Option<&'a std::path::Path>
    {
        match self {
            Self::Target(id) => registry.get(*id).target_path(),
            Self::FileDep(fd) => fd.target_name(),
        }
    }
}

/// The heterogeneous dependency tree supplied when a target is constructed.
///
/// See §4.2 and the "Heterogeneous dep lists" design note: a sum type of a
/// raw (possibly whitespace-separated) name, an already-resolved node, or a
/// nested list of more of the same.
#[derive(Clone, PartialEq)]
pub enum Dep
{
    /// One or more whitespace-separated target names.
    Raw(String),
    /// An already-resolved node, spliced in directly.
    Node(ResolvedDep),
    /// A nested list, flattened during resolution.
    Nested(Vec<Dep>),
}

impl Dep
{
    /// An empty dependency list.
    pub fn none() -> Self
    {
        Self::Nested(Vec::new())
    }

    /// Flatten this tree into an ordered sequence of leaves.
    ///
    /// `Raw` entries are *not* split on whitespace here; that happens during
    /// name resolution in [`Target::resolve_deps`], once per leaf, so that a
    /// `Node` leaf is never mistakenly re-interpreted as text.
    fn flatten_into(&self, out: &mut Vec<DepLeaf>)
    {
        match self {
            Self::Raw(s) => out.push(DepLeaf::Raw(s.clone())),
            Self::Node(n) => out.push(DepLeaf::Node(n.clone())),
            Self::Nested(list) => {
                for dep in list {
                    dep.flatten_into(out);
                }
            },
        }
    }

    /// Flatten this tree into an ordered sequence of leaves.
    pub fn flatten(&self) -> Vec<DepLeaf>
    {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

/// A single flattened leaf of a [`Dep`] tree, before name resolution.
#[derive(Clone)]
pub enum DepLeaf
{
    /// A raw, possibly whitespace-separated, string of names.
    Raw(String),
    /// An already-resolved node.
    Node(ResolvedDep),
}

/// The context a pre- or post-hook receives.
///
/// A pre-hook may rewrite `raw_deps`; a post-hook is given the same shape
/// for symmetry, even though none of the hooks this crate builds (see
/// `Engine::make_exe_target`) need write access from the post side.
pub struct HookContext<'a>
{
    /// The name of the target the hook is attached to.
    pub target_name: &'a str,
    /// For a pre-hook: whether staleness so far says the command will run.
    /// For a post-hook: whether the command actually ran.
    pub will_run_command: bool,
    /// The target's dependency tree. A pre-hook may replace it wholesale.
    pub raw_deps: &'a mut Dep,
}

/// A pre- or post-build hook.
///
/// See the "Callable commands" design note — hooks, like commands, are
/// first-class closures rather than a fixed enum of behaviors. Unlike
/// [`Command::Thunk`], a hook is not required to be `Send`: the engine is
/// single-threaded end to end (§5), and `make_exe_target`'s hooks close
/// over an `Rc`-shared `dep_results` map, which itself is not `Send`.
pub type Hook = Box<dyn FnMut(&mut HookContext)>;

/// A node in the build graph.
///
/// See the module documentation and §3 of the specification for the full
/// contract. Construction happens through [`Engine`][`crate::engine::Engine`]
/// factory methods; after [`Engine::build`][`crate::engine::Engine::build`]
/// starts, only `resolved_deps`, hooks (consumed in place), and
/// `force_rebuild` ever change.
pub struct Target
{
    /// Either a filesystem path or a phony name (see [`is_phony`]).
    pub name: String,
    /// Controls only the display label (§4.3 "Display").
    pub kind: TargetKind,
    /// `None` for a pure aggregator target.
    pub command: Option<Command>,
    /// The dependency tree as originally supplied.
    pub raw_deps: Dep,
    /// The most recently resolved dependency list, cached for callers that
    /// want to inspect what a target actually depended on after a build.
    pub resolved_deps: Vec<ResolvedDep>,
    /// Runs before dependency-staleness is finalized; see §4.3 step 5.
    pub pre_hook: Option<Hook>,
    /// Runs after the command (or lack thereof); see §4.3 step 8.
    pub post_hook: Option<Hook>,
    /// Forces the command to run regardless of staleness.
    pub force_rebuild: bool,
    /// Opaque payload passed through to a callable [`Command::Thunk`].
    pub extra_args: Option<ExtraArgs>,
}

impl Target
{
    /// Create a target with no command, no deps, no hooks: a bare aggregator.
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self
    {
        Self {
            name: name.into(),
            kind,
            command: None,
            raw_deps: Dep::none(),
            resolved_deps: Vec::new(),
            pre_hook: None,
            post_hook: None,
            force_rebuild: false,
            extra_args: None,
        }
    }

    /// Whether this target is phony (see [`is_phony`]).
    pub fn is_phony(&self) -> bool
    {
        is_phony(&self.name)
    }

    /// The output path of this target, or `None` if it is phony.
    pub fn target_path(&self) -> Option<&std::path::Path>
    {
        if self.is_phony() {
            None
        } else {
            Some(std::path::Path::new(&self.name))
        }
    }

    /// Resolve `raw_deps` against `registry`, in order: §4.1.
    ///
    /// Each flattened `Raw` leaf is split on whitespace and every resulting
    /// name is looked up; a hit becomes `ResolvedDep::Target`, a miss becomes
    /// a `ResolvedDep::FileDep` naming `self` as the consumer. A `Node` leaf
    /// is passed through unchanged.
    pub fn resolve_deps(&self, registry: &crate::registry::Registry) -> Vec<ResolvedDep>
    {
        let mut out = Vec::new();
        for leaf in self.raw_deps.flatten() {
            match leaf {
                DepLeaf::Node(resolved) => out.push(resolved),
                DepLeaf::Raw(raw) => {
                    for token in raw.split_whitespace() {
                        match registry.lookup(token) {
                            Some(id) => out.push(ResolvedDep::Target(id)),
                            None => out.push(ResolvedDep::FileDep(FileDep::new(token, self.name.clone()))),
                        }
                    }
                },
            }
        }
        out
    }
}

impl Default for Target
{
    fn default() -> Self
    {
        Self::new(String::new(), TargetKind::Generic)
    }
}
