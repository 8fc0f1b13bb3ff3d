//! Owning all targets and tracking which have run this build.

use {
    crate::{error::BuildError, target::Target},
    firn_util::normalize_name,
    std::collections::{HashMap, HashSet},
};

/// A handle to a [`Target`] stored in a [`Registry`].
///
/// Targets reference each other by `TargetId` rather than by pointer or
/// `Rc`, which is what lets [`Engine::build_target`][`crate::engine::Engine::build_target`]
/// temporarily take a target out of the arena to recurse into its
/// dependencies without running afoul of the borrow checker or building an
/// ownership cycle (see the "Cyclic references" design note).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TargetId(usize);

/// Owns every [`Target`] constructed so far, keyed by normalized name.
///
/// Also records, via `already_run`, which target names have had their
/// command considered (and possibly invoked) during the current
/// [`Engine::build`][`crate::engine::Engine::build`] call — see §4.4.
pub struct Registry
{
    // `None` only while a target is taken out of the arena by
    // `Engine::build_target` to recurse into its own dependencies; a lookup
    // that finds `None` here means the graph has a cycle.
    targets: Vec<Option<Target>>,
    by_name: HashMap<String, TargetId>,
    already_run: HashSet<String>,
}

impl Registry
{
    /// An empty registry.
    pub fn new() -> Self
    {
        Self {
            targets: Vec::new(),
            by_name: HashMap::new(),
            already_run: HashSet::new(),
        }
    }

    /// Register `target`, returning its id.
    ///
    /// Re-registering a name that already exists overwrites the existing
    /// entry and reuses its id; this is accepted for test harnesses (§4.4)
    /// and is not treated as an error.
    pub fn register(&mut self, mut target: Target) -> TargetId
    {
        let name = normalize_name(&target.name);
        target.name = name.clone();

        if let Some(&id) = self.by_name.get(&name) {
            self.targets[id.0] = Some(target);
            return id;
        }

        let id = TargetId(self.targets.len());
        self.targets.push(Some(target));
        self.by_name.insert(name, id);
        id
    }

    /// Look up a target by name, after normalization.
    pub fn lookup(&self, name: &str) -> Option<TargetId>
    {
        self.by_name.get(&normalize_name(name)).copied()
    }

    /// Borrow a target.
    ///
    /// Panics if called while the target is taken out of the arena (i.e.
    /// from within its own `build_target` call) — that would itself be a
    /// bug in the traversal, not a cycle a caller needs to handle, since
    /// `take` already turns real cycles into [`BuildError::Cycle`].
    pub fn get(&self, id: TargetId) -> &Target
    {
        self.targets[id.0].as_ref()
            .expect("Target was borrowed while taken out of the arena")
    }

    /// The normalized name of a target, without borrowing it mutably.
    pub fn name_of(&self, id: TargetId) -> &str
    {
        &self.get(id).name
    }

    /// Take a target out of the arena so it can be mutated while the
    /// registry itself is mutated recursively (e.g. to build its children).
    ///
    /// Returns [`BuildError::Cycle`] if the target is already taken, which
    /// only happens if some ancestor in the current call stack is this same
    /// target — a dependency cycle.
    pub fn take(&mut self, id: TargetId) -> Result<Target, BuildError>
    {
        self.targets[id.0].take()
            .ok_or_else(|| BuildError::Cycle(self.by_name.iter()
                .find(|&(_, &v)| v == id)
                .map(|(k, _)| k.clone())
                .unwrap_or_default()))
    }

    /// Put a target back into the arena after [`take`][`Self::take`].
    pub fn put(&mut self, id: TargetId, target: Target)
    {
        self.targets[id.0] = Some(target);
    }

    /// Whether `name`'s command has already been considered this run.
    pub fn already_run(&self, name: &str) -> bool
    {
        self.already_run.contains(name)
    }

    /// Record that `name`'s command has been considered this run.
    pub fn mark_run(&mut self, name: String)
    {
        self.already_run.insert(name);
    }

    /// Clear the set of names considered run, starting a fresh build.
    pub fn reset_run_state(&mut self)
    {
        self.already_run.clear();
    }

    /// All registered target names, for diagnostics (§7 "Target-not-found").
    pub fn names(&self) -> impl Iterator<Item = &str>
    {
        self.by_name.keys().map(String::as_str)
    }
}

impl Default for Registry
{
    fn default() -> Self
    {
        Self::new()
    }
}
